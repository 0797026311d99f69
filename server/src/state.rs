use std::sync::Arc;

use crate::config::Config;
use crate::realtime::RoomHub;
use crate::store::{AvailabilityStore, DepartmentStore, EventStore, MessageStore, Store};

/// Shared service context handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub departments: Arc<dyn DepartmentStore>,
    pub events: Arc<dyn EventStore>,
    pub availability: Arc<dyn AvailabilityStore>,
    pub messages: Arc<dyn MessageStore>,
    pub rooms: RoomHub,
}

impl AppState {
    pub fn new<S>(config: Config, store: S) -> Self
    where
        S: Store + 'static,
    {
        let store = Arc::new(store);
        Self {
            config: Arc::new(config),
            departments: Arc::clone(&store) as Arc<dyn DepartmentStore>,
            events: Arc::clone(&store) as Arc<dyn EventStore>,
            availability: Arc::clone(&store) as Arc<dyn AvailabilityStore>,
            messages: store as Arc<dyn MessageStore>,
            rooms: RoomHub::new(),
        }
    }
}
