//! Persistence seams.
//!
//! Handlers talk to storage only through these traits. [`PgStore`] is the
//! production backend; [`MemoryStore`] keeps everything in process.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::availability::{AvailabilityKey, AvailabilityUpsert, DateRange, ResourceAvailability};
use crate::models::department::{Department, DepartmentFilter, NewDepartment, Requirement, RequirementRemoval};
use crate::models::event::{Event, EventFilter, EventStatus, EventUpdate, NewEvent};
use crate::models::message::{Conversation, Message, NewMessage};
use crate::utils::error::AppResult;
use crate::utils::response::PageParams;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub const DUPLICATE_DEPARTMENT: &str = "Department already exists";
pub const DUPLICATE_AVAILABILITY: &str = "Availability already exists for this requirement on this date";

#[async_trait]
pub trait DepartmentStore: Send + Sync {
    /// Filtered page sorted by name, with the total match count.
    async fn list(&self, filter: &DepartmentFilter, page: PageParams) -> AppResult<(Vec<Department>, u64)>;

    async fn list_visible(&self) -> AppResult<Vec<Department>>;

    async fn find(&self, id: Uuid) -> AppResult<Option<Department>>;

    /// Lookup by canonical (uppercased) name.
    async fn find_by_name(&self, name: &str) -> AppResult<Option<Department>>;

    /// Fails with [`AppError::Duplicate`](crate::utils::error::AppError::Duplicate)
    /// when the name is taken.
    async fn create(&self, department: NewDepartment) -> AppResult<Department>;

    async fn add_requirement(&self, id: Uuid, text: &str) -> AppResult<Option<Requirement>>;

    async fn remove_requirement(&self, id: Uuid, requirement_id: Uuid) -> AppResult<RequirementRemoval>;

    async fn set_visibility(&self, id: Uuid, is_visible: bool) -> AppResult<Option<Department>>;

    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create(&self, event: NewEvent) -> AppResult<Event>;

    async fn find(&self, id: Uuid) -> AppResult<Option<Event>>;

    /// Newest first.
    async fn list(&self, filter: &EventFilter, page: PageParams) -> AppResult<(Vec<Event>, u64)>;

    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Event>>;

    async fn list_tagged(&self, department: &str) -> AppResult<Vec<Event>>;

    async fn update_details(&self, id: Uuid, update: EventUpdate) -> AppResult<Option<Event>>;

    /// Moves `id` from `from` to `to`. Returns `None` when the event no longer
    /// has status `from`.
    async fn transition(&self, id: Uuid, from: EventStatus, to: EventStatus) -> AppResult<Option<Event>>;

    async fn delete(&self, id: Uuid) -> AppResult<bool>;
}

#[async_trait]
pub trait AvailabilityStore: Send + Sync {
    /// Insert-or-update on the natural key.
    async fn upsert(&self, upsert: AvailabilityUpsert) -> AppResult<ResourceAvailability>;

    async fn find(&self, key: AvailabilityKey) -> AppResult<Option<ResourceAvailability>>;

    /// Sorted by date, then requirement text.
    async fn list(&self, department_id: Uuid, range: Option<DateRange>) -> AppResult<Vec<ResourceAvailability>>;

    async fn delete(&self, key: AvailabilityKey) -> AppResult<bool>;

    /// Removes every row dated strictly before `today`.
    async fn delete_before(&self, today: NaiveDate) -> AppResult<u64>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn create(&self, message: NewMessage) -> AppResult<Message>;

    /// Non-deleted messages of the thread, newest first, plus their total.
    async fn conversation(&self, conversation: Conversation, page: PageParams) -> AppResult<(Vec<Message>, u64)>;

    /// Flags unread messages from the peer to the caller as read and returns
    /// how many changed.
    async fn mark_conversation_read(&self, conversation: Conversation) -> AppResult<u64>;

    async fn unread_count(&self, conversation: Conversation) -> AppResult<u64>;

    /// Only succeeds for the receiver of a non-deleted message.
    async fn mark_read(&self, id: Uuid, receiver_id: Uuid) -> AppResult<Option<Message>>;

    /// Only succeeds for the sender of a non-deleted message.
    async fn soft_delete(&self, id: Uuid, sender_id: Uuid) -> AppResult<bool>;
}

/// A backend that provides every repository.
pub trait Store: DepartmentStore + EventStore + AvailabilityStore + MessageStore {}

impl<T> Store for T where T: DepartmentStore + EventStore + AvailabilityStore + MessageStore {}
