//! Room-based fan-out for live message updates.
//!
//! ```text
//! HTTP handler ── publish("user-<id>") ──> RoomHub ──broadcast──> Connection ──mpsc──> socket
//! ```
//!
//! Every room is a `tokio::sync::broadcast` channel created on first join and
//! removed when its last member leaves.
//! Delivery is best-effort: publishing to a room nobody joined is a no-op and
//! slow connections skip frames they lagged behind on. The hub lives in
//! [`AppState`](crate::state::AppState), so fan-out only reaches sockets held
//! by this process.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::message::Message;

const ROOM_CAPACITY: usize = 256;

/// Frames pushed to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    NewMessage {
        message: Message,
        conversation_id: String,
    },
    MessagesRead {
        event_id: Uuid,
        reader_id: Uuid,
        conversation_id: String,
    },
    Joined {
        room: String,
    },
    Error {
        message: String,
    },
}

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientEvent {
    JoinUserRoom { user_id: Uuid },
    JoinConversation { conversation_id: String },
    LeaveConversation { conversation_id: String },
}

pub fn user_room(user_id: Uuid) -> String {
    format!("user-{user_id}")
}

/// `conversation_id` is `<event>-<sender>-<receiver>`.
pub fn conversation_room(conversation_id: &str) -> String {
    format!("conversation-{conversation_id}")
}

struct Room {
    sender: broadcast::Sender<ServerEvent>,
    members: usize,
}

type Rooms = Arc<RwLock<HashMap<String, Room>>>;

/// Named rooms with member counts. A room exists while it has members and
/// is removed when the last one releases it.
#[derive(Clone, Default)]
pub struct RoomHub {
    rooms: Rooms,
}

impl RoomHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends `event` to everyone in `room` and returns how many connections
    /// it reached.
    pub async fn publish(&self, room: &str, event: ServerEvent) -> usize {
        let delivered = {
            let rooms = self.rooms.read().await;
            match rooms.get(room) {
                Some(entry) => entry.sender.send(event).unwrap_or(0),
                None => return 0,
            }
        };

        if delivered == 0 {
            self.drop_if_empty(room).await;
        }
        delivered
    }

    /// Joins `room` as a new member. Pair with [`RoomHub::release`].
    pub async fn subscribe(&self, room: &str) -> broadcast::Receiver<ServerEvent> {
        let mut rooms = self.rooms.write().await;
        let entry = rooms.entry(room.to_string()).or_insert_with(|| Room {
            sender: broadcast::channel(ROOM_CAPACITY).0,
            members: 0,
        });
        entry.members += 1;
        entry.sender.subscribe()
    }

    /// Gives up one membership of `room`, removing the room with its last member.
    pub async fn release(&self, room: &str) {
        release_member(&mut *self.rooms.write().await, room);
    }

    /// [`RoomHub::release`] for synchronous callers. Falls back to a spawned
    /// task when the map is busy.
    fn release_detached(&self, room: String) {
        if let Ok(mut rooms) = self.rooms.try_write() {
            release_member(&mut rooms, &room);
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let hub = self.clone();
                handle.spawn(async move { hub.release(&room).await });
            }
            Err(_) => warn!(room, "No runtime to release room membership"),
        }
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    async fn drop_if_empty(&self, room: &str) {
        let mut rooms = self.rooms.write().await;
        if rooms.get(room).is_some_and(|r| r.sender.receiver_count() == 0) {
            rooms.remove(room);
            debug!(room, "Dropped empty room");
        }
    }
}

fn release_member(rooms: &mut HashMap<String, Room>, room: &str) {
    let Some(entry) = rooms.get_mut(room) else {
        return;
    };
    entry.members = entry.members.saturating_sub(1);
    if entry.members == 0 {
        rooms.remove(room);
        debug!(room, "Dropped empty room");
    }
}

/// Room membership of one socket. Joined rooms are forwarded into
/// `outbound`; dropping the connection leaves every room.
pub struct Connection {
    hub: RoomHub,
    outbound: mpsc::Sender<ServerEvent>,
    rooms: HashMap<String, JoinHandle<()>>,
}

impl Connection {
    pub fn new(hub: RoomHub, outbound: mpsc::Sender<ServerEvent>) -> Self {
        Self {
            hub,
            outbound,
            rooms: HashMap::new(),
        }
    }

    pub async fn handle(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::JoinUserRoom { user_id } => self.join(user_room(user_id)).await,
            ClientEvent::JoinConversation { conversation_id } => {
                self.join(conversation_room(&conversation_id)).await;
            }
            ClientEvent::LeaveConversation { conversation_id } => {
                self.leave(&conversation_room(&conversation_id)).await;
            }
        }
    }

    /// Joining a room twice keeps a single subscription.
    pub async fn join(&mut self, room: String) {
        if !self.rooms.contains_key(&room) {
            let receiver = self.hub.subscribe(&room).await;
            let forwarder = forward(receiver, self.outbound.clone(), room.clone());
            self.rooms.insert(room.clone(), forwarder);
            debug!(room, "Joined room");
        }
        let _ = self.outbound.send(ServerEvent::Joined { room }).await;
    }

    pub async fn leave(&mut self, room: &str) {
        if let Some(forwarder) = self.rooms.remove(room) {
            forwarder.abort();
            self.hub.release(room).await;
            debug!(room, "Left room");
        }
    }

    pub fn is_member(&self, room: &str) -> bool {
        self.rooms.contains_key(room)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        for (room, forwarder) in self.rooms.drain() {
            forwarder.abort();
            self.hub.release_detached(room);
        }
    }
}

fn forward(
    mut receiver: broadcast::Receiver<ServerEvent>,
    outbound: mpsc::Sender<ServerEvent>,
    room: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if outbound.send(event).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(room, skipped, "Connection lagged behind room");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    fn read_event(reader: Uuid) -> ServerEvent {
        ServerEvent::MessagesRead {
            event_id: Uuid::nil(),
            reader_id: reader,
            conversation_id: format!("{}-{reader}", Uuid::nil()),
        }
    }

    #[test]
    fn test_client_event_wire_format() {
        let id = Uuid::new_v4();
        let parsed: ClientEvent =
            serde_json::from_str(&format!(r#"{{"type":"join-user-room","userId":"{id}"}}"#)).unwrap();
        assert_eq!(parsed, ClientEvent::JoinUserRoom { user_id: id });

        let parsed: ClientEvent =
            serde_json::from_str(r#"{"type":"leave-conversation","conversationId":"a-b-c"}"#).unwrap();
        assert_eq!(
            parsed,
            ClientEvent::LeaveConversation {
                conversation_id: "a-b-c".into()
            }
        );
    }

    #[test]
    fn test_server_event_wire_format() {
        let reader = Uuid::new_v4();
        let json = serde_json::to_value(read_event(reader)).unwrap();
        assert_eq!(json["type"], "messages-read");
        assert_eq!(json["readerId"], reader.to_string());
        assert!(json.get("conversationId").is_some());
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let hub = RoomHub::new();
        assert_eq!(hub.publish("user-nobody", read_event(Uuid::nil())).await, 0);
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_connection_receives_joined_rooms_only() {
        let hub = RoomHub::new();
        let (tx, mut rx) = mpsc::channel(16);
        let mut conn = Connection::new(hub.clone(), tx);
        let user = Uuid::new_v4();

        conn.handle(ClientEvent::JoinUserRoom { user_id: user }).await;
        conn.handle(ClientEvent::JoinUserRoom { user_id: user }).await;
        assert!(matches!(rx.recv().await, Some(ServerEvent::Joined { .. })));
        assert!(matches!(rx.recv().await, Some(ServerEvent::Joined { .. })));

        hub.publish(&user_room(Uuid::new_v4()), read_event(Uuid::nil())).await;
        assert_eq!(hub.publish(&user_room(user), read_event(user)).await, 1);

        let got = timeout(Duration::from_secs(1), rx.recv()).await.unwrap();
        assert!(matches!(got, Some(ServerEvent::MessagesRead { reader_id, .. }) if reader_id == user));
    }

    #[tokio::test]
    async fn test_leave_stops_forwarding() {
        let hub = RoomHub::new();
        let (tx, mut rx) = mpsc::channel(16);
        let mut conn = Connection::new(hub.clone(), tx);

        conn.handle(ClientEvent::JoinConversation {
            conversation_id: "e-a-b".into(),
        })
        .await;
        let _joined = rx.recv().await;
        assert!(conn.is_member("conversation-e-a-b"));

        conn.handle(ClientEvent::LeaveConversation {
            conversation_id: "e-a-b".into(),
        })
        .await;
        assert!(!conn.is_member("conversation-e-a-b"));
        tokio::task::yield_now().await;

        hub.publish("conversation-e-a-b", read_event(Uuid::nil())).await;
        assert!(timeout(Duration::from_millis(50), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn test_leave_removes_empty_room() {
        let hub = RoomHub::new();
        let (tx, mut rx) = mpsc::channel(16);
        let mut conn = Connection::new(hub.clone(), tx);

        for i in 0..100 {
            let conversation_id = format!("x-{i}");
            conn.handle(ClientEvent::JoinConversation {
                conversation_id: conversation_id.clone(),
            })
            .await;
            let _joined = rx.recv().await;
            conn.handle(ClientEvent::LeaveConversation { conversation_id }).await;
        }
        assert_eq!(hub.room_count().await, 0);
    }

    #[tokio::test]
    async fn test_room_survives_until_last_member_goes() {
        let hub = RoomHub::new();
        let (tx, _rx) = mpsc::channel(16);
        let mut first = Connection::new(hub.clone(), tx.clone());
        let mut second = Connection::new(hub.clone(), tx);
        let user = Uuid::new_v4();

        first.handle(ClientEvent::JoinUserRoom { user_id: user }).await;
        second.handle(ClientEvent::JoinUserRoom { user_id: user }).await;
        second
            .handle(ClientEvent::JoinConversation {
                conversation_id: "e-a-b".into(),
            })
            .await;
        assert_eq!(hub.room_count().await, 2);

        drop(first);
        assert_eq!(hub.room_count().await, 2);

        drop(second);
        assert_eq!(hub.room_count().await, 0);
    }
}
