use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::utils::error::AppError;

pub const MAX_CONTENT_CHARS: usize = 2000;
const DEFAULT_MESSAGE_TYPE: &str = "text";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub event_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub message_type: String,
    pub timestamp: DateTime<Utc>,
    pub is_read: bool,
    pub is_deleted: bool,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Message {
    /// True when the message belongs to the thread between `a` and `b` on `event_id`,
    /// in either direction.
    pub fn in_conversation(&self, event_id: Uuid, a: Uuid, b: Uuid) -> bool {
        self.event_id == event_id
            && ((self.sender_id == a && self.receiver_id == b)
                || (self.sender_id == b && self.receiver_id == a))
    }
}

/// One side's view of a thread: `user_id` is the caller, `other_id` the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conversation {
    pub event_id: Uuid,
    pub user_id: Uuid,
    pub other_id: Uuid,
}

impl Conversation {
    /// Identifier the peer uses for this thread, `<event>-<user>`.
    pub fn id_for_peer(&self) -> String {
        format!("{}-{}", self.event_id, self.user_id)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub event_id: Option<Uuid>,
    pub receiver_id: Option<Uuid>,
    pub content: Option<String>,
    pub message_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub event_id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub message_type: String,
}

impl SendMessageRequest {
    pub fn validate(self, sender_id: Uuid) -> Result<NewMessage, AppError> {
        let (Some(event_id), Some(receiver_id), Some(content)) = (
            self.event_id,
            self.receiver_id,
            self.content.filter(|c| !c.is_empty()),
        ) else {
            return Err(AppError::ValidationError(
                "Event ID, receiver ID, and content are required".to_string(),
            ));
        };

        // The limit applies to the content as sent, before trimming.
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(AppError::ValidationError(format!(
                "Message cannot exceed {MAX_CONTENT_CHARS} characters"
            )));
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(AppError::ValidationError(
                "Message content cannot be empty".to_string(),
            ));
        }

        Ok(NewMessage {
            event_id,
            sender_id,
            receiver_id,
            content: content.to_string(),
            message_type: self
                .message_type
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MESSAGE_TYPE.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(content: Option<&str>) -> SendMessageRequest {
        SendMessageRequest {
            event_id: Some(Uuid::new_v4()),
            receiver_id: Some(Uuid::new_v4()),
            content: content.map(str::to_string),
            message_type: None,
        }
    }

    #[test]
    fn test_content_is_trimmed_and_typed() {
        let msg = request(Some("  hello  ")).validate(Uuid::new_v4()).unwrap();
        assert_eq!(msg.content, "hello");
        assert_eq!(msg.message_type, "text");
    }

    #[test]
    fn test_missing_and_blank_content() {
        assert!(request(None).validate(Uuid::new_v4()).is_err());
        assert!(request(Some("   ")).validate(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_length_limit_counts_characters() {
        let at_limit = "é".repeat(MAX_CONTENT_CHARS);
        assert!(request(Some(&at_limit)).validate(Uuid::new_v4()).is_ok());
        let over = "a".repeat(MAX_CONTENT_CHARS + 1);
        assert!(request(Some(&over)).validate(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_length_limit_includes_surrounding_whitespace() {
        let padded = format!("{}{}", "a".repeat(MAX_CONTENT_CHARS), " ".repeat(50));
        let err = request(Some(&padded)).validate(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Message cannot exceed 2000 characters");
    }

    #[test]
    fn test_empty_content_counts_as_missing() {
        let err = request(Some("")).validate(Uuid::new_v4()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: Event ID, receiver ID, and content are required"
        );
        let err = request(Some("  ")).validate(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Message content cannot be empty");
    }

    #[test]
    fn test_conversation_membership_is_unordered() {
        let (event, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let msg = Message {
            id: Uuid::new_v4(),
            event_id: event,
            sender_id: b,
            receiver_id: a,
            content: "hi".into(),
            message_type: "text".into(),
            timestamp: Utc::now(),
            is_read: false,
            is_deleted: false,
            deleted_at: None,
        };
        assert!(msg.in_conversation(event, a, b));
        assert!(msg.in_conversation(event, b, a));
        assert!(!msg.in_conversation(Uuid::new_v4(), a, b));
    }
}
