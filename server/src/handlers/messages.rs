use axum::extract::State;
use axum::response::Response;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

use crate::models::message::{Conversation, SendMessageRequest};
use crate::realtime::{conversation_room, user_room, ServerEvent};
use crate::state::AppState;
use crate::utils::auth::AuthUser;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::{ApiJson, ApiPath, ApiQuery};
use crate::utils::response::{created, data, empty_success, paginated, success, PageParams};

/// Returns the thread oldest-first and marks the peer's messages as read.
/// The peer is told about the receipt only when something changed.
pub async fn get_conversation(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((event_id, other_id)): ApiPath<(Uuid, Uuid)>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> AppResult<Response> {
    let conversation = Conversation {
        event_id,
        user_id: user.id,
        other_id,
    };

    let (mut messages, total) = state.messages.conversation(conversation, page).await?;
    messages.reverse();

    let marked = state.messages.mark_conversation_read(conversation).await?;
    if marked > 0 {
        let receipt = ServerEvent::MessagesRead {
            event_id,
            reader_id: user.id,
            conversation_id: conversation.id_for_peer(),
        };
        let reached = state.rooms.publish(&user_room(other_id), receipt).await;
        debug!(%event_id, reader = %user.id, marked, reached, "Read receipt published");
    }

    Ok(paginated(messages, page.pagination(total)))
}

pub async fn send_message(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SendMessageRequest>,
) -> AppResult<Response> {
    let message = body.validate(user.id)?;
    if message.receiver_id == user.id {
        return Err(AppError::ValidationError(
            "Cannot send a message to yourself".to_string(),
        ));
    }
    if state.events.find(message.event_id).await?.is_none() {
        return Err(AppError::NotFound("Event not found".to_string()));
    }

    let message = state.messages.create(message).await?;
    info!(
        message_id = %message.id,
        event_id = %message.event_id,
        sender = %message.sender_id,
        receiver = %message.receiver_id,
        "Message sent"
    );

    let notification = ServerEvent::NewMessage {
        message: message.clone(),
        conversation_id: format!("{}-{}", message.event_id, message.sender_id),
    };
    let thread = format!("{}-{}-{}", message.event_id, message.sender_id, message.receiver_id);
    state
        .rooms
        .publish(&user_room(message.receiver_id), notification.clone())
        .await;
    state.rooms.publish(&conversation_room(&thread), notification).await;

    Ok(created(message, "Message sent successfully"))
}

pub async fn unread_count(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath((event_id, other_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Response> {
    let count = state
        .messages
        .unread_count(Conversation {
            event_id,
            user_id: user.id,
            other_id,
        })
        .await?;
    Ok(data(json!({ "unreadCount": count })))
}

pub async fn mark_as_read(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(message_id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let message = state
        .messages
        .mark_read(message_id, user.id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(
                "Message not found or you are not authorized to mark it as read".to_string(),
            )
        })?;
    Ok(success(message, "Message marked as read"))
}

pub async fn delete_message(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(message_id): ApiPath<Uuid>,
) -> AppResult<Response> {
    if !state.messages.soft_delete(message_id, user.id).await? {
        return Err(AppError::NotFound(
            "Message not found or you are not authorized to delete it".to_string(),
        ));
    }
    info!(%message_id, sender = %user.id, "Message deleted");
    Ok(empty_success("Message deleted successfully"))
}
