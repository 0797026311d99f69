use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::models::department::normalize_name;
use crate::models::event::{CreateEventRequest, Event, EventFilter, EventStatus, UpdateEventRequest};
use crate::state::AppState;
use crate::utils::auth::{AdminUser, AuthUser};
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::{ApiJson, ApiPath, ApiQuery};
use crate::utils::response::{created, data, empty_success, paginated, success, PageParams};

const EVENT_NOT_FOUND: &str = "Event not found";
const INVALID_TRANSITION: &str = "Invalid status transition";

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: EventStatus,
}

pub async fn create_event(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateEventRequest>,
) -> AppResult<Response> {
    let event = body.validate(user.id)?;

    for name in &event.tagged_departments {
        if state.departments.find_by_name(name).await?.is_none() {
            return Err(AppError::ValidationError(format!("Department not found: {name}")));
        }
    }

    let event = state.events.create(event).await?;
    info!(event_id = %event.id, owner = %user.id, status = ?event.status, "Event created");

    Ok(created(event, "Event request submitted successfully"))
}

pub async fn list_events(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<EventFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> AppResult<Response> {
    let (events, total) = state.events.list(&filter, page).await?;
    Ok(paginated(events, page.pagination(total)))
}

pub async fn my_events(user: AuthUser, State(state): State<AppState>) -> AppResult<Response> {
    Ok(data(state.events.list_by_owner(user.id).await?))
}

/// Events that tag the caller's department.
pub async fn tagged_events(user: AuthUser, State(state): State<AppState>) -> AppResult<Response> {
    let events = match user.department.as_deref().and_then(normalize_name) {
        Some(department) => state.events.list_tagged(&department).await?,
        None => Vec::new(),
    };
    Ok(data(events))
}

pub async fn get_event(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let event = find_event(&state, id).await?;

    let tagged = user
        .department
        .as_deref()
        .is_some_and(|department| event.is_tagged(department));
    if !(user.is_admin() || event.owner_id == user.id || tagged) {
        return Err(AppError::Forbidden("You do not have access to this event".to_string()));
    }

    Ok(data(event))
}

pub async fn update_event(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateEventRequest>,
) -> AppResult<Response> {
    let event = find_event(&state, id).await?;
    if event.owner_id != user.id {
        return Err(AppError::Forbidden(
            "Only the event owner can modify this event".to_string(),
        ));
    }

    let update = body.apply_to(&event)?;
    let event = state
        .events
        .update_details(id, update)
        .await?
        .ok_or_else(|| AppError::NotFound(EVENT_NOT_FOUND.to_string()))?;

    Ok(success(event, "Event updated successfully"))
}

/// Admins drive the review workflow; owners may only submit their drafts.
pub async fn update_status(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<UpdateStatusRequest>,
) -> AppResult<Response> {
    let event = find_event(&state, id).await?;
    let next = body.status;

    let owner_submit = event.owner_id == user.id && next == EventStatus::Submitted;
    if !(user.is_admin() || owner_submit) {
        return Err(AppError::Forbidden(
            "You are not allowed to change this event's status".to_string(),
        ));
    }
    if !event.status.can_transition_to(next) {
        return Err(AppError::ValidationError(INVALID_TRANSITION.to_string()));
    }

    let updated = state
        .events
        .transition(id, event.status, next)
        .await?
        .ok_or_else(|| AppError::ValidationError(INVALID_TRANSITION.to_string()))?;
    info!(event_id = %id, from = ?event.status, to = ?next, by = %user.id, "Event status changed");

    Ok(success(updated, "Event status updated successfully"))
}

pub async fn delete_event(
    user: AuthUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let event = find_event(&state, id).await?;
    if event.owner_id != user.id {
        return Err(AppError::Forbidden(
            "Only the event owner can delete this event".to_string(),
        ));
    }

    if !state.events.delete(id).await? {
        return Err(AppError::NotFound(EVENT_NOT_FOUND.to_string()));
    }
    info!(event_id = %id, by = %user.id, "Event deleted");

    Ok(empty_success("Event deleted successfully"))
}

async fn find_event(state: &AppState, id: Uuid) -> AppResult<Event> {
    state
        .events
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(EVENT_NOT_FOUND.to_string()))
}
