use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{availability, departments, events, health_check, messages, realtime};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let security = create_security_headers_layer(state.config.production);
    let cors = create_cors_layer(&state.config.allowed_origins);

    Router::new()
        .nest("/api", api_routes())
        .route("/ws", get(realtime::ws_handler))
        .layer(security)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .nest("/departments", department_routes())
        .nest("/events", event_routes())
        .nest("/resource-availability", availability_routes())
        .nest("/messages", message_routes())
}

fn department_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(departments::list_departments).post(departments::create_department),
        )
        .route("/visible", get(departments::list_visible_departments))
        .route("/sync", post(departments::sync_departments))
        .route("/:id", delete(departments::delete_department))
        .route(
            "/:id/requirements",
            get(departments::get_requirements).post(departments::add_requirement),
        )
        .route(
            "/:id/requirements/:requirement_id",
            delete(departments::delete_requirement),
        )
        .route("/:id/visibility", put(departments::set_visibility))
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(events::list_events).post(events::create_event))
        .route("/my", get(events::my_events))
        .route("/tagged", get(events::tagged_events))
        .route(
            "/:id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route("/:id/status", patch(events::update_status))
}

fn availability_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/department/:department_id/requirements",
            get(availability::department_requirements),
        )
        .route(
            "/department/:department_id/availability",
            get(availability::department_availability),
        )
        .route(
            "/department/:department_id/summary",
            get(availability::availability_summary),
        )
        .route("/availability", post(availability::set_availability))
        .route("/availability/bulk", post(availability::bulk_set_availability))
        .route(
            "/availability/:department_id/:requirement_id/:date",
            delete(availability::delete_availability),
        )
        .route("/cleanup-past", post(availability::cleanup_past))
}

fn message_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/conversation/:event_id/:user_id",
            get(messages::get_conversation),
        )
        .route("/send", post(messages::send_message))
        .route(
            "/unread-count/:event_id/:user_id",
            get(messages::unread_count),
        )
        .route("/:message_id", delete(messages::delete_message))
        .route("/:message_id/read", put(messages::mark_as_read))
}
