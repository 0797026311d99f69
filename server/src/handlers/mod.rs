use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod availability;
pub mod departments;
pub mod events;
pub mod messages;
pub mod realtime;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "event-scheduler-api",
    };

    success(payload, "Event Scheduler API is running")
}
