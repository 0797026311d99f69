use axum::extract::State;
use axum::response::Response;
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::handlers::departments::find_department;
use crate::models::availability::{
    AvailabilityKey, AvailabilityQuery, AvailabilitySummary, AvailabilityUpsert,
    BulkAvailabilityRequest, BulkAvailabilityResult, BulkItemError, DateRange,
    SetAvailabilityRequest, SummaryQuery,
};
use crate::models::department::Requirement;
use crate::scheduler::{cleanup_past_availability, local_date};
use crate::state::AppState;
use crate::utils::auth::AuthUser;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::{ApiJson, ApiPath, ApiQuery};
use crate::utils::response::{data, empty_success, success};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DepartmentRequirements {
    department_id: Uuid,
    department_name: String,
    requirements: Vec<Requirement>,
}

pub async fn department_requirements(
    _user: AuthUser,
    State(state): State<AppState>,
    ApiPath(department_id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let department = find_department(&state, department_id).await?;
    Ok(data(DepartmentRequirements {
        department_id: department.id,
        department_name: department.name,
        requirements: department.requirements,
    }))
}

pub async fn department_availability(
    _user: AuthUser,
    State(state): State<AppState>,
    ApiPath(department_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<AvailabilityQuery>,
) -> AppResult<Response> {
    let range = query.range();
    if range.is_some_and(|r| r.end < r.start) {
        return Err(AppError::ValidationError(
            "startDate must not be after endDate".to_string(),
        ));
    }
    Ok(data(state.availability.list(department_id, range).await?))
}

pub async fn set_availability(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SetAvailabilityRequest>,
) -> AppResult<Response> {
    let (Some(department_id), Some(requirement_id), Some(requirement_text), Some(date)) = (
        body.department_id,
        body.requirement_id,
        body.requirement_text.filter(|t| !t.trim().is_empty()),
        body.date,
    ) else {
        return Err(AppError::ValidationError(
            "Department ID, requirement ID, requirement text, and date are required".to_string(),
        ));
    };

    let department_name = department_name(&state, department_id, body.department_name).await?;
    let upsert = AvailabilityUpsert {
        key: AvailabilityKey {
            department_id,
            requirement_id,
            date,
        },
        department_name,
        requirement_text,
        is_available: body.is_available,
        notes: body.notes,
        quantity: body.quantity,
        max_capacity: body.max_capacity,
        set_by: user.id,
    };

    let row = state.availability.upsert(upsert).await?;
    info!(%department_id, %requirement_id, %date, available = row.is_available, "Availability set");

    Ok(success(row, "Availability updated successfully"))
}

/// Upserts every item independently; one bad item does not fail the batch.
pub async fn bulk_set_availability(
    user: AuthUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<BulkAvailabilityRequest>,
) -> AppResult<Response> {
    let (Some(department_id), Some(date), Some(items)) =
        (body.department_id, body.date, body.requirements)
    else {
        return Err(AppError::ValidationError(
            "Department ID, date, and requirements array are required".to_string(),
        ));
    };

    let department_name = department_name(&state, department_id, body.department_name).await?;
    let mut results = Vec::with_capacity(items.len());
    let mut errors = Vec::new();

    for item in items {
        let Some(requirement_id) = item.requirement_id else {
            errors.push(BulkItemError {
                requirement_id: None,
                error: "Requirement ID is required".to_string(),
            });
            continue;
        };
        let key = AvailabilityKey {
            department_id,
            requirement_id,
            date,
        };

        // Text is only needed to create a row; updates keep the stored one.
        let requirement_text = match item.requirement_text.filter(|t| !t.trim().is_empty()) {
            Some(text) => text,
            None => match state.availability.find(key).await {
                Ok(Some(existing)) => existing.requirement_text,
                Ok(None) => {
                    errors.push(BulkItemError {
                        requirement_id: Some(requirement_id),
                        error: "Requirement text is required for new availability records"
                            .to_string(),
                    });
                    continue;
                }
                Err(e) => {
                    errors.push(BulkItemError {
                        requirement_id: Some(requirement_id),
                        error: e.to_string(),
                    });
                    continue;
                }
            },
        };

        let upsert = AvailabilityUpsert {
            key,
            department_name: department_name.clone(),
            requirement_text,
            is_available: item.is_available,
            notes: item.notes,
            quantity: item.quantity,
            max_capacity: item.max_capacity,
            set_by: user.id,
        };

        match state.availability.upsert(upsert).await {
            Ok(row) => results.push(row),
            Err(e) => {
                warn!(%requirement_id, error = %e, "Bulk availability item failed");
                errors.push(BulkItemError {
                    requirement_id: Some(requirement_id),
                    error: e.to_string(),
                });
            }
        }
    }

    let result = BulkAvailabilityResult {
        successful: results.len(),
        failed: errors.len(),
        results,
        errors,
    };
    info!(%department_id, %date, successful = result.successful, failed = result.failed, "Bulk availability processed");

    Ok(success(result, "Bulk availability update completed"))
}

pub async fn delete_availability(
    _user: AuthUser,
    State(state): State<AppState>,
    ApiPath((department_id, requirement_id, date)): ApiPath<(Uuid, Uuid, NaiveDate)>,
) -> AppResult<Response> {
    let key = AvailabilityKey {
        department_id,
        requirement_id,
        date,
    };
    if !state.availability.delete(key).await? {
        return Err(AppError::NotFound("Availability record not found".to_string()));
    }
    Ok(empty_success("Availability record deleted successfully"))
}

/// Per-requirement tallies, optionally limited to one calendar month.
pub async fn availability_summary(
    _user: AuthUser,
    State(state): State<AppState>,
    ApiPath(department_id): ApiPath<Uuid>,
    ApiQuery(query): ApiQuery<SummaryQuery>,
) -> AppResult<Response> {
    let range = match (query.month, query.year) {
        (Some(month), Some(year)) => Some(
            DateRange::month(year, month)
                .ok_or_else(|| AppError::ValidationError("Invalid month or year".to_string()))?,
        ),
        _ => None,
    };

    let rows = state.availability.list(department_id, range).await?;
    Ok(data(AvailabilitySummary::tally(&rows)))
}

pub async fn cleanup_past(user: AuthUser, State(state): State<AppState>) -> AppResult<Response> {
    let today = local_date(Utc::now(), state.config.cleanup_timezone);
    let deleted = cleanup_past_availability(state.availability.as_ref(), today).await?;
    info!(deleted, by = %user.id, "Manual availability cleanup finished");

    Ok(success(
        json!({ "deletedCount": deleted }),
        format!("Deleted {deleted} past resource availability records"),
    ))
}

/// The name stored on new rows: the one supplied by the client, else the
/// department's own.
async fn department_name(
    state: &AppState,
    department_id: Uuid,
    supplied: Option<String>,
) -> AppResult<String> {
    match supplied.filter(|n| !n.trim().is_empty()) {
        Some(name) => Ok(name.trim().to_string()),
        None => Ok(find_department(state, department_id).await?.name),
    }
}
