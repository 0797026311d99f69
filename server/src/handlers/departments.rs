use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::models::department::{
    normalize_requirement, Department, DepartmentFilter, NewDepartment, RequirementRemoval,
};
use crate::state::AppState;
use crate::store::DUPLICATE_DEPARTMENT;
use crate::utils::auth::AdminUser;
use crate::utils::error::{AppError, AppResult};
use crate::utils::extract::{ApiJson, ApiPath, ApiQuery};
use crate::utils::response::{created, data, empty_success, paginated, success, PageParams};

const DEPARTMENT_NOT_FOUND: &str = "Department not found";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateDepartmentRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
    pub is_visible: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AddRequirementRequest {
    pub requirement: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SyncDepartmentsRequest {
    pub departments: Option<Vec<SyncEntry>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncEntry {
    pub name: String,
    pub is_visible: Option<bool>,
}

pub async fn list_departments(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiQuery(filter): ApiQuery<DepartmentFilter>,
    ApiQuery(page): ApiQuery<PageParams>,
) -> AppResult<Response> {
    let (departments, total) = state.departments.list(&filter, page).await?;
    Ok(paginated(departments, page.pagination(total)))
}

pub async fn create_department(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateDepartmentRequest>,
) -> AppResult<Response> {
    let department = NewDepartment::new(
        body.name.as_deref().unwrap_or_default(),
        body.requirements,
        body.is_visible.unwrap_or(true),
    )
    .ok_or_else(|| AppError::ValidationError("Department name is required".to_string()))?;

    if state.departments.find_by_name(&department.name).await?.is_some() {
        return Err(AppError::Duplicate(DUPLICATE_DEPARTMENT.to_string()));
    }

    let department = state.departments.create(department).await?;
    info!(department = %department.name, admin = %admin.id, "Department created");

    Ok(created(department, "Department created successfully"))
}

pub async fn list_visible_departments(State(state): State<AppState>) -> AppResult<Response> {
    Ok(data(state.departments.list_visible().await?))
}

pub async fn get_requirements(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Response> {
    let department = find_department(&state, id).await?;
    Ok(data(department.requirements))
}

pub async fn add_requirement(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<AddRequirementRequest>,
) -> AppResult<Response> {
    let text = body
        .requirement
        .as_deref()
        .and_then(normalize_requirement)
        .ok_or_else(|| AppError::ValidationError("Requirement text is required".to_string()))?;

    let requirement = state
        .departments
        .add_requirement(id, &text)
        .await?
        .ok_or_else(|| AppError::NotFound(DEPARTMENT_NOT_FOUND.to_string()))?;

    Ok(created(requirement, "Requirement added successfully"))
}

pub async fn delete_requirement(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath((id, requirement_id)): ApiPath<(Uuid, Uuid)>,
) -> AppResult<Response> {
    match state.departments.remove_requirement(id, requirement_id).await? {
        RequirementRemoval::Removed => Ok(empty_success("Requirement deleted successfully")),
        RequirementRemoval::DepartmentMissing => {
            Err(AppError::NotFound(DEPARTMENT_NOT_FOUND.to_string()))
        }
        RequirementRemoval::RequirementMissing => {
            Err(AppError::NotFound("Requirement not found".to_string()))
        }
    }
}

pub async fn set_visibility(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(body): ApiJson<Value>,
) -> AppResult<Response> {
    let is_visible = body
        .get("isVisible")
        .and_then(Value::as_bool)
        .ok_or_else(|| AppError::ValidationError("isVisible must be a boolean value".to_string()))?;

    let department = state
        .departments
        .set_visibility(id, is_visible)
        .await?
        .ok_or_else(|| AppError::NotFound(DEPARTMENT_NOT_FOUND.to_string()))?;

    Ok(success(department, "Department visibility updated successfully"))
}

pub async fn delete_department(
    AdminUser(admin): AdminUser,
    State(state): State<AppState>,
    ApiPath(id): ApiPath<Uuid>,
) -> AppResult<Response> {
    if !state.departments.delete(id).await? {
        return Err(AppError::NotFound(DEPARTMENT_NOT_FOUND.to_string()));
    }
    info!(department_id = %id, admin = %admin.id, "Department deleted");
    Ok(empty_success("Department deleted successfully"))
}

/// Creates any listed department that does not exist yet and returns the
/// stored record for every entry.
pub async fn sync_departments(
    _admin: AdminUser,
    State(state): State<AppState>,
    ApiJson(body): ApiJson<SyncDepartmentsRequest>,
) -> AppResult<Response> {
    let entries = body
        .departments
        .ok_or_else(|| AppError::ValidationError("Departments array is required".to_string()))?;

    let mut synced: Vec<Department> = Vec::with_capacity(entries.len());
    for entry in entries {
        let Some(department) =
            NewDepartment::new(&entry.name, Vec::new(), entry.is_visible.unwrap_or(true))
        else {
            warn!("Skipping department sync entry without a name");
            continue;
        };

        let stored = match state.departments.find_by_name(&department.name).await? {
            Some(existing) => existing,
            None => {
                let name = department.name.clone();
                match state.departments.create(department).await {
                    Ok(created) => created,
                    // Created concurrently; use the winner's row.
                    Err(AppError::Duplicate(_)) => state
                        .departments
                        .find_by_name(&name)
                        .await?
                        .ok_or_else(|| AppError::NotFound(DEPARTMENT_NOT_FOUND.to_string()))?,
                    Err(e) => return Err(e),
                }
            }
        };
        synced.push(stored);
    }

    Ok(success(synced, "Departments synced successfully"))
}

pub(crate) async fn find_department(state: &AppState, id: Uuid) -> AppResult<Department> {
    state
        .departments
        .find(id)
        .await?
        .ok_or_else(|| AppError::NotFound(DEPARTMENT_NOT_FOUND.to_string()))
}
