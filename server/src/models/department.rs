use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub id: Uuid,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    #[sqlx(json)]
    pub requirements: Vec<Requirement>,
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Department {
    pub fn requirement(&self, requirement_id: Uuid) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == requirement_id)
    }
}

/// A department about to be stored. Build it with [`NewDepartment::new`] so
/// the name is always in canonical form.
#[derive(Debug, Clone)]
pub struct NewDepartment {
    pub name: String,
    pub requirements: Vec<String>,
    pub is_visible: bool,
}

impl NewDepartment {
    /// Returns `None` when the name is blank.
    pub fn new(name: &str, requirements: Vec<String>, is_visible: bool) -> Option<Self> {
        let name = normalize_name(name)?;
        let requirements = requirements
            .into_iter()
            .filter_map(|text| normalize_requirement(&text))
            .collect();
        Some(Self {
            name,
            requirements,
            is_visible,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DepartmentFilter {
    pub search: Option<String>,
    pub visible: Option<bool>,
}

impl DepartmentFilter {
    pub fn matches(&self, department: &Department) -> bool {
        let search_ok = match self.search.as_deref().map(str::trim) {
            Some(term) if !term.is_empty() => department
                .name
                .to_lowercase()
                .contains(&term.to_lowercase()),
            _ => true,
        };
        let visible_ok = self.visible.map_or(true, |v| department.is_visible == v);
        search_ok && visible_ok
    }
}

/// Outcome of removing a requirement from a department's list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequirementRemoval {
    Removed,
    DepartmentMissing,
    RequirementMissing,
}

/// Department names are compared and stored trimmed and uppercased.
pub fn normalize_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

pub fn normalize_requirement(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
