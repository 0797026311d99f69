use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::department::normalize_name;
use crate::utils::error::AppError;

const CONTACT_NUMBER_DIGITS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "event_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    Draft,
    Submitted,
    Approved,
    Rejected,
    Completed,
}

impl EventStatus {
    pub fn can_transition_to(self, next: EventStatus) -> bool {
        use EventStatus::*;
        matches!(
            (self, next),
            (Draft, Submitted) | (Submitted, Approved) | (Submitted, Rejected) | (Approved, Completed)
        )
    }
}

/// Metadata of a file attached to an event request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub filename: String,
    pub original_name: String,
    pub mimetype: String,
    pub size: i64,
}

/// A requirement the requester picked from a tagged department's catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedRequirement {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub selected: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

pub type DepartmentRequirements = BTreeMap<String, Vec<SelectedRequirement>>;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub requestor: String,
    pub location: String,
    pub participants: i32,
    pub vip: i32,
    pub vvip: i32,
    pub without_gov: bool,
    pub multiple_locations: bool,
    pub description: String,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_date: NaiveDate,
    pub end_time: NaiveTime,
    pub contact_number: String,
    pub contact_email: String,
    #[sqlx(json)]
    pub attachments: Vec<Attachment>,
    pub tagged_departments: Vec<String>,
    #[sqlx(json)]
    pub department_requirements: DepartmentRequirements,
    pub status: EventStatus,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Event {
    pub fn schedule(&self) -> Schedule {
        Schedule {
            start_date: self.start_date,
            start_time: self.start_time,
            end_date: self.end_date,
            end_time: self.end_time,
        }
    }

    pub fn is_tagged(&self, department: &str) -> bool {
        normalize_name(department)
            .map_or(false, |name| self.tagged_departments.iter().any(|d| *d == name))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_date: NaiveDate,
    pub end_time: NaiveTime,
}

impl Schedule {
    pub fn start(&self) -> NaiveDateTime {
        self.start_date.and_time(self.start_time)
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end_date.and_time(self.end_time)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.end() <= self.start() {
            return Err(AppError::ValidationError(
                "Event end must be after its start".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    #[serde(alias = "eventTitle")]
    pub title: String,
    pub requestor: String,
    pub location: String,
    pub participants: i32,
    #[serde(default)]
    pub vip: i32,
    #[serde(default)]
    pub vvip: i32,
    #[serde(default)]
    pub without_gov: bool,
    #[serde(default)]
    pub multiple_locations: bool,
    #[serde(default)]
    pub description: Option<String>,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_date: NaiveDate,
    pub end_time: NaiveTime,
    pub contact_number: String,
    pub contact_email: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub tagged_departments: Vec<String>,
    #[serde(default)]
    pub department_requirements: DepartmentRequirements,
    #[serde(default)]
    pub as_draft: bool,
}

/// A validated event ready to be stored.
#[derive(Debug, Clone)]
pub struct NewEvent {
    pub owner_id: Uuid,
    pub title: String,
    pub requestor: String,
    pub location: String,
    pub participants: i32,
    pub vip: i32,
    pub vvip: i32,
    pub without_gov: bool,
    pub multiple_locations: bool,
    pub description: String,
    pub schedule: Schedule,
    pub contact_number: String,
    pub contact_email: String,
    pub attachments: Vec<Attachment>,
    pub tagged_departments: Vec<String>,
    pub department_requirements: DepartmentRequirements,
    pub status: EventStatus,
}

impl CreateEventRequest {
    /// Checks field rules and canonicalizes department names. Whether the
    /// tagged departments exist is left to the caller.
    pub fn validate(self, owner_id: Uuid) -> Result<NewEvent, AppError> {
        let title = required(&self.title, "Event title")?;
        let requestor = required(&self.requestor, "Requestor")?;
        let location = required(&self.location, "Location")?;
        let contact_number = required(&self.contact_number, "Contact number")?;
        let contact_email = required(&self.contact_email, "Contact email")?;

        if self.participants <= 0 {
            return Err(AppError::ValidationError(
                "Participants must be greater than zero".to_string(),
            ));
        }
        if self.vip < 0 || self.vvip < 0 {
            return Err(AppError::ValidationError(
                "VIP counts cannot be negative".to_string(),
            ));
        }
        if contact_number.len() != CONTACT_NUMBER_DIGITS
            || !contact_number.chars().all(|c| c.is_ascii_digit())
        {
            return Err(AppError::ValidationError(format!(
                "Contact number must be {CONTACT_NUMBER_DIGITS} digits"
            )));
        }
        if !contact_email.contains('@') {
            return Err(AppError::ValidationError(
                "Contact email is invalid".to_string(),
            ));
        }

        let schedule = Schedule {
            start_date: self.start_date,
            start_time: self.start_time,
            end_date: self.end_date,
            end_time: self.end_time,
        };
        schedule.validate()?;

        let tagged_departments = normalize_tags(&self.tagged_departments);
        let department_requirements =
            select_requirements(self.department_requirements, &tagged_departments)?;

        let status = if self.as_draft {
            EventStatus::Draft
        } else {
            EventStatus::Submitted
        };

        Ok(NewEvent {
            owner_id,
            title,
            requestor,
            location,
            participants: self.participants,
            vip: self.vip,
            vvip: self.vvip,
            without_gov: self.without_gov,
            multiple_locations: self.multiple_locations,
            description: self.description.unwrap_or_default().trim().to_string(),
            schedule,
            contact_number,
            contact_email,
            attachments: self.attachments,
            tagged_departments,
            department_requirements,
            status,
        })
    }
}

/// Owner edits: location and schedule only.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    pub location: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_date: Option<NaiveDate>,
    pub end_time: Option<NaiveTime>,
}

#[derive(Debug, Clone)]
pub struct EventUpdate {
    pub location: String,
    pub schedule: Schedule,
}

impl UpdateEventRequest {
    pub fn apply_to(self, event: &Event) -> Result<EventUpdate, AppError> {
        let location = match self.location {
            Some(location) => required(&location, "Location")?,
            None => event.location.clone(),
        };
        let current = event.schedule();
        let schedule = Schedule {
            start_date: self.start_date.unwrap_or(current.start_date),
            start_time: self.start_time.unwrap_or(current.start_time),
            end_date: self.end_date.unwrap_or(current.end_date),
            end_time: self.end_time.unwrap_or(current.end_time),
        };
        schedule.validate()?;
        Ok(EventUpdate { location, schedule })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventFilter {
    pub status: Option<EventStatus>,
}

fn required(value: &str, field: &str) -> Result<String, AppError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(AppError::ValidationError(format!("{field} is required")))
    } else {
        Ok(trimmed.to_string())
    }
}

fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for name in tags.iter().filter_map(|t| normalize_name(t)) {
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

fn select_requirements(
    raw: DepartmentRequirements,
    tagged: &[String],
) -> Result<DepartmentRequirements, AppError> {
    let mut selected = DepartmentRequirements::new();
    for (department, requirements) in raw {
        let Some(name) = normalize_name(&department) else {
            continue;
        };
        let picked: Vec<SelectedRequirement> =
            requirements.into_iter().filter(|r| r.selected).collect();
        if picked.is_empty() {
            continue;
        }
        if !tagged.contains(&name) {
            return Err(AppError::ValidationError(format!(
                "Requirements given for untagged department: {name}"
            )));
        }
        selected.entry(name).or_default().extend(picked);
    }
    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateEventRequest {
        serde_json::from_value(serde_json::json!({
            "eventTitle": "IT Security Training",
            "requestor": "Juan Dela Cruz",
            "location": "Atrium",
            "participants": 40,
            "startDate": "2025-03-10",
            "startTime": "09:00:00",
            "endDate": "2025-03-10",
            "endTime": "12:00:00",
            "contactNumber": "09171234567",
            "contactEmail": "juan@pgb.gov.ph",
            "taggedDepartments": ["pgso", "PGSO", " it "],
            "departmentRequirements": {
                "pgso": [
                    { "name": "Chairs", "selected": true },
                    { "name": "Tables", "selected": false }
                ],
                "it": [{ "name": "Projector", "selected": false }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_validate_normalizes_tags_and_keeps_selected_only() {
        let event = request().validate(Uuid::new_v4()).unwrap();
        assert_eq!(event.tagged_departments, vec!["PGSO", "IT"]);
        assert_eq!(event.department_requirements.len(), 1);
        assert_eq!(event.department_requirements["PGSO"][0].name, "Chairs");
        assert_eq!(event.status, EventStatus::Submitted);
    }

    #[test]
    fn test_validate_rejects_bad_contact_number() {
        let mut req = request();
        req.contact_number = "12345".into();
        assert!(matches!(
            req.validate(Uuid::new_v4()),
            Err(AppError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_rejects_end_before_start() {
        let mut req = request();
        req.end_time = NaiveTime::from_hms_opt(8, 0, 0).unwrap();
        assert!(req.validate(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_requirements_for_untagged_department_are_rejected() {
        let mut req = request();
        req.tagged_departments = vec!["IT".into()];
        assert!(req.validate(Uuid::new_v4()).is_err());
    }

    #[test]
    fn test_status_transitions() {
        use EventStatus::*;
        assert!(Draft.can_transition_to(Submitted));
        assert!(Submitted.can_transition_to(Approved));
        assert!(Submitted.can_transition_to(Rejected));
        assert!(Approved.can_transition_to(Completed));
        assert!(!Rejected.can_transition_to(Approved));
        assert!(!Draft.can_transition_to(Completed));
        assert!(!Completed.can_transition_to(Completed));
    }
}
