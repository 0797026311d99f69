use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_QUANTITY: i32 = 1;
pub const DEFAULT_MAX_CAPACITY: i32 = 1;

/// Whether a department can supply one of its requirements on a given day.
/// At most one row exists per `(department_id, requirement_id, date)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAvailability {
    pub id: Uuid,
    pub department_id: Uuid,
    pub department_name: String,
    pub requirement_id: Uuid,
    pub requirement_text: String,
    pub date: NaiveDate,
    pub is_available: bool,
    pub notes: String,
    pub quantity: i32,
    pub max_capacity: i32,
    pub set_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Natural key of an availability row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AvailabilityKey {
    pub department_id: Uuid,
    pub requirement_id: Uuid,
    pub date: NaiveDate,
}

/// An insert-or-update against [`AvailabilityKey`]. `None` fields take the
/// defaults on insert and keep the stored value on update.
#[derive(Debug, Clone)]
pub struct AvailabilityUpsert {
    pub key: AvailabilityKey,
    pub department_name: String,
    pub requirement_text: String,
    pub is_available: Option<bool>,
    pub notes: Option<String>,
    pub quantity: Option<i32>,
    pub max_capacity: Option<i32>,
    pub set_by: Uuid,
}

impl AvailabilityUpsert {
    pub fn insert(&self, now: DateTime<Utc>) -> ResourceAvailability {
        ResourceAvailability {
            id: Uuid::new_v4(),
            department_id: self.key.department_id,
            department_name: self.department_name.clone(),
            requirement_id: self.key.requirement_id,
            requirement_text: self.requirement_text.clone(),
            date: self.key.date,
            is_available: self.is_available.unwrap_or(true),
            notes: self.notes.clone().unwrap_or_default(),
            quantity: self.quantity.unwrap_or(DEFAULT_QUANTITY),
            max_capacity: self.max_capacity.unwrap_or(DEFAULT_MAX_CAPACITY),
            set_by: self.set_by,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&self, row: &mut ResourceAvailability, now: DateTime<Utc>) {
        if let Some(is_available) = self.is_available {
            row.is_available = is_available;
        }
        if let Some(notes) = &self.notes {
            row.notes = notes.clone();
        }
        if let Some(quantity) = self.quantity {
            row.quantity = quantity;
        }
        if let Some(max_capacity) = self.max_capacity {
            row.max_capacity = max_capacity;
        }
        row.set_by = self.set_by;
        row.updated_at = now;
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetAvailabilityRequest {
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub department_name: Option<String>,
    pub requirement_id: Option<Uuid>,
    pub requirement_text: Option<String>,
    pub date: Option<NaiveDate>,
    pub is_available: Option<bool>,
    pub notes: Option<String>,
    pub quantity: Option<i32>,
    pub max_capacity: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAvailabilityRequest {
    pub department_id: Option<Uuid>,
    #[serde(default)]
    pub department_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub requirements: Option<Vec<BulkAvailabilityItem>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAvailabilityItem {
    pub requirement_id: Option<Uuid>,
    pub requirement_text: Option<String>,
    pub is_available: Option<bool>,
    pub notes: Option<String>,
    pub quantity: Option<i32>,
    pub max_capacity: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkItemError {
    pub requirement_id: Option<Uuid>,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAvailabilityResult {
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<ResourceAvailability>,
    pub errors: Vec<BulkItemError>,
}

/// Inclusive date window for availability queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// The whole calendar month, `None` for an invalid month.
    pub fn month(year: i32, month: u32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, month, 1)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)?
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)?
        };
        Some(Self {
            start,
            end: next.pred_opt()?,
        })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl AvailabilityQuery {
    pub fn range(&self) -> Option<DateRange> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => Some(DateRange { start, end }),
            (Some(start), None) => Some(DateRange::day(start)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SummaryQuery {
    pub month: Option<u32>,
    pub year: Option<i32>,
}

/// Per-requirement tally over a department's availability rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilitySummary {
    pub requirement_id: Uuid,
    pub requirement_text: String,
    pub total_days: i64,
    pub available_days: i64,
    pub unavailable_days: i64,
    pub availability_rate: f64,
}

impl AvailabilitySummary {
    /// Groups rows by requirement, ordered by requirement text.
    pub fn tally<'a>(rows: impl IntoIterator<Item = &'a ResourceAvailability>) -> Vec<Self> {
        let mut by_requirement: Vec<Self> = Vec::new();
        for row in rows {
            let idx = match by_requirement
                .iter()
                .position(|s| s.requirement_id == row.requirement_id)
            {
                Some(idx) => idx,
                None => {
                    by_requirement.push(Self {
                        requirement_id: row.requirement_id,
                        requirement_text: row.requirement_text.clone(),
                        total_days: 0,
                        available_days: 0,
                        unavailable_days: 0,
                        availability_rate: 0.0,
                    });
                    by_requirement.len() - 1
                }
            };
            let entry = &mut by_requirement[idx];
            entry.total_days += 1;
            if row.is_available {
                entry.available_days += 1;
            } else {
                entry.unavailable_days += 1;
            }
        }
        for entry in &mut by_requirement {
            entry.availability_rate = rate(entry.available_days, entry.total_days);
        }
        by_requirement.sort_by(|a, b| a.requirement_text.cmp(&b.requirement_text));
        by_requirement
    }
}

pub fn rate(available: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        available as f64 / total as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn upsert(is_available: Option<bool>) -> AvailabilityUpsert {
        AvailabilityUpsert {
            key: AvailabilityKey {
                department_id: Uuid::new_v4(),
                requirement_id: Uuid::new_v4(),
                date: date("2025-01-10"),
            },
            department_name: "PGSO".into(),
            requirement_text: "Chairs".into(),
            is_available,
            notes: None,
            quantity: None,
            max_capacity: None,
            set_by: Uuid::new_v4(),
        }
    }

    #[test]
    fn test_insert_uses_defaults() {
        let row = upsert(None).insert(Utc::now());
        assert!(row.is_available);
        assert_eq!(row.notes, "");
        assert_eq!(row.quantity, DEFAULT_QUANTITY);
        assert_eq!(row.max_capacity, DEFAULT_MAX_CAPACITY);
    }

    #[test]
    fn test_apply_keeps_absent_fields() {
        let mut first = upsert(Some(true));
        first.quantity = Some(20);
        let mut row = first.insert(Utc::now());

        let second = upsert(Some(false));
        second.apply(&mut row, Utc::now());

        assert!(!row.is_available);
        assert_eq!(row.quantity, 20);
        assert_eq!(row.set_by, second.set_by);
    }

    #[test]
    fn test_month_range_handles_short_months() {
        let feb = DateRange::month(2024, 2).unwrap();
        assert_eq!(feb.end, date("2024-02-29"));
        let dec = DateRange::month(2025, 12).unwrap();
        assert_eq!(dec.end, date("2025-12-31"));
        assert!(DateRange::month(2025, 13).is_none());
    }

    #[test]
    fn test_tally_counts_and_rates() {
        let mut a = upsert(Some(true)).insert(Utc::now());
        a.requirement_text = "Tables".into();
        let mut b = a.clone();
        b.is_available = false;
        let c = upsert(Some(true)).insert(Utc::now());

        let summary = AvailabilitySummary::tally([&a, &b, &c]);
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[0].requirement_text, "Chairs");
        assert_eq!(summary[1].total_days, 2);
        assert_eq!(summary[1].available_days, 1);
        assert!((summary[1].availability_rate - 50.0).abs() < f64::EPSILON);
    }
}
