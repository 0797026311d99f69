//! In-process store used by the HTTP test-suite and local runs without a
//! database. Same observable behaviour as [`PgStore`](super::PgStore).

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::models::availability::{AvailabilityKey, AvailabilityUpsert, DateRange, ResourceAvailability};
use crate::models::department::{Department, DepartmentFilter, NewDepartment, Requirement, RequirementRemoval};
use crate::models::event::{Event, EventFilter, EventStatus, EventUpdate, NewEvent};
use crate::models::message::{Conversation, Message, NewMessage};
use crate::store::{AvailabilityStore, DepartmentStore, EventStore, MessageStore, DUPLICATE_DEPARTMENT};
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::PageParams;

#[derive(Default)]
struct Inner {
    departments: Vec<Department>,
    /// Insertion order, oldest first.
    events: Vec<Event>,
    availability: BTreeMap<AvailabilityKey, ResourceAvailability>,
    /// Insertion order, oldest first.
    messages: Vec<Message>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| AppError::InternalServerError("memory store lock poisoned".to_string()))
    }
}

fn paginate<T: Clone>(items: &[T], page: PageParams) -> Vec<T> {
    let offset = usize::try_from(page.offset()).unwrap_or(usize::MAX);
    items
        .iter()
        .skip(offset)
        .take(page.limit() as usize)
        .cloned()
        .collect()
}

fn is_unread_from_peer(message: &Message, conversation: Conversation) -> bool {
    message.event_id == conversation.event_id
        && message.sender_id == conversation.other_id
        && message.receiver_id == conversation.user_id
        && !message.is_read
        && !message.is_deleted
}

#[async_trait]
impl DepartmentStore for MemoryStore {
    async fn list(&self, filter: &DepartmentFilter, page: PageParams) -> AppResult<(Vec<Department>, u64)> {
        let inner = self.lock()?;
        let mut matching: Vec<Department> = inner
            .departments
            .iter()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        matching.sort_by(|a, b| a.name.cmp(&b.name));
        Ok((paginate(&matching, page), matching.len() as u64))
    }

    async fn list_visible(&self) -> AppResult<Vec<Department>> {
        let inner = self.lock()?;
        let mut visible: Vec<Department> = inner
            .departments
            .iter()
            .filter(|d| d.is_visible)
            .cloned()
            .collect();
        visible.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(visible)
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Department>> {
        Ok(self.lock()?.departments.iter().find(|d| d.id == id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Department>> {
        Ok(self
            .lock()?
            .departments
            .iter()
            .find(|d| d.name == name)
            .cloned())
    }

    async fn create(&self, department: NewDepartment) -> AppResult<Department> {
        let mut inner = self.lock()?;
        if inner.departments.iter().any(|d| d.name == department.name) {
            return Err(AppError::Duplicate(DUPLICATE_DEPARTMENT.to_string()));
        }

        let now = Utc::now();
        let created = Department {
            id: Uuid::new_v4(),
            name: department.name,
            requirements: department
                .requirements
                .into_iter()
                .map(|text| Requirement {
                    id: Uuid::new_v4(),
                    text,
                    created_at: now,
                })
                .collect(),
            is_visible: department.is_visible,
            created_at: now,
            updated_at: now,
        };
        inner.departments.push(created.clone());
        Ok(created)
    }

    async fn add_requirement(&self, id: Uuid, text: &str) -> AppResult<Option<Requirement>> {
        let mut inner = self.lock()?;
        let Some(department) = inner.departments.iter_mut().find(|d| d.id == id) else {
            return Ok(None);
        };

        let now = Utc::now();
        let requirement = Requirement {
            id: Uuid::new_v4(),
            text: text.to_string(),
            created_at: now,
        };
        department.requirements.push(requirement.clone());
        department.updated_at = now;
        Ok(Some(requirement))
    }

    async fn remove_requirement(&self, id: Uuid, requirement_id: Uuid) -> AppResult<RequirementRemoval> {
        let mut inner = self.lock()?;
        let Some(department) = inner.departments.iter_mut().find(|d| d.id == id) else {
            return Ok(RequirementRemoval::DepartmentMissing);
        };

        let before = department.requirements.len();
        department.requirements.retain(|r| r.id != requirement_id);
        if department.requirements.len() == before {
            return Ok(RequirementRemoval::RequirementMissing);
        }
        department.updated_at = Utc::now();
        Ok(RequirementRemoval::Removed)
    }

    async fn set_visibility(&self, id: Uuid, is_visible: bool) -> AppResult<Option<Department>> {
        let mut inner = self.lock()?;
        Ok(inner
            .departments
            .iter_mut()
            .find(|d| d.id == id)
            .map(|department| {
                department.is_visible = is_visible;
                department.updated_at = Utc::now();
                department.clone()
            }))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.lock()?;
        let before = inner.departments.len();
        inner.departments.retain(|d| d.id != id);
        Ok(inner.departments.len() != before)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create(&self, event: NewEvent) -> AppResult<Event> {
        let now = Utc::now();
        let created = Event {
            id: Uuid::new_v4(),
            owner_id: event.owner_id,
            title: event.title,
            requestor: event.requestor,
            location: event.location,
            participants: event.participants,
            vip: event.vip,
            vvip: event.vvip,
            without_gov: event.without_gov,
            multiple_locations: event.multiple_locations,
            description: event.description,
            start_date: event.schedule.start_date,
            start_time: event.schedule.start_time,
            end_date: event.schedule.end_date,
            end_time: event.schedule.end_time,
            contact_number: event.contact_number,
            contact_email: event.contact_email,
            attachments: event.attachments,
            tagged_departments: event.tagged_departments,
            department_requirements: event.department_requirements,
            status: event.status,
            submitted_at: (event.status == EventStatus::Submitted).then_some(now),
            created_at: now,
            updated_at: now,
        };
        self.lock()?.events.push(created.clone());
        Ok(created)
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Event>> {
        Ok(self.lock()?.events.iter().find(|e| e.id == id).cloned())
    }

    async fn list(&self, filter: &EventFilter, page: PageParams) -> AppResult<(Vec<Event>, u64)> {
        let inner = self.lock()?;
        let matching: Vec<Event> = inner
            .events
            .iter()
            .rev()
            .filter(|e| filter.status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        Ok((paginate(&matching, page), matching.len() as u64))
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Event>> {
        Ok(self
            .lock()?
            .events
            .iter()
            .rev()
            .filter(|e| e.owner_id == owner_id)
            .cloned()
            .collect())
    }

    async fn list_tagged(&self, department: &str) -> AppResult<Vec<Event>> {
        Ok(self
            .lock()?
            .events
            .iter()
            .rev()
            .filter(|e| e.tagged_departments.iter().any(|d| d == department))
            .cloned()
            .collect())
    }

    async fn update_details(&self, id: Uuid, update: EventUpdate) -> AppResult<Option<Event>> {
        let mut inner = self.lock()?;
        Ok(inner.events.iter_mut().find(|e| e.id == id).map(|event| {
            event.location = update.location;
            event.start_date = update.schedule.start_date;
            event.start_time = update.schedule.start_time;
            event.end_date = update.schedule.end_date;
            event.end_time = update.schedule.end_time;
            event.updated_at = Utc::now();
            event.clone()
        }))
    }

    async fn transition(&self, id: Uuid, from: EventStatus, to: EventStatus) -> AppResult<Option<Event>> {
        let mut inner = self.lock()?;
        Ok(inner
            .events
            .iter_mut()
            .find(|e| e.id == id && e.status == from)
            .map(|event| {
                let now = Utc::now();
                event.status = to;
                if to == EventStatus::Submitted {
                    event.submitted_at = Some(now);
                }
                event.updated_at = now;
                event.clone()
            }))
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let mut inner = self.lock()?;
        let before = inner.events.len();
        inner.events.retain(|e| e.id != id);
        Ok(inner.events.len() != before)
    }
}

#[async_trait]
impl AvailabilityStore for MemoryStore {
    async fn upsert(&self, upsert: AvailabilityUpsert) -> AppResult<ResourceAvailability> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let row = inner
            .availability
            .entry(upsert.key)
            .and_modify(|row| upsert.apply(row, now))
            .or_insert_with(|| upsert.insert(now));
        Ok(row.clone())
    }

    async fn find(&self, key: AvailabilityKey) -> AppResult<Option<ResourceAvailability>> {
        Ok(self.lock()?.availability.get(&key).cloned())
    }

    async fn list(&self, department_id: Uuid, range: Option<DateRange>) -> AppResult<Vec<ResourceAvailability>> {
        let inner = self.lock()?;
        let mut rows: Vec<ResourceAvailability> = inner
            .availability
            .values()
            .filter(|r| r.department_id == department_id)
            .filter(|r| range.map_or(true, |range| range.contains(r.date)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            a.date
                .cmp(&b.date)
                .then_with(|| a.requirement_text.cmp(&b.requirement_text))
        });
        Ok(rows)
    }

    async fn delete(&self, key: AvailabilityKey) -> AppResult<bool> {
        Ok(self.lock()?.availability.remove(&key).is_some())
    }

    async fn delete_before(&self, today: NaiveDate) -> AppResult<u64> {
        let mut inner = self.lock()?;
        let before = inner.availability.len();
        inner.availability.retain(|key, _| key.date >= today);
        Ok((before - inner.availability.len()) as u64)
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn create(&self, message: NewMessage) -> AppResult<Message> {
        let created = Message {
            id: Uuid::new_v4(),
            event_id: message.event_id,
            sender_id: message.sender_id,
            receiver_id: message.receiver_id,
            content: message.content,
            message_type: message.message_type,
            timestamp: Utc::now(),
            is_read: false,
            is_deleted: false,
            deleted_at: None,
        };
        self.lock()?.messages.push(created.clone());
        Ok(created)
    }

    async fn conversation(&self, conversation: Conversation, page: PageParams) -> AppResult<(Vec<Message>, u64)> {
        let inner = self.lock()?;
        let thread: Vec<Message> = inner
            .messages
            .iter()
            .rev()
            .filter(|m| !m.is_deleted)
            .filter(|m| m.in_conversation(conversation.event_id, conversation.user_id, conversation.other_id))
            .cloned()
            .collect();
        Ok((paginate(&thread, page), thread.len() as u64))
    }

    async fn mark_conversation_read(&self, conversation: Conversation) -> AppResult<u64> {
        let mut inner = self.lock()?;
        let mut changed = 0;
        for message in inner
            .messages
            .iter_mut()
            .filter(|m| is_unread_from_peer(m, conversation))
        {
            message.is_read = true;
            changed += 1;
        }
        Ok(changed)
    }

    async fn unread_count(&self, conversation: Conversation) -> AppResult<u64> {
        Ok(self
            .lock()?
            .messages
            .iter()
            .filter(|m| is_unread_from_peer(m, conversation))
            .count() as u64)
    }

    async fn mark_read(&self, id: Uuid, receiver_id: Uuid) -> AppResult<Option<Message>> {
        let mut inner = self.lock()?;
        Ok(inner
            .messages
            .iter_mut()
            .find(|m| m.id == id && m.receiver_id == receiver_id && !m.is_deleted)
            .map(|message| {
                message.is_read = true;
                message.clone()
            }))
    }

    async fn soft_delete(&self, id: Uuid, sender_id: Uuid) -> AppResult<bool> {
        let mut inner = self.lock()?;
        match inner
            .messages
            .iter_mut()
            .find(|m| m.id == id && m.sender_id == sender_id && !m.is_deleted)
        {
            Some(message) => {
                message.is_deleted = true;
                message.deleted_at = Some(Utc::now());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
