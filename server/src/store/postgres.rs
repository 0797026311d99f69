use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::models::availability::{
    AvailabilityKey, AvailabilityUpsert, DateRange, ResourceAvailability, DEFAULT_MAX_CAPACITY,
    DEFAULT_QUANTITY,
};
use crate::models::department::{Department, DepartmentFilter, NewDepartment, Requirement, RequirementRemoval};
use crate::models::event::{Event, EventFilter, EventStatus, EventUpdate, NewEvent};
use crate::models::message::{Conversation, Message, NewMessage};
use crate::store::{
    AvailabilityStore, DepartmentStore, EventStore, MessageStore, DUPLICATE_AVAILABILITY,
    DUPLICATE_DEPARTMENT,
};
use crate::utils::error::{AppError, AppResult};
use crate::utils::response::PageParams;

/// Requirements are folded into a JSON array so a department loads in one row.
const DEPARTMENT_SELECT: &str = r#"
    SELECT d.id, d.name, d.is_visible, d.created_at, d.updated_at,
        COALESCE(
            (SELECT json_agg(
                        json_build_object('id', r.id, 'text', r.text, 'createdAt', r.created_at)
                        ORDER BY r.seq)
             FROM department_requirements r
             WHERE r.department_id = d.id),
            '[]'::json
        ) AS requirements
    FROM departments d
"#;

const DEPARTMENT_FILTER: &str = r#"
    WHERE ($1::text IS NULL OR d.name ILIKE '%' || $1 || '%' ESCAPE '\')
      AND ($2::bool IS NULL OR d.is_visible = $2)
"#;

const CONVERSATION_FILTER: &str = r#"
    WHERE event_id = $1
      AND is_deleted = FALSE
      AND ((sender_id = $2 AND receiver_id = $3) OR (sender_id = $3 AND receiver_id = $2))
"#;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!().run(&self.pool).await
    }

    async fn fetch_department(&self, id: Uuid) -> AppResult<Option<Department>> {
        let sql = format!("{DEPARTMENT_SELECT} WHERE d.id = $1");
        Ok(sqlx::query_as::<_, Department>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }
}

/// Escapes LIKE wildcards so the search term matches literally.
fn like_term(term: &str) -> String {
    term.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn page_bounds(page: PageParams) -> (i64, i64) {
    (
        i64::from(page.limit()),
        i64::try_from(page.offset()).unwrap_or(i64::MAX),
    )
}

#[async_trait]
impl DepartmentStore for PgStore {
    async fn list(&self, filter: &DepartmentFilter, page: PageParams) -> AppResult<(Vec<Department>, u64)> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_term);
        let (limit, offset) = page_bounds(page);

        let sql = format!("{DEPARTMENT_SELECT} {DEPARTMENT_FILTER} ORDER BY d.name LIMIT $3 OFFSET $4");
        let departments = sqlx::query_as::<_, Department>(&sql)
            .bind(&search)
            .bind(filter.visible)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM departments d {DEPARTMENT_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&search)
            .bind(filter.visible)
            .fetch_one(&self.pool)
            .await?;

        Ok((departments, total.max(0) as u64))
    }

    async fn list_visible(&self) -> AppResult<Vec<Department>> {
        let sql = format!("{DEPARTMENT_SELECT} WHERE d.is_visible = TRUE ORDER BY d.name");
        Ok(sqlx::query_as::<_, Department>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Department>> {
        self.fetch_department(id).await
    }

    async fn find_by_name(&self, name: &str) -> AppResult<Option<Department>> {
        let sql = format!("{DEPARTMENT_SELECT} WHERE d.name = $1");
        Ok(sqlx::query_as::<_, Department>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn create(&self, department: NewDepartment) -> AppResult<Department> {
        let id = Uuid::new_v4();
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO departments (id, name, is_visible) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(&department.name)
            .bind(department.is_visible)
            .execute(&mut *tx)
            .await
            .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_DEPARTMENT))?;

        for text in &department.requirements {
            sqlx::query("INSERT INTO department_requirements (id, department_id, text) VALUES ($1, $2, $3)")
                .bind(Uuid::new_v4())
                .bind(id)
                .bind(text)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        self.fetch_department(id).await?.ok_or_else(|| {
            AppError::InternalServerError(format!("department {id} vanished after insert"))
        })
    }

    async fn add_requirement(&self, id: Uuid, text: &str) -> AppResult<Option<Requirement>> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE departments SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if touched == 0 {
            return Ok(None);
        }

        let requirement = sqlx::query_as::<_, Requirement>(
            "INSERT INTO department_requirements (id, department_id, text) VALUES ($1, $2, $3) \
             RETURNING id, text, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(id)
        .bind(text)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(requirement))
    }

    async fn remove_requirement(&self, id: Uuid, requirement_id: Uuid) -> AppResult<RequirementRemoval> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query("UPDATE departments SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if touched == 0 {
            return Ok(RequirementRemoval::DepartmentMissing);
        }

        let removed = sqlx::query("DELETE FROM department_requirements WHERE id = $1 AND department_id = $2")
            .bind(requirement_id)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if removed == 0 {
            return Ok(RequirementRemoval::RequirementMissing);
        }

        tx.commit().await?;
        Ok(RequirementRemoval::Removed)
    }

    async fn set_visibility(&self, id: Uuid, is_visible: bool) -> AppResult<Option<Department>> {
        let updated = sqlx::query("UPDATE departments SET is_visible = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(is_visible)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(None);
        }
        self.fetch_department(id).await
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let deleted = sqlx::query("DELETE FROM departments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn create(&self, event: NewEvent) -> AppResult<Event> {
        let submitted_at = (event.status == EventStatus::Submitted).then(chrono::Utc::now);

        Ok(sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (
                id, owner_id, title, requestor, location, participants, vip, vvip,
                without_gov, multiple_locations, description,
                start_date, start_time, end_date, end_time,
                contact_number, contact_email, attachments,
                tagged_departments, department_requirements, status, submitted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                    $16, $17, $18, $19, $20, $21, $22)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(event.owner_id)
        .bind(&event.title)
        .bind(&event.requestor)
        .bind(&event.location)
        .bind(event.participants)
        .bind(event.vip)
        .bind(event.vvip)
        .bind(event.without_gov)
        .bind(event.multiple_locations)
        .bind(&event.description)
        .bind(event.schedule.start_date)
        .bind(event.schedule.start_time)
        .bind(event.schedule.end_date)
        .bind(event.schedule.end_time)
        .bind(&event.contact_number)
        .bind(&event.contact_email)
        .bind(Json(&event.attachments))
        .bind(&event.tagged_departments)
        .bind(Json(&event.department_requirements))
        .bind(event.status)
        .bind(submitted_at)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn find(&self, id: Uuid) -> AppResult<Option<Event>> {
        Ok(sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn list(&self, filter: &EventFilter, page: PageParams) -> AppResult<(Vec<Event>, u64)> {
        let (limit, offset) = page_bounds(page);

        let events = sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE ($1::event_status IS NULL OR status = $1) \
             ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(filter.status)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM events WHERE ($1::event_status IS NULL OR status = $1)",
        )
        .bind(filter.status)
        .fetch_one(&self.pool)
        .await?;

        Ok((events, total.max(0) as u64))
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> AppResult<Vec<Event>> {
        Ok(sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn list_tagged(&self, department: &str) -> AppResult<Vec<Event>> {
        Ok(sqlx::query_as::<_, Event>(
            "SELECT * FROM events WHERE $1 = ANY(tagged_departments) ORDER BY created_at DESC",
        )
        .bind(department)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn update_details(&self, id: Uuid, update: EventUpdate) -> AppResult<Option<Event>> {
        Ok(sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET location = $2, start_date = $3, start_time = $4, end_date = $5, end_time = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&update.location)
        .bind(update.schedule.start_date)
        .bind(update.schedule.start_time)
        .bind(update.schedule.end_date)
        .bind(update.schedule.end_time)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn transition(&self, id: Uuid, from: EventStatus, to: EventStatus) -> AppResult<Option<Event>> {
        Ok(sqlx::query_as::<_, Event>(
            r#"
            UPDATE events
            SET status = $3,
                submitted_at = CASE WHEN $3 = 'submitted'::event_status THEN NOW() ELSE submitted_at END,
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(from)
        .bind(to)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn delete(&self, id: Uuid) -> AppResult<bool> {
        let deleted = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }
}

#[async_trait]
impl AvailabilityStore for PgStore {
    async fn upsert(&self, upsert: AvailabilityUpsert) -> AppResult<ResourceAvailability> {
        sqlx::query_as::<_, ResourceAvailability>(
            r#"
            INSERT INTO resource_availabilities (
                id, department_id, department_name, requirement_id, requirement_text, date,
                is_available, notes, quantity, max_capacity, set_by
            )
            VALUES ($1, $2, $3, $4, $5, $6,
                    COALESCE($7, TRUE), COALESCE($8, ''), COALESCE($9, $12), COALESCE($10, $13), $11)
            ON CONFLICT (department_id, requirement_id, date) DO UPDATE SET
                is_available = COALESCE($7, resource_availabilities.is_available),
                notes = COALESCE($8, resource_availabilities.notes),
                quantity = COALESCE($9, resource_availabilities.quantity),
                max_capacity = COALESCE($10, resource_availabilities.max_capacity),
                set_by = EXCLUDED.set_by,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(upsert.key.department_id)
        .bind(&upsert.department_name)
        .bind(upsert.key.requirement_id)
        .bind(&upsert.requirement_text)
        .bind(upsert.key.date)
        .bind(upsert.is_available)
        .bind(&upsert.notes)
        .bind(upsert.quantity)
        .bind(upsert.max_capacity)
        .bind(upsert.set_by)
        .bind(DEFAULT_QUANTITY)
        .bind(DEFAULT_MAX_CAPACITY)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::on_unique_violation(e, DUPLICATE_AVAILABILITY))
    }

    async fn find(&self, key: AvailabilityKey) -> AppResult<Option<ResourceAvailability>> {
        Ok(sqlx::query_as::<_, ResourceAvailability>(
            "SELECT * FROM resource_availabilities \
             WHERE department_id = $1 AND requirement_id = $2 AND date = $3",
        )
        .bind(key.department_id)
        .bind(key.requirement_id)
        .bind(key.date)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn list(&self, department_id: Uuid, range: Option<DateRange>) -> AppResult<Vec<ResourceAvailability>> {
        Ok(sqlx::query_as::<_, ResourceAvailability>(
            r#"
            SELECT * FROM resource_availabilities
            WHERE department_id = $1
              AND ($2::date IS NULL OR date >= $2)
              AND ($3::date IS NULL OR date <= $3)
            ORDER BY date, requirement_text
            "#,
        )
        .bind(department_id)
        .bind(range.map(|r| r.start))
        .bind(range.map(|r| r.end))
        .fetch_all(&self.pool)
        .await?)
    }

    async fn delete(&self, key: AvailabilityKey) -> AppResult<bool> {
        let deleted = sqlx::query(
            "DELETE FROM resource_availabilities \
             WHERE department_id = $1 AND requirement_id = $2 AND date = $3",
        )
        .bind(key.department_id)
        .bind(key.requirement_id)
        .bind(key.date)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(deleted > 0)
    }

    async fn delete_before(&self, today: NaiveDate) -> AppResult<u64> {
        Ok(sqlx::query("DELETE FROM resource_availabilities WHERE date < $1")
            .bind(today)
            .execute(&self.pool)
            .await?
            .rows_affected())
    }
}

#[async_trait]
impl MessageStore for PgStore {
    async fn create(&self, message: NewMessage) -> AppResult<Message> {
        Ok(sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (id, event_id, sender_id, receiver_id, content, message_type)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(message.event_id)
        .bind(message.sender_id)
        .bind(message.receiver_id)
        .bind(&message.content)
        .bind(&message.message_type)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn conversation(&self, conversation: Conversation, page: PageParams) -> AppResult<(Vec<Message>, u64)> {
        let (limit, offset) = page_bounds(page);

        let sql = format!("SELECT * FROM messages {CONVERSATION_FILTER} ORDER BY timestamp DESC LIMIT $4 OFFSET $5");
        let messages = sqlx::query_as::<_, Message>(&sql)
            .bind(conversation.event_id)
            .bind(conversation.user_id)
            .bind(conversation.other_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        let count_sql = format!("SELECT COUNT(*) FROM messages {CONVERSATION_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(conversation.event_id)
            .bind(conversation.user_id)
            .bind(conversation.other_id)
            .fetch_one(&self.pool)
            .await?;

        Ok((messages, total.max(0) as u64))
    }

    async fn mark_conversation_read(&self, conversation: Conversation) -> AppResult<u64> {
        Ok(sqlx::query(
            r#"
            UPDATE messages SET is_read = TRUE
            WHERE event_id = $1 AND sender_id = $2 AND receiver_id = $3
              AND is_read = FALSE AND is_deleted = FALSE
            "#,
        )
        .bind(conversation.event_id)
        .bind(conversation.other_id)
        .bind(conversation.user_id)
        .execute(&self.pool)
        .await?
        .rows_affected())
    }

    async fn unread_count(&self, conversation: Conversation) -> AppResult<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE event_id = $1 AND sender_id = $2 AND receiver_id = $3
              AND is_read = FALSE AND is_deleted = FALSE
            "#,
        )
        .bind(conversation.event_id)
        .bind(conversation.other_id)
        .bind(conversation.user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.max(0) as u64)
    }

    async fn mark_read(&self, id: Uuid, receiver_id: Uuid) -> AppResult<Option<Message>> {
        Ok(sqlx::query_as::<_, Message>(
            "UPDATE messages SET is_read = TRUE \
             WHERE id = $1 AND receiver_id = $2 AND is_deleted = FALSE RETURNING *",
        )
        .bind(id)
        .bind(receiver_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn soft_delete(&self, id: Uuid, sender_id: Uuid) -> AppResult<bool> {
        let deleted = sqlx::query(
            "UPDATE messages SET is_deleted = TRUE, deleted_at = NOW() \
             WHERE id = $1 AND sender_id = $2 AND is_deleted = FALSE",
        )
        .bind(id)
        .bind(sender_id)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(deleted > 0)
    }
}
