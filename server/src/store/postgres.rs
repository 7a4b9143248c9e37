use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::{
    CategoryStore, EventStore, OtpStore, RegistrationStore, StoreError, StoreResult, UserStore,
};
use crate::models::{
    Category, CategoryChanges, Credential, Event, EventChanges, NewCategory, NewEvent,
    NewOtpRecord, NewRegistration, NewUser, OtpPurpose, OtpRecord, Registration,
    RegistrationStatus, User,
};

const USER_COLUMNS: &str =
    "id, name, email, password_hash, date_of_birth, google_id, role, verified, created_at, updated_at";
const EVENT_COLUMNS: &str =
    "id, title, date, location, description, category_id, created_by, attendees, created_at, updated_at";
const CATEGORY_COLUMNS: &str = "id, name, description, created_at, updated_at";
const REGISTRATION_COLUMNS: &str =
    "id, event_id, user_id, name, email, status, registration_date, created_at, updated_at";
const OTP_COLUMNS: &str = "id, user_id, purpose, otp_hash, created_at, expires_at";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps unique-index violations onto [`StoreError::Conflict`].
fn conflict_or_database(err: sqlx::Error, what: &'static str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(what),
        _ => StoreError::Database(err),
    }
}

#[derive(FromRow)]
struct UserRow {
    id: Uuid,
    name: String,
    email: String,
    password_hash: Option<String>,
    date_of_birth: Option<NaiveDate>,
    google_id: Option<String>,
    role: String,
    verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let credential = match (row.password_hash, row.date_of_birth, row.google_id) {
            (Some(password_hash), Some(date_of_birth), None) => Credential::Local {
                password_hash,
                date_of_birth,
            },
            (None, None, Some(google_id)) => Credential::External { google_id },
            _ => {
                return Err(StoreError::Corrupt(format!(
                    "user {} has an inconsistent credential",
                    row.id
                )))
            }
        };
        let role = row
            .role
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("user {}: {e}", row.id)))?;

        Ok(User {
            id: row.id,
            name: row.name,
            email: row.email,
            role,
            verified: row.verified,
            credential,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct OtpRow {
    id: Uuid,
    user_id: Uuid,
    purpose: String,
    otp_hash: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl TryFrom<OtpRow> for OtpRecord {
    type Error = StoreError;

    fn try_from(row: OtpRow) -> Result<Self, Self::Error> {
        let purpose = row
            .purpose
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("otp {}: {e}", row.id)))?;
        Ok(OtpRecord {
            id: row.id,
            user_id: row.user_id,
            purpose,
            otp_hash: row.otp_hash,
            created_at: row.created_at,
            expires_at: row.expires_at,
        })
    }
}

#[derive(FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    date: DateTime<Utc>,
    location: String,
    description: Option<String>,
    category_id: Option<Uuid>,
    created_by: Uuid,
    attendees: Vec<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            title: row.title,
            date: row.date,
            location: row.location,
            description: row.description,
            category_id: row.category_id,
            created_by: row.created_by,
            attendees: row.attendees,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CategoryRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Category {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct RegistrationRow {
    id: Uuid,
    event_id: Uuid,
    user_id: Option<Uuid>,
    name: String,
    email: String,
    status: String,
    registration_date: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RegistrationRow> for Registration {
    type Error = StoreError;

    fn try_from(row: RegistrationRow) -> Result<Self, Self::Error> {
        let status = row
            .status
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("registration {}: {e}", row.id)))?;
        Ok(Registration {
            id: row.id,
            event_id: row.event_id,
            user_id: row.user_id,
            name: row.name,
            email: row.email,
            status,
            registration_date: row.registration_date,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn to_user(row: Option<UserRow>) -> StoreResult<Option<User>> {
    row.map(User::try_from).transpose()
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let (password_hash, date_of_birth, google_id) = match user.credential {
            Credential::Local {
                password_hash,
                date_of_birth,
            } => (Some(password_hash), Some(date_of_birth), None),
            Credential::External { google_id } => (None, None, Some(google_id)),
        };

        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (id, name, email, password_hash, date_of_birth, google_id, role, verified) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {USER_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&user.name)
        .bind(&user.email)
        .bind(password_hash)
        .bind(date_of_birth)
        .bind(google_id)
        .bind(user.role.as_str())
        .bind(user.verified)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "user"))?;

        User::try_from(row)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        to_user(row)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        to_user(row)
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE google_id = $1"
        ))
        .bind(google_id)
        .fetch_optional(&self.pool)
        .await?;
        to_user(row)
    }

    async fn mark_user_verified(&self, id: Uuid) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE users SET verified = TRUE, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET password_hash = $2, updated_at = NOW() \
             WHERE id = $1 AND google_id IS NULL",
        )
        .bind(id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OtpStore for PgStore {
    async fn insert_otp(&self, record: NewOtpRecord) -> StoreResult<OtpRecord> {
        let row = sqlx::query_as::<_, OtpRow>(&format!(
            "INSERT INTO otp_verifications (id, user_id, purpose, otp_hash, created_at, expires_at) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {OTP_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(record.user_id)
        .bind(record.purpose.as_str())
        .bind(&record.otp_hash)
        .bind(record.created_at)
        .bind(record.expires_at)
        .fetch_one(&self.pool)
        .await?;
        OtpRecord::try_from(row)
    }

    async fn find_latest_otp(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
    ) -> StoreResult<Option<OtpRecord>> {
        let row = sqlx::query_as::<_, OtpRow>(&format!(
            "SELECT {OTP_COLUMNS} FROM otp_verifications \
             WHERE user_id = $1 AND purpose = $2 ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(purpose.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(OtpRecord::try_from).transpose()
    }

    async fn delete_otps(&self, user_id: Uuid, purpose: OtpPurpose) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM otp_verifications WHERE user_id = $1 AND purpose = $2")
                .bind(user_id)
                .bind(purpose.as_str())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl EventStore for PgStore {
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "INSERT INTO events (id, title, date, location, description, category_id, created_by) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {EVENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&event.title)
        .bind(event.date)
        .bind(&event.location)
        .bind(&event.description)
        .bind(event.category_id)
        .bind(event.created_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Event::from))
    }

    async fn list_events(&self, limit: i64) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events ORDER BY date ASC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<Event>> {
        let (set_description, description) = match changes.description {
            Some(value) => (true, value),
            None => (false, None),
        };
        let (set_category, category_id) = match changes.category_id {
            Some(value) => (true, value),
            None => (false, None),
        };

        let row = sqlx::query_as::<_, EventRow>(&format!(
            "UPDATE events SET \
                title = COALESCE($2, title), \
                date = COALESCE($3, date), \
                location = COALESCE($4, location), \
                description = CASE WHEN $5 THEN $6 ELSE description END, \
                category_id = CASE WHEN $7 THEN $8 ELSE category_id END, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.title)
        .bind(changes.date)
        .bind(changes.location)
        .bind(set_description)
        .bind(description)
        .bind(set_category)
        .bind(category_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Event::from))
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn add_attendee(&self, event_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE events SET attendees = array_append(attendees, $2), updated_at = NOW() \
             WHERE id = $1 AND NOT ($2 = ANY(attendees))",
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl CategoryStore for PgStore {
    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "INSERT INTO categories (id, name, description) VALUES ($1, $2, $3) \
             RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&category.name)
        .bind(&category.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    async fn list_categories(&self, limit: i64) -> StoreResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories ORDER BY name ASC LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Category::from).collect())
    }

    async fn update_category(
        &self,
        id: Uuid,
        changes: CategoryChanges,
    ) -> StoreResult<Option<Category>> {
        let (set_description, description) = match changes.description {
            Some(value) => (true, value),
            None => (false, None),
        };

        let row = sqlx::query_as::<_, CategoryRow>(&format!(
            "UPDATE categories SET \
                name = COALESCE($2, name), \
                description = CASE WHEN $3 THEN $4 ELSE description END, \
                updated_at = NOW() \
             WHERE id = $1 RETURNING {CATEGORY_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.name)
        .bind(set_description)
        .bind(description)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Category::from))
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl RegistrationStore for PgStore {
    async fn insert_registration(
        &self,
        registration: NewRegistration,
    ) -> StoreResult<Registration> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            "INSERT INTO registrations (id, event_id, user_id, name, email) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(registration.event_id)
        .bind(registration.user_id)
        .bind(&registration.name)
        .bind(&registration.email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or_database(e, "registration"))?;
        Registration::try_from(row)
    }

    async fn find_registration(&self, id: Uuid) -> StoreResult<Option<Registration>> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Registration::try_from).transpose()
    }

    async fn find_registration_for(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> StoreResult<Option<Registration>> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE event_id = $1 AND email = $2"
        ))
        .bind(event_id)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Registration::try_from).transpose()
    }

    async fn list_registrations(
        &self,
        event_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<Registration>> {
        let rows = sqlx::query_as::<_, RegistrationRow>(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations \
             WHERE event_id = $1 ORDER BY registration_date ASC LIMIT $2"
        ))
        .bind(event_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Registration::try_from).collect()
    }

    async fn set_registration_status(
        &self,
        id: Uuid,
        status: RegistrationStatus,
    ) -> StoreResult<Option<Registration>> {
        let row = sqlx::query_as::<_, RegistrationRow>(&format!(
            "UPDATE registrations SET status = $2, updated_at = NOW() \
             WHERE id = $1 RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(Registration::try_from).transpose()
    }

    async fn delete_registration(&self, id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
