//! Persistence ports.
//!
//! Handlers and services talk to these traits only. [`PgStore`] backs them
//! with Postgres; the in-memory store is compiled for tests.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{
    Category, CategoryChanges, Event, EventChanges, NewCategory, NewEvent, NewOtpRecord,
    NewRegistration, NewUser, OtpPurpose, OtpRecord, Registration, RegistrationStatus, User,
};

#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod postgres;

#[cfg(any(test, feature = "test-support"))]
pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Upper bound on rows returned by any listing.
pub const RESULT_LIMIT: i64 = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write. Carries the kind of record.
    #[error("{0} already exists")]
    Conflict(&'static str),

    #[error("stored record is invalid: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn find_user_by_google_id(&self, google_id: &str) -> StoreResult<Option<User>>;
    async fn mark_user_verified(&self, id: Uuid) -> StoreResult<bool>;
    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<bool>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert_otp(&self, record: NewOtpRecord) -> StoreResult<OtpRecord>;
    /// Most recently issued code for the user and purpose.
    async fn find_latest_otp(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
    ) -> StoreResult<Option<OtpRecord>>;
    async fn delete_otps(&self, user_id: Uuid, purpose: OtpPurpose) -> StoreResult<u64>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event>;
    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>>;
    async fn list_events(&self, limit: i64) -> StoreResult<Vec<Event>>;
    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<Event>>;
    async fn delete_event(&self, id: Uuid) -> StoreResult<bool>;
    /// Appends to the attendee list unless the user is already on it.
    async fn add_attendee(&self, event_id: Uuid, user_id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait CategoryStore: Send + Sync {
    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category>;
    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>>;
    async fn list_categories(&self, limit: i64) -> StoreResult<Vec<Category>>;
    async fn update_category(
        &self,
        id: Uuid,
        changes: CategoryChanges,
    ) -> StoreResult<Option<Category>>;
    async fn delete_category(&self, id: Uuid) -> StoreResult<bool>;
}

#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] when the email is already registered for the event.
    async fn insert_registration(&self, registration: NewRegistration)
        -> StoreResult<Registration>;
    async fn find_registration(&self, id: Uuid) -> StoreResult<Option<Registration>>;
    async fn find_registration_for(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> StoreResult<Option<Registration>>;
    async fn list_registrations(&self, event_id: Uuid, limit: i64)
        -> StoreResult<Vec<Registration>>;
    async fn set_registration_status(
        &self,
        id: Uuid,
        status: RegistrationStatus,
    ) -> StoreResult<Option<Registration>>;
    async fn delete_registration(&self, id: Uuid) -> StoreResult<bool>;
}

pub trait Store: UserStore + OtpStore + EventStore + CategoryStore + RegistrationStore {}

impl<T> Store for T where T: UserStore + OtpStore + EventStore + CategoryStore + RegistrationStore {}
