use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{
    CategoryStore, EventStore, OtpStore, RegistrationStore, StoreError, StoreResult, UserStore,
};
use crate::models::{
    Category, CategoryChanges, Credential, Event, EventChanges, NewCategory, NewEvent,
    NewOtpRecord, NewRegistration, NewUser, OtpPurpose, OtpRecord, Registration,
    RegistrationStatus, User,
};

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    otps: Vec<OtpRecord>,
    events: HashMap<Uuid, Event>,
    categories: HashMap<Uuid, Category>,
    registrations: HashMap<Uuid, Registration>,
}

/// In-process store with the same uniqueness rules as the Postgres schema.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of stored OTP records for a user, for assertions.
    pub fn otp_count(&self, user_id: Uuid) -> usize {
        self.lock()
            .otps
            .iter()
            .filter(|otp| otp.user_id == user_id)
            .count()
    }

    pub fn user_count(&self) -> usize {
        self.lock().users.len()
    }

    /// Moves every stored code for the user into the past.
    pub fn expire_otps(&self, user_id: Uuid) {
        let past = Utc::now() - chrono::Duration::minutes(1);
        for otp in self.lock().otps.iter_mut().filter(|otp| otp.user_id == user_id) {
            otp.expires_at = past;
        }
    }
}

fn sorted_by<T, K: Ord>(mut items: Vec<T>, key: impl Fn(&T) -> K, limit: i64) -> Vec<T> {
    items.sort_by_key(key);
    items.truncate(usize::try_from(limit).unwrap_or(0));
    items
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.lock();
        let duplicate = tables.users.values().any(|existing| {
            existing.email == user.email
                || matches!(
                    (&existing.credential, &user.credential),
                    (Credential::External { google_id: a }, Credential::External { google_id: b }) if a == b
                )
        });
        if duplicate {
            return Err(StoreError::Conflict("user"));
        }

        let now = Utc::now();
        let stored = User {
            id: Uuid::new_v4(),
            name: user.name,
            email: user.email,
            role: user.role,
            verified: user.verified,
            credential: user.credential,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.lock().users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|user| user.email == email)
            .cloned())
    }

    async fn find_user_by_google_id(&self, google_id: &str) -> StoreResult<Option<User>> {
        Ok(self
            .lock()
            .users
            .values()
            .find(|user| {
                matches!(&user.credential, Credential::External { google_id: id } if id == google_id)
            })
            .cloned())
    }

    async fn mark_user_verified(&self, id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables.users.get_mut(&id) {
            Some(user) => {
                user.verified = true;
                user.updated_at = Utc::now();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn update_password_hash(&self, id: Uuid, password_hash: &str) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables.users.get_mut(&id).map(|user| &mut user.credential) {
            Some(Credential::Local {
                password_hash: stored,
                ..
            }) => {
                *stored = password_hash.to_string();
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl OtpStore for MemoryStore {
    async fn insert_otp(&self, record: NewOtpRecord) -> StoreResult<OtpRecord> {
        let stored = OtpRecord {
            id: Uuid::new_v4(),
            user_id: record.user_id,
            purpose: record.purpose,
            otp_hash: record.otp_hash,
            created_at: record.created_at,
            expires_at: record.expires_at,
        };
        self.lock().otps.push(stored.clone());
        Ok(stored)
    }

    async fn find_latest_otp(
        &self,
        user_id: Uuid,
        purpose: OtpPurpose,
    ) -> StoreResult<Option<OtpRecord>> {
        Ok(self
            .lock()
            .otps
            .iter()
            .filter(|otp| otp.user_id == user_id && otp.purpose == purpose)
            .max_by_key(|otp| otp.created_at)
            .cloned())
    }

    async fn delete_otps(&self, user_id: Uuid, purpose: OtpPurpose) -> StoreResult<u64> {
        let mut tables = self.lock();
        let before = tables.otps.len();
        tables
            .otps
            .retain(|otp| !(otp.user_id == user_id && otp.purpose == purpose));
        Ok(u64::try_from(before - tables.otps.len()).unwrap_or(u64::MAX))
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_event(&self, event: NewEvent) -> StoreResult<Event> {
        let now = Utc::now();
        let stored = Event {
            id: Uuid::new_v4(),
            title: event.title,
            date: event.date,
            location: event.location,
            description: event.description,
            category_id: event.category_id,
            created_by: event.created_by,
            attendees: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.lock().events.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_event(&self, id: Uuid) -> StoreResult<Option<Event>> {
        Ok(self.lock().events.get(&id).cloned())
    }

    async fn list_events(&self, limit: i64) -> StoreResult<Vec<Event>> {
        let events = self.lock().events.values().cloned().collect();
        Ok(sorted_by(events, |event| event.date, limit))
    }

    async fn update_event(&self, id: Uuid, changes: EventChanges) -> StoreResult<Option<Event>> {
        let mut tables = self.lock();
        Ok(tables.events.get_mut(&id).map(|event| {
            changes.apply(event);
            event.updated_at = Utc::now();
            event.clone()
        }))
    }

    async fn delete_event(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.lock().events.remove(&id).is_some())
    }

    async fn add_attendee(&self, event_id: Uuid, user_id: Uuid) -> StoreResult<bool> {
        let mut tables = self.lock();
        match tables.events.get_mut(&event_id) {
            Some(event) if !event.attendees.contains(&user_id) => {
                event.attendees.push(user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CategoryStore for MemoryStore {
    async fn insert_category(&self, category: NewCategory) -> StoreResult<Category> {
        let now = Utc::now();
        let stored = Category {
            id: Uuid::new_v4(),
            name: category.name,
            description: category.description,
            created_at: now,
            updated_at: now,
        };
        self.lock().categories.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_category(&self, id: Uuid) -> StoreResult<Option<Category>> {
        Ok(self.lock().categories.get(&id).cloned())
    }

    async fn list_categories(&self, limit: i64) -> StoreResult<Vec<Category>> {
        let categories = self.lock().categories.values().cloned().collect();
        Ok(sorted_by(categories, |category| category.name.clone(), limit))
    }

    async fn update_category(
        &self,
        id: Uuid,
        changes: CategoryChanges,
    ) -> StoreResult<Option<Category>> {
        let mut tables = self.lock();
        Ok(tables.categories.get_mut(&id).map(|category| {
            if let Some(name) = changes.name {
                category.name = name;
            }
            if let Some(description) = changes.description {
                category.description = description;
            }
            category.updated_at = Utc::now();
            category.clone()
        }))
    }

    async fn delete_category(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.lock().categories.remove(&id).is_some())
    }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    async fn insert_registration(
        &self,
        registration: NewRegistration,
    ) -> StoreResult<Registration> {
        let mut tables = self.lock();
        let duplicate = tables.registrations.values().any(|existing| {
            existing.event_id == registration.event_id && existing.email == registration.email
        });
        if duplicate {
            return Err(StoreError::Conflict("registration"));
        }

        let now = Utc::now();
        let stored = Registration {
            id: Uuid::new_v4(),
            event_id: registration.event_id,
            user_id: registration.user_id,
            name: registration.name,
            email: registration.email,
            status: RegistrationStatus::Pending,
            registration_date: now,
            created_at: now,
            updated_at: now,
        };
        tables.registrations.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn find_registration(&self, id: Uuid) -> StoreResult<Option<Registration>> {
        Ok(self.lock().registrations.get(&id).cloned())
    }

    async fn find_registration_for(
        &self,
        event_id: Uuid,
        email: &str,
    ) -> StoreResult<Option<Registration>> {
        Ok(self
            .lock()
            .registrations
            .values()
            .find(|registration| registration.event_id == event_id && registration.email == email)
            .cloned())
    }

    async fn list_registrations(
        &self,
        event_id: Uuid,
        limit: i64,
    ) -> StoreResult<Vec<Registration>> {
        let registrations = self
            .lock()
            .registrations
            .values()
            .filter(|registration| registration.event_id == event_id)
            .cloned()
            .collect();
        Ok(sorted_by(
            registrations,
            |registration| registration.registration_date,
            limit,
        ))
    }

    async fn set_registration_status(
        &self,
        id: Uuid,
        status: RegistrationStatus,
    ) -> StoreResult<Option<Registration>> {
        let mut tables = self.lock();
        Ok(tables.registrations.get_mut(&id).map(|registration| {
            registration.status = status;
            registration.updated_at = Utc::now();
            registration.clone()
        }))
    }

    async fn delete_registration(&self, id: Uuid) -> StoreResult<bool> {
        Ok(self.lock().registrations.remove(&id).is_some())
    }
}
