use tracing::info;
use uuid::Uuid;

use super::events::can_manage;
use crate::auth::AuthUser;
use crate::models::{Event, NewRegistration, Registration, RegistrationStatus};
use crate::store::{Store, StoreError, RESULT_LIMIT};
use crate::utils::error::AppError;
use crate::utils::validation::{is_valid_email, non_blank, normalize_email, parse_id};

const ALREADY_REGISTERED: &str = "You are already registered for this event";

pub struct RegistrationService<'a> {
    store: &'a dyn Store,
}

impl<'a> RegistrationService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    /// Anonymous registration with just a name and an email.
    pub async fn register_guest(
        &self,
        event_id: Option<&str>,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Registration, AppError> {
        let (Some(event_id), Some(name), Some(email)) =
            (non_blank(event_id), non_blank(name), non_blank(email))
        else {
            return Err(AppError::ValidationError("Empty input fields!".into()));
        };
        let email = normalize_email(&email);
        if !is_valid_email(&email) {
            return Err(AppError::ValidationError("Invalid email entered".into()));
        }
        let event = self.event(parse_id(&event_id, "event id")?).await?;

        self.insert(NewRegistration {
            event_id: event.id,
            user_id: None,
            name,
            email,
        })
        .await
    }

    /// Registers the caller under their account name and email and adds them to the attendees.
    pub async fn register_user(
        &self,
        caller: &AuthUser,
        event_id: Uuid,
    ) -> Result<Registration, AppError> {
        let event = self.event(event_id).await?;
        let user = self
            .store
            .find_user_by_id(caller.user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Account not found".into()))?;

        let registration = self
            .insert(NewRegistration {
                event_id: event.id,
                user_id: Some(user.id),
                name: user.name,
                email: user.email,
            })
            .await?;
        self.store.add_attendee(event.id, user.id).await?;
        Ok(registration)
    }

    pub async fn list_for_event(&self, event_id: Uuid) -> Result<Vec<Registration>, AppError> {
        let event = self.event(event_id).await?;
        Ok(self
            .store
            .list_registrations(event.id, RESULT_LIMIT)
            .await?)
    }

    /// Any status may follow any other.
    pub async fn set_status(
        &self,
        caller: &AuthUser,
        event_id: Uuid,
        registration_id: Uuid,
        status: RegistrationStatus,
    ) -> Result<Registration, AppError> {
        self.managed_registration(caller, event_id, registration_id)
            .await?;
        let registration = self
            .store
            .set_registration_status(registration_id, status)
            .await?
            .ok_or_else(registration_not_found)?;
        info!(registration_id = %registration.id, status = %status, "registration status changed");
        Ok(registration)
    }

    pub async fn delete(
        &self,
        caller: &AuthUser,
        event_id: Uuid,
        registration_id: Uuid,
    ) -> Result<(), AppError> {
        self.managed_registration(caller, event_id, registration_id)
            .await?;
        if !self.store.delete_registration(registration_id).await? {
            return Err(registration_not_found());
        }
        info!(registration_id = %registration_id, "registration deleted");
        Ok(())
    }

    async fn event(&self, id: Uuid) -> Result<Event, AppError> {
        self.store
            .find_event(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".into()))
    }

    async fn insert(&self, registration: NewRegistration) -> Result<Registration, AppError> {
        if self
            .store
            .find_registration_for(registration.event_id, &registration.email)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict(ALREADY_REGISTERED.into()));
        }

        // The unique index still catches a concurrent duplicate that slipped past the check.
        let registration = self
            .store
            .insert_registration(registration)
            .await
            .map_err(|err| match err {
                StoreError::Conflict(_) => AppError::Conflict(ALREADY_REGISTERED.into()),
                other => other.into(),
            })?;
        info!(
            registration_id = %registration.id,
            event_id = %registration.event_id,
            "registration created"
        );
        Ok(registration)
    }

    async fn managed_registration(
        &self,
        caller: &AuthUser,
        event_id: Uuid,
        registration_id: Uuid,
    ) -> Result<Registration, AppError> {
        let event = self.event(event_id).await?;
        if !can_manage(&event, caller) {
            return Err(AppError::Forbidden(
                "You do not have permission to manage registrations for this event".into(),
            ));
        }
        self.store
            .find_registration(registration_id)
            .await?
            .filter(|registration| registration.event_id == event.id)
            .ok_or_else(registration_not_found)
    }
}

fn registration_not_found() -> AppError {
    AppError::NotFound("Registration not found".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use crate::models::{Credential, NewEvent, NewUser, Role};
    use crate::store::{EventStore, MemoryStore, RegistrationStore, UserStore};

    async fn seed_event(store: &MemoryStore, created_by: Uuid) -> Event {
        store
            .insert_event(NewEvent {
                title: "Launch".into(),
                date: Utc::now(),
                location: "Online".into(),
                description: None,
                category_id: None,
                created_by,
            })
            .await
            .unwrap()
    }

    async fn seed_user(store: &MemoryStore, role: Role) -> AuthUser {
        let user = store
            .insert_user(NewUser {
                name: "Ann".into(),
                email: format!("{}@x.com", Uuid::new_v4().simple()),
                role,
                verified: true,
                credential: Credential::Local {
                    password_hash: "hash".into(),
                    date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                },
            })
            .await
            .unwrap();
        AuthUser {
            user_id: user.id,
            role,
        }
    }

    #[tokio::test]
    async fn second_guest_registration_with_same_email_conflicts() {
        let store = MemoryStore::new();
        let event = seed_event(&store, Uuid::new_v4()).await;
        let id = event.id.to_string();
        let service = RegistrationService::new(&store);

        let first = service
            .register_guest(Some(id.as_str()), Some("Bo"), Some("bo@x.com"))
            .await
            .unwrap();
        assert_eq!(first.status, RegistrationStatus::Pending);
        assert_eq!(first.user_id, None);

        let err = service
            .register_guest(Some(id.as_str()), Some("Bo again"), Some(" BO@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(service.list_for_event(event.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn guest_registration_needs_an_existing_event() {
        let store = MemoryStore::new();
        let service = RegistrationService::new(&store);
        let missing = Uuid::new_v4().to_string();

        let err = service
            .register_guest(Some(missing.as_str()), Some("Bo"), Some("bo@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = service
            .register_guest(Some(missing.as_str()), None, Some("bo@x.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn user_registration_links_the_account_and_attends() {
        let store = MemoryStore::new();
        let event = seed_event(&store, Uuid::new_v4()).await;
        let attendee = seed_user(&store, Role::Attendee).await;
        let service = RegistrationService::new(&store);

        let registration = service.register_user(&attendee, event.id).await.unwrap();
        assert_eq!(registration.user_id, Some(attendee.user_id));

        let err = service.register_user(&attendee, event.id).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        let stored = store.find_event(event.id).await.unwrap().unwrap();
        assert_eq!(stored.attendees, vec![attendee.user_id]);
    }

    #[tokio::test]
    async fn empty_event_lists_no_registrations() {
        let store = MemoryStore::new();
        let event = seed_event(&store, Uuid::new_v4()).await;
        let registrations = RegistrationService::new(&store)
            .list_for_event(event.id)
            .await
            .unwrap();
        assert!(registrations.is_empty());
    }

    #[tokio::test]
    async fn only_creator_or_admin_manage_registrations() {
        let store = MemoryStore::new();
        let creator = seed_user(&store, Role::Organizer).await;
        let stranger = seed_user(&store, Role::Organizer).await;
        let admin = seed_user(&store, Role::Admin).await;
        let event = seed_event(&store, creator.user_id).await;
        let service = RegistrationService::new(&store);
        let registration = service
            .register_guest(Some(event.id.to_string().as_str()), Some("Bo"), Some("bo@x.com"))
            .await
            .unwrap();

        let err = service
            .set_status(&stranger, event.id, registration.id, RegistrationStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let confirmed = service
            .set_status(&creator, event.id, registration.id, RegistrationStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, RegistrationStatus::Confirmed);

        let canceled = service
            .set_status(&admin, event.id, registration.id, RegistrationStatus::Canceled)
            .await
            .unwrap();
        assert_eq!(canceled.status, RegistrationStatus::Canceled);

        let reconfirmed = service
            .set_status(&creator, event.id, registration.id, RegistrationStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(reconfirmed.status, RegistrationStatus::Confirmed);

        service.delete(&admin, event.id, registration.id).await.unwrap();
        let err = service
            .delete(&admin, event.id, registration.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn registrations_are_scoped_to_their_event() {
        let store = MemoryStore::new();
        let creator = seed_user(&store, Role::Organizer).await;
        let event = seed_event(&store, creator.user_id).await;
        let other = seed_event(&store, creator.user_id).await;
        let service = RegistrationService::new(&store);
        let registration = service
            .register_guest(Some(event.id.to_string().as_str()), Some("Bo"), Some("bo@x.com"))
            .await
            .unwrap();

        let err = service
            .set_status(&creator, other.id, registration.id, RegistrationStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_the_event_keeps_its_registrations() {
        let store = MemoryStore::new();
        let creator = seed_user(&store, Role::Organizer).await;
        let event = seed_event(&store, creator.user_id).await;
        let registration = RegistrationService::new(&store)
            .register_guest(Some(event.id.to_string().as_str()), Some("Bo"), Some("bo@x.com"))
            .await
            .unwrap();

        assert!(store.delete_event(event.id).await.unwrap());

        let kept = store.find_registration(registration.id).await.unwrap();
        assert_eq!(kept.map(|r| r.event_id), Some(event.id));
    }
}
