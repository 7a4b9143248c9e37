use tracing::info;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::models::{Event, EventChanges, NewEvent};
use crate::store::{Store, RESULT_LIMIT};
use crate::utils::error::AppError;
use crate::utils::validation::{non_blank, parse_date_time, parse_id};

/// Raw event fields as submitted. Every field is optional so that create and
/// update can report missing values themselves.
#[derive(Debug, Default, Clone)]
pub struct EventInput {
    pub title: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub category_id: Option<String>,
}

/// Creator or admin. Only they may delete the event or manage its registrations.
pub(crate) fn can_manage(event: &Event, caller: &AuthUser) -> bool {
    event.created_by == caller.user_id || caller.is_admin()
}

pub struct EventService<'a> {
    store: &'a dyn Store,
}

impl<'a> EventService<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> Result<Vec<Event>, AppError> {
        Ok(self.store.list_events(RESULT_LIMIT).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Event, AppError> {
        self.store
            .find_event(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".into()))
    }

    pub async fn create(&self, caller: &AuthUser, input: EventInput) -> Result<Event, AppError> {
        let (Some(title), Some(date), Some(location)) = (
            non_blank(input.title.as_deref()),
            non_blank(input.date.as_deref()),
            non_blank(input.location.as_deref()),
        ) else {
            return Err(AppError::ValidationError("Missing required fields".into()));
        };
        let date = parse_event_date(&date)?;
        let category_id = match non_blank(input.category_id.as_deref()) {
            Some(raw) => Some(self.existing_category(&raw).await?),
            None => None,
        };

        let event = self
            .store
            .insert_event(NewEvent {
                title,
                date,
                location,
                description: non_blank(input.description.as_deref()),
                category_id,
                created_by: caller.user_id,
            })
            .await?;
        info!(event_id = %event.id, user_id = %caller.user_id, "event created");
        Ok(event)
    }

    /// Only the creator may update. Ownership is checked before the payload is
    /// looked at, so a body that failed to parse is reported only to the creator.
    pub async fn update(
        &self,
        caller: &AuthUser,
        id: Uuid,
        input: Result<EventInput, AppError>,
    ) -> Result<Event, AppError> {
        let event = self.get(id).await?;
        if event.created_by != caller.user_id {
            return Err(AppError::Forbidden(
                "You do not have permission to update this event".into(),
            ));
        }

        let changes = self.changes_from(input?).await?;
        let event = self
            .store
            .update_event(id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".into()))?;
        info!(event_id = %event.id, "event updated");
        Ok(event)
    }

    pub async fn delete(&self, caller: &AuthUser, id: Uuid) -> Result<(), AppError> {
        let event = self.get(id).await?;
        if !can_manage(&event, caller) {
            return Err(AppError::Forbidden(
                "You do not have permission to delete this event".into(),
            ));
        }

        if !self.store.delete_event(id).await? {
            return Err(AppError::NotFound("Event not found".into()));
        }
        info!(event_id = %id, user_id = %caller.user_id, "event deleted");
        Ok(())
    }

    async fn changes_from(&self, input: EventInput) -> Result<EventChanges, AppError> {
        let required = |raw: Option<String>, field: &str| -> Result<Option<String>, AppError> {
            match raw {
                None => Ok(None),
                Some(value) => non_blank(Some(value.as_str()))
                    .map(Some)
                    .ok_or_else(|| AppError::ValidationError(format!("{field} cannot be empty"))),
            }
        };

        let title = required(input.title, "Title")?;
        let location = required(input.location, "Location")?;
        let date = match required(input.date, "Date")? {
            Some(raw) => Some(parse_event_date(&raw)?),
            None => None,
        };
        // A blank category or description clears the stored value.
        let category_id = match input.category_id {
            None => None,
            Some(raw) => match non_blank(Some(raw.as_str())) {
                Some(raw) => Some(Some(self.existing_category(&raw).await?)),
                None => Some(None),
            },
        };
        let description = input
            .description
            .map(|raw| non_blank(Some(raw.as_str())));

        Ok(EventChanges {
            title,
            date,
            location,
            description,
            category_id,
        })
    }

    async fn existing_category(&self, raw: &str) -> Result<Uuid, AppError> {
        let id = parse_id(raw, "category id")?;
        match self.store.find_category(id).await? {
            Some(_) => Ok(id),
            None => Err(AppError::NotFound("Category not found".into())),
        }
    }
}

fn parse_event_date(raw: &str) -> Result<chrono::DateTime<chrono::Utc>, AppError> {
    parse_date_time(raw).ok_or_else(|| AppError::ValidationError("Invalid event date".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewCategory, Role};
    use crate::store::{CategoryStore, MemoryStore};

    fn caller(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
        }
    }

    fn meetup() -> EventInput {
        EventInput {
            title: Some("Rust meetup".into()),
            date: Some("2030-05-01T18:00:00Z".into()),
            location: Some("Lagos".into()),
            ..EventInput::default()
        }
    }

    #[tokio::test]
    async fn create_requires_title_date_and_location() {
        let store = MemoryStore::new();
        let err = EventService::new(&store)
            .create(
                &caller(Role::Organizer),
                EventInput {
                    location: None,
                    ..meetup()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(m) if m == "Missing required fields"));
    }

    #[tokio::test]
    async fn create_checks_the_category() {
        let store = MemoryStore::new();
        let organizer = caller(Role::Organizer);
        let err = EventService::new(&store)
            .create(
                &organizer,
                EventInput {
                    category_id: Some(Uuid::new_v4().to_string()),
                    ..meetup()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let category = store
            .insert_category(NewCategory {
                name: "Tech".into(),
                description: None,
            })
            .await
            .unwrap();
        let event = EventService::new(&store)
            .create(
                &organizer,
                EventInput {
                    category_id: Some(category.id.to_string()),
                    ..meetup()
                },
            )
            .await
            .unwrap();
        assert_eq!(event.category_id, Some(category.id));
        assert_eq!(event.created_by, organizer.user_id);
    }

    #[tokio::test]
    async fn non_creator_update_is_forbidden_even_with_a_bad_payload() {
        let store = MemoryStore::new();
        let service = EventService::new(&store);
        let event = service.create(&caller(Role::Organizer), meetup()).await.unwrap();

        let err = service
            .update(
                &caller(Role::Admin),
                event.id,
                Ok(EventInput {
                    date: Some("not a date".into()),
                    ..EventInput::default()
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let unparsed = service
            .update(
                &caller(Role::Organizer),
                event.id,
                Err(AppError::ValidationError("malformed body".into())),
            )
            .await
            .unwrap_err();
        assert!(matches!(unparsed, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn creator_sees_the_body_error() {
        let store = MemoryStore::new();
        let service = EventService::new(&store);
        let organizer = caller(Role::Organizer);
        let event = service.create(&organizer, meetup()).await.unwrap();

        let err = service
            .update(
                &organizer,
                event.id,
                Err(AppError::ValidationError("malformed body".into())),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(m) if m == "malformed body"));
    }

    #[tokio::test]
    async fn creator_updates_only_the_given_fields() {
        let store = MemoryStore::new();
        let service = EventService::new(&store);
        let organizer = caller(Role::Organizer);
        let event = service
            .create(
                &organizer,
                EventInput {
                    description: Some("Talks".into()),
                    ..meetup()
                },
            )
            .await
            .unwrap();

        let updated = service
            .update(
                &organizer,
                event.id,
                Ok(EventInput {
                    location: Some("Abuja".into()),
                    description: Some(String::new()),
                    ..EventInput::default()
                }),
            )
            .await
            .unwrap();
        assert_eq!(updated.location, "Abuja");
        assert_eq!(updated.title, "Rust meetup");
        assert_eq!(updated.description, None);

        let err = service
            .update(
                &organizer,
                event.id,
                Ok(EventInput {
                    title: Some("  ".into()),
                    ..EventInput::default()
                }),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn admins_may_delete_any_event() {
        let store = MemoryStore::new();
        let service = EventService::new(&store);
        let event = service.create(&caller(Role::Organizer), meetup()).await.unwrap();

        let err = service
            .delete(&caller(Role::Organizer), event.id)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        service.delete(&caller(Role::Admin), event.id).await.unwrap();
        assert!(matches!(
            service.get(event.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn list_is_ordered_by_date() {
        let store = MemoryStore::new();
        let service = EventService::new(&store);
        let organizer = caller(Role::Organizer);
        service
            .create(
                &organizer,
                EventInput {
                    title: Some("Later".into()),
                    date: Some("2031-01-01".into()),
                    ..meetup()
                },
            )
            .await
            .unwrap();
        service.create(&organizer, meetup()).await.unwrap();

        let titles: Vec<String> = service
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|event| event.title)
            .collect();
        assert_eq!(titles, ["Rust meetup", "Later"]);
    }
}
