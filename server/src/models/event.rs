use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: Uuid,
    pub title: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub created_by: Uuid,
    pub attendees: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub title: String,
    pub date: DateTime<Utc>,
    pub location: String,
    pub description: Option<String>,
    pub category_id: Option<Uuid>,
    pub created_by: Uuid,
}

/// Fields to overwrite on an event. `None` leaves the stored value alone;
/// the nested options clear a nullable column when set to `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct EventChanges {
    pub title: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub description: Option<Option<String>>,
    pub category_id: Option<Option<Uuid>>,
}

impl EventChanges {
    pub fn apply(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title;
        }
        if let Some(date) = self.date {
            event.date = date;
        }
        if let Some(location) = self.location {
            event.location = location;
        }
        if let Some(description) = self.description {
            event.description = description;
        }
        if let Some(category_id) = self.category_id {
            event.category_id = category_id;
        }
    }
}
