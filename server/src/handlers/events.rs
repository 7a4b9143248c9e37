use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::services::EventInput;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{AppJson, AppPath};
use crate::utils::response::{created, empty_success, success};
use crate::utils::validation::parse_id;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventRequest {
    pub title: Option<String>,
    pub date: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "category")]
    pub category_id: Option<String>,
}

impl From<EventRequest> for EventInput {
    fn from(request: EventRequest) -> Self {
        EventInput {
            title: request.title,
            date: request.date,
            location: request.location,
            description: request.description,
            category_id: request.category_id,
        }
    }
}

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = state.events().list().await?;
    Ok(success(events, "Events retrieved successfully"))
}

pub async fn get_event(
    State(state): State<AppState>,
    AppPath(id): AppPath<String>,
) -> Result<Response, AppError> {
    let event = state.events().get(parse_id(&id, "event id")?).await?;
    Ok(success(event, "Event retrieved successfully"))
}

pub async fn create_event(
    State(state): State<AppState>,
    caller: AuthUser,
    AppJson(body): AppJson<EventRequest>,
) -> Result<Response, AppError> {
    let event = state.events().create(&caller, body.into()).await?;
    Ok(created(event, "Event created successfully"))
}

pub async fn update_event(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<String>,
    body: Result<AppJson<EventRequest>, AppError>,
) -> Result<Response, AppError> {
    let id = parse_id(&id, "event id")?;
    // Body errors surface only after the ownership check.
    let input = body.map(|AppJson(request)| EventInput::from(request));
    let event = state.events().update(&caller, id, input).await?;
    Ok(success(event, "Event updated successfully"))
}

pub async fn delete_event(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(id): AppPath<String>,
) -> Result<Response, AppError> {
    let id = parse_id(&id, "event id")?;
    state.events().delete(&caller, id).await?;
    Ok(empty_success("Event deleted successfully"))
}
