use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use crate::auth::AuthUser;
use crate::models::RegistrationStatus;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::{AppJson, AppPath};
use crate::utils::response::{created, empty_success, success};
use crate::utils::validation::parse_id;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuestRegistrationRequest {
    pub event_id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
}

fn ids(event_id: &str, registration_id: &str) -> Result<(uuid::Uuid, uuid::Uuid), AppError> {
    Ok((
        parse_id(event_id, "event id")?,
        parse_id(registration_id, "registration id")?,
    ))
}

pub async fn register_guest(
    State(state): State<AppState>,
    AppJson(body): AppJson<GuestRegistrationRequest>,
) -> Result<Response, AppError> {
    let registration = state
        .registrations()
        .register_guest(
            body.event_id.as_deref(),
            body.name.as_deref(),
            body.email.as_deref(),
        )
        .await?;
    Ok(created(registration, "Registration successful"))
}

pub async fn register_user(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath(event_id): AppPath<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "event id")?;
    let registration = state
        .registrations()
        .register_user(&caller, event_id)
        .await?;
    Ok(created(registration, "Registration successful"))
}

pub async fn list_registrations(
    State(state): State<AppState>,
    AppPath(event_id): AppPath<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "event id")?;
    let registrations = state.registrations().list_for_event(event_id).await?;
    Ok(success(registrations, "Registrations retrieved successfully"))
}

async fn set_status(
    state: AppState,
    caller: AuthUser,
    event_id: String,
    registration_id: String,
    status: RegistrationStatus,
) -> Result<Response, AppError> {
    let (event_id, registration_id) = ids(&event_id, &registration_id)?;
    let registration = state
        .registrations()
        .set_status(&caller, event_id, registration_id, status)
        .await?;
    Ok(success(registration, format!("Registration {status}")))
}

pub async fn confirm_registration(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath((event_id, registration_id)): AppPath<(String, String)>,
) -> Result<Response, AppError> {
    set_status(
        state,
        caller,
        event_id,
        registration_id,
        RegistrationStatus::Confirmed,
    )
    .await
}

pub async fn cancel_registration(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath((event_id, registration_id)): AppPath<(String, String)>,
) -> Result<Response, AppError> {
    set_status(
        state,
        caller,
        event_id,
        registration_id,
        RegistrationStatus::Canceled,
    )
    .await
}

pub async fn delete_registration(
    State(state): State<AppState>,
    caller: AuthUser,
    AppPath((event_id, registration_id)): AppPath<(String, String)>,
) -> Result<Response, AppError> {
    let (event_id, registration_id) = ids(&event_id, &registration_id)?;
    state
        .registrations()
        .delete(&caller, event_id, registration_id)
        .await?;
    Ok(empty_success("Registration deleted successfully"))
}
