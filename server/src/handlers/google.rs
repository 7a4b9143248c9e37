//! Browser sign-in through Google and cookie session logout.
//!
//! The OAuth `state` parameter is remembered in an HttpOnly cookie and must
//! come back unchanged on the callback. Logout uses the double-submit
//! pattern: the `x-csrf-token` header has to repeat the `csrf_token` cookie.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::auth::google::IdentityProvider;
use crate::auth::otp::random_token;
use crate::auth::SESSION_COOKIE;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::AppQuery;
use crate::utils::response::{empty_success, success, with_token};

pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const OAUTH_STATE_COOKIE: &str = "oauth_state";

const TOKEN_LEN: usize = 32;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CsrfPayload {
    csrf_token: String,
}

fn provider(state: &AppState) -> Result<Arc<dyn IdentityProvider>, AppError> {
    state
        .identity
        .clone()
        .ok_or_else(|| AppError::NotConfigured("Google sign-in is not configured".into()))
}

fn cookie(name: &'static str, value: String, http_only: bool, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(http_only)
        .same_site(SameSite::Lax)
        .secure(secure)
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

pub async fn start(State(state): State<AppState>, jar: CookieJar) -> Result<Response, AppError> {
    let provider = provider(&state)?;
    let oauth_state = random_token(TOKEN_LEN);
    let url = provider
        .authorize_url(&oauth_state)
        .map_err(|e| AppError::ExternalServiceError(e.to_string()))?;

    let jar = jar.add(cookie(
        OAUTH_STATE_COOKIE,
        oauth_state,
        true,
        state.settings.secure_cookies,
    ));
    Ok((jar, Redirect::to(&url)).into_response())
}

pub async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    AppQuery(query): AppQuery<CallbackQuery>,
) -> Result<Response, AppError> {
    let provider = provider(&state)?;

    if let Some(reason) = query.error {
        warn!(reason = %reason, "Google sign-in was not completed");
        return Err(AppError::AuthError("Google sign-in was cancelled".into()));
    }

    let expected = jar.get(OAUTH_STATE_COOKIE).map(|c| c.value().to_string());
    match (expected, query.state) {
        (Some(expected), Some(received)) if !expected.is_empty() && expected == received => {}
        _ => return Err(AppError::Forbidden("Invalid OAuth state".into())),
    }
    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::ValidationError("Missing authorization code".into()))?;

    let profile = provider
        .exchange_code(&code)
        .await
        .map_err(|e| AppError::ExternalServiceError(e.to_string()))?;
    let outcome = state.auth().sign_in_external(profile).await?;

    let jar = jar.remove(removal(OAUTH_STATE_COOKIE)).add(cookie(
        SESSION_COOKIE,
        outcome.token.clone(),
        true,
        state.settings.secure_cookies,
    ));
    Ok((jar, with_token(outcome.token, outcome.user, "Signin successful")).into_response())
}

/// Issues a token that must be echoed in the `x-csrf-token` header on logout.
pub async fn csrf_token(State(state): State<AppState>, jar: CookieJar) -> Response {
    let token = random_token(TOKEN_LEN);
    let jar = jar.add(cookie(
        CSRF_COOKIE,
        token.clone(),
        false,
        state.settings.secure_cookies,
    ));
    (
        jar,
        success(CsrfPayload { csrf_token: token }, "CSRF token issued"),
    )
        .into_response()
}

pub async fn logout(jar: CookieJar, headers: HeaderMap) -> Result<Response, AppError> {
    let submitted = headers.get(CSRF_HEADER).and_then(|v| v.to_str().ok());
    let expected = jar.get(CSRF_COOKIE).map(|c| c.value());
    match (submitted, expected) {
        (Some(submitted), Some(expected)) if !expected.is_empty() && submitted == expected => {}
        _ => return Err(AppError::Forbidden("Invalid CSRF token".into())),
    }

    let jar = jar
        .remove(removal(SESSION_COOKIE))
        .remove(removal(CSRF_COOKIE));
    Ok((jar, empty_success("Logged out successfully")).into_response())
}
