use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::CookieJar;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use tracing::debug;
use uuid::Uuid;

use crate::auth::jwt::TokenError;
use crate::models::Role;
use crate::state::AppState;
use crate::utils::error::AppError;

/// Cookie holding the session token for browser logins.
pub const SESSION_COOKIE: &str = "session";

/// Identity attached to a request once its token checks out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Verifies the bearer token (or session cookie) and stores the caller in the
/// request extensions.
pub async fn authenticate(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = match (bearer, jar.get(SESSION_COOKIE)) {
        (Some(TypedHeader(header)), _) => header.token().to_string(),
        (None, Some(cookie)) => cookie.value().to_string(),
        (None, None) => return Err(AppError::AuthError("Authentication required".into())),
    };

    let claims = state.tokens.verify(&token).map_err(|err| {
        match &err {
            TokenError::Expired => debug!("rejected expired token"),
            other => debug!(error = %other, "rejected token"),
        }
        AppError::AuthError("Invalid or expired token".into())
    })?;

    request.extensions_mut().insert(AuthUser {
        user_id: claims.user_id,
        role: claims.role,
    });

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .copied()
            .ok_or_else(|| AppError::AuthError("Authentication required".into()))
    }
}
