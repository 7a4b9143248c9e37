use axum::body::Body;
use axum::http::Request;
use axum::response::{IntoResponse, Response};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tower::{Layer, Service};

use crate::auth::middleware::AuthUser;
use crate::models::Role;
use crate::utils::error::AppError;

pub const ADMINS: &[Role] = &[Role::Admin];
pub const EVENT_MANAGERS: &[Role] = &[Role::Admin, Role::Organizer];

/// Rejects requests whose caller role is not in the allow-list.
///
/// Must sit inside the authentication middleware so the caller is already
/// attached to the request.
#[derive(Clone, Copy)]
pub struct RequireRoleLayer {
    allowed: &'static [Role],
}

impl RequireRoleLayer {
    pub fn new(allowed: &'static [Role]) -> Self {
        Self { allowed }
    }
}

impl<S> Layer<S> for RequireRoleLayer {
    type Service = RequireRoleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireRoleService {
            inner,
            allowed: self.allowed,
        }
    }
}

#[derive(Clone)]
pub struct RequireRoleService<S> {
    inner: S,
    allowed: &'static [Role],
}

impl<S> Service<Request<Body>> for RequireRoleService<S>
where
    S: Service<Request<Body>, Response = Response>,
{
    type Response = Response;
    type Error = S::Error;
    type Future = RequireRoleFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let caller = request.extensions().get::<AuthUser>().copied();

        let rejection = match caller {
            Some(caller) if self.allowed.contains(&caller.role) => {
                return RequireRoleFuture::Allowed {
                    future: self.inner.call(request),
                };
            }
            Some(caller) => {
                tracing::warn!(
                    user_id = %caller.user_id,
                    role = %caller.role,
                    path = %request.uri().path(),
                    "role not allowed"
                );
                AppError::Forbidden("You are not authorized to perform this action".into())
            }
            None => AppError::AuthError("Authentication required".into()),
        };

        RequireRoleFuture::Rejected {
            response: Some(rejection.into_response()),
        }
    }
}

#[pin_project::pin_project(project = RequireRoleProj)]
pub enum RequireRoleFuture<F> {
    Allowed {
        #[pin]
        future: F,
    },
    Rejected {
        response: Option<Response>,
    },
}

impl<F, E> Future for RequireRoleFuture<F>
where
    F: Future<Output = Result<Response, E>>,
{
    type Output = Result<Response, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.project() {
            RequireRoleProj::Allowed { future } => future.poll(cx),
            RequireRoleProj::Rejected { response } => Poll::Ready(Ok(response
                .take()
                .unwrap_or_else(|| {
                    AppError::Forbidden("You are not authorized to perform this action".into())
                        .into_response()
                }))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use std::convert::Infallible;
    use tower::{service_fn, ServiceExt};
    use uuid::Uuid;

    async fn ok(_request: Request<Body>) -> Result<Response, Infallible> {
        Ok(StatusCode::NO_CONTENT.into_response())
    }

    fn request_as(role: Option<Role>) -> Request<Body> {
        let mut request = Request::new(Body::empty());
        if let Some(role) = role {
            request.extensions_mut().insert(AuthUser {
                user_id: Uuid::new_v4(),
                role,
            });
        }
        request
    }

    #[tokio::test]
    async fn listed_roles_pass_through() {
        let service = RequireRoleLayer::new(EVENT_MANAGERS).layer(service_fn(ok));
        let response = service.oneshot(request_as(Some(Role::Organizer))).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn other_roles_are_forbidden() {
        let service = RequireRoleLayer::new(ADMINS).layer(service_fn(ok));
        let response = service.oneshot(request_as(Some(Role::Organizer))).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn anonymous_callers_are_unauthorized() {
        let service = RequireRoleLayer::new(ADMINS).layer(service_fn(ok));
        let response = service.oneshot(request_as(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }
}
