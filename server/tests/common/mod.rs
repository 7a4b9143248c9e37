#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, Response, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use rsvp_server::auth::google::{ExternalProfile, IdentityError, IdentityProvider};
use rsvp_server::auth::{Hasher, JwtKeys};
use rsvp_server::mail::RecordingMailer;
use rsvp_server::models::{Credential, NewUser, Role};
use rsvp_server::routes::create_routes;
use rsvp_server::state::{AppState, AuthSettings};
use rsvp_server::store::{MemoryStore, UserStore};

pub const TOKEN_SECRET: &[u8] = b"integration-secret";
pub const ADMIN_SECRET: &str = "let-me-in";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub mailer: Arc<RecordingMailer>,
    pub tokens: JwtKeys,
}

/// Accepts the code `good-code` and returns a fixed profile.
pub struct FakeGoogle;

#[async_trait]
impl IdentityProvider for FakeGoogle {
    fn authorize_url(&self, state: &str) -> Result<String, IdentityError> {
        Ok(format!("https://accounts.example.com/consent?state={state}"))
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalProfile, IdentityError> {
        if code != "good-code" {
            return Err(IdentityError::IncompleteProfile);
        }
        Ok(ExternalProfile {
            subject: "google-sub-1".into(),
            email: "gina@example.com".into(),
            name: "Gina".into(),
        })
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(false)
    }

    pub fn with_google() -> Self {
        Self::build(true)
    }

    fn build(google: bool) -> Self {
        let store = Arc::new(MemoryStore::new());
        let mailer = Arc::new(RecordingMailer::new());
        let settings = AuthSettings {
            admin_secret: Some(ADMIN_SECRET.to_string()),
            hasher: Hasher::new(4),
            ..AuthSettings::default()
        };
        let mut state = AppState::new(
            store.clone(),
            mailer.clone(),
            JwtKeys::new(TOKEN_SECRET, Duration::hours(1)),
            settings,
        );
        if google {
            state = state.with_identity_provider(Arc::new(FakeGoogle));
        }

        Self {
            router: create_routes(state, None, false),
            store,
            mailer,
            tokens: JwtKeys::new(TOKEN_SECRET, Duration::hours(1)),
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn call(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.send(request).await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// Inserts a verified user straight into the store and returns a token for them.
    pub async fn seed_user(&self, role: Role) -> (Uuid, String) {
        let user = self
            .store
            .insert_user(NewUser {
                name: "Seeded User".into(),
                email: format!("{}@example.com", Uuid::new_v4().simple()),
                role,
                verified: true,
                credential: Credential::Local {
                    password_hash: Hasher::new(4).hash("password123").await.unwrap(),
                    date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
                },
            })
            .await
            .unwrap();
        let token = self.tokens.issue(user.id, role).unwrap();
        (user.id, token)
    }
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    }
}

pub fn json_request(method: Method, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).unwrap()
}
