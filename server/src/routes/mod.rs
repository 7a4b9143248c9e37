use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put, MethodRouter};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::roles::{ADMINS, EVENT_MANAGERS};
use crate::auth::{authenticate, RequireRoleLayer};
use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{
    auth, categories, events, google, health_check, registrations, route_not_found,
};
use crate::models::Role;
use crate::state::AppState;

/// Requires a valid session token.
fn authenticated(route: MethodRouter<AppState>, state: &AppState) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(state.clone(), authenticate))
}

/// Requires a valid session token held by one of `roles`.
fn guarded(
    route: MethodRouter<AppState>,
    state: &AppState,
    roles: &'static [Role],
) -> MethodRouter<AppState> {
    authenticated(route.route_layer(RequireRoleLayer::new(roles)), state)
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(auth::signup))
        .route("/signup/verifyOTP", post(auth::verify_otp))
        .route(
            "/signup/resendOTPVerificationCode",
            post(auth::resend_otp),
        )
        .route("/signup/forget_password", post(auth::forgot_password))
        .route("/signup/reset-password", post(auth::reset_password))
        .route("/signin", post(auth::signin))
}

fn event_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            authenticated(get(events::list_events), state).merge(guarded(
                post(events::create_event),
                state,
                EVENT_MANAGERS,
            )),
        )
        .route("/register", post(registrations::register_guest))
        .route(
            "/:id",
            authenticated(get(events::get_event), state).merge(guarded(
                put(events::update_event).delete(events::delete_event),
                state,
                EVENT_MANAGERS,
            )),
        )
        .route(
            "/:id/register",
            authenticated(post(registrations::register_user), state),
        )
        .route(
            "/:id/registrations",
            authenticated(get(registrations::list_registrations), state),
        )
        .route(
            "/:id/registrations/:registration_id",
            authenticated(delete(registrations::delete_registration), state),
        )
        .route(
            "/:id/registrations/:registration_id/confirm",
            authenticated(put(registrations::confirm_registration), state),
        )
        .route(
            "/:id/registrations/:registration_id/cancel",
            authenticated(put(registrations::cancel_registration), state),
        )
}

fn category_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(categories::list_categories).merge(guarded(
                post(categories::create_category),
                state,
                ADMINS,
            )),
        )
        .route(
            "/:id",
            get(categories::get_category).merge(guarded(
                put(categories::update_category).delete(categories::delete_category),
                state,
                ADMINS,
            )),
        )
}

fn external_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/google", get(google::start))
        .route("/google/callback", get(google::callback))
        .route("/csrf-token", get(google::csrf_token))
        .route("/logout", post(google::logout))
}

pub fn create_routes(state: AppState, cors_origins: Option<&str>, production: bool) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/auth", auth_routes())
        .nest("/api/events", event_routes(&state))
        .nest("/api/categories", category_routes(&state))
        .nest("/auth", external_auth_routes())
        .fallback(route_not_found)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(production))
        .layer(create_cors_layer(cors_origins))
        .with_state(state)
}
