use axum::http::Uri;

use crate::utils::error::AppError;

pub mod auth;
pub mod categories;
pub mod events;
pub mod google;
pub mod health;
pub mod registrations;

pub use health::health_check;

pub async fn route_not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for '{}'", uri.path()))
}
