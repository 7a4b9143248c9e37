use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Status {
    Success,
    Failed,
}

#[derive(Serialize)]
pub struct ApiResponse<T>
where
    T: Serialize,
{
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub details: Option<Value>,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub status: Status,
    pub message: String,
    pub error: ApiErrorBody,
}

fn respond<T>(status: StatusCode, body: ApiResponse<T>) -> Response
where
    T: Serialize,
{
    (status, Json(body)).into_response()
}

pub fn success<T>(data: T, message: impl Into<String>) -> Response
where
    T: Serialize,
{
    respond(
        StatusCode::OK,
        ApiResponse {
            status: Status::Success,
            message: message.into(),
            token: None,
            data: Some(data),
        },
    )
}

pub fn created<T>(data: T, message: impl Into<String>) -> Response
where
    T: Serialize,
{
    respond(
        StatusCode::CREATED,
        ApiResponse {
            status: Status::Success,
            message: message.into(),
            token: None,
            data: Some(data),
        },
    )
}

/// Success envelope carrying a freshly issued session token.
pub fn with_token<T>(token: String, data: T, message: impl Into<String>) -> Response
where
    T: Serialize,
{
    respond(
        StatusCode::OK,
        ApiResponse {
            status: Status::Success,
            message: message.into(),
            token: Some(token),
            data: Some(data),
        },
    )
}

pub fn empty_success(message: impl Into<String>) -> Response {
    respond::<()>(
        StatusCode::OK,
        ApiResponse {
            status: Status::Success,
            message: message.into(),
            token: None,
            data: None,
        },
    )
}

pub fn error(
    code: &str,
    message: impl Into<String>,
    details: Option<Value>,
    status: StatusCode,
) -> Response {
    let body = ApiErrorResponse {
        status: Status::Failed,
        message: message.into(),
        error: ApiErrorBody {
            code: code.to_string(),
            details,
        },
    };

    (status, Json(body)).into_response()
}
