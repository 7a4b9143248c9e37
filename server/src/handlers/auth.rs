use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use crate::services::{AuthOutcome, SignupInput};
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::extract::AppJson;
use crate::utils::response::{empty_success, with_token};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub date_of_birth: String,
    pub role: Option<String>,
    pub admin_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VerifyOtpRequest {
    pub user_id: String,
    pub otp: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResendOtpRequest {
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SigninRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub new_password: String,
}

fn session(outcome: AuthOutcome, message: &str) -> Response {
    with_token(outcome.token, outcome.user, message)
}

pub async fn signup(
    State(state): State<AppState>,
    AppJson(body): AppJson<SignupRequest>,
) -> Result<Response, AppError> {
    let outcome = state
        .auth()
        .signup(SignupInput {
            name: body.name,
            email: body.email,
            password: body.password,
            date_of_birth: body.date_of_birth,
            role: body.role,
            admin_secret: body.admin_secret,
        })
        .await?;

    Ok(session(
        outcome,
        "Signup successful. Verify your email with the code we sent.",
    ))
}

pub async fn verify_otp(
    State(state): State<AppState>,
    AppJson(body): AppJson<VerifyOtpRequest>,
) -> Result<Response, AppError> {
    let outcome = state.auth().verify_otp(&body.user_id, &body.otp).await?;
    Ok(session(outcome, "User email verified successfully."))
}

pub async fn resend_otp(
    State(state): State<AppState>,
    AppJson(body): AppJson<ResendOtpRequest>,
) -> Result<Response, AppError> {
    state
        .auth()
        .resend_verification(&body.user_id, &body.email)
        .await?;
    Ok(empty_success("Verification code sent. Check your inbox."))
}

pub async fn signin(
    State(state): State<AppState>,
    AppJson(body): AppJson<SigninRequest>,
) -> Result<Response, AppError> {
    let outcome = state.auth().signin(&body.email, &body.password).await?;
    Ok(session(outcome, "Signin successful"))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    AppJson(body): AppJson<ForgotPasswordRequest>,
) -> Result<Response, AppError> {
    state.auth().request_password_reset(&body.email).await?;
    Ok(empty_success("Password reset code sent. Check your inbox."))
}

pub async fn reset_password(
    State(state): State<AppState>,
    AppJson(body): AppJson<ResetPasswordRequest>,
) -> Result<Response, AppError> {
    state
        .auth()
        .reset_password(&body.email, &body.otp, &body.new_password)
        .await?;
    Ok(empty_success("Password has been reset successfully."))
}
