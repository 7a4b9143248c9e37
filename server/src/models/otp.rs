use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// What a one-time code was issued for. Codes for one purpose never satisfy the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OtpPurpose {
    Verification,
    PasswordReset,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown otp purpose '{0}'")]
pub struct UnknownPurpose(pub String);

impl OtpPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::Verification => "verification",
            OtpPurpose::PasswordReset => "password_reset",
        }
    }
}

impl FromStr for OtpPurpose {
    type Err = UnknownPurpose;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "verification" => Ok(OtpPurpose::Verification),
            "password_reset" => Ok(OtpPurpose::PasswordReset),
            other => Err(UnknownPurpose(other.to_string())),
        }
    }
}

impl fmt::Display for OtpPurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct OtpRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub purpose: OtpPurpose,
    pub otp_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl OtpRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}

#[derive(Debug, Clone)]
pub struct NewOtpRecord {
    pub user_id: Uuid,
    pub purpose: OtpPurpose,
    pub otp_hash: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}
