use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Registration lifecycle. Moves between states are not validated: a
/// canceled registration can be confirmed again and vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Confirmed,
    Canceled,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown registration status '{0}'")]
pub struct UnknownStatus(pub String);

impl RegistrationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegistrationStatus::Pending => "pending",
            RegistrationStatus::Confirmed => "confirmed",
            RegistrationStatus::Canceled => "canceled",
        }
    }
}

impl FromStr for RegistrationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RegistrationStatus::Pending),
            "confirmed" => Ok(RegistrationStatus::Confirmed),
            "canceled" => Ok(RegistrationStatus::Canceled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub event_id: Uuid,
    /// Set when an authenticated user registered; guests only leave a name and email.
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub status: RegistrationStatus,
    pub registration_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub event_id: Uuid,
    pub user_id: Option<Uuid>,
    pub name: String,
    pub email: String,
}
