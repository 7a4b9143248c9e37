use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[serde(alias = "event-organizer")]
    Organizer,
    Attendee,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Organizer => "organizer",
            Role::Attendee => "attendee",
        }
    }

    /// Role requested at signup. Anything unrecognised falls back to attendee.
    pub fn from_signup(requested: Option<&str>) -> Self {
        requested
            .map(|raw| raw.trim().to_lowercase())
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(Role::Attendee)
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "organizer" | "event-organizer" => Ok(Role::Organizer),
            "attendee" => Ok(Role::Attendee),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an account proves its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credential {
    Local {
        password_hash: String,
        date_of_birth: NaiveDate,
    },
    External {
        google_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    pub credential: Credential,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn password_hash(&self) -> Option<&str> {
        match &self.credential {
            Credential::Local { password_hash, .. } => Some(password_hash),
            Credential::External { .. } => None,
        }
    }

    pub fn summary(&self) -> UserSummary {
        UserSummary {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            verified: self.verified,
            role: self.role,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub verified: bool,
    pub credential: Credential,
}

/// Public view of a user returned by the auth endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub verified: bool,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(None, Role::Attendee)]
    #[case(Some("ADMIN "), Role::Admin)]
    #[case(Some("organizer"), Role::Organizer)]
    #[case(Some("event-organizer"), Role::Organizer)]
    #[case(Some("superuser"), Role::Attendee)]
    #[case(Some(""), Role::Attendee)]
    fn signup_role_falls_back_to_attendee(#[case] requested: Option<&str>, #[case] expected: Role) {
        assert_eq!(Role::from_signup(requested), expected);
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Organizer).unwrap();
        assert_eq!(json, "\"organizer\"");
        let parsed: Role = serde_json::from_str("\"event-organizer\"").unwrap();
        assert_eq!(parsed, Role::Organizer);
    }

    #[test]
    fn external_users_have_no_password() {
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            name: "Ann".to_string(),
            email: "ann@x.com".to_string(),
            role: Role::Attendee,
            verified: true,
            credential: Credential::External {
                google_id: "g-1".to_string(),
            },
            created_at: now,
            updated_at: now,
        };
        assert!(user.password_hash().is_none());
    }
}
