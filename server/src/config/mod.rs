use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;

use chrono::Duration;
use reqwest::Url;
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::google::GoogleConfig;
use crate::auth::password::DEFAULT_COST;

pub mod cors;
pub mod security;

pub use cors::create_cors_layer;
pub use security::create_security_headers_layer;

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_TOKEN_EXPIRY_SECS: i64 = 72 * 60 * 60;
const DEFAULT_OTP_EXPIRY_SECS: i64 = 60 * 60;
const DEFAULT_MAIL_FROM: &str = "no-reply@localhost";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone)]
pub struct MailConfig {
    pub api_url: Url,
    pub api_key: Option<String>,
    pub from: String,
}

/// Process configuration, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub host: IpAddr,
    pub port: u16,
    pub token_key: String,
    pub token_ttl: Duration,
    pub otp_ttl: Duration,
    pub admin_secret: Option<String>,
    pub bcrypt_cost: u32,
    pub mail: Option<MailConfig>,
    pub google: Option<GoogleConfig>,
    pub cors_allowed_origins: Option<String>,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let token_key = get("TOKEN_KEY").ok_or(ConfigError::Missing("TOKEN_KEY"))?;

        let mail = match get("MAIL_API_URL") {
            Some(raw) => Some(MailConfig {
                api_url: Url::parse(&raw).map_err(|e| ConfigError::Invalid {
                    key: "MAIL_API_URL",
                    reason: e.to_string(),
                })?,
                api_key: get("MAIL_API_KEY"),
                from: get("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            }),
            None => {
                info!("MAIL_API_URL not set, one-time codes will only be logged");
                None
            }
        };

        let google = match (
            get("GOOGLE_CLIENT_ID"),
            get("GOOGLE_CLIENT_SECRET"),
            get("GOOGLE_REDIRECT_URL"),
        ) {
            (Some(client_id), Some(client_secret), Some(redirect_url)) => Some(GoogleConfig {
                client_id,
                client_secret,
                redirect_url,
            }),
            (None, None, None) => None,
            _ => {
                warn!("Google sign-in is partially configured and will stay disabled");
                None
            }
        };

        let token_expiry: i64 = parse_or(
            "TOKEN_EXPIRY_SECS",
            get("TOKEN_EXPIRY_SECS"),
            DEFAULT_TOKEN_EXPIRY_SECS,
        )?;
        let otp_expiry: i64 = parse_or(
            "OTP_EXPIRY_SECS",
            get("OTP_EXPIRY_SECS"),
            DEFAULT_OTP_EXPIRY_SECS,
        )?;
        if token_expiry <= 0 || otp_expiry <= 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_EXPIRY_SECS/OTP_EXPIRY_SECS",
                reason: "expiry must be positive".to_string(),
            });
        }

        Ok(Self {
            database_url,
            max_connections: parse_or(
                "DATABASE_MAX_CONNECTIONS",
                get("DATABASE_MAX_CONNECTIONS"),
                DEFAULT_MAX_CONNECTIONS,
            )?,
            host: parse_or("HOST", get("HOST"), IpAddr::V4(Ipv4Addr::UNSPECIFIED))?,
            port: parse_or("PORT", get("PORT"), DEFAULT_PORT)?,
            token_key,
            token_ttl: Duration::seconds(token_expiry),
            otp_ttl: Duration::seconds(otp_expiry),
            admin_secret: get("ADMIN_SECRET"),
            bcrypt_cost: parse_or("BCRYPT_COST", get("BCRYPT_COST"), DEFAULT_COST)?,
            mail,
            google,
            cors_allowed_origins: get("CORS_ALLOWED_ORIGINS"),
            production: get("RUST_ENV")
                .map(|v| v.to_lowercase() == "production")
                .unwrap_or(false),
        })
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

fn parse_or<T>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("DATABASE_URL", "postgres://localhost/rsvp"),
        ("TOKEN_KEY", "secret"),
    ];

    #[test]
    fn missing_database_url_is_fatal() {
        let err = config_from(&[("TOKEN_KEY", "secret")]).err().unwrap();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn missing_token_key_is_fatal() {
        let err = config_from(&[("DATABASE_URL", "postgres://x")]).err().unwrap();
        assert!(matches!(err, ConfigError::Missing("TOKEN_KEY")));
    }

    #[test]
    fn defaults_apply() {
        let config = config_from(&REQUIRED).unwrap();
        assert_eq!(config.socket_addr().to_string(), "0.0.0.0:3001");
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.token_ttl, Duration::hours(72));
        assert_eq!(config.otp_ttl, Duration::hours(1));
        assert_eq!(config.bcrypt_cost, 10);
        assert!(config.admin_secret.is_none());
        assert!(config.mail.is_none());
        assert!(config.google.is_none());
        assert!(!config.production);
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("ADMIN_SECRET", "bootstrap"),
            ("MAIL_API_URL", "https://mail.example.com/send"),
            ("RUST_ENV", "Production"),
        ]);
        let config = config_from(&pairs).unwrap();
        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:8080");
        assert_eq!(config.admin_secret.as_deref(), Some("bootstrap"));
        assert_eq!(config.mail.unwrap().from, DEFAULT_MAIL_FROM);
        assert!(config.production);
    }

    #[test]
    fn bad_numbers_are_reported() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("PORT", "eighty"));
        let err = config_from(&pairs).err().unwrap();
        assert!(matches!(err, ConfigError::Invalid { key: "PORT", .. }));
    }

    #[test]
    fn partial_google_config_is_ignored() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("GOOGLE_CLIENT_ID", "id"));
        assert!(config_from(&pairs).unwrap().google.is_none());
    }
}
