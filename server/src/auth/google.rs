//! Google OAuth 2.0 sign-in.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use thiserror::Error;

const AUTHORIZE_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

/// Identity returned by an external provider after a successful login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalProfile {
    pub subject: String,
    pub email: String,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity provider request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("identity provider returned an incomplete profile")]
    IncompleteProfile,

    #[error("invalid provider url: {0}")]
    Url(String),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Consent page the browser is redirected to.
    fn authorize_url(&self, state: &str) -> Result<String, IdentityError>;

    async fn exchange_code(&self, code: &str) -> Result<ExternalProfile, IdentityError>;
}

#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

pub struct GoogleProvider {
    client: Client,
    config: GoogleConfig,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UserInfo {
    sub: String,
    email: Option<String>,
    name: Option<String>,
}

impl GoogleProvider {
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorize_url(&self, state: &str) -> Result<String, IdentityError> {
        let url = Url::parse_with_params(
            AUTHORIZE_URL,
            &[
                ("client_id", self.config.client_id.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", "openid profile email"),
                ("state", state),
            ],
        )
        .map_err(|e| IdentityError::Url(e.to_string()))?;
        Ok(url.into())
    }

    async fn exchange_code(&self, code: &str) -> Result<ExternalProfile, IdentityError> {
        let token: TokenResponse = self
            .client
            .post(TOKEN_URL)
            .form(&[
                ("code", code),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.as_str()),
                ("redirect_uri", self.config.redirect_url.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let info: UserInfo = self
            .client
            .get(USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let email = info.email.ok_or(IdentityError::IncompleteProfile)?;
        let name = info
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| email.clone());

        Ok(ExternalProfile {
            subject: info.sub,
            email,
            name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_client_and_state() {
        let provider = GoogleProvider::new(GoogleConfig {
            client_id: "client-123".to_string(),
            client_secret: "secret".to_string(),
            redirect_url: "http://localhost:3001/auth/google/callback".to_string(),
        });

        let url = Url::parse(&provider.authorize_url("abc").unwrap()).unwrap();
        let params: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(params.contains(&("client_id".into(), "client-123".into())));
        assert!(params.contains(&("state".into(), "abc".into())));
        assert!(params.contains(&("response_type".into(), "code".into())));
        assert_eq!(url.host_str(), Some("accounts.google.com"));
    }
}
