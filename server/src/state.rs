use std::sync::Arc;

use chrono::Duration;
use tracing::info;

use crate::auth::google::{GoogleProvider, IdentityProvider};
use crate::auth::{Hasher, JwtKeys};
use crate::config::Config;
use crate::mail::{HttpMailer, LogMailer, MailError, Mailer};
use crate::services::{AuthService, CategoryService, EventService, RegistrationService};
use crate::store::Store;

/// Tunables for the credential flows.
#[derive(Clone)]
pub struct AuthSettings {
    pub otp_ttl: Duration,
    pub admin_secret: Option<String>,
    pub hasher: Hasher,
    /// Mark cookies `Secure`; on when serving over HTTPS.
    pub secure_cookies: bool,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            otp_ttl: Duration::hours(1),
            admin_secret: None,
            hasher: Hasher::default(),
            secure_cookies: false,
        }
    }
}

/// Shared, immutable handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub mailer: Arc<dyn Mailer>,
    pub tokens: Arc<JwtKeys>,
    pub identity: Option<Arc<dyn IdentityProvider>>,
    pub settings: Arc<AuthSettings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        mailer: Arc<dyn Mailer>,
        tokens: JwtKeys,
        settings: AuthSettings,
    ) -> Self {
        Self {
            store,
            mailer,
            tokens: Arc::new(tokens),
            identity: None,
            settings: Arc::new(settings),
        }
    }

    pub fn with_identity_provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(provider);
        self
    }

    pub fn from_config(config: &Config, store: Arc<dyn Store>) -> Result<Self, MailError> {
        let mailer: Arc<dyn Mailer> = match &config.mail {
            Some(mail) => {
                info!(endpoint = %mail.api_url, "mail delivery via HTTP API");
                Arc::new(HttpMailer::new(
                    mail.api_url.clone(),
                    mail.api_key.clone(),
                    mail.from.clone(),
                )?)
            }
            None => Arc::new(LogMailer),
        };

        let settings = AuthSettings {
            otp_ttl: config.otp_ttl,
            admin_secret: config.admin_secret.clone(),
            hasher: Hasher::new(config.bcrypt_cost),
            secure_cookies: config.production,
        };

        let state = Self::new(
            store,
            mailer,
            JwtKeys::new(config.token_key.as_bytes(), config.token_ttl),
            settings,
        );

        Ok(match &config.google {
            Some(google) => {
                info!("Google sign-in enabled");
                state.with_identity_provider(Arc::new(GoogleProvider::new(google.clone())))
            }
            None => state,
        })
    }

    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(
            self.store.as_ref(),
            self.mailer.as_ref(),
            self.tokens.as_ref(),
            self.settings.as_ref(),
        )
    }

    pub fn events(&self) -> EventService<'_> {
        EventService::new(self.store.as_ref())
    }

    pub fn categories(&self) -> CategoryService<'_> {
        CategoryService::new(self.store.as_ref())
    }

    pub fn registrations(&self) -> RegistrationService<'_> {
        RegistrationService::new(self.store.as_ref())
    }
}
