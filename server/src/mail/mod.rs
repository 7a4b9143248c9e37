//! Outbound email for one-time codes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

#[cfg(any(test, feature = "test-support"))]
mod recording;
#[cfg(any(test, feature = "test-support"))]
pub use recording::RecordingMailer;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail api request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("mail api rejected the message with status {0}")]
    Rejected(StatusCode),
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError>;
}

/// Writes mail to the log instead of delivering it. Used when no mail API is configured.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        info!(to = %mail.to, subject = %mail.subject, "mail delivery disabled, logging message");
        debug!(text = %mail.text, "undelivered mail body");
        Ok(())
    }
}

/// Delivers mail through a JSON HTTP API (`POST {from, to, subject, text}`).
pub struct HttpMailer {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct MailPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(endpoint: Url, api_key: Option<String>, from: String) -> Result<Self, MailError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint,
            api_key,
            from,
        })
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let mut request = self.client.post(self.endpoint.clone()).json(&MailPayload {
            from: &self.from,
            to: &mail.to,
            subject: &mail.subject,
            text: &mail.text,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let status = request.send().await?.status();
        if !status.is_success() {
            return Err(MailError::Rejected(status));
        }

        info!(to = %mail.to, subject = %mail.subject, "mail sent");
        Ok(())
    }
}
