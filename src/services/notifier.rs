//! Outbound verification email delivery.
//!
//! Delivery is fire-and-forget from the verification flow's point of view: a
//! failed send is logged and reported, and the pending verification stays
//! redeemable until its TTL runs out.

use async_trait::async_trait;
use serde::Serialize;

#[cfg(test)]
use mockall::automock;

/// A rendered message ready to hand to a delivery provider.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

impl EmailMessage {
    /// Verification email carrying the redemption link.
    pub fn verification(to: &str, verification_url: &str) -> Self {
        let text = format!(
            "Please verify your API key request by clicking this link: {}. \
             This link will expire in 30 minutes.",
            verification_url
        );
        let html = format!(
            "<!DOCTYPE html><html lang=\"en\"><body>\
             <h1>Verify your API key request</h1>\
             <p>Click the button below to receive your API key. \
             This link will expire in 30 minutes.</p>\
             <p><a href=\"{url}\">Verify and get my API key</a></p>\
             <p>If you did not request an API key, you can ignore this email.</p>\
             </body></html>",
            url = verification_url
        );

        Self {
            to: to.to_string(),
            subject: "Verify your API key request".to_string(),
            text,
            html,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("delivery request failed: {0}")]
    Transport(String),

    #[error("provider rejected message with status {status}: {body}")]
    Rejected { status: u16, body: String },
}

/// Sends emails on behalf of the verification flow.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, message: EmailMessage) -> Result<(), NotifyError>;
}

#[derive(Debug, Serialize)]
struct ResendPayload<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: &'a str,
    html: &'a str,
}

/// Delivers through the Resend HTTP API.
#[derive(Debug, Clone)]
pub struct ResendNotifier {
    client: reqwest::Client,
    api_key: String,
    from: String,
    endpoint: String,
}

impl ResendNotifier {
    /// # Timeout
    ///
    /// 5 seconds per send, so a slow provider cannot hold the request open.
    pub fn new(api_key: String, from_address: &str) -> Result<Self, NotifyError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .map_err(|e| NotifyError::Transport(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            from: format!("Email Validator API <{}>", from_address),
            endpoint: "https://api.resend.com/emails".to_string(),
        })
    }
}

#[async_trait]
impl Notifier for ResendNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), NotifyError> {
        let payload = ResendPayload {
            from: &self.from,
            to: [message.to.as_str()],
            subject: &message.subject,
            text: &message.text,
            html: &message.html,
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotifyError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

/// Used when no delivery provider is configured.
///
/// Records that a message would have been sent. The link is a bearer secret
/// and is never written to the log.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, message: EmailMessage) -> Result<(), NotifyError> {
        tracing::info!(
            to = %message.to,
            subject = %message.subject,
            "email delivery not configured, verification email not sent"
        );
        Ok(())
    }
}
