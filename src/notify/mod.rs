//! Outbound chat notifications.
//!
//! Notifications are best-effort: callers log failures and carry on. The
//! only place a failure is surfaced is the preflight test message, where it
//! becomes a warning.

pub mod templates;

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::config::TelegramConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Notifier not configured: {0}")]
    NotConfigured(String),
}

/// Sends a plain-text message to a configured destination.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<(), NotifyError>;
}

/// Telegram Bot API `sendMessage`.
pub struct TelegramNotifier {
    client: reqwest::Client,
    endpoint: String,
    chat_id: String,
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

impl TelegramNotifier {
    /// Build a notifier from config. Fails if a credential is missing.
    pub fn from_config(config: &TelegramConfig) -> Result<Self, NotifyError> {
        let missing = config.missing_credentials();
        if !missing.is_empty() {
            return Err(NotifyError::NotConfigured(missing.join(", ")));
        }
        let (Some(token), Some(chat_id)) = (&config.bot_token, &config.chat_id) else {
            return Err(NotifyError::NotConfigured(
                "notification.telegram credentials".into(),
            ));
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/bot{}/sendMessage",
                config.api_base.trim_end_matches('/'),
                token
            ),
            chat_id: chat_id.clone(),
        })
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&SendMessage {
                chat_id: &self.chat_id,
                text,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(chat_id = %self.chat_id, "Telegram message sent");
        Ok(())
    }
}
