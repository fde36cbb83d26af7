//! Outbound notification configuration.
//!
//! # Example
//!
//! ```toml
//! [notification.telegram]
//! enabled = true
//! bot_token = "${TELEGRAM_BOT_TOKEN}"
//! chat_id = "-1001234567890"
//! ```

use serde::{Deserialize, Serialize};

use super::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl NotificationConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        self.telegram.validate()
    }
}

/// Telegram bot settings.
///
/// Credentials are optional at load time; preflight validation reports
/// them as missing when the channel is enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Whether messages are sent.
    /// Default: false
    #[serde(default)]
    pub enabled: bool,

    /// Bot API token.
    #[serde(default)]
    pub bot_token: Option<String>,

    /// Destination chat.
    #[serde(default)]
    pub chat_id: Option<String>,

    /// Bot API base URL.
    /// Default: "https://api.telegram.org"
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Per-request timeout in seconds.
    /// Default: 10
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bot_token: None,
            chat_id: None,
            api_base: default_api_base(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

impl TelegramConfig {
    /// Names of credential fields that are enabled but unset.
    pub fn missing_credentials(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.bot_token.as_deref().is_none_or(str::is_empty) {
            missing.push("notification.telegram.bot_token");
        }
        if self.chat_id.as_deref().is_none_or(str::is_empty) {
            missing.push("notification.telegram.chat_id");
        }
        missing
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(ConfigError::Validation(format!(
                "notification.telegram.api_base must be an http(s) URL, got '{}'",
                self.api_base
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_credentials_enumerated() {
        let config = TelegramConfig {
            enabled: true,
            ..Default::default()
        };
        assert_eq!(
            config.missing_credentials(),
            vec![
                "notification.telegram.bot_token",
                "notification.telegram.chat_id"
            ]
        );
    }

    #[test]
    fn test_empty_token_counts_as_missing() {
        let config: TelegramConfig = toml::from_str(
            r#"
            enabled = true
            bot_token = ""
            chat_id = "42"
        "#,
        )
        .unwrap();
        assert_eq!(
            config.missing_credentials(),
            vec!["notification.telegram.bot_token"]
        );
    }

    #[test]
    fn test_api_base_must_be_http() {
        let config = TelegramConfig {
            api_base: "ftp://example".into(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
