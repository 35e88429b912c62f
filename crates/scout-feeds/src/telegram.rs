//! Outbound chat transport.
//!
//! Sends formatted alert messages through the Telegram Bot API using HTML
//! parse mode. The alert dispatcher in `scout-bot` owns formatting and rate
//! limiting; this client only delivers.

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Errors from the chat transport.
#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API rejected the message: {0}")]
    Api(String),
}

/// Configuration for the chat transport.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot token from BotFather.
    pub bot_token: String,
    /// Target chat id.
    pub chat_id: String,
    /// HTTP request timeout.
    pub request_timeout: Duration,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id: chat_id.into(),
            request_timeout: Duration::from_secs(15),
        }
    }
}

/// Response envelope from the Bot API.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Telegram Bot API client.
pub struct TelegramClient {
    http: Client,
    config: TelegramConfig,
}

impl TelegramClient {
    /// Create a new transport client.
    pub fn new(config: TelegramConfig) -> Self {
        let http = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .expect("Failed to create HTTP client");
        Self { http, config }
    }

    /// Send an HTML-formatted message to the configured chat.
    pub async fn send_html(&self, text: &str) -> Result<(), TelegramError> {
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            self.config.bot_token
        );
        let payload = serde_json::json!({
            "chat_id": self.config.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        let response: ApiResponse = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if !response.ok {
            return Err(TelegramError::Api(
                response
                    .description
                    .unwrap_or_else(|| "unknown error".to_string()),
            ));
        }

        debug!("Alert delivered to chat {}", self.config.chat_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_response_parsing() {
        let ok: ApiResponse = serde_json::from_str(r#"{"ok":true,"result":{}}"#).unwrap();
        assert!(ok.ok);

        let err: ApiResponse =
            serde_json::from_str(r#"{"ok":false,"description":"Bad Request"}"#).unwrap();
        assert!(!err.ok);
        assert_eq!(err.description.as_deref(), Some("Bad Request"));
    }

    #[test]
    fn test_config_new() {
        let config = TelegramConfig::new("123:abc", "-100200");
        assert_eq!(config.bot_token, "123:abc");
        assert_eq!(config.chat_id, "-100200");
    }
}
