//! Notification module for delivering screening reports.
//!
//! Delivery is best-effort: callers log a failed send and keep the
//! screening result.

use anyhow::Result;
use async_trait::async_trait;
use sandwich_common::config::TelegramConfig;
use sandwich_common::util::{sanitize_for_log, truncate_with_ellipsis};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivers report text somewhere.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Channel name for logs
    fn name(&self) -> &'static str;

    /// Whether `send` reaches a recipient.
    fn delivers(&self) -> bool {
        true
    }

    /// Send one message.
    async fn send(&self, text: &str) -> Result<()>;
}

/// Notifier for display-only runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    fn name(&self) -> &'static str {
        "noop"
    }

    fn delivers(&self) -> bool {
        false
    }

    async fn send(&self, _text: &str) -> Result<()> {
        tracing::debug!("Notification disabled, skipping");
        Ok(())
    }
}

/// Request body for the Bot API `sendMessage` method
#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

/// Response envelope from the Bot API
#[derive(Debug, Deserialize)]
struct BotApiResponse {
    ok: bool,
    description: Option<String>,
}

/// Sends reports through the Telegram Bot API.
pub struct TelegramNotifier {
    api_base_url: String,
    bot_token: String,
    chat_id: String,
    parse_mode: String,
    retry_count: u32,
    client: reqwest::Client,
}

impl TelegramNotifier {
    /// Create a notifier from configuration.
    ///
    /// Returns `None` when Telegram is disabled or credentials are missing.
    pub fn from_config(config: &TelegramConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let bot_token = config.bot_token.clone().filter(|t| !t.is_empty())?;
        let chat_id = config.chat_id.clone().filter(|c| !c.is_empty())?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Some(Self {
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            bot_token,
            chat_id,
            parse_mode: config.parse_mode.clone(),
            retry_count: config.retry_count.max(1),
            client,
        })
    }

    fn send_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base_url, self.bot_token)
    }

    /// Try to send a single request
    async fn try_send(&self, url: &str, request: &SendMessageRequest<'_>) -> Result<()> {
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(|e| anyhow::anyhow!(sanitize_for_log(&e.to_string())))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status, truncate_with_ellipsis(&error_text, 200));
        }

        let result: BotApiResponse = response.json().await?;

        if result.ok {
            Ok(())
        } else {
            anyhow::bail!(
                "Send failed: {}",
                result.description.unwrap_or_else(|| "Unknown error".to_string())
            )
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, text: &str) -> Result<()> {
        let url = self.send_url();
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: &self.parse_mode,
            disable_web_page_preview: true,
        };

        let mut last_error = None;

        for attempt in 1..=self.retry_count {
            match self.try_send(&url, &request).await {
                Ok(()) => {
                    tracing::info!(
                        chat_id = %self.chat_id,
                        chars = text.chars().count(),
                        "Report notification sent successfully"
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.retry_count,
                        error = %sanitize_for_log(&e.to_string()),
                        "Failed to send notification, retrying..."
                    );
                    last_error = Some(e);

                    if attempt < self.retry_count {
                        tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Unknown error")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str) -> TelegramConfig {
        TelegramConfig {
            enabled: true,
            bot_token: Some("123:ABC".into()),
            chat_id: Some("-100200".into()),
            retry_count: 3,
            api_base_url: base.to_string(),
            ..TelegramConfig::default()
        }
    }

    #[test]
    fn test_from_config_requires_credentials() {
        let mut cfg = config("http://localhost");
        assert!(TelegramNotifier::from_config(&cfg).is_some());

        cfg.chat_id = Some(String::new());
        assert!(TelegramNotifier::from_config(&cfg).is_none());

        let disabled = TelegramConfig::default();
        assert!(TelegramNotifier::from_config(&disabled).is_none());
    }

    #[tokio::test]
    async fn test_send_posts_html_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:ABC/sendMessage"))
            .and(body_partial_json(serde_json::json!({
                "chat_id": "-100200",
                "text": "<b>hi</b>",
                "parse_mode": "HTML"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = TelegramNotifier::from_config(&config(&server.uri())).unwrap();
        notifier.send("<b>hi</b>").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_retries_then_fails() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": false,
                "description": "Bad Request: chat not found"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.retry_count = 2;
        let notifier = TelegramNotifier::from_config(&cfg).unwrap();
        let err = notifier.send("text").await.unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[tokio::test]
    async fn test_noop_always_succeeds() {
        assert!(NoopNotifier.send("anything").await.is_ok());
    }

    #[test]
    fn test_only_telegram_delivers() {
        assert!(!NoopNotifier.delivers());

        let notifier = TelegramNotifier::from_config(&config("http://localhost")).unwrap();
        assert!(notifier.delivers());
    }
}
