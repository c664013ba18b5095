//! Telegram notification transport.
//!
//! Sends alert text to a chat via the Bot API. Entirely optional: when the
//! token or chat id env vars are not set the notifier is simply absent and
//! the dispatcher skips notification.
//!
//! API: POST https://api.telegram.org/bot{token}/sendMessage

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

use crate::config::{AlertsConfig, AppConfig};
use crate::sinks::Notifier;
use crate::types::TriarbError;

const API_BASE: &str = "https://api.telegram.org";

/// Bounded delivery timeout; a stuck send must not stall evaluation for
/// longer than this.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Serialize)]
struct SendMessagePayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
    parse_mode: &'a str,
}

pub struct TelegramNotifier {
    http: Client,
    token: SecretString,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(token: SecretString, chat_id: String) -> Result<Self> {
        let http = Client::builder().timeout(SEND_TIMEOUT).build()?;
        Ok(Self {
            http,
            token,
            chat_id,
        })
    }

    /// Build the notifier from config, resolving the referenced env vars.
    /// Returns `None` (notifications disabled) when either is missing.
    pub fn from_config(cfg: &AlertsConfig) -> Result<Option<Self>> {
        let token = cfg
            .telegram_bot_token_env
            .as_deref()
            .and_then(|env| AppConfig::resolve_env(env).ok())
            .filter(|t| !t.is_empty());
        let chat_id = cfg
            .telegram_chat_id_env
            .as_deref()
            .and_then(|env| AppConfig::resolve_env(env).ok())
            .filter(|c| !c.is_empty());

        match (token, chat_id) {
            (Some(token), Some(chat_id)) => {
                info!("Telegram notifications enabled");
                Ok(Some(Self::new(SecretString::new(token), chat_id)?))
            }
            _ => {
                info!("Telegram notifications disabled (token/chat id not configured)");
                Ok(None)
            }
        }
    }

    fn send_url(&self) -> String {
        format!("{API_BASE}/bot{}/sendMessage", self.token.expose_secret())
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        let payload = SendMessagePayload {
            chat_id: &self.chat_id,
            text,
            disable_web_page_preview: true,
            parse_mode: "Markdown",
        };

        let response = self
            .http
            .post(self.send_url())
            .json(&payload)
            .send()
            .await
            .map_err(|e| TriarbError::Notify {
                transport: "telegram".to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TriarbError::Notify {
                transport: "telegram".to_string(),
                message: format!("HTTP {status}: {body}"),
            }
            .into());
        }

        Ok(())
    }

    fn name(&self) -> &str {
        "telegram"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
