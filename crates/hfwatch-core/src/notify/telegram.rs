//! Telegram Bot API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::TelegramConfig;
use crate::error::{Error, Result};

use super::Notifier;

/// Extra time allowed on top of the long-poll timeout
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Minimal Telegram Bot API client for sending messages and polling updates
pub struct TelegramClient {
    client: Client,
    base_url: String,
}

impl TelegramClient {
    /// Create a client from configuration; requires a bot token
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::config("telegram.bot_token is not set"))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                config.api_base_url.trim_end_matches('/'),
                token
            ),
        })
    }

    /// Send a plain text message to `chat_id`
    pub async fn send_message(&self, chat_id: &str, text: &str) -> Result<()> {
        let payload = SendMessage { chat_id, text };
        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::notification(e.to_string()))?;

        let _: Message = read_result(response)
            .await
            .map_err(|e| Error::notification(e.to_string()))?;

        debug!(chat_id = %chat_id, "Telegram message sent");
        Ok(())
    }

    /// Long-poll for updates starting at `offset`
    pub async fn get_updates(&self, offset: Option<i64>, timeout: Duration) -> Result<Vec<Update>> {
        let mut query = vec![
            ("timeout", timeout.as_secs().to_string()),
            ("allowed_updates", r#"["message"]"#.to_string()),
        ];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }

        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&query)
            .timeout(timeout + POLL_GRACE)
            .send()
            .await?;

        read_result(response).await
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }
}

#[async_trait]
impl Notifier for TelegramClient {
    async fn send(&self, subscriber_id: &str, text: &str) -> Result<()> {
        self.send_message(subscriber_id, text).await
    }
}

async fn read_result<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body: ApiResponse<T> = response.json().await?;

    if !body.ok {
        return Err(Error::notification(format!(
            "Telegram returned {}: {}",
            status,
            body.description.unwrap_or_default()
        )));
    }

    body.result
        .ok_or_else(|| Error::notification("Telegram response has no result"))
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

/// An incoming update
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update identifier
    pub update_id: i64,
    /// New incoming message, if this update carries one
    pub message: Option<Message>,
}

/// A chat message
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    /// Chat the message belongs to
    pub chat: Chat,
    /// Message text, absent for media messages
    pub text: Option<String>,
}

/// A chat
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// Chat identifier
    pub id: i64,
}
