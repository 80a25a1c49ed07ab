//! Message delivery to subscribers

mod telegram;

pub use telegram::{Chat, Message, TelegramClient, Update};

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;

/// Delivers a text message to one subscriber
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send `text` to `subscriber_id`
    async fn send(&self, subscriber_id: &str, text: &str) -> Result<()>;
}

/// Writes messages to the log instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, subscriber_id: &str, text: &str) -> Result<()> {
        info!(subscriber = %subscriber_id, text = %text, "Notification (dry run)");
        Ok(())
    }
}
