//! Telegram long-poll loop

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::notify::{TelegramClient, Update};

use super::handler::CommandHandler;

/// Wait after a failed poll before trying again
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// Receives chat messages via `getUpdates` and hands them to the command handler
pub struct TelegramPoller {
    client: Arc<TelegramClient>,
    handler: Arc<CommandHandler>,
    poll_timeout: Duration,
}

impl TelegramPoller {
    /// Create a poller
    pub fn new(
        client: Arc<TelegramClient>,
        handler: Arc<CommandHandler>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            client,
            handler,
            poll_timeout,
        }
    }

    /// Poll until `cancel` fires; each message is handled on its own task
    pub async fn run(&self, cancel: CancellationToken) {
        info!("Polling Telegram for updates");
        let mut offset: Option<i64> = None;

        loop {
            let updates = tokio::select! {
                () = cancel.cancelled() => break,
                result = self.client.get_updates(offset, self.poll_timeout) => result,
            };

            match updates {
                Ok(updates) => {
                    if let Some(next) = next_offset(&updates) {
                        offset = Some(next);
                    }
                    for update in updates {
                        self.spawn_handler(update);
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to poll Telegram updates");
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(POLL_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Telegram poller stopped");
    }

    fn spawn_handler(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(text) = message.text else {
            debug!(update_id = update.update_id, "Ignoring non-text message");
            return;
        };

        let subscriber_id = message.chat.id.to_string();
        let handler = self.handler.clone();
        tokio::spawn(async move {
            handler.dispatch(&subscriber_id, &text).await;
        });
    }
}

/// Offset that acknowledges every update in `updates`
fn next_offset(updates: &[Update]) -> Option<i64> {
    updates.iter().map(|u| u.update_id + 1).max()
}
