//! Command execution against the registry and metric source

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::models::{is_valid_threshold, RemoveOutcome, UpsertOutcome};
use crate::monitor::{format_health_factor, Scheduler, SubscriptionRegistry};
use crate::notify::Notifier;
use crate::source::{AddressValidator, MetricSource};

use super::commands::Command;

const HELP_TEXT: &str = "Welcome to the AAVE Health Factor Monitor Bot!\n\n\
Here are the available commands:\n\
/start - Show this help message\n\
/monitor <threshold> <address> - Start monitoring an address\n\
/check - Check your current monitoring settings\n\
/stop - Stop monitoring\n\n\
You can also simply paste an Ethereum address to check its current health factor.\n\n\
DISCLAIMER: This bot is not officially affiliated with or endorsed by AAVE. \
It is an independent tool created for informational purposes only. \
The bot is not guaranteed to be always accurate or available. \
Users should not rely solely on this bot for making financial decisions.";

const INVALID_ADDRESS: &str = "Invalid Ethereum address. Please try again.";

/// What to do after handling a command
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Response {
    /// Reply to send back to the chat
    pub reply: Option<String>,
    /// Evaluate the subscriber right away
    pub check_now: bool,
}

impl Response {
    fn reply(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            check_now: false,
        }
    }
}

/// Executes chat commands for one subscriber at a time
pub struct CommandHandler {
    registry: Arc<SubscriptionRegistry>,
    source: Arc<dyn MetricSource>,
    validator: Arc<dyn AddressValidator>,
    notifier: Arc<dyn Notifier>,
    scheduler: Arc<Scheduler>,
}

impl CommandHandler {
    /// Create a handler
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        source: Arc<dyn MetricSource>,
        validator: Arc<dyn AddressValidator>,
        notifier: Arc<dyn Notifier>,
        scheduler: Arc<Scheduler>,
    ) -> Self {
        Self {
            registry,
            source,
            validator,
            notifier,
            scheduler,
        }
    }

    /// Handle `text`, send the reply, and run any follow-up check
    pub async fn dispatch(&self, subscriber_id: &str, text: &str) {
        let response = self.handle(subscriber_id, text).await;

        if let Some(reply) = &response.reply {
            if let Err(e) = self.notifier.send(subscriber_id, reply).await {
                warn!(subscriber = %subscriber_id, error = %e, "Failed to send reply");
            }
        }

        if response.check_now {
            self.scheduler.check_and_notify(subscriber_id).await;
        }
    }

    /// Compute the response to `text` without sending anything
    pub async fn handle(&self, subscriber_id: &str, text: &str) -> Response {
        match Command::parse(text) {
            Command::Start => Response::reply(HELP_TEXT),
            Command::Monitor(args) => self.monitor(subscriber_id, &args).await,
            Command::Check => self.check(subscriber_id).await,
            Command::Stop => self.stop(subscriber_id).await,
            Command::Lookup(address) => self.lookup(&address).await,
            Command::Unknown(name) => {
                debug!(subscriber = %subscriber_id, command = %name, "Ignoring unknown command");
                Response::default()
            }
        }
    }

    async fn monitor(&self, subscriber_id: &str, args: &[String]) -> Response {
        let [threshold, address] = args else {
            return Response::reply("Usage: /monitor <threshold> <address>");
        };

        let threshold = match threshold.parse::<f64>() {
            Ok(t) if is_valid_threshold(t) => t,
            _ => return Response::reply("Invalid threshold. Please enter a number (e.g., 1.5)."),
        };

        if !self.validator.is_valid(address) {
            return Response::reply(INVALID_ADDRESS);
        }

        match self.registry.upsert(subscriber_id, threshold, address).await {
            Ok(outcome) => {
                let text = match outcome {
                    UpsertOutcome::Created => format!(
                        "Started monitoring address {address} with threshold {threshold}"
                    ),
                    UpsertOutcome::Updated => format!(
                        "Updated monitoring for address {address} with new threshold {threshold}"
                    ),
                };
                Response {
                    reply: Some(text),
                    check_now: true,
                }
            }
            Err(e) if e.is_persistence() => Response {
                reply: Some(format!(
                    "Monitoring address {address} with threshold {threshold}, \
                     but the setting could not be saved and may be lost on restart."
                )),
                check_now: true,
            },
            Err(e) => Response::reply(format!("Could not start monitoring: {e}")),
        }
    }

    async fn check(&self, subscriber_id: &str) -> Response {
        let Some(subscription) = self.registry.get(subscriber_id).await else {
            return Response::reply("You are not currently monitoring any address.");
        };

        let current = match self.source.health_factor(&subscription.address).await {
            Ok(hf) if hf.is_finite() => {
                format!("Current health factor: {}", format_health_factor(hf))
            }
            Ok(_) | Err(_) => {
                "Unable to fetch current health factor. Please try again later.".to_string()
            }
        };

        Response::reply(format!(
            "Currently monitoring address {}\nThreshold: {}\n{}",
            subscription.address, subscription.threshold, current
        ))
    }

    async fn stop(&self, subscriber_id: &str) -> Response {
        match self.registry.remove(subscriber_id).await {
            Ok(RemoveOutcome::Removed) => Response::reply("Monitoring stopped."),
            Ok(RemoveOutcome::Absent) => Response::reply("You were not monitoring any address."),
            Err(_) => Response::reply(
                "Monitoring stopped, but the change could not be saved and may be undone on restart.",
            ),
        }
    }

    async fn lookup(&self, address: &str) -> Response {
        if !self.validator.is_valid(address) {
            return Response::reply(INVALID_ADDRESS);
        }

        info!(address = %address, "Health factor check requested");

        match self.source.health_factor(address).await {
            Ok(hf) if hf.is_finite() => {
                Response::reply(format!(
                "Current health factor for {address}: {}",
                format_health_factor(hf)
            ))
            }
            Ok(_) | Err(_) => {
                Response::reply("Unable to fetch health factor. Please try again later.")
            }
        }
    }
}
