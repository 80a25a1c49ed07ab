//! # hfwatch
//!
//! Aave health factor monitoring with Telegram alerts.
//!
//! Users register an address and a threshold through the bot; a background
//! scheduler periodically reads each address's health factor and alerts the
//! subscriber when it drops below their threshold.
//!
//! ## Architecture
//!
//! - **Monitor**: subscription registry, durable store, alert evaluator, scheduler
//! - **Source**: health factor readings from the Aave v3 Pool over JSON-RPC
//! - **Notify**: message delivery through the Telegram Bot API
//! - **Bot**: chat command parsing and handling
//!
//! ## Quick Start
//!
//! ```bash
//! export TELEGRAM_BOT_TOKEN=...
//! export ETHEREUM_NODE_URL=https://eth.llamarpc.com
//! hfwatch serve
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod bot;
pub mod config;
pub mod error;
pub mod models;
pub mod monitor;
pub mod notify;
pub mod source;

#[cfg(test)]
mod testing;

pub use crate::config::Config;
pub use crate::error::{Error, Result};

/// Re-exports for convenience
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::models::*;
    pub use crate::monitor::{AlertEvaluator, Scheduler, SubscriptionRegistry, SubscriptionStore};
    pub use crate::notify::Notifier;
    pub use crate::source::{AddressValidator, MetricSource};
}
