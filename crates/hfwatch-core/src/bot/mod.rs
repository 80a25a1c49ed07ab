//! Telegram bot front end
//!
//! Turns chat messages into registry operations and replies.

mod commands;
mod handler;
mod poller;

pub use commands::Command;
pub use handler::{CommandHandler, Response};
pub use poller::TelegramPoller;
