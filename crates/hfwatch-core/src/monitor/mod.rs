//! Monitoring engine for hfwatch
//!
//! Holds subscriptions, persists them, and periodically checks each
//! subscribed address against its threshold.

mod evaluator;
mod registry;
mod scheduler;
mod store;

pub use evaluator::{format_health_factor, AlertEvaluator, DEFAULT_DASHBOARD_URL};
pub use registry::SubscriptionRegistry;
pub use scheduler::{Scheduler, SchedulerConfig, SchedulerState, SubscriberOutcome, SweepReport};
pub use store::{JsonFileStore, MemoryStore, Snapshot, SubscriptionStore};
