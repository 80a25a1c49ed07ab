//! Subscription data models

use serde::{Deserialize, Serialize};

/// Opaque subscriber identity (a chat id rendered as a string)
pub type SubscriberId = String;

/// One subscriber's monitoring intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    /// Alert fires when the reading is strictly below this value
    pub threshold: f64,

    /// Monitored account address, validated before it reaches the registry
    pub address: String,
}

impl Subscription {
    /// Create a subscription without validating its fields
    pub fn new(threshold: f64, address: impl Into<String>) -> Self {
        Self {
            threshold,
            address: address.into(),
        }
    }

    /// Whether the threshold is usable and the address is present
    pub fn is_valid(&self) -> bool {
        is_valid_threshold(self.threshold) && !self.address.trim().is_empty()
    }
}

/// Thresholds must be finite and strictly positive
pub fn is_valid_threshold(threshold: f64) -> bool {
    threshold.is_finite() && threshold > 0.0
}

/// Result of [`crate::monitor::SubscriptionRegistry::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// No subscription existed for the subscriber
    Created,
    /// An existing subscription was replaced
    Updated,
}

/// Result of [`crate::monitor::SubscriptionRegistry::remove`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The subscription was deleted
    Removed,
    /// There was nothing to delete
    Absent,
}
