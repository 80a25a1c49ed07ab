//! Metric readings and alert decisions

use serde::{Deserialize, Serialize};

/// A fresh health factor reading for one address
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MetricReading {
    /// The source returned a number
    Value(f64),
    /// The source failed or returned something unusable
    Unavailable,
}

impl MetricReading {
    /// Build a reading from a raw source value, treating non-finite numbers as unavailable
    pub fn from_value(value: f64) -> Self {
        if value.is_finite() {
            Self::Value(value)
        } else {
            Self::Unavailable
        }
    }

    /// The numeric value, if any
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Unavailable => None,
        }
    }
}

/// Outcome of evaluating one subscription against one reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum AlertDecision {
    /// Reading is at or above the threshold
    NoAlert,
    /// Reading is strictly below the threshold
    BelowThreshold {
        /// The reading that triggered the alert
        value: f64,
    },
    /// The source could not produce a reading
    SourceUnavailable,
}

impl AlertDecision {
    /// Whether this decision results in a message to the subscriber
    pub fn is_alert(&self) -> bool {
        !matches!(self, Self::NoAlert)
    }
}
