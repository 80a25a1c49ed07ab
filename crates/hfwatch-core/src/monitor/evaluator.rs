//! Alert decision logic

use crate::models::{AlertDecision, MetricReading, Subscription};

/// Link appended to threshold alerts unless configured otherwise
pub const DEFAULT_DASHBOARD_URL: &str = "https://app.aave.com/";

/// Magnitude from which health factors are shown in exponent form
const EXPONENT_CUTOFF: f64 = 1e16;

/// Render a health factor for chat messages.
///
/// Positions without debt report the maximum uint256, which would otherwise
/// print as a sixty-digit integer.
pub fn format_health_factor(value: f64) -> String {
    if value.is_finite() && value.abs() >= EXPONENT_CUTOFF {
        let rendered = format!("{value:e}");
        match rendered.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => {
                format!("{mantissa}e+{exponent}")
            }
            _ => rendered,
        }
    } else {
        value.to_string()
    }
}

/// Decides whether a reading warrants an alert and renders its text.
///
/// Stateless: every call where the condition holds produces an alert, there
/// is no memory of what was sent before.
#[derive(Debug, Clone)]
pub struct AlertEvaluator {
    dashboard_url: String,
}

impl AlertEvaluator {
    /// Create an evaluator whose alerts link to `dashboard_url`
    pub fn new(dashboard_url: impl Into<String>) -> Self {
        Self {
            dashboard_url: dashboard_url.into(),
        }
    }

    /// Compare `reading` against the subscription threshold
    pub fn evaluate(&self, subscription: &Subscription, reading: MetricReading) -> AlertDecision {
        match reading {
            MetricReading::Value(value) if value < subscription.threshold => {
                AlertDecision::BelowThreshold { value }
            }
            MetricReading::Value(_) => AlertDecision::NoAlert,
            MetricReading::Unavailable => AlertDecision::SourceUnavailable,
        }
    }

    /// Text sent to the subscriber for `decision`, if any
    pub fn format_alert_message(
        &self,
        subscription: &Subscription,
        decision: &AlertDecision,
    ) -> Option<String> {
        match decision {
            AlertDecision::NoAlert => None,
            AlertDecision::BelowThreshold { value } => Some(format!(
                "Alert: Health factor for {} is {}, which is below your threshold of {}!\n\
                 Check your position on AAVE: {}",
                subscription.address,
                format_health_factor(*value),
                subscription.threshold,
                self.dashboard_url
            )),
            AlertDecision::SourceUnavailable => Some(format!(
                "Unable to fetch health factor for {}. Will try again in the next check.",
                subscription.address
            )),
        }
    }
}

impl Default for AlertEvaluator {
    fn default() -> Self {
        Self::new(DEFAULT_DASHBOARD_URL)
    }
}
