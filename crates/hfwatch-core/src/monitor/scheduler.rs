//! Periodic sweep over all subscriptions

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::models::{AlertDecision, MetricReading, SubscriberId, Subscription};
use crate::notify::Notifier;
use crate::source::MetricSource;

use super::evaluator::AlertEvaluator;
use super::registry::SubscriptionRegistry;

/// Shortest interval between sweeps
const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Scheduler timing configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between sweeps
    pub sweep_interval: Duration,
    /// Time before the first sweep
    pub initial_delay: Duration,
    /// Subscribers evaluated concurrently within one sweep
    pub concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&MonitorConfig::default())
    }
}

impl From<&MonitorConfig> for SchedulerConfig {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            sweep_interval: config.sweep_interval(),
            initial_delay: config.initial_delay(),
            concurrency: config.sweep_concurrency,
        }
    }
}

impl SchedulerConfig {
    /// Clamp values that would stall or panic the scheduler
    fn normalized(mut self) -> Self {
        if self.concurrency == 0 {
            warn!("Sweep concurrency of 0 raised to 1");
            self.concurrency = 1;
        }
        if self.sweep_interval < MIN_SWEEP_INTERVAL {
            warn!(
                interval_ms = u64::try_from(self.sweep_interval.as_millis()).unwrap_or(u64::MAX),
                "Sweep interval raised to the 1s minimum"
            );
            self.sweep_interval = MIN_SWEEP_INTERVAL;
        }
        self
    }
}

/// What the scheduler is doing right now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// Waiting for the next tick
    Idle,
    /// Evaluating subscriptions
    Sweeping,
}

/// Result of evaluating one subscriber
#[derive(Debug, Clone, Serialize)]
pub struct SubscriberOutcome {
    /// Evaluated subscriber
    pub subscriber_id: SubscriberId,
    /// Reading obtained from the source
    pub reading: MetricReading,
    /// Evaluator decision
    pub decision: AlertDecision,
    /// Whether a message was delivered; `None` when nothing was sent
    pub delivered: Option<bool>,
}

/// Summary of one sweep
#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    /// When the sweep began
    pub started_at: DateTime<Utc>,
    /// When the sweep ended
    pub finished_at: DateTime<Utc>,
    /// Per-subscriber results, in completion order
    pub outcomes: Vec<SubscriberOutcome>,
}

impl SweepReport {
    /// Number of subscribers evaluated
    pub fn evaluated(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of messages delivered
    pub fn alerts_sent(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.delivered == Some(true))
            .count()
    }

    /// Number of messages that could not be delivered
    pub fn delivery_failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.delivered == Some(false))
            .count()
    }

    /// Number of subscribers whose reading was unavailable
    pub fn unavailable(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.decision == AlertDecision::SourceUnavailable)
            .count()
    }

    /// Outcome for `subscriber_id`, if it was part of the sweep
    pub fn outcome(&self, subscriber_id: &str) -> Option<&SubscriberOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.subscriber_id == subscriber_id)
    }
}

/// Runs sweeps on a fixed interval.
///
/// A sweep works on a snapshot of the registry taken when it starts and
/// never mutates the registry. Source and notifier failures are contained
/// to the subscriber they happened for.
pub struct Scheduler {
    config: SchedulerConfig,
    registry: Arc<SubscriptionRegistry>,
    source: Arc<dyn MetricSource>,
    notifier: Arc<dyn Notifier>,
    evaluator: AlertEvaluator,
    state: RwLock<SchedulerState>,
}

impl Scheduler {
    /// Create a scheduler over `registry`
    pub fn new(
        config: SchedulerConfig,
        registry: Arc<SubscriptionRegistry>,
        source: Arc<dyn MetricSource>,
        notifier: Arc<dyn Notifier>,
        evaluator: AlertEvaluator,
    ) -> Self {
        Self {
            config: config.normalized(),
            registry,
            source,
            notifier,
            evaluator,
            state: RwLock::new(SchedulerState::Idle),
        }
    }

    /// Current state
    pub fn state(&self) -> SchedulerState {
        *self.state.read()
    }

    /// Sweep on the configured schedule until `cancel` fires
    pub async fn run(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.config.sweep_interval.as_secs(),
            initial_delay_secs = self.config.initial_delay.as_secs(),
            "Starting scheduler"
        );

        let first = Instant::now() + self.config.initial_delay;
        let mut ticker = interval_at(first, self.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    warn!("Sweep abandoned on shutdown");
                    break;
                }
                report = self.sweep() => {
                    info!(
                        evaluated = report.evaluated(),
                        alerts_sent = report.alerts_sent(),
                        unavailable = report.unavailable(),
                        delivery_failures = report.delivery_failures(),
                        "Sweep finished"
                    );
                }
            }
        }

        *self.state.write() = SchedulerState::Idle;
        info!("Scheduler stopped");
    }

    /// Evaluate every subscription once
    pub async fn sweep(&self) -> SweepReport {
        *self.state.write() = SchedulerState::Sweeping;
        let started_at = Utc::now();

        let subscriptions = self.registry.list_all().await;
        debug!(count = subscriptions.len(), "Sweeping subscriptions");

        let outcomes = stream::iter(subscriptions)
            .map(|(subscriber_id, subscription)| async move {
                self.evaluate_subscription(subscriber_id, &subscription).await
            })
            .buffer_unordered(self.config.concurrency)
            .collect::<Vec<_>>()
            .await;

        *self.state.write() = SchedulerState::Idle;

        SweepReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
        }
    }

    /// Evaluate one subscriber immediately; `None` if it has no subscription
    pub async fn check_and_notify(&self, subscriber_id: &str) -> Option<SubscriberOutcome> {
        let subscription = self.registry.get(subscriber_id).await?;
        Some(
            self.evaluate_subscription(subscriber_id.to_string(), &subscription)
                .await,
        )
    }

    async fn evaluate_subscription(
        &self,
        subscriber_id: SubscriberId,
        subscription: &Subscription,
    ) -> SubscriberOutcome {
        let reading = match self.source.health_factor(&subscription.address).await {
            Ok(value) => MetricReading::from_value(value),
            Err(e) => {
                warn!(
                    subscriber = %subscriber_id,
                    address = %subscription.address,
                    error = %e,
                    "Failed to fetch health factor"
                );
                MetricReading::Unavailable
            }
        };

        let decision = self.evaluator.evaluate(subscription, reading);

        debug!(
            subscriber = %subscriber_id,
            address = %subscription.address,
            reading = ?reading,
            threshold = subscription.threshold,
            decision = ?decision,
            "Evaluated subscription"
        );

        let delivered = match self.evaluator.format_alert_message(subscription, &decision) {
            Some(text) => match self.notifier.send(&subscriber_id, &text).await {
                Ok(()) => {
                    info!(subscriber = %subscriber_id, decision = ?decision, "Alert sent");
                    Some(true)
                }
                Err(e) => {
                    warn!(subscriber = %subscriber_id, error = %e, "Failed to deliver alert");
                    Some(false)
                }
            },
            None => None,
        };

        SubscriberOutcome {
            subscriber_id,
            reading,
            decision,
            delivered,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::store::MemoryStore;
    use crate::error::Result;
    use crate::testing::{FakeSource, RecordingNotifier};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    /// Source whose lookups never complete
    struct HangingSource;

    #[async_trait]
    impl MetricSource for HangingSource {
        async fn health_factor(&self, _address: &str) -> Result<f64> {
            futures::future::pending().await
        }
    }

    struct Fixture {
        registry: Arc<SubscriptionRegistry>,
        source: Arc<FakeSource>,
        notifier: Arc<RecordingNotifier>,
    }

    impl Fixture {
        async fn new() -> Self {
            Self {
                registry: Arc::new(SubscriptionRegistry::open(Arc::new(MemoryStore::new())).await),
                source: Arc::new(FakeSource::default()),
                notifier: Arc::new(RecordingNotifier::default()),
            }
        }

        fn scheduler(&self, config: SchedulerConfig) -> Scheduler {
            Scheduler::new(
                config,
                self.registry.clone(),
                self.source.clone(),
                self.notifier.clone(),
                AlertEvaluator::default(),
            )
        }
    }

    #[tokio::test]
    async fn test_sweep_alerts_single_subscriber_below_threshold() {
        let fx = Fixture::new().await;
        fx.registry.upsert("A", 1.5, "0xabc").await.unwrap();
        fx.source.set("0xabc", 1.2);

        let report = fx.scheduler(SchedulerConfig::default()).sweep().await;

        assert_eq!(report.evaluated(), 1);
        assert_eq!(
            report.outcome("A").unwrap().decision,
            AlertDecision::BelowThreshold { value: 1.2 }
        );
        let sent = fx.notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "A");
        assert!(sent[0].1.starts_with("Alert: Health factor for 0xabc is 1.2"));
    }

    #[tokio::test]
    async fn test_sweep_evaluates_subscribers_independently() {
        let fx = Fixture::new().await;
        fx.registry.upsert("A", 1.5, "0xaaa").await.unwrap();
        fx.registry.upsert("B", 2.0, "0xbbb").await.unwrap();
        fx.source.set("0xaaa", 1.8);
        fx.source.set("0xbbb", 1.9);

        let report = fx.scheduler(SchedulerConfig::default()).sweep().await;

        assert_eq!(report.outcome("A").unwrap().decision, AlertDecision::NoAlert);
        assert_eq!(report.outcome("A").unwrap().delivered, None);
        assert_eq!(
            report.outcome("B").unwrap().decision,
            AlertDecision::BelowThreshold { value: 1.9 }
        );
        assert_eq!(fx.notifier.recipients(), vec!["B".to_string()]);
    }

    #[tokio::test]
    async fn test_source_failure_does_not_block_other_subscribers() {
        let fx = Fixture::new().await;
        fx.registry.upsert("A", 1.5, "0xaaa").await.unwrap();
        fx.registry.upsert("B", 2.0, "0xbbb").await.unwrap();
        fx.source.fail("0xaaa");
        fx.source.set("0xbbb", 1.9);

        let report = fx.scheduler(SchedulerConfig::default()).sweep().await;

        assert_eq!(
            report.outcome("A").unwrap().decision,
            AlertDecision::SourceUnavailable
        );
        assert_eq!(
            report.outcome("B").unwrap().decision,
            AlertDecision::BelowThreshold { value: 1.9 }
        );
        assert_eq!(report.unavailable(), 1);

        let mut recipients = fx.notifier.recipients();
        recipients.sort();
        assert_eq!(recipients, vec!["A".to_string(), "B".to_string()]);
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_block_other_subscribers() {
        let fx = Fixture::new().await;
        fx.registry.upsert("A", 1.5, "0xaaa").await.unwrap();
        fx.registry.upsert("B", 2.0, "0xbbb").await.unwrap();
        fx.source.set("0xaaa", 1.0);
        fx.source.set("0xbbb", 1.0);
        fx.notifier.fail_for("A");

        let report = fx
            .scheduler(SchedulerConfig {
                concurrency: 4,
                ..SchedulerConfig::default()
            })
            .sweep()
            .await;

        assert_eq!(report.outcome("A").unwrap().delivered, Some(false));
        assert_eq!(report.outcome("B").unwrap().delivered, Some(true));
        assert_eq!(report.alerts_sent(), 1);
        assert_eq!(report.delivery_failures(), 1);
    }

    #[tokio::test]
    async fn test_non_finite_reading_is_unavailable() {
        let fx = Fixture::new().await;
        fx.registry.upsert("A", 1.5, "0xabc").await.unwrap();
        fx.source.set("0xabc", f64::NAN);

        let report = fx.scheduler(SchedulerConfig::default()).sweep().await;

        assert_eq!(report.outcome("A").unwrap().reading, MetricReading::Unavailable);
    }

    #[tokio::test]
    async fn test_repeated_sweeps_resend_alerts() {
        let fx = Fixture::new().await;
        fx.registry.upsert("A", 1.5, "0xabc").await.unwrap();
        fx.source.fail("0xabc");
        let scheduler = fx.scheduler(SchedulerConfig::default());

        scheduler.sweep().await;
        scheduler.sweep().await;

        assert_eq!(fx.notifier.sent().len(), 2);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test]
    async fn test_check_and_notify_unknown_subscriber() {
        let fx = Fixture::new().await;

        let outcome = fx
            .scheduler(SchedulerConfig::default())
            .check_and_notify("nobody")
            .await;

        assert!(outcome.is_none());
        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_sweeps_after_initial_delay_then_every_interval() {
        let fx = Fixture::new().await;
        fx.registry.upsert("A", 1.5, "0xabc").await.unwrap();
        fx.source.set("0xabc", 1.0);
        let scheduler = Arc::new(fx.scheduler(SchedulerConfig {
            sweep_interval: Duration::from_secs(60),
            initial_delay: Duration::from_secs(5),
            concurrency: 1,
        }));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            let cancel = cancel.clone();
            async move { scheduler.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(fx.notifier.sent().len(), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fx.notifier.sent().len(), 1);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fx.notifier.sent().len(), 2);

        cancel.cancel();
        handle.await.unwrap();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_tick_sends_nothing() {
        let fx = Fixture::new().await;
        fx.registry.upsert("A", 1.5, "0xabc").await.unwrap();
        fx.source.set("0xabc", 1.0);
        let scheduler = fx.scheduler(SchedulerConfig::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        scheduler.run(cancel).await;

        assert!(fx.notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_zero_concurrency_sweep_still_completes() {
        let fx = Fixture::new().await;
        fx.registry.upsert("A", 1.5, "0xabc").await.unwrap();
        fx.source.set("0xabc", 1.0);
        let scheduler = fx.scheduler(SchedulerConfig {
            concurrency: 0,
            ..SchedulerConfig::default()
        });

        let report = tokio::time::timeout(Duration::from_secs(2), scheduler.sweep())
            .await
            .expect("sweep did not complete");

        assert_eq!(report.evaluated(), 1);
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let fx = Fixture::new().await;
        fx.registry.upsert("A", 1.5, "0xabc").await.unwrap();
        fx.source.set("0xabc", 1.0);
        let scheduler = Arc::new(fx.scheduler(SchedulerConfig {
            sweep_interval: Duration::ZERO,
            initial_delay: Duration::ZERO,
            concurrency: 1,
        }));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            let cancel = cancel.clone();
            async move { scheduler.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_millis(1500)).await;
        cancel.cancel();
        handle.await.unwrap();

        assert_eq!(fx.notifier.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_abandons_in_flight_sweep() {
        let fx = Fixture::new().await;
        fx.registry.upsert("A", 1.5, "0xabc").await.unwrap();
        let scheduler = Arc::new(Scheduler::new(
            SchedulerConfig {
                sweep_interval: Duration::from_secs(60),
                initial_delay: Duration::from_secs(5),
                concurrency: 1,
            },
            fx.registry.clone(),
            Arc::new(HangingSource),
            fx.notifier.clone(),
            AlertEvaluator::default(),
        ));
        let cancel = CancellationToken::new();

        let handle = tokio::spawn({
            let scheduler = scheduler.clone();
            let cancel = cancel.clone();
            async move { scheduler.run(cancel).await }
        });

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(scheduler.state(), SchedulerState::Sweeping);

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("scheduler did not stop")
            .unwrap();

        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert!(fx.notifier.sent().is_empty());
    }
}
