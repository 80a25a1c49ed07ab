//! In-memory subscription registry backed by a durable store

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{is_valid_threshold, RemoveOutcome, SubscriberId, Subscription, UpsertOutcome};

use super::store::{Snapshot, SubscriptionStore};

/// Authoritative view of all subscriptions.
///
/// Mutations hold the write lock across the store write, so saves never
/// interleave and readers never observe a half-applied change. When a save
/// fails the in-memory change is kept and the error is returned; the next
/// successful mutation writes the full snapshot again.
pub struct SubscriptionRegistry {
    store: Arc<dyn SubscriptionStore>,
    subscriptions: RwLock<Snapshot>,
}

impl SubscriptionRegistry {
    /// Load the registry from `store`
    pub async fn open(store: Arc<dyn SubscriptionStore>) -> Self {
        let subscriptions = store.load().await;
        info!(count = subscriptions.len(), "Loaded subscriptions");

        Self {
            store,
            subscriptions: RwLock::new(subscriptions),
        }
    }

    /// Create or replace the subscription for `subscriber_id`
    pub async fn upsert(
        &self,
        subscriber_id: &str,
        threshold: f64,
        address: &str,
    ) -> Result<UpsertOutcome> {
        if !is_valid_threshold(threshold) {
            return Err(Error::validation(format!(
                "threshold must be a positive number, got {threshold}"
            )));
        }
        if address.trim().is_empty() {
            return Err(Error::validation("address must not be empty"));
        }

        let mut subscriptions = self.subscriptions.write().await;
        let previous = subscriptions.insert(
            subscriber_id.to_string(),
            Subscription::new(threshold, address),
        );
        let outcome = if previous.is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        };

        info!(
            subscriber = %subscriber_id,
            address = %address,
            threshold,
            outcome = ?outcome,
            "Subscription saved"
        );

        self.persist(&subscriptions).await?;
        Ok(outcome)
    }

    /// Current subscription for `subscriber_id`
    pub async fn get(&self, subscriber_id: &str) -> Option<Subscription> {
        self.subscriptions.read().await.get(subscriber_id).cloned()
    }

    /// Delete the subscription for `subscriber_id`
    pub async fn remove(&self, subscriber_id: &str) -> Result<RemoveOutcome> {
        let mut subscriptions = self.subscriptions.write().await;
        if subscriptions.remove(subscriber_id).is_none() {
            return Ok(RemoveOutcome::Absent);
        }

        info!(subscriber = %subscriber_id, "Subscription removed");

        self.persist(&subscriptions).await?;
        Ok(RemoveOutcome::Removed)
    }

    /// Snapshot of every subscription, in no particular order
    pub async fn list_all(&self) -> Vec<(SubscriberId, Subscription)> {
        self.subscriptions
            .read()
            .await
            .iter()
            .map(|(id, sub)| (id.clone(), sub.clone()))
            .collect()
    }

    /// Number of subscriptions
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Whether there are no subscriptions
    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }

    async fn persist(&self, subscriptions: &Snapshot) -> Result<()> {
        self.store.save(subscriptions).await.map_err(|e| {
            warn!(error = %e, "Subscription change kept in memory but not persisted");
            e
        })
    }
}
