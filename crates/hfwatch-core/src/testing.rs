//! Test doubles for the metric source and notifier

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::notify::Notifier;
use crate::source::MetricSource;

/// Source answering from a fixed address → value table
#[derive(Default)]
pub struct FakeSource {
    values: Mutex<HashMap<String, Option<f64>>>,
}

impl FakeSource {
    pub fn set(&self, address: &str, value: f64) {
        self.values.lock().insert(address.to_string(), Some(value));
    }

    pub fn fail(&self, address: &str) {
        self.values.lock().insert(address.to_string(), None);
    }
}

#[async_trait]
impl MetricSource for FakeSource {
    async fn health_factor(&self, address: &str) -> Result<f64> {
        match self.values.lock().get(address) {
            Some(Some(value)) => Ok(*value),
            Some(None) => Err(Error::source_unavailable("node unreachable")),
            None => Err(Error::source_unavailable(format!("unknown address {address}"))),
        }
    }
}

/// Notifier that records every message it is asked to send
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn fail_for(&self, subscriber_id: &str) {
        self.failing.lock().insert(subscriber_id.to_string());
    }

    /// Successfully delivered `(subscriber, text)` pairs
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().clone()
    }

    pub fn recipients(&self) -> Vec<String> {
        self.sent().into_iter().map(|(id, _)| id).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, subscriber_id: &str, text: &str) -> Result<()> {
        if self.failing.lock().contains(subscriber_id) {
            return Err(Error::notification("chat not found"));
        }
        self.sent
            .lock()
            .push((subscriber_id.to_string(), text.to_string()));
        Ok(())
    }
}
