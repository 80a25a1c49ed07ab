//! Durable storage for subscription snapshots

use std::collections::{BTreeMap, HashMap};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{SubscriberId, Subscription};

/// Full subscriber → subscription mapping
pub type Snapshot = HashMap<SubscriberId, Subscription>;

/// Read/write surface over the durable subscription state
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Load the stored mapping.
    ///
    /// Missing, empty, unreadable or corrupt state yields an empty mapping.
    async fn load(&self) -> Snapshot;

    /// Replace the stored mapping with `snapshot`
    async fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Stores subscriptions as a JSON object in a single file.
///
/// Writes go to a sibling temporary file which is synced and then renamed
/// over the target, so readers only ever see a complete snapshot.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the state file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn write_atomically(&self, bytes: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let temp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        if let Err(e) = tokio::fs::rename(&temp_path, &self.path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e);
        }

        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for JsonFileStore {
    async fn load(&self) -> Snapshot {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No subscription file, starting empty");
                return Snapshot::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read subscription file, starting empty");
                return Snapshot::new();
            }
        };

        if content.trim().is_empty() {
            return Snapshot::new();
        }

        match serde_json::from_str::<Snapshot>(&content) {
            Ok(snapshot) => retain_valid(snapshot),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Subscription file is corrupt, starting empty");
                Snapshot::new()
            }
        }
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let ordered: BTreeMap<_, _> = snapshot.iter().collect();
        let bytes = serde_json::to_vec(&ordered)?;

        self.write_atomically(&bytes)
            .await
            .map_err(|e| Error::persistence(&self.path, e))?;

        debug!(path = %self.path.display(), count = snapshot.len(), "Saved subscriptions");
        Ok(())
    }
}

/// Keeps subscriptions in process memory; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Mutex<Snapshot>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `snapshot`
    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
        }
    }

    /// Copy of the last saved snapshot
    pub fn current(&self) -> Snapshot {
        self.snapshot.lock().clone()
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn load(&self) -> Snapshot {
        retain_valid(self.current())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        *self.snapshot.lock() = snapshot.clone();
        Ok(())
    }
}

fn retain_valid(mut snapshot: Snapshot) -> Snapshot {
    snapshot.retain(|subscriber, subscription| {
        let valid = subscription.is_valid();
        if !valid {
            warn!(
                subscriber = %subscriber,
                threshold = subscription.threshold,
                "Dropping invalid stored subscription"
            );
        }
        valid
    });
    snapshot
}
