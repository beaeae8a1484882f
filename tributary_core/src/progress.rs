//! Per-job sync progress counters and their publication.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::Result;

pub const DEFAULT_PUBLISH_THRESHOLD: u64 = 10;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressKind {
    Inserted,
    Updated,
    Deleted,
    Kept,
    Skipped,
}

/// Snapshot of a job's counters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncProgressUpdate {
    pub sync_job_id: Uuid,
    pub inserted: u64,
    pub updated: u64,
    pub deleted: u64,
    pub kept: u64,
    pub skipped: u64,
    #[serde(default)]
    pub is_complete: bool,
}

impl SyncProgressUpdate {
    pub fn total(&self) -> u64 {
        self.inserted + self.updated + self.deleted + self.kept + self.skipped
    }
}

#[async_trait]
pub trait ProgressPublisher: Send + Sync {
    async fn publish(&self, update: SyncProgressUpdate) -> Result<()>;
}

/// Fan-out publisher over `tokio::sync::broadcast`. Updates sent while nobody
/// is subscribed are dropped.
#[derive(Clone)]
pub struct BroadcastProgressPublisher {
    tx: broadcast::Sender<SyncProgressUpdate>,
}

impl BroadcastProgressPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncProgressUpdate> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastProgressPublisher {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl ProgressPublisher for BroadcastProgressPublisher {
    async fn publish(&self, update: SyncProgressUpdate) -> Result<()> {
        if self.tx.send(update).is_err() {
            tracing::debug!(sync_job_id = %update.sync_job_id, "no progress subscribers");
        }
        Ok(())
    }
}

#[derive(Default)]
struct Counters {
    inserted: AtomicU64,
    updated: AtomicU64,
    deleted: AtomicU64,
    kept: AtomicU64,
    skipped: AtomicU64,
}

impl Counters {
    fn get(&self, kind: ProgressKind) -> &AtomicU64 {
        match kind {
            ProgressKind::Inserted => &self.inserted,
            ProgressKind::Updated => &self.updated,
            ProgressKind::Deleted => &self.deleted,
            ProgressKind::Kept => &self.kept,
            ProgressKind::Skipped => &self.skipped,
        }
    }
}

/// Progress sink bound to one sync job.
///
/// Counters are the only mutable state a `SyncContext` exposes. A snapshot is
/// published every `publish_threshold` increments and once more on `finalize`.
pub struct SyncProgress {
    sync_job_id: Uuid,
    counters: Counters,
    since_publish: AtomicU64,
    publish_threshold: u64,
    publisher: Arc<dyn ProgressPublisher>,
}

impl SyncProgress {
    pub fn new(sync_job_id: Uuid, publisher: Arc<dyn ProgressPublisher>) -> Self {
        Self {
            sync_job_id,
            counters: Counters::default(),
            since_publish: AtomicU64::new(0),
            publish_threshold: DEFAULT_PUBLISH_THRESHOLD,
            publisher,
        }
    }

    pub fn with_publish_threshold(mut self, threshold: u64) -> Self {
        self.publish_threshold = threshold.max(1);
        self
    }

    pub fn sync_job_id(&self) -> Uuid {
        self.sync_job_id
    }

    pub async fn increment(&self, kind: ProgressKind, amount: u64) -> Result<()> {
        self.counters.get(kind).fetch_add(amount, Ordering::Relaxed);
        let pending = self.since_publish.fetch_add(amount, Ordering::AcqRel) + amount;
        if pending >= self.publish_threshold {
            self.since_publish.store(0, Ordering::Release);
            self.publisher.publish(self.snapshot(false)).await?;
        }
        Ok(())
    }

    pub fn snapshot(&self, is_complete: bool) -> SyncProgressUpdate {
        let load = |kind| self.counters.get(kind).load(Ordering::Relaxed);
        SyncProgressUpdate {
            sync_job_id: self.sync_job_id,
            inserted: load(ProgressKind::Inserted),
            updated: load(ProgressKind::Updated),
            deleted: load(ProgressKind::Deleted),
            kept: load(ProgressKind::Kept),
            skipped: load(ProgressKind::Skipped),
            is_complete,
        }
    }

    pub async fn finalize(&self) -> Result<SyncProgressUpdate> {
        let update = self.snapshot(true);
        self.publisher.publish(update).await?;
        tracing::info!(
            sync_job_id = %self.sync_job_id,
            total = update.total(),
            "sync progress finalized"
        );
        Ok(update)
    }
}

impl std::fmt::Debug for SyncProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncProgress")
            .field("sync_job_id", &self.sync_job_id)
            .field("counters", &self.snapshot(false))
            .finish()
    }
}
