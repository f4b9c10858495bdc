//! Coordinated task descriptors.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::checkpoint::CheckpointKey;
use super::ids::CorrelationId;
use super::lock::LockName;

/// Everything the coordinator needs to run one recurring task safely:
/// which lock guards it, how long a lease lasts, where its progress lives,
/// and how far back a first run reaches.
#[derive(Debug, Clone)]
pub struct CoordinatedTask {
    pub lock_name: LockName,
    pub lease_duration: Duration,
    pub checkpoint: CheckpointKey,
    pub backfill: chrono::Duration,
}

impl CoordinatedTask {
    pub fn new(lock_name: LockName, lease_duration: Duration, checkpoint: CheckpointKey) -> Self {
        Self {
            lock_name,
            lease_duration,
            checkpoint,
            backfill: chrono::Duration::days(1),
        }
    }

    pub fn with_backfill(mut self, backfill: chrono::Duration) -> Self {
        self.backfill = backfill;
        self
    }
}

/// The slice of the feed one run is responsible for.
///
/// `since` is the stored checkpoint; `until` is captured before the body
/// starts and becomes the next checkpoint if the run succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskWindow {
    pub since: DateTime<Utc>,
    pub until: DateTime<Utc>,
    pub correlation_id: CorrelationId,
}
