//! Checkpoint keys and records.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite key of a checkpoint: the logical task plus a partition
/// (profile / tenant) it runs for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CheckpointKey {
    task_name: String,
    partition_key: String,
}

impl CheckpointKey {
    pub fn new(task_name: impl Into<String>, partition_key: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            partition_key: partition_key.into(),
        }
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }
}

impl fmt::Display for CheckpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.task_name, self.partition_key)
    }
}

/// Stored progress marker. Last write wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub last_timestamp: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CheckpointRecord {
    pub fn new(last_timestamp: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self {
            last_timestamp,
            updated_at,
        }
    }
}
