//! CheckpointBackend port - durable task progress markers.

use async_trait::async_trait;

use crate::domain::{CheckpointKey, CheckpointRecord, CreateOutcome, StoreError};

/// Key-value contract for checkpoint records.
///
/// # Design
/// - `put` is last-write-wins; no ordering check against the stored value
/// - `create_if_absent` never overwrites
#[async_trait]
pub trait CheckpointBackend: Send + Sync {
    async fn get(&self, key: &CheckpointKey) -> Result<Option<CheckpointRecord>, StoreError>;

    async fn put(&self, key: &CheckpointKey, record: CheckpointRecord) -> Result<(), StoreError>;

    async fn create_if_absent(
        &self,
        key: &CheckpointKey,
        record: CheckpointRecord,
    ) -> Result<CreateOutcome, StoreError>;
}
