//! InMemoryCheckpointBackend - checkpoint records in a map.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{CheckpointKey, CheckpointRecord, CreateOutcome, StoreError};
use crate::ports::CheckpointBackend;

#[derive(Debug, Default)]
pub struct InMemoryCheckpointBackend {
    records: Mutex<HashMap<CheckpointKey, CheckpointRecord>>,
}

impl InMemoryCheckpointBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl CheckpointBackend for InMemoryCheckpointBackend {
    async fn get(&self, key: &CheckpointKey) -> Result<Option<CheckpointRecord>, StoreError> {
        Ok(self.records.lock().await.get(key).cloned())
    }

    async fn put(&self, key: &CheckpointKey, record: CheckpointRecord) -> Result<(), StoreError> {
        self.records.lock().await.insert(key.clone(), record);
        Ok(())
    }

    async fn create_if_absent(
        &self,
        key: &CheckpointKey,
        record: CheckpointRecord,
    ) -> Result<CreateOutcome, StoreError> {
        let mut records = self.records.lock().await;
        if records.contains_key(key) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        records.insert(key.clone(), record);
        Ok(CreateOutcome::Created)
    }
}
