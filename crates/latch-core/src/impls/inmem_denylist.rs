//! InMemoryDenylist - case-insensitive blocked-domain set.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::StoreError;
use crate::ports::{DenylistEntry, DenylistRepository};

#[derive(Debug, Default)]
pub struct InMemoryDenylist {
    entries: Mutex<HashMap<String, DenylistEntry>>,
}

impl InMemoryDenylist {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    pub async fn get(&self, domain: &str) -> Option<DenylistEntry> {
        self.entries.lock().await.get(&domain.to_lowercase()).cloned()
    }
}

#[async_trait]
impl DenylistRepository for InMemoryDenylist {
    async fn contains(&self, domain: &str) -> Result<bool, StoreError> {
        Ok(self.entries.lock().await.contains_key(&domain.to_lowercase()))
    }

    async fn insert(&self, entry: DenylistEntry) -> Result<(), StoreError> {
        self.entries.lock().await.insert(entry.domain.to_lowercase(), entry);
        Ok(())
    }
}
