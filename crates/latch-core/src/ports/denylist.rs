//! DenylistRepository port - the blocked-domain store seeding writes into.
//!
//! Only what seeding needs: a membership check before mutating, and an insert.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::StoreError;

/// One blocked domain as handed to the repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenylistEntry {
    pub domain: String,
    pub source: String,
    pub added_at: DateTime<Utc>,
}

#[async_trait]
pub trait DenylistRepository: Send + Sync {
    /// Case-insensitive membership.
    async fn contains(&self, domain: &str) -> Result<bool, StoreError>;

    async fn insert(&self, entry: DenylistEntry) -> Result<(), StoreError>;
}
