//! LeaseStore port - durable records with server-enforced leases.
//!
//! The store is the only authority on who holds a lease. At most one valid
//! (unexpired) token exists per key at any instant; application code never
//! tries to enforce that itself.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{AcquireOutcome, CreateOutcome, LeaseToken, ReleaseOutcome, StoreError};

/// Contract consumed by `DistributedLock`.
///
/// # Outcomes
/// - lease contention is `AcquireOutcome::Conflict`, not an error
/// - releasing a stale or foreign token is `ReleaseOutcome::Conflict`
/// - a concurrent creator winning `create_if_absent` is `CreateOutcome::AlreadyExists`
/// - `Err(StoreError)` is reserved for the store itself misbehaving
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Ensure the backing record for `key` exists.
    async fn create_if_absent(&self, key: &str) -> Result<CreateOutcome, StoreError>;

    /// Atomically take the lease on `key` for `duration` if nobody holds a valid one.
    async fn acquire_lease(&self, key: &str, duration: Duration) -> Result<AcquireOutcome, StoreError>;

    /// Give the lease back. Only succeeds while `token` is the current, unexpired lease.
    async fn release_lease(&self, key: &str, token: &LeaseToken) -> Result<ReleaseOutcome, StoreError>;
}
