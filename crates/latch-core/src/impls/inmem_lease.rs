//! InMemoryLeaseStore - process-local lease store for development and tests.
//!
//! Mirrors the semantics of a blob/record lease service: records must exist
//! before they can be leased, leases expire by the clock, and release only
//! succeeds with the current unexpired token.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::{AcquireOutcome, CreateOutcome, LeaseToken, ReleaseOutcome, StoreError};
use crate::ports::{Clock, IdGenerator, LeaseStore, UlidGenerator};

#[derive(Debug, Clone)]
struct ActiveLease {
    token: LeaseToken,
    expires_at: DateTime<Utc>,
}

/// One lockable record. The record outlives any number of leases.
#[derive(Debug, Default)]
struct LeaseRecord {
    lease: Option<ActiveLease>,
}

impl LeaseRecord {
    fn valid_lease(&self, now: DateTime<Utc>) -> Option<&ActiveLease> {
        self.lease.as_ref().filter(|lease| lease.expires_at > now)
    }
}

pub struct InMemoryLeaseStore {
    records: Mutex<HashMap<String, LeaseRecord>>,
    clock: Arc<dyn Clock>,
    ids: UlidGenerator<Arc<dyn Clock>>,
}

impl InMemoryLeaseStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            ids: UlidGenerator::new(Arc::clone(&clock)),
            clock,
        }
    }

    /// Current valid holder of `key`, if any.
    pub async fn holder(&self, key: &str) -> Option<LeaseToken> {
        let now = self.clock.now();
        let records = self.records.lock().await;
        records
            .get(key)
            .and_then(|record| record.valid_lease(now))
            .map(|lease| lease.token.clone())
    }

    pub async fn record_exists(&self, key: &str) -> bool {
        self.records.lock().await.contains_key(key)
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    async fn create_if_absent(&self, key: &str) -> Result<CreateOutcome, StoreError> {
        let mut records = self.records.lock().await;
        if records.contains_key(key) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        records.insert(key.to_string(), LeaseRecord::default());
        Ok(CreateOutcome::Created)
    }

    async fn acquire_lease(&self, key: &str, duration: Duration) -> Result<AcquireOutcome, StoreError> {
        let ttl = chrono::Duration::from_std(duration)
            .map_err(|_| StoreError::Other(format!("lease duration {duration:?} out of range")))?;
        let now = self.clock.now();
        let expires_at = now
            .checked_add_signed(ttl)
            .ok_or_else(|| StoreError::Other(format!("lease duration {duration:?} expires past the end of time")))?;

        let mut records = self.records.lock().await;
        let record = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("lease record {key}")))?;

        if record.valid_lease(now).is_some() {
            return Ok(AcquireOutcome::Conflict);
        }

        let token = LeaseToken::new(self.ids.generate_lease_id().to_string());
        record.lease = Some(ActiveLease {
            token: token.clone(),
            expires_at,
        });
        Ok(AcquireOutcome::Acquired(token))
    }

    async fn release_lease(&self, key: &str, token: &LeaseToken) -> Result<ReleaseOutcome, StoreError> {
        let now = self.clock.now();

        let mut records = self.records.lock().await;
        let record = records
            .get_mut(key)
            .ok_or_else(|| StoreError::NotFound(format!("lease record {key}")))?;

        match record.valid_lease(now) {
            Some(lease) if lease.token == *token => {
                record.lease = None;
                Ok(ReleaseOutcome::Released)
            }
            _ => Ok(ReleaseOutcome::Conflict),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;

    fn store() -> (Arc<FixedClock>, InMemoryLeaseStore) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let clock = Arc::new(FixedClock::new(start));
        let store = InMemoryLeaseStore::new(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let (_, store) = store();
        assert_eq!(store.create_if_absent("k").await.unwrap(), CreateOutcome::Created);
        assert_eq!(store.create_if_absent("k").await.unwrap(), CreateOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn acquire_without_record_is_not_found() {
        let (_, store) = store();
        let err = store.acquire_lease("missing", Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn expiry_past_the_calendar_is_an_error() {
        let (_, store) = store();
        store.create_if_absent("k").await.unwrap();

        let err = store
            .acquire_lease("k", Duration::from_secs(10u64.pow(15)))
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Other(_)));
        assert!(store.holder("k").await.is_none());
    }

    #[tokio::test]
    async fn second_acquire_conflicts_until_expiry() {
        let (clock, store) = store();
        store.create_if_absent("k").await.unwrap();

        let first = store.acquire_lease("k", Duration::from_secs(30)).await.unwrap();
        assert!(first.is_acquired());
        assert_eq!(
            store.acquire_lease("k", Duration::from_secs(30)).await.unwrap(),
            AcquireOutcome::Conflict
        );

        clock.advance(chrono::Duration::seconds(30));
        assert!(store.acquire_lease("k", Duration::from_secs(30)).await.unwrap().is_acquired());
    }

    #[tokio::test]
    async fn release_requires_current_token() {
        let (clock, store) = store();
        store.create_if_absent("k").await.unwrap();
        let AcquireOutcome::Acquired(token) = store.acquire_lease("k", Duration::from_secs(10)).await.unwrap() else {
            panic!("expected lease");
        };

        let stranger = LeaseToken::new("not-the-token");
        assert_eq!(store.release_lease("k", &stranger).await.unwrap(), ReleaseOutcome::Conflict);
        assert_eq!(store.release_lease("k", &token).await.unwrap(), ReleaseOutcome::Released);
        assert_eq!(store.release_lease("k", &token).await.unwrap(), ReleaseOutcome::Conflict);

        let AcquireOutcome::Acquired(expiring) = store.acquire_lease("k", Duration::from_secs(10)).await.unwrap() else {
            panic!("expected lease");
        };
        clock.advance(chrono::Duration::seconds(11));
        assert_eq!(store.release_lease("k", &expiring).await.unwrap(), ReleaseOutcome::Conflict);
        assert!(store.holder("k").await.is_none());
    }
}
