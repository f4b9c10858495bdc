//! CheckpointStore - per-task progress markers.
//!
//! Thin layer over `CheckpointBackend` that adds cancellation, logging and
//! the seed-if-absent race handling. Monotonicity is the caller's job:
//! `update_last_timestamp` overwrites whatever is stored.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cancel::cancellable;
use crate::domain::{CheckpointKey, CheckpointRecord, CoordError, CreateOutcome};
use crate::ports::{CheckpointBackend, Clock};

#[derive(Clone)]
pub struct CheckpointStore {
    backend: Arc<dyn CheckpointBackend>,
    clock: Arc<dyn Clock>,
}

impl CheckpointStore {
    pub fn new(backend: Arc<dyn CheckpointBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Stored marker for `key`; `None` means the task never ran.
    pub async fn get_last_timestamp(
        &self,
        key: &CheckpointKey,
        cancel: &CancellationToken,
    ) -> Result<Option<DateTime<Utc>>, CoordError> {
        let record = cancellable(cancel, "get_checkpoint", async {
            self.backend.get(key).await.map_err(|source| {
                warn!(target: "latch::checkpoint", task = %key, error = %source, "checkpoint read failed");
                CoordError::store("get_checkpoint", key.to_string(), source)
            })
        })
        .await?;

        Ok(record.map(|r| r.last_timestamp))
    }

    /// Last-write-wins overwrite. A cancelled call reports `Cancelled`, never
    /// success, so callers do not move on as if it had landed.
    pub async fn update_last_timestamp(
        &self,
        key: &CheckpointKey,
        timestamp: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<(), CoordError> {
        let record = CheckpointRecord::new(timestamp, self.clock.now());
        cancellable(cancel, "update_checkpoint", async {
            self.backend.put(key, record).await.map_err(|source| {
                warn!(target: "latch::checkpoint", task = %key, error = %source, "checkpoint write failed");
                CoordError::store("update_checkpoint", key.to_string(), source)
            })
        })
        .await?;

        debug!(target: "latch::checkpoint", task = %key, %timestamp, "checkpoint updated");
        Ok(())
    }

    /// Create the checkpoint at `default` only if nothing is stored yet.
    ///
    /// The read and the create are separate calls; a writer slipping in
    /// between surfaces as `AlreadyExists` from the create and is accepted.
    pub async fn seed_if_absent(
        &self,
        key: &CheckpointKey,
        default: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<CreateOutcome, CoordError> {
        if self.get_last_timestamp(key, cancel).await?.is_some() {
            debug!(target: "latch::checkpoint", task = %key, "checkpoint already present");
            return Ok(CreateOutcome::AlreadyExists);
        }

        let record = CheckpointRecord::new(default, self.clock.now());
        let outcome = cancellable(cancel, "seed_checkpoint", async {
            self.backend.create_if_absent(key, record).await.map_err(|source| {
                warn!(target: "latch::checkpoint", task = %key, error = %source, "checkpoint seed failed");
                CoordError::store("seed_checkpoint", key.to_string(), source)
            })
        })
        .await?;

        match outcome {
            CreateOutcome::Created => {
                info!(target: "latch::checkpoint", task = %key, %default, "checkpoint seeded");
            }
            CreateOutcome::AlreadyExists => {
                debug!(target: "latch::checkpoint", task = %key, "checkpoint seeded concurrently by another worker");
            }
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StoreError;
    use crate::impls::InMemoryCheckpointBackend;
    use crate::ports::FixedClock;
    use async_trait::async_trait;
    use chrono::TimeZone;

    fn t(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, hour, 0, 0).unwrap()
    }

    fn key() -> CheckpointKey {
        CheckpointKey::new("denylist-import", "profile-a")
    }

    fn store() -> (Arc<InMemoryCheckpointBackend>, CheckpointStore) {
        let backend = Arc::new(InMemoryCheckpointBackend::new());
        let store = CheckpointStore::new(backend.clone(), Arc::new(FixedClock::new(t(12))));
        (backend, store)
    }

    /// Reports nothing stored, then loses the create race.
    struct RacingBackend;

    #[async_trait]
    impl CheckpointBackend for RacingBackend {
        async fn get(&self, _key: &CheckpointKey) -> Result<Option<CheckpointRecord>, StoreError> {
            Ok(None)
        }

        async fn put(&self, _key: &CheckpointKey, _record: CheckpointRecord) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("throttled".into()))
        }

        async fn create_if_absent(
            &self,
            _key: &CheckpointKey,
            _record: CheckpointRecord,
        ) -> Result<CreateOutcome, StoreError> {
            Ok(CreateOutcome::AlreadyExists)
        }
    }

    #[tokio::test]
    async fn absent_checkpoint_reads_as_none() {
        let (_, store) = store();
        let cancel = CancellationToken::new();
        assert_eq!(store.get_last_timestamp(&key(), &cancel).await.unwrap(), None);
    }

    #[tokio::test]
    async fn update_overwrites_without_ordering_check() {
        let (_, store) = store();
        let cancel = CancellationToken::new();

        store.update_last_timestamp(&key(), t(5), &cancel).await.unwrap();
        store.update_last_timestamp(&key(), t(3), &cancel).await.unwrap();

        assert_eq!(store.get_last_timestamp(&key(), &cancel).await.unwrap(), Some(t(3)));
    }

    #[tokio::test]
    async fn seed_if_absent_keeps_the_first_value() {
        let (_, store) = store();
        let cancel = CancellationToken::new();

        let first = store.seed_if_absent(&key(), t(1), &cancel).await.unwrap();
        let second = store.seed_if_absent(&key(), t(2), &cancel).await.unwrap();

        assert!(first.was_created());
        assert!(!second.was_created());
        assert_eq!(store.get_last_timestamp(&key(), &cancel).await.unwrap(), Some(t(1)));
    }

    #[tokio::test]
    async fn seed_if_absent_does_not_touch_an_explicit_checkpoint() {
        let (_, store) = store();
        let cancel = CancellationToken::new();
        store.update_last_timestamp(&key(), t(9), &cancel).await.unwrap();

        store.seed_if_absent(&key(), t(1), &cancel).await.unwrap();
        assert_eq!(store.get_last_timestamp(&key(), &cancel).await.unwrap(), Some(t(9)));
    }

    #[tokio::test]
    async fn lost_create_race_is_success() {
        let store = CheckpointStore::new(Arc::new(RacingBackend), Arc::new(FixedClock::new(t(12))));
        let outcome = store
            .seed_if_absent(&key(), t(1), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome, CreateOutcome::AlreadyExists);
    }

    #[tokio::test]
    async fn backend_failure_is_surfaced() {
        let store = CheckpointStore::new(Arc::new(RacingBackend), Arc::new(FixedClock::new(t(12))));
        let err = store
            .update_last_timestamp(&key(), t(1), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoordError::Store { operation: "update_checkpoint", source: StoreError::Unavailable(_), .. }
        ));
    }

    #[tokio::test]
    async fn cancelled_update_leaves_nothing_behind() {
        let (backend, store) = store();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = store.update_last_timestamp(&key(), t(1), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn records_carry_the_write_time() {
        let (backend, store) = store();
        store
            .update_last_timestamp(&key(), t(1), &CancellationToken::new())
            .await
            .unwrap();

        let record = backend.get(&key()).await.unwrap().unwrap();
        assert_eq!(record.updated_at, t(12));
    }
}
