//! DistributedLock - named, time-bounded mutual exclusion across workers.
//!
//! # Flow
//! 1. ensure the lease record exists (a concurrent creator is fine)
//! 2. attempt an atomic lease acquisition on it
//! 3. remember the granted token locally so `release` can hand it back
//!
//! Leases self-expire: a crashed holder blocks others for at most one lease
//! duration. There is no renewal, so `duration` must exceed the longest
//! expected run of the protected work.
//!
//! Not re-entrant. A second `try_acquire` of a name this instance already
//! holds goes to the store again and conflicts with its own lease.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cancel::cancellable;
use crate::domain::{AcquireOutcome, CoordError, CreateOutcome, LeaseToken, LockName, ReleaseOutcome, StoreError};
use crate::ports::LeaseStore;

/// Tokens this process currently believes it holds. Never shared across
/// processes; clones of one `DistributedLock` share it.
type HeldLeases = Arc<Mutex<HashMap<LockName, LeaseToken>>>;

#[derive(Clone)]
pub struct DistributedLock {
    store: Arc<dyn LeaseStore>,
    held: HeldLeases,
}

impl DistributedLock {
    pub fn new(store: Arc<dyn LeaseStore>) -> Self {
        Self {
            store,
            held: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Try to take `name` for `duration`.
    ///
    /// - `Ok(true)`: acquired; the token is recorded for `release`
    /// - `Ok(false)`: another holder has it (contention, not a failure)
    /// - `Err(_)`: the store is broken, or `cancel` fired
    ///
    /// The remote acquisition runs on its own task and records a granted
    /// token before finishing, so cancelling the caller never loses a lease
    /// that was in fact granted. `release(name)` frees it later.
    pub async fn try_acquire(
        &self,
        name: &LockName,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool, CoordError> {
        if duration.is_zero() {
            return Err(CoordError::InvalidArgument(format!(
                "lease duration for {name} must be greater than zero"
            )));
        }

        let created = cancellable(cancel, "create_lock_record", async {
            self.store.create_if_absent(name.as_str()).await.map_err(|source| {
                warn!(target: "latch::lock", lock = %name, error = %source, "failed to ensure lock record");
                CoordError::store("create_lock_record", name.as_str(), source)
            })
        })
        .await?;
        match created {
            CreateOutcome::Created => debug!(target: "latch::lock", lock = %name, "created lock record"),
            // possibly a concurrent worker; only existence matters
            CreateOutcome::AlreadyExists => debug!(target: "latch::lock", lock = %name, "lock record exists"),
        }

        let store = Arc::clone(&self.store);
        let held = Arc::clone(&self.held);
        let key = name.clone();
        let acquisition = tokio::spawn(async move {
            let outcome = store.acquire_lease(key.as_str(), duration).await?;
            if let AcquireOutcome::Acquired(token) = &outcome {
                let previous = held.lock().await.insert(key.clone(), token.clone());
                if let Some(previous) = previous {
                    warn!(
                        target: "latch::lock",
                        lock = %key,
                        previous = %previous,
                        "replaced a recorded lease token; the earlier lease had lapsed"
                    );
                }
            }
            Ok::<_, StoreError>(outcome)
        });

        let joined = tokio::select! {
            biased;
            joined = acquisition => joined.map_err(|err| {
                warn!(target: "latch::lock", lock = %name, error = %err, "lease acquisition task did not finish");
                CoordError::Join(err)
            })?,
            _ = cancel.cancelled() => {
                warn!(
                    target: "latch::lock",
                    lock = %name,
                    "try_acquire cancelled; a lease granted in flight will still be recorded"
                );
                return Err(CoordError::Cancelled { operation: "acquire_lease" });
            }
        };

        match joined {
            Ok(AcquireOutcome::Acquired(token)) => {
                info!(target: "latch::lock", lock = %name, token = %token, ?duration, "lease acquired");
                Ok(true)
            }
            Ok(AcquireOutcome::Conflict) => {
                debug!(target: "latch::lock", lock = %name, "lease held by another holder");
                Ok(false)
            }
            Err(source) => {
                warn!(target: "latch::lock", lock = %name, error = %source, "lease acquisition failed");
                Err(CoordError::store("acquire_lease", name.as_str(), source))
            }
        }
    }

    /// Give back the lease this process holds on `name`.
    ///
    /// No recorded lease is a logged no-op, so double release is harmless.
    /// Backend errors keep the local record so the call can be retried.
    pub async fn release(&self, name: &LockName, cancel: &CancellationToken) -> Result<(), CoordError> {
        let token = self.held.lock().await.get(name).cloned();
        let Some(token) = token else {
            info!(target: "latch::lock", lock = %name, "no lease held; nothing to release");
            return Ok(());
        };

        let outcome = cancellable(cancel, "release_lease", async {
            self.store.release_lease(name.as_str(), &token).await.map_err(|source| {
                warn!(target: "latch::lock", lock = %name, token = %token, error = %source, "lease release failed");
                CoordError::store("release_lease", name.as_str(), source)
            })
        })
        .await?;

        self.forget(name, &token).await;

        match outcome {
            ReleaseOutcome::Released => {
                info!(target: "latch::lock", lock = %name, token = %token, "lease released");
            }
            // The store rejected the token: the lease already expired or was
            // released. The resource is free either way, which is what a
            // release asks for, so this is success and the record is dropped.
            ReleaseOutcome::Conflict => {
                warn!(
                    target: "latch::lock",
                    lock = %name,
                    token = %token,
                    "lease already expired or released; treating release as done"
                );
            }
        }
        Ok(())
    }

    /// Whether this process has a recorded lease on `name`.
    pub async fn is_held(&self, name: &LockName) -> bool {
        self.held.lock().await.contains_key(name)
    }

    pub async fn held_locks(&self) -> Vec<LockName> {
        let mut names: Vec<LockName> = self.held.lock().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Drop the record only if it still holds `token`; a newer acquisition
    /// may have replaced it meanwhile.
    async fn forget(&self, name: &LockName, token: &LeaseToken) {
        let mut held = self.held.lock().await;
        if held.get(name) == Some(token) {
            held.remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impls::InMemoryLeaseStore;
    use crate::ports::FixedClock;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use tokio::sync::{Notify, Semaphore};

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()))
    }

    fn name() -> LockName {
        LockName::new("denylist-import").unwrap()
    }

    const LEASE: Duration = Duration::from_secs(60);

    /// Store that never answers successfully.
    struct BrokenStore;

    #[async_trait]
    impl LeaseStore for BrokenStore {
        async fn create_if_absent(&self, _key: &str) -> Result<CreateOutcome, StoreError> {
            Ok(CreateOutcome::AlreadyExists)
        }

        async fn acquire_lease(&self, _key: &str, _duration: Duration) -> Result<AcquireOutcome, StoreError> {
            Err(StoreError::PermissionDenied("credential expired".into()))
        }

        async fn release_lease(&self, _key: &str, _token: &LeaseToken) -> Result<ReleaseOutcome, StoreError> {
            Err(StoreError::Unavailable("connection reset".into()))
        }
    }

    /// Store whose acquisition blows up mid-call.
    struct PanickingStore;

    #[async_trait]
    impl LeaseStore for PanickingStore {
        async fn create_if_absent(&self, _key: &str) -> Result<CreateOutcome, StoreError> {
            Ok(CreateOutcome::Created)
        }

        async fn acquire_lease(&self, _key: &str, _duration: Duration) -> Result<AcquireOutcome, StoreError> {
            panic!("driver bug")
        }

        async fn release_lease(&self, _key: &str, _token: &LeaseToken) -> Result<ReleaseOutcome, StoreError> {
            Ok(ReleaseOutcome::Conflict)
        }
    }

    /// Lets a test hold `acquire_lease` open until it decides to grant it.
    struct GatedStore {
        inner: InMemoryLeaseStore,
        entered: Notify,
        gate: Semaphore,
    }

    #[async_trait]
    impl LeaseStore for GatedStore {
        async fn create_if_absent(&self, key: &str) -> Result<CreateOutcome, StoreError> {
            self.inner.create_if_absent(key).await
        }

        async fn acquire_lease(&self, key: &str, duration: Duration) -> Result<AcquireOutcome, StoreError> {
            self.entered.notify_one();
            let _permit = self.gate.acquire().await.unwrap();
            self.inner.acquire_lease(key, duration).await
        }

        async fn release_lease(&self, key: &str, token: &LeaseToken) -> Result<ReleaseOutcome, StoreError> {
            self.inner.release_lease(key, token).await
        }
    }

    #[tokio::test]
    async fn acquire_then_contend_then_release() {
        let store = Arc::new(InMemoryLeaseStore::new(clock()));
        let worker_a = DistributedLock::new(store.clone());
        let worker_b = DistributedLock::new(store.clone());
        let cancel = CancellationToken::new();

        assert!(worker_a.try_acquire(&name(), LEASE, &cancel).await.unwrap());
        assert!(!worker_b.try_acquire(&name(), LEASE, &cancel).await.unwrap());
        assert!(worker_a.is_held(&name()).await);
        assert!(!worker_b.is_held(&name()).await);

        worker_a.release(&name(), &cancel).await.unwrap();
        assert!(!worker_a.is_held(&name()).await);
        assert!(worker_b.try_acquire(&name(), LEASE, &cancel).await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn exactly_one_concurrent_caller_wins() {
        let store: Arc<dyn LeaseStore> = Arc::new(InMemoryLeaseStore::new(clock()));
        let mut attempts = Vec::new();
        for _ in 0..16 {
            let lock = DistributedLock::new(Arc::clone(&store));
            attempts.push(tokio::spawn(async move {
                lock.try_acquire(&name(), LEASE, &CancellationToken::new()).await
            }));
        }

        let mut winners = 0;
        for attempt in attempts {
            if attempt.await.unwrap().unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let store = Arc::new(InMemoryLeaseStore::new(clock()));
        let lock = DistributedLock::new(store);
        let cancel = CancellationToken::new();

        // never acquired
        lock.release(&name(), &cancel).await.unwrap();

        assert!(lock.try_acquire(&name(), LEASE, &cancel).await.unwrap());
        lock.release(&name(), &cancel).await.unwrap();
        lock.release(&name(), &cancel).await.unwrap();
    }

    #[tokio::test]
    async fn expired_lease_is_taken_over_no_earlier_than_its_duration() {
        let clock = clock();
        let store = Arc::new(InMemoryLeaseStore::new(clock.clone()));
        let crashed = DistributedLock::new(store.clone());
        let successor = DistributedLock::new(store.clone());
        let cancel = CancellationToken::new();

        assert!(crashed.try_acquire(&name(), LEASE, &cancel).await.unwrap());

        clock.advance(chrono::Duration::seconds(59));
        assert!(!successor.try_acquire(&name(), LEASE, &cancel).await.unwrap());

        clock.advance(chrono::Duration::seconds(1));
        assert!(successor.try_acquire(&name(), LEASE, &cancel).await.unwrap());
    }

    #[tokio::test]
    async fn releasing_a_lapsed_lease_clears_the_record_without_error() {
        let clock = clock();
        let store = Arc::new(InMemoryLeaseStore::new(clock.clone()));
        let slow = DistributedLock::new(store.clone());
        let other = DistributedLock::new(store.clone());
        let cancel = CancellationToken::new();

        assert!(slow.try_acquire(&name(), LEASE, &cancel).await.unwrap());
        clock.advance(chrono::Duration::seconds(61));
        assert!(other.try_acquire(&name(), LEASE, &cancel).await.unwrap());

        slow.release(&name(), &cancel).await.unwrap();
        assert!(!slow.is_held(&name()).await);
        // the takeover lease is untouched
        assert!(store.holder(name().as_str()).await.is_some());
    }

    #[tokio::test]
    async fn backend_failures_are_errors_not_false() {
        let lock = DistributedLock::new(Arc::new(BrokenStore));
        let err = lock
            .try_acquire(&name(), LEASE, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoordError::Store { operation: "acquire_lease", source: StoreError::PermissionDenied(_), .. }
        ));
    }

    #[tokio::test]
    async fn crashed_acquisition_surfaces_as_join_error() {
        let lock = DistributedLock::new(Arc::new(PanickingStore));
        let err = lock
            .try_acquire(&name(), LEASE, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CoordError::Join(_)));
        assert!(!lock.is_held(&name()).await);
    }

    #[tokio::test]
    async fn overlong_lease_is_a_store_error() {
        let lock = DistributedLock::new(Arc::new(InMemoryLeaseStore::new(clock())));
        let err = lock
            .try_acquire(&name(), Duration::from_secs(10u64.pow(15)), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoordError::Store { operation: "acquire_lease", source: StoreError::Other(_), .. }
        ));
    }

    #[tokio::test]
    async fn release_failure_keeps_the_record_for_retry() {
        let store = Arc::new(InMemoryLeaseStore::new(clock()));
        let lock = DistributedLock::new(store);
        let cancel = CancellationToken::new();
        assert!(lock.try_acquire(&name(), LEASE, &cancel).await.unwrap());

        let broken = DistributedLock {
            store: Arc::new(BrokenStore),
            held: Arc::clone(&lock.held),
        };
        assert!(broken.release(&name(), &cancel).await.is_err());
        assert!(lock.is_held(&name()).await);
    }

    #[tokio::test]
    async fn record_created_by_someone_else_is_fine() {
        let store = Arc::new(InMemoryLeaseStore::new(clock()));
        store.create_if_absent(name().as_str()).await.unwrap();

        let lock = DistributedLock::new(store);
        assert!(lock.try_acquire(&name(), LEASE, &CancellationToken::new()).await.unwrap());
    }

    #[tokio::test]
    async fn same_instance_is_not_reentrant() {
        let store = Arc::new(InMemoryLeaseStore::new(clock()));
        let lock = DistributedLock::new(store);
        let cancel = CancellationToken::new();

        assert!(lock.try_acquire(&name(), LEASE, &cancel).await.unwrap());
        assert!(!lock.try_acquire(&name(), LEASE, &cancel).await.unwrap());
        assert!(lock.is_held(&name()).await);
    }

    #[tokio::test]
    async fn rejects_zero_duration() {
        let lock = DistributedLock::new(Arc::new(InMemoryLeaseStore::new(clock())));
        let err = lock
            .try_acquire(&name(), Duration::ZERO, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoordError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn cancelled_before_start_touches_nothing() {
        let store = Arc::new(InMemoryLeaseStore::new(clock()));
        let lock = DistributedLock::new(store.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = lock.try_acquire(&name(), LEASE, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
        assert!(!store.record_exists(name().as_str()).await);
    }

    #[tokio::test]
    async fn lease_granted_after_cancellation_is_still_recorded() {
        let store = Arc::new(GatedStore {
            inner: InMemoryLeaseStore::new(clock()),
            entered: Notify::new(),
            gate: Semaphore::new(0),
        });
        let lock = DistributedLock::new(store.clone());
        let cancel = CancellationToken::new();

        let attempt = {
            let lock = lock.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move { lock.try_acquire(&name(), LEASE, &cancel).await })
        };

        store.entered.notified().await;
        cancel.cancel();
        assert!(attempt.await.unwrap().unwrap_err().is_cancelled());

        store.gate.add_permits(1);
        for _ in 0..100 {
            if lock.is_held(&name()).await {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(lock.is_held(&name()).await);

        lock.release(&name(), &CancellationToken::new()).await.unwrap();
        assert!(store.inner.holder(name().as_str()).await.is_none());
    }

    #[tokio::test]
    async fn held_locks_lists_names() {
        let lock = DistributedLock::new(Arc::new(InMemoryLeaseStore::new(clock())));
        let cancel = CancellationToken::new();
        let other = LockName::new("another").unwrap();

        lock.try_acquire(&name(), LEASE, &cancel).await.unwrap();
        lock.try_acquire(&other, LEASE, &cancel).await.unwrap();

        assert_eq!(lock.held_locks().await, vec![other, name()]);
    }
}
