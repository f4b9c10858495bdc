//! DenylistSeeder - one-time bulk load of the denylist from a seed file.
//!
//! Guarded by a dedicated checkpoint (the seed marker): once the marker is
//! written, every later call returns `AlreadySeeded` without touching the
//! denylist. Per-entry failures are counted and the batch continues; only a
//! failed marker write fails the call, since a missing marker re-seeds on
//! every run.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::cancel::cancellable;
use super::checkpoints::CheckpointStore;
use super::lock::DistributedLock;
use crate::domain::{CheckpointKey, CoordError, LockName, parse_seed_list};
use crate::ports::{Clock, DenylistEntry, DenylistRepository};

/// Source tag on entries written by the seeder.
pub const SEED_SOURCE: &str = "seed";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeedReport {
    /// The marker was already present; nothing was read or written.
    AlreadySeeded { seeded_at: DateTime<Utc> },
    /// The seed file does not exist. No marker is written, so a later run
    /// seeds once the file shows up.
    SourceMissing,
    /// Another worker holds the seed lock and is seeding right now.
    LockHeld,
    Completed { added: usize, skipped: usize, failed: usize },
}

struct SeedGuard {
    lock: DistributedLock,
    name: LockName,
    lease: Duration,
}

pub struct DenylistSeeder {
    checkpoints: CheckpointStore,
    denylist: Arc<dyn DenylistRepository>,
    marker: CheckpointKey,
    clock: Arc<dyn Clock>,
    guard: Option<SeedGuard>,
}

impl DenylistSeeder {
    pub fn new(
        checkpoints: CheckpointStore,
        denylist: Arc<dyn DenylistRepository>,
        marker: CheckpointKey,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            checkpoints,
            denylist,
            marker,
            clock,
            guard: None,
        }
    }

    /// Seed only while holding `name`. `lease` must outlast a full load.
    pub fn with_lock(mut self, lock: DistributedLock, name: LockName, lease: Duration) -> Self {
        self.guard = Some(SeedGuard { lock, name, lease });
        self
    }

    #[tracing::instrument(skip_all, fields(marker = %self.marker, path = %path.display()))]
    pub async fn seed(&self, path: &Path, cancel: &CancellationToken) -> Result<SeedReport, CoordError> {
        let Some(guard) = &self.guard else {
            return self.load(path, cancel).await;
        };

        if !guard.lock.try_acquire(&guard.name, guard.lease, cancel).await? {
            info!(target: "latch::seed", lock = %guard.name, "another worker is seeding; skipping");
            return Ok(SeedReport::LockHeld);
        }

        let result = self.load(path, cancel).await;

        // fresh token: a cancelled load still hands the lease back
        if let Err(err) = guard.lock.release(&guard.name, &CancellationToken::new()).await {
            // the marker decides whether seeding repeats, not the lease
            warn!(
                target: "latch::seed",
                lock = %guard.name,
                error = %err,
                "seed lock release failed; it frees on lease expiry"
            );
        }
        result
    }

    async fn load(&self, path: &Path, cancel: &CancellationToken) -> Result<SeedReport, CoordError> {
        if let Some(seeded_at) = self.checkpoints.get_last_timestamp(&self.marker, cancel).await? {
            info!(target: "latch::seed", %seeded_at, "denylist already seeded; skipping");
            return Ok(SeedReport::AlreadySeeded { seeded_at });
        }

        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                warn!(target: "latch::seed", "seed file not found; skipping seeding");
                return Ok(SeedReport::SourceMissing);
            }
            Err(source) => {
                warn!(target: "latch::seed", error = %source, "failed to read seed file");
                return Err(CoordError::SeedSource {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let entries = parse_seed_list(&text);
        info!(target: "latch::seed", entries = entries.len(), "seeding denylist");

        let (mut added, mut skipped, mut failed) = (0, 0, 0);
        for domain in &entries {
            match self.seed_entry(domain, cancel).await {
                Ok(true) => added += 1,
                Ok(false) => skipped += 1,
                Err(err) if err.is_cancelled() => return Err(err),
                Err(err) => {
                    warn!(target: "latch::seed", %domain, error = %err, "failed to seed entry");
                    failed += 1;
                }
            }
        }

        self.checkpoints
            .update_last_timestamp(&self.marker, self.clock.now(), cancel)
            .await
            .map_err(|err| {
                if err.is_cancelled() {
                    return err;
                }
                error!(
                    target: "latch::seed",
                    error = %err,
                    "seed marker write failed; seeding will repeat on the next run"
                );
                CoordError::MarkerWrite {
                    marker: self.marker.to_string(),
                    source: Box::new(err),
                }
            })?;

        info!(target: "latch::seed", added, skipped, failed, "denylist seeding completed");
        Ok(SeedReport::Completed { added, skipped, failed })
    }

    /// `Ok(true)` if inserted, `Ok(false)` if it was already present.
    async fn seed_entry(&self, domain: &str, cancel: &CancellationToken) -> Result<bool, CoordError> {
        let present = cancellable(cancel, "denylist_contains", async {
            self.denylist
                .contains(domain)
                .await
                .map_err(|source| CoordError::store("denylist_contains", domain, source))
        })
        .await?;
        if present {
            return Ok(false);
        }

        let entry = DenylistEntry {
            domain: domain.to_string(),
            source: SEED_SOURCE.to_string(),
            added_at: self.clock.now(),
        };
        cancellable(cancel, "denylist_insert", async {
            self.denylist
                .insert(entry)
                .await
                .map_err(|source| CoordError::store("denylist_insert", domain, source))
        })
        .await?;
        Ok(true)
    }
}
