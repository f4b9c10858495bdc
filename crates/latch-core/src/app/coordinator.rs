//! Coordinator - one lock-guarded, checkpointed run of a recurring task.
//!
//! # Flow
//! 1. try the task's lock; if another worker holds it, skip
//! 2. read the checkpoint, seeding it at `now - backfill` on first run
//! 3. run the body over `[since, until)` where `until` is captured up front
//! 4. advance the checkpoint to `until`
//! 5. publish what the body produced
//! 6. release the lock, on every path once it was acquired
//!
//! The checkpoint advances before publishing. A publish failure therefore
//! does not re-read the window on the next run; the items of a failed batch
//! are reported through the error, and the caller decides what to do.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::cancel::cancellable;
use super::checkpoints::CheckpointStore;
use super::lock::DistributedLock;
use super::publisher::QueuePublisher;
use crate::domain::{CoordError, CoordinatedTask, SuspectDomainMessage, TaskWindow};
use crate::ports::{Clock, IdGenerator};

pub type BodyError = Box<dyn std::error::Error + Send + Sync>;

/// The protected work of a coordinated task.
///
/// Runs only while the task's lock is held. Returns the items to publish;
/// must not publish them itself.
#[async_trait]
pub trait TaskBody: Send + Sync {
    async fn run(
        &self,
        window: TaskWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<SuspectDomainMessage>, BodyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another worker holds the task's lock.
    LockHeld,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunReport {
    Completed { window: TaskWindow, published: usize },
    Skipped(SkipReason),
}

#[derive(Clone)]
pub struct Coordinator {
    lock: DistributedLock,
    checkpoints: CheckpointStore,
    publisher: QueuePublisher,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdGenerator>,
}

impl Coordinator {
    pub fn new(
        lock: DistributedLock,
        checkpoints: CheckpointStore,
        publisher: QueuePublisher,
        clock: Arc<dyn Clock>,
        ids: Arc<dyn IdGenerator>,
    ) -> Self {
        Self {
            lock,
            checkpoints,
            publisher,
            clock,
            ids,
        }
    }

    #[tracing::instrument(skip_all, fields(task = %task.checkpoint, lock = %task.lock_name))]
    pub async fn run(
        &self,
        task: &CoordinatedTask,
        body: &dyn TaskBody,
        cancel: &CancellationToken,
    ) -> Result<RunReport, CoordError> {
        if !self.lock.try_acquire(&task.lock_name, task.lease_duration, cancel).await? {
            info!(target: "latch::coordinator", "lock held by another worker; skipping run");
            return Ok(RunReport::Skipped(SkipReason::LockHeld));
        }

        let result = self.run_locked(task, body, cancel).await;

        // Released with a fresh token: a cancelled run must still hand the lease back.
        let released = self.lock.release(&task.lock_name, &CancellationToken::new()).await;

        match (result, released) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(release_err)) => {
                error!(
                    target: "latch::coordinator",
                    error = %release_err,
                    "run completed but the lock could not be released; it frees on lease expiry"
                );
                Err(release_err)
            }
            (Err(run_err), Ok(())) => Err(run_err),
            (Err(run_err), Err(release_err)) => {
                warn!(target: "latch::coordinator", error = %release_err, "lock release after failed run also failed");
                Err(run_err)
            }
        }
    }

    async fn run_locked(
        &self,
        task: &CoordinatedTask,
        body: &dyn TaskBody,
        cancel: &CancellationToken,
    ) -> Result<RunReport, CoordError> {
        let now = self.clock.now();
        let since = match self.checkpoints.get_last_timestamp(&task.checkpoint, cancel).await? {
            Some(since) => since,
            None => {
                let default = now.checked_sub_signed(task.backfill).ok_or_else(|| {
                    warn!(
                        target: "latch::coordinator",
                        backfill = %task.backfill,
                        "backfill reaches before the earliest representable time"
                    );
                    CoordError::InvalidArgument(format!(
                        "backfill {} for {} is out of range",
                        task.backfill, task.checkpoint
                    ))
                })?;
                self.checkpoints.seed_if_absent(&task.checkpoint, default, cancel).await?;
                // another worker may have seeded first; its value wins
                self.checkpoints
                    .get_last_timestamp(&task.checkpoint, cancel)
                    .await?
                    .unwrap_or(default)
            }
        };

        if since > now {
            warn!(
                target: "latch::coordinator",
                %since,
                %now,
                "checkpoint is ahead of the local clock; running an empty window"
            );
        }
        let window = TaskWindow {
            since,
            until: now.max(since),
            correlation_id: self.ids.generate_correlation_id(),
        };
        info!(
            target: "latch::coordinator",
            since = %window.since,
            until = %window.until,
            correlation_id = %window.correlation_id,
            "running task"
        );

        let task_name = task.checkpoint.task_name();
        let items = cancellable(cancel, "task_body", async {
            body.run(window, cancel).await.map_err(|source| {
                warn!(target: "latch::coordinator", error = %source, "task body failed");
                CoordError::TaskFailed {
                    task: task_name.to_string(),
                    source,
                }
            })
        })
        .await?;

        self.checkpoints
            .update_last_timestamp(&task.checkpoint, window.until, cancel)
            .await?;

        self.publisher.publish_batch(&items, cancel).await?;

        info!(
            target: "latch::coordinator",
            correlation_id = %window.correlation_id,
            published = items.len(),
            "task run completed"
        );
        Ok(RunReport::Completed {
            window,
            published: items.len(),
        })
    }
}
