//! QueuePublisher - fan-out of suspect-domain messages onto one queue.
//!
//! # Delivery
//! - at-least-once: consumers must tolerate duplicates
//! - no ordering between messages of one batch
//! - `publish_batch` is NOT atomic. The queue has no multi-message
//!   transaction, so when it reports a failure some messages of the batch
//!   may already be enqueued. They are not rolled back; retrying the batch
//!   re-sends them.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cancel::cancellable;
use crate::domain::{CoordError, CreateOutcome, QueueStats, SuspectDomainMessage};
use crate::ports::{Clock, MessageQueue};

#[derive(Clone)]
pub struct QueuePublisher {
    queue: Arc<dyn MessageQueue>,
    queue_name: String,
    clock: Arc<dyn Clock>,
}

impl QueuePublisher {
    pub fn new(queue: Arc<dyn MessageQueue>, queue_name: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
            clock,
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }

    /// Ensure the queue, serialize, send. Every failure reaches the caller.
    pub async fn publish(&self, message: &SuspectDomainMessage, cancel: &CancellationToken) -> Result<(), CoordError> {
        let created = cancellable(cancel, "ensure_queue", async {
            self.queue.ensure_exists(&self.queue_name).await.map_err(|source| {
                warn!(target: "latch::queue", queue = %self.queue_name, error = %source, "failed to ensure queue");
                CoordError::store("ensure_queue", self.queue_name.as_str(), source)
            })
        })
        .await?;
        if created == CreateOutcome::Created {
            info!(target: "latch::queue", queue = %self.queue_name, "created queue");
        }

        let payload = message.to_payload().map_err(|source| {
            warn!(target: "latch::queue", domain = %message.domain, error = %source, "failed to serialize message");
            CoordError::from(source)
        })?;

        cancellable(cancel, "send_message", async {
            self.queue.send(&self.queue_name, payload).await.map_err(|source| {
                warn!(
                    target: "latch::queue",
                    queue = %self.queue_name,
                    domain = %message.domain,
                    correlation_id = %message.correlation_id,
                    error = %source,
                    "failed to send message"
                );
                CoordError::store("send_message", self.queue_name.as_str(), source)
            })
        })
        .await?;

        debug!(
            target: "latch::queue",
            queue = %self.queue_name,
            domain = %message.domain,
            correlation_id = %message.correlation_id,
            "message sent"
        );
        Ok(())
    }

    /// Publish every message concurrently and wait for all of them.
    ///
    /// Fails if any single publish failed, carrying the failure count and
    /// the first error. See the module docs for the partial-send caveat.
    pub async fn publish_batch(
        &self,
        messages: &[SuspectDomainMessage],
        cancel: &CancellationToken,
    ) -> Result<(), CoordError> {
        if messages.is_empty() {
            warn!(target: "latch::queue", queue = %self.queue_name, "publish_batch called with no messages");
            return Ok(());
        }

        let total = messages.len();
        let results = join_all(messages.iter().map(|message| self.publish(message, cancel))).await;

        let mut errors = results.into_iter().filter_map(Result::err);
        let Some(first) = errors.next() else {
            info!(target: "latch::queue", queue = %self.queue_name, count = total, "batch published");
            return Ok(());
        };
        let failed = 1 + errors.count();

        warn!(
            target: "latch::queue",
            queue = %self.queue_name,
            failed,
            total,
            error = %first,
            "batch partially failed; sent messages are not rolled back"
        );
        Err(CoordError::BatchPublish {
            failed,
            total,
            source: Box::new(first),
        })
    }

    /// Startup health check: a head read fails if the queue is unreachable
    /// or was never created.
    pub async fn test_connection(&self, cancel: &CancellationToken) -> Result<(), CoordError> {
        cancellable(cancel, "test_connection", async {
            self.queue.peek(&self.queue_name).await.map_err(|source| {
                warn!(target: "latch::queue", queue = %self.queue_name, error = %source, "queue health check failed");
                CoordError::store("test_connection", self.queue_name.as_str(), source)
            })
        })
        .await?;

        info!(target: "latch::queue", queue = %self.queue_name, "queue reachable");
        Ok(())
    }

    pub async fn get_queue_stats(&self, cancel: &CancellationToken) -> Result<QueueStats, CoordError> {
        let approximate_message_count = cancellable(cancel, "queue_stats", async {
            self.queue.approximate_count(&self.queue_name).await.map_err(|source| {
                warn!(target: "latch::queue", queue = %self.queue_name, error = %source, "queue stats unavailable");
                CoordError::store("queue_stats", self.queue_name.as_str(), source)
            })
        })
        .await?;

        Ok(QueueStats {
            approximate_message_count,
            as_of: self.clock.now(),
        })
    }
}
