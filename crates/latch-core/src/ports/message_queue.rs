//! MessageQueue port - durable at-least-once queue.
//!
//! The queue carries opaque text payloads. It has no batch primitive, no
//! transactions across messages, and no ordering guarantee.

use async_trait::async_trait;

use crate::domain::{CreateOutcome, StoreError};

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Create the queue if missing. Safe to call before every send.
    async fn ensure_exists(&self, queue: &str) -> Result<CreateOutcome, StoreError>;

    /// Append one payload. Fails with `StoreError::NotFound` if the queue was never created.
    async fn send(&self, queue: &str, payload: String) -> Result<(), StoreError>;

    /// Best-effort depth. Eventually consistent; never exact.
    async fn approximate_count(&self, queue: &str) -> Result<u64, StoreError>;

    /// Lightweight read of the head without dequeuing. Used for health checks.
    async fn peek(&self, queue: &str) -> Result<Option<String>, StoreError>;
}
