//! InMemoryMessageQueue - named FIFO queues for development and tests.
//!
//! # Details
//! - `HashMap<String, VecDeque<String>>` holds one queue per name
//! - queues must be created (`ensure_exists`) before `send`, like a hosted queue
//! - `receive` is the consumer side; the coordination layer never calls it

use std::collections::{HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::{CreateOutcome, StoreError};
use crate::ports::MessageQueue;

#[derive(Debug, Default)]
pub struct InMemoryMessageQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
}

impl InMemoryMessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pop the oldest payload, if any.
    pub async fn receive(&self, queue: &str) -> Option<String> {
        self.queues.lock().await.get_mut(queue)?.pop_front()
    }

    /// Drain every payload currently in `queue`.
    pub async fn drain(&self, queue: &str) -> Vec<String> {
        self.queues
            .lock()
            .await
            .get_mut(queue)
            .map(|q| q.drain(..).collect())
            .unwrap_or_default()
    }
}

fn missing(queue: &str) -> StoreError {
    StoreError::NotFound(format!("queue {queue}"))
}

#[async_trait]
impl MessageQueue for InMemoryMessageQueue {
    async fn ensure_exists(&self, queue: &str) -> Result<CreateOutcome, StoreError> {
        let mut queues = self.queues.lock().await;
        if queues.contains_key(queue) {
            return Ok(CreateOutcome::AlreadyExists);
        }
        queues.insert(queue.to_string(), VecDeque::new());
        Ok(CreateOutcome::Created)
    }

    async fn send(&self, queue: &str, payload: String) -> Result<(), StoreError> {
        let mut queues = self.queues.lock().await;
        let q = queues.get_mut(queue).ok_or_else(|| missing(queue))?;
        q.push_back(payload);
        Ok(())
    }

    async fn approximate_count(&self, queue: &str) -> Result<u64, StoreError> {
        let queues = self.queues.lock().await;
        let q = queues.get(queue).ok_or_else(|| missing(queue))?;
        Ok(q.len() as u64)
    }

    async fn peek(&self, queue: &str) -> Result<Option<String>, StoreError> {
        let queues = self.queues.lock().await;
        let q = queues.get(queue).ok_or_else(|| missing(queue))?;
        Ok(q.front().cloned())
    }
}
