//! Backend selection.

use std::sync::Arc;

use latch_core::app::BackendKind;
use latch_core::impls::{InMemoryCheckpointBackend, InMemoryDenylist, InMemoryLeaseStore, InMemoryMessageQueue};
use latch_core::ports::{CheckpointBackend, Clock, DenylistRepository, LeaseStore, MessageQueue};
use tracing::warn;

pub struct Backends {
    pub leases: Arc<dyn LeaseStore>,
    pub checkpoints: Arc<dyn CheckpointBackend>,
    pub queue: Arc<dyn MessageQueue>,
    pub denylist: Arc<dyn DenylistRepository>,
}

impl Backends {
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            leases: Arc::new(InMemoryLeaseStore::new(clock)),
            checkpoints: Arc::new(InMemoryCheckpointBackend::new()),
            queue: Arc::new(InMemoryMessageQueue::new()),
            denylist: Arc::new(InMemoryDenylist::new()),
        }
    }

    pub async fn connect(kind: &BackendKind, clock: Arc<dyn Clock>) -> anyhow::Result<Self> {
        match kind {
            BackendKind::Memory => {
                warn!(target: "latch", "using in-memory backends; state is lost when the process exits");
                Ok(Self::in_memory(clock))
            }
            #[cfg(feature = "redis")]
            BackendKind::Redis { url } => {
                use anyhow::Context;
                use latch_core::impls::RedisBackend;

                let redis = Arc::new(RedisBackend::connect(url).await.context("connecting to redis")?);
                Ok(Self {
                    leases: redis.clone(),
                    checkpoints: redis.clone(),
                    queue: redis.clone(),
                    denylist: redis,
                })
            }
            #[cfg(not(feature = "redis"))]
            BackendKind::Redis { .. } => {
                anyhow::bail!("LATCH_BACKEND=redis needs a latch build with the `redis` feature")
            }
        }
    }
}
