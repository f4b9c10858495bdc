//! Import body: turn a feed file of candidate domains into suspect messages.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use latch_core::app::{BodyError, TaskBody};
use latch_core::domain::{CoordError, SuspectDomainMessage, TaskWindow, parse_seed_list};
use latch_core::ports::{Clock, DenylistRepository};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Reads newline-delimited candidates (same normalization as the seed file)
/// and emits one message per candidate that is not already denylisted.
pub struct FeedFileTask {
    path: Option<PathBuf>,
    denylist: Arc<dyn DenylistRepository>,
    clock: Arc<dyn Clock>,
}

impl FeedFileTask {
    pub fn new(path: Option<PathBuf>, denylist: Arc<dyn DenylistRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { path, denylist, clock }
    }
}

#[async_trait]
impl TaskBody for FeedFileTask {
    async fn run(
        &self,
        window: TaskWindow,
        cancel: &CancellationToken,
    ) -> Result<Vec<SuspectDomainMessage>, BodyError> {
        let Some(path) = &self.path else {
            info!(target: "latch::feed", "no feed file given; nothing to import");
            return Ok(Vec::new());
        };

        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading feed file {}", path.display()))?;

        let mut messages = Vec::new();
        for domain in parse_seed_list(&text) {
            if cancel.is_cancelled() {
                warn!(target: "latch::feed", scanned = messages.len(), "feed scan cancelled");
                return Err(CoordError::Cancelled { operation: "feed_scan" }.into());
            }
            if self.denylist.contains(&domain).await? {
                debug!(target: "latch::feed", %domain, "already denylisted");
                continue;
            }
            messages.push(
                SuspectDomainMessage::new(domain, window.correlation_id, self.clock.now()).with_field("source", "feed"),
            );
        }

        info!(target: "latch::feed", candidates = messages.len(), "feed file scanned");
        Ok(messages)
    }
}
