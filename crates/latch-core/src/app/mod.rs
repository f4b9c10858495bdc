//! App - the coordination components, built by composing ports.
//!
//! # Components
//! - **DistributedLock**: named, self-expiring mutual exclusion
//! - **CheckpointStore**: per-task progress markers with seed-if-absent
//! - **QueuePublisher**: single and batched publishes, health check, stats
//! - **Coordinator**: lock, checkpoint window, body, advance, publish, release
//! - **DenylistSeeder**: one-time, marker-guarded denylist load
//! - **LatchConfig**: startup settings

mod cancel;
pub mod checkpoints;
pub mod config;
pub mod coordinator;
pub mod lock;
pub mod publisher;
pub mod seeding;

pub use self::checkpoints::CheckpointStore;
pub use self::config::{BackendKind, LatchConfig};
pub use self::coordinator::{BodyError, Coordinator, RunReport, SkipReason, TaskBody};
pub use self::lock::DistributedLock;
pub use self::publisher::QueuePublisher;
pub use self::seeding::{DenylistSeeder, SeedReport};
