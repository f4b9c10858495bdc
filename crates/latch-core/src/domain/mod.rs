//! Domain model (ids, lock names, checkpoints, messages, queue stats,
//! outcomes, errors).
//!
//! Pure data: nothing in here performs I/O.

pub mod checkpoint;
pub mod errors;
pub mod ids;
pub mod lock;
pub mod message;
pub mod outcome;
pub mod seed_list;
pub mod stats;
pub mod task;

pub use checkpoint::{CheckpointKey, CheckpointRecord};
pub use errors::{ConfigError, CoordError, ErrorKind, StoreError};
pub use ids::{CorrelationId, LeaseId};
pub use lock::{LeaseToken, LockName};
pub use message::SuspectDomainMessage;
pub use outcome::{AcquireOutcome, CreateOutcome, ReleaseOutcome};
pub use seed_list::{normalize_entry, parse_seed_list};
pub use stats::QueueStats;
pub use task::{CoordinatedTask, TaskWindow};
