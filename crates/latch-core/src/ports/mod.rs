//! Ports - abstraction layer over every external collaborator.
//!
//! Each trait is a seam where a real backend (Redis, a cloud table/queue
//! service, a database) or an in-memory stand-in plugs in.
//!
//! # Principles
//! - the backend is the source of truth for leases, checkpoints and queued messages
//! - all serialization between workers is delegated to backend atomic primitives
//! - expected conflicts are outcome variants; `StoreError` means the backend is broken

pub mod checkpoint_store;
pub mod clock;
pub mod denylist;
pub mod id_generator;
pub mod lease_store;
pub mod message_queue;

pub use self::checkpoint_store::CheckpointBackend;
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::denylist::{DenylistEntry, DenylistRepository};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::lease_store::LeaseStore;
pub use self::message_queue::MessageQueue;
