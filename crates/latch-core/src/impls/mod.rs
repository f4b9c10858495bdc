//! Impls - port implementations.
//!
//! # Included
//! - **InMemory\***: single-process stand-ins for every port (development, tests)
//! - **RedisBackend** (feature `redis`): lease, checkpoint, queue and denylist stores
//!   shared by any number of worker processes

pub mod inmem_checkpoint;
pub mod inmem_denylist;
pub mod inmem_lease;
pub mod inmem_queue;
#[cfg(feature = "redis")]
pub mod redis_store;

pub use self::inmem_checkpoint::InMemoryCheckpointBackend;
pub use self::inmem_denylist::InMemoryDenylist;
pub use self::inmem_lease::InMemoryLeaseStore;
pub use self::inmem_queue::InMemoryMessageQueue;
#[cfg(feature = "redis")]
pub use self::redis_store::RedisBackend;
