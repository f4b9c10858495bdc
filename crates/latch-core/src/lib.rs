//! latch-core
//!
//! Coordination layer for workers that share remote stores: distributed
//! leases, task checkpoints, queue publishing and one-time seeding.
//!
//! # Modules
//! - **domain**: data model (ids, lock names, checkpoints, messages, outcomes, errors)
//! - **ports**: traits over every external collaborator (LeaseStore, CheckpointBackend, MessageQueue, ...)
//! - **impls**: in-memory ports, and a Redis backend behind the `redis` feature
//! - **app**: DistributedLock, CheckpointStore, QueuePublisher, Coordinator, DenylistSeeder, config

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
