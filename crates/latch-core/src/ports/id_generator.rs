//! IdGenerator port - identifier minting.
//!
//! Behind a trait so a `FixedClock` gives deterministic timestamps in tests.

use ulid::Ulid;

use crate::domain::ids::{CorrelationId, LeaseId};
use crate::ports::Clock;

/// Mints ids usable across any number of workers without coordination.
pub trait IdGenerator: Send + Sync {
    fn generate_correlation_id(&self) -> CorrelationId;

    fn generate_lease_id(&self) -> LeaseId;
}

/// ULID-based generator: timestamp from the clock, entropy from `rand`.
#[derive(Debug, Clone)]
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }

    fn next_ulid(&self) -> Ulid {
        let timestamp_ms = self.clock.now().timestamp_millis() as u64;
        Ulid::from_parts(timestamp_ms, rand::random())
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_correlation_id(&self) -> CorrelationId {
        CorrelationId::from(self.next_ulid())
    }

    fn generate_lease_id(&self) -> LeaseId {
        LeaseId::from(self.next_ulid())
    }
}
