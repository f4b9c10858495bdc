//! Outcome model: the expected, non-exceptional results of backend primitives.
//!
//! Contention and "already there" are routine in a multi-worker deployment, so
//! they are variants callers match on rather than errors they catch.

use serde::{Deserialize, Serialize};

use super::lock::LeaseToken;

/// Result of an atomic "acquire if free" on a lease record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The lease is ours until it expires or is released.
    Acquired(LeaseToken),

    /// Another holder owns a valid lease.
    Conflict,
}

impl AcquireOutcome {
    pub fn is_acquired(&self) -> bool {
        matches!(self, AcquireOutcome::Acquired(_))
    }
}

/// Result of releasing a lease by token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,

    /// The token no longer matches: the lease expired, was released, or was
    /// taken over by someone else.
    Conflict,
}

/// Result of a create-if-absent on any durable record (lock record,
/// checkpoint, queue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateOutcome {
    Created,
    AlreadyExists,
}

impl CreateOutcome {
    pub fn was_created(self) -> bool {
        matches!(self, CreateOutcome::Created)
    }
}
