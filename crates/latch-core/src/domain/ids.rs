//! Domain identifiers (strongly-typed IDs).
//!
//! Identifiers are ULIDs wrapped in a phantom-typed `Id<T>`:
//! - **sortable by time**: the timestamp sits in the high bits
//! - **generated without coordination**: any worker can mint one
//! - **type-safe**: a `CorrelationId` cannot be passed where a `LeaseId` is expected

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// Marker trait for each identifier kind.
///
/// Supplies the prefix used by `Display` (`"corr-"`, `"lease-"`).
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// Generic ULID-backed identifier.
///
/// `T` is zero-sized; it only exists at compile time.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

/// Marker for correlation ids (one per coordinated run / published work item).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Correlation {}

impl IdMarker for Correlation {
    fn prefix() -> &'static str {
        "corr-"
    }
}

/// Marker for lease ids minted by stores that issue their own tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Lease {}

impl IdMarker for Lease {
    fn prefix() -> &'static str {
        "lease-"
    }
}

/// Identifier tying a run and the work items it produced together.
pub type CorrelationId = Id<Correlation>;

/// Identifier of one granted lease.
pub type LeaseId = Id<Lease>;
