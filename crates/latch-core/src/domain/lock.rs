//! Lock names and lease tokens.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::errors::CoordError;

/// Name of a protected resource. Globally unique per resource, never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LockName(String);

impl LockName {
    pub fn new(name: impl Into<String>) -> Result<Self, CoordError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CoordError::InvalidArgument("lock name must not be empty".into()));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LockName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Opaque lease token issued by the lease store.
///
/// Only the store interprets it. `Display` and `Debug` print the redacted
/// form so tokens never reach logs in full.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseToken(String);

impl LeaseToken {
    const VISIBLE_CHARS: usize = 8;

    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Full token, for handing back to the store.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// First few characters followed by an ellipsis.
    pub fn redacted(&self) -> String {
        let mut chars = self.0.chars();
        let head: String = chars.by_ref().take(Self::VISIBLE_CHARS).collect();
        if chars.next().is_some() {
            format!("{head}…")
        } else {
            head
        }
    }
}

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LeaseToken").field(&self.redacted()).finish()
    }
}
