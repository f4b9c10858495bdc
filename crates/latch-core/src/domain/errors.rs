//! Errors - error types and their operational classification.
//!
//! Routine outcomes (lease conflict, record already exists) are NOT errors;
//! they are variants in `domain::outcome`. Everything here
//! is something a caller has to decide about.

use std::path::PathBuf;

use thiserror::Error;

/// Operational classification of a failure.
///
/// - Transient: the backend may recover; retrying is reasonable
/// - Permanent: retrying the same call will fail the same way
/// - Cancelled: the caller's cancellation token fired
/// - Configuration: startup settings are missing or invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Permanent,
    Cancelled,
    Configuration,
}

/// Failure reported by a backend port.
///
/// Conflicts are not represented here: ports return them as outcome variants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Unavailable(_) | StoreError::Other(_) => ErrorKind::Transient,
            StoreError::PermissionDenied(_) | StoreError::NotFound(_) | StoreError::Corrupt(_) => {
                ErrorKind::Permanent
            }
        }
    }
}

/// Missing or invalid startup settings.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("required setting {key} is not set")]
    Missing { key: &'static str },

    #[error("setting {key}={value:?} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Error surfaced by the coordination components.
#[derive(Debug, Error)]
pub enum CoordError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{operation} failed for {target}")]
    Store {
        operation: &'static str,
        target: String,
        #[source]
        source: StoreError,
    },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },

    #[error("failed to serialize message")]
    Serialization(#[from] serde_json::Error),

    #[error("task {task} failed")]
    TaskFailed {
        task: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("failed to read seed source {}", path.display())]
    SeedSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write seed completion marker {marker}")]
    MarkerWrite {
        marker: String,
        #[source]
        source: Box<CoordError>,
    },

    #[error("{failed} of {total} messages failed to publish")]
    BatchPublish {
        failed: usize,
        total: usize,
        #[source]
        source: Box<CoordError>,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("background task failed")]
    Join(#[from] tokio::task::JoinError),
}

impl CoordError {
    pub(crate) fn store(operation: &'static str, target: impl Into<String>, source: StoreError) -> Self {
        CoordError::Store {
            operation,
            target: target.into(),
            source,
        }
    }

    /// Classification used by top-level code to pick retry or abort.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoordError::Store { source, .. } => source.kind(),
            CoordError::Cancelled { .. } => ErrorKind::Cancelled,
            CoordError::Config(_) => ErrorKind::Configuration,
            CoordError::MarkerWrite { source, .. } | CoordError::BatchPublish { source, .. } => {
                source.kind()
            }
            CoordError::TaskFailed { .. } | CoordError::Join(_) => ErrorKind::Transient,
            CoordError::InvalidArgument(_)
            | CoordError::Serialization(_)
            | CoordError::SeedSource { .. } => ErrorKind::Permanent,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
