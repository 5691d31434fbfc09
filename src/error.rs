use thiserror::Error;

use crate::types::NamespacePath;

/// Convenience result type for import operations.
pub type ImportResult<T> = Result<T, ImportError>;

/// Convenience result type for calls against a [`crate::store::DocumentStore`].
pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a document store client.
///
/// Clients classify failures into these variants at the boundary so that callers never need to
/// inspect message text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Timeout, refused connection or an overloaded server. Safe to retry.
    #[error("transient store failure: {0}")]
    Transient(String),

    /// The resource being created is already present (e.g. a concurrent creator won the race).
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store rejected the request itself (bad statement, unsupported operation, bad document).
    #[error("rejected by store: {0}")]
    Structural(String),

    /// Authentication/authorization or other failures that retrying will not fix.
    #[error("fatal store failure: {0}")]
    Fatal(String),
}

impl StoreError {
    /// Returns `true` if the failure is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Returns `true` if the failure means the target already exists.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// Error type returned by the import pipeline.
#[derive(Debug, Error)]
pub enum ImportError {
    /// Underlying I/O error (e.g. file not found, permission denied).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid JSON in a dataset or configuration file.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV report export error.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// A store call failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// The input does not have a shape the importer understands.
    #[error("malformed input: {message}")]
    Structural { message: String },

    /// Every creation strategy for a namespace path failed.
    #[error("could not provision '{path}' after {attempts} strategies: {last_error}")]
    Provisioning {
        path: NamespacePath,
        attempts: usize,
        last_error: StoreError,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    Config { message: String },
}

impl ImportError {
    pub(crate) fn structural(message: impl Into<String>) -> Self {
        Self::Structural {
            message: message.into(),
        }
    }
}
