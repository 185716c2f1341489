//! Error types for listsync-core

use thiserror::Error;

use crate::config::ConfigError;
use crate::remote::RemoteError;

/// Result type alias using listsync-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a listsync operation.
///
/// Per-row failures while applying changes are not represented here; they are
/// recorded on the affected [`crate::ChangeRecord`] instead.
#[derive(Error, Debug)]
pub enum Error {
    /// A key column or mapped field is absent from a table's field set
    #[error("Schema error: {0}")]
    Schema(String),

    /// Inputs that cannot be reconciled (e.g. an empty key column list)
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal invariant was violated before any remote call was issued
    #[error("Reconciliation error: {0}")]
    Reconciliation(String),

    /// Remote store failure outside the per-row apply phase
    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub fn schema(message: impl Into<String>) -> Self {
        Self::Schema(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn reconciliation(message: impl Into<String>) -> Self {
        Self::Reconciliation(message.into())
    }
}
