//! Store error types.

use thiserror::Error;

/// Errors from storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `SQLite` error (preserves source chain).
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Persisted JSON could not be (de)serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stage config failed validation.
    #[error(transparent)]
    Config(#[from] vecsync_config::ConfigError),

    /// Schema provisioning failed; the transaction was rolled back and
    /// no partial objects remain.
    #[error("provisioning failed: {0}")]
    Provision(String),

    /// The source relation has no declared primary key.
    #[error("source relation {table:?} has no primary key")]
    MissingPrimaryKey {
        /// The source relation.
        table: String,
    },

    /// No vectorizer with this ID or name exists.
    #[error("vectorizer {0:?} not found")]
    NotFound(String),

    /// The caller is not the owning principal.
    #[error("permission denied: {0}")]
    Permission(String),

    /// A primary-key value has a type the queue cannot carry.
    #[error("unsupported key value: {0}")]
    UnsupportedKeyValue(String),
}

/// Result alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
