//! Config validation error types.
//!
//! All config errors are fatal and raised synchronously at definition
//! time, before any schema object exists.

use thiserror::Error;

/// Errors from validating a pipeline stage config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A referenced column does not exist on the source relation.
    #[error("column {column:?} does not exist on {table:?}")]
    MissingColumn {
        /// The missing column.
        column: String,
        /// The source relation.
        table: String,
    },

    /// The source relation has a column whose name collides with a
    /// reserved name (e.g. the chunk placeholder).
    #[error("source column {column:?} collides with a reserved name")]
    ReservedColumn {
        /// The colliding column.
        column: String,
    },

    /// A column that provisioning would add already exists on the
    /// source relation.
    #[error("column {column:?} already exists on {table:?}")]
    ColumnExists {
        /// The colliding column.
        column: String,
        /// The source relation.
        table: String,
    },

    /// A numeric parameter is outside its allowed range.
    #[error("{param}: {detail}")]
    OutOfRange {
        /// Parameter name.
        param: &'static str,
        /// What was wrong.
        detail: String,
    },

    /// A formatting template is malformed.
    #[error("invalid template: {0}")]
    InvalidTemplate(String),

    /// Config JSON could not be parsed.
    #[error("config JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for config operations.
pub type Result<T> = std::result::Result<T, ConfigError>;
