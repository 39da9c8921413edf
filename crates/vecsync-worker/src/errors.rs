//! Worker error types.
//!
//! Failures are per-key: one poisoned row is recorded and retried
//! without stopping the batch. Rate limits are not failures and never
//! consume a delivery attempt.

use thiserror::Error;
use vecsync_embeddings::EmbeddingError;
use vecsync_store::StoreError;

/// Errors from pipeline and worker operations.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Storage failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Embedding provider failure.
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// The document could not be loaded.
    #[error("load failed: {0}")]
    Load(String),

    /// The loaded payload could not be parsed into text.
    #[error("parse failed: {0}")]
    Parse(String),
}

impl WorkerError {
    /// Whether this failure is a provider rate limit, which defers the
    /// work instead of consuming a delivery attempt.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::Embedding(EmbeddingError::RateLimited { .. }))
    }

    /// Provider-suggested backoff, if the provider gave one.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            Self::Embedding(EmbeddingError::RateLimited { retry_after_secs }) => {
                *retry_after_secs
            }
            _ => None,
        }
    }
}

/// Result alias for worker operations.
pub type Result<T> = std::result::Result<T, WorkerError>;
