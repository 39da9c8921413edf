//! Embedding error types.
//!
//! Provider failures are per-key, recorded and retried by the worker;
//! rate limits are surfaced distinctly so operators can tune batch size
//! and concurrency.

use thiserror::Error;

/// Errors from embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// The provider rejected or failed the request.
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider rate-limited the request.
    #[error("rate limited{}", retry_after_hint(.retry_after_secs))]
    RateLimited {
        /// Provider-suggested wait, if any.
        retry_after_secs: Option<u64>,
    },

    /// A named credential could not be resolved from the environment.
    #[error("credential {name:?} is not set")]
    MissingCredential {
        /// The environment variable name.
        name: String,
    },

    /// The configured implementation has no registered client.
    #[error("no provider client registered for implementation {0:?}")]
    UnsupportedImplementation(String),

    /// The provider returned the wrong number or width of vectors.
    #[error("provider response mismatch: {0}")]
    ResponseMismatch(String),
}

fn retry_after_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs.map_or_else(String::new, |s| format!(" (retry after {s}s)"))
}

/// Result alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;
