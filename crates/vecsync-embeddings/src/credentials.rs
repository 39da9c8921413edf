//! Credential resolution.
//!
//! API keys are resolved by name from the environment at provider
//! construction time and never persisted with the vectorizer
//! definition.

use tracing::debug;

use crate::errors::{EmbeddingError, Result};

/// Resolve an API key from the environment variable with this name.
/// Only the name is ever logged.
pub fn resolve_api_key(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => {
            debug!(name, "resolved credential from environment");
            Ok(value)
        }
        _ => Err(EmbeddingError::MissingCredential { name: name.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_errors() {
        let err = resolve_api_key("VECSYNC_TEST_KEY_THAT_DOES_NOT_EXIST").unwrap_err();
        assert!(matches!(err, EmbeddingError::MissingCredential { .. }));
    }

    #[test]
    fn present_variable_resolves() {
        // PATH is always set wherever tests run; mutating the process
        // environment from a test is not thread-safe.
        assert!(resolve_api_key("PATH").is_ok());
    }
}
