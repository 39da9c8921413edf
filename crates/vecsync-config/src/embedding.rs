//! Embedding stage config.
//!
//! Provider clients themselves are external collaborators; this config
//! only names the implementation, model, output dimensions, and how to
//! resolve credentials (by environment variable name, never inline).

use serde::{Deserialize, Serialize};
use vecsync_core::SourceSchemaInfo;

use crate::errors::{ConfigError, Result};

fn default_openai_key_name() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

/// Which embedding provider produces the vectors, and at what width.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "implementation", rename_all = "snake_case")]
pub enum EmbeddingConfig {
    /// OpenAI-compatible HTTP provider.
    Openai {
        /// Model name, e.g. `text-embedding-3-small`.
        model: String,
        /// Output vector dimensions.
        dimensions: usize,
        /// Environment variable holding the API key.
        #[serde(default = "default_openai_key_name")]
        api_key_name: String,
    },
    /// Local Ollama provider.
    Ollama {
        /// Model name.
        model: String,
        /// Output vector dimensions.
        dimensions: usize,
        /// Base URL of the Ollama server.
        #[serde(default = "default_ollama_base_url")]
        base_url: String,
    },
    /// Deterministic hash-based embedder, for tests and offline use.
    Hash {
        /// Output vector dimensions.
        dimensions: usize,
    },
}

impl EmbeddingConfig {
    /// Output vector dimensions.
    pub fn dimensions(&self) -> usize {
        match self {
            Self::Openai { dimensions, .. }
            | Self::Ollama { dimensions, .. }
            | Self::Hash { dimensions } => *dimensions,
        }
    }

    /// Validate parameter ranges.
    pub fn validate(&self, _source: &SourceSchemaInfo) -> Result<()> {
        if self.dimensions() == 0 {
            return Err(ConfigError::OutOfRange {
                param: "dimensions",
                detail: "must be greater than zero".into(),
            });
        }
        if let Self::Openai { model, .. } | Self::Ollama { model, .. } = self {
            if model.is_empty() {
                return Err(ConfigError::OutOfRange {
                    param: "model",
                    detail: "must not be empty".into(),
                });
            }
        }
        Ok(())
    }
}
