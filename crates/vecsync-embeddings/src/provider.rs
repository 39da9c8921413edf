//! Embedding provider trait, factory, and deterministic test provider.

use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use vecsync_config::EmbeddingConfig;

use crate::credentials::resolve_api_key;
use crate::errors::{EmbeddingError, Result};
use crate::normalize::l2_normalize;

/// Trait for embedding batches of formatted chunk text into vectors.
///
/// One vector is returned per input text, order-preserving. Callers
/// must respect [`EmbeddingProvider::max_batch_size`].
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Output embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Largest batch the provider accepts in one request.
    fn max_batch_size(&self) -> usize {
        64
    }
}

impl std::fmt::Debug for dyn EmbeddingProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingProvider").field("dimensions", &self.dimensions()).finish()
    }
}

/// Builds a provider instance from a persisted embedding config.
///
/// Concrete HTTP clients (OpenAI, Ollama, …) are external collaborators
/// registered by the embedding host; the engine only depends on this
/// factory shape.
pub type ProviderFactory =
    Arc<dyn Fn(&EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync>;

/// The built-in factory: supports the `hash` implementation and
/// verifies credentials exist for HTTP implementations before failing
/// with [`EmbeddingError::UnsupportedImplementation`].
pub fn default_provider_factory() -> ProviderFactory {
    Arc::new(|config: &EmbeddingConfig| match config {
        EmbeddingConfig::Hash { dimensions } => {
            debug!(dimensions, "building hash embedding provider");
            Ok(Arc::new(HashEmbedder::new(*dimensions)) as Arc<dyn EmbeddingProvider>)
        }
        EmbeddingConfig::Openai { api_key_name, .. } => {
            // Fail on the missing credential first so the operator sees
            // the actionable error even without a registered client.
            let _ = resolve_api_key(api_key_name)?;
            warn!("openai embedding config has no registered client");
            Err(EmbeddingError::UnsupportedImplementation("openai".into()))
        }
        EmbeddingConfig::Ollama { .. } => {
            warn!("ollama embedding config has no registered client");
            Err(EmbeddingError::UnsupportedImplementation("ollama".into()))
        }
    })
}

/// Deterministic embedding provider backed by SHA-256.
///
/// Hashes each input text and expands the digest into a unit vector, so
/// identical text always embeds identically. Used by tests and by the
/// `hash` embedding implementation for offline runs.
pub struct HashEmbedder {
    dims: usize,
}

impl HashEmbedder {
    /// Create a provider with the given output dimensions.
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        let hash = hasher.finalize();

        let mut v: Vec<f32> = (0..self.dims)
            .map(|i| {
                let byte_idx = i % hash.len();
                // Map byte to [-1, 1] range, perturbed by position so
                // dims beyond 32 are not a pure repeat of the digest.
                let byte = f32::from(hash[byte_idx]);
                let lane = (i / hash.len()) as f32;
                (byte / 127.5) - 1.0 + lane * 1e-3
            })
            .collect();

        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.hash_to_vector(t)).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::l2_norm;

    #[tokio::test]
    async fn hash_embedder_correct_shape() {
        let provider = HashEmbedder::new(64);
        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let vectors = provider.embed(&texts).await.unwrap();
        assert_eq!(vectors.len(), 3);
        for v in &vectors {
            assert_eq!(v.len(), 64);
            assert!((l2_norm(v) - 1.0).abs() < 1e-5);
        }
    }

    #[tokio::test]
    async fn hash_embedder_deterministic() {
        let provider = HashEmbedder::new(32);
        let a = provider.embed(&["same text".to_string()]).await.unwrap();
        let b = provider.embed(&["same text".to_string()]).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn hash_embedder_distinguishes_inputs() {
        let provider = HashEmbedder::new(32);
        let vectors = provider
            .embed(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_ne!(vectors[0], vectors[1]);
    }

    #[tokio::test]
    async fn hash_embedder_empty_batch() {
        let provider = HashEmbedder::new(32);
        let vectors = provider.embed(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[test]
    fn factory_builds_hash_provider() {
        let factory = default_provider_factory();
        let provider = factory(&EmbeddingConfig::Hash { dimensions: 16 }).unwrap();
        assert_eq!(provider.dimensions(), 16);
    }

    #[test]
    fn factory_rejects_unregistered_http_provider() {
        let factory = default_provider_factory();
        let config = EmbeddingConfig::Ollama {
            model: "nomic-embed-text".into(),
            dimensions: 768,
            base_url: "http://localhost:11434".into(),
        };
        let err = factory(&config).unwrap_err();
        assert!(matches!(err, EmbeddingError::UnsupportedImplementation(_)));
    }

    #[test]
    fn factory_surfaces_missing_openai_credential() {
        let factory = default_provider_factory();
        let config = EmbeddingConfig::Openai {
            model: "text-embedding-3-small".into(),
            dimensions: 768,
            api_key_name: "VECSYNC_FACTORY_TEST_MISSING_KEY".into(),
        };
        let err = factory(&config).unwrap_err();
        assert!(matches!(err, EmbeddingError::MissingCredential { .. }));
    }
}
