//! # vecsync-embeddings
//!
//! The embedding provider seam. Concrete HTTP provider clients are
//! external collaborators; this crate defines the narrow async
//! interface the worker drives, a deterministic hash-based provider for
//! tests and offline runs, and credential resolution by environment
//! variable name.

#![deny(unsafe_code)]

pub mod credentials;
pub mod errors;
pub mod normalize;
pub mod provider;

pub use credentials::resolve_api_key;
pub use errors::{EmbeddingError, Result};
pub use provider::{default_provider_factory, EmbeddingProvider, HashEmbedder, ProviderFactory};
