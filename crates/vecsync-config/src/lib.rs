//! # vecsync-config
//!
//! Typed descriptions of each pipeline stage: loading, parsing,
//! chunking, formatting, embedding, destination, indexing, scheduling,
//! processing.
//!
//! Each stage config is a closed sum type with an `implementation`
//! discriminant in its JSON form — that JSON is the wire format
//! persisted alongside the vectorizer definition, and the contract any
//! client must produce. Validation is pure and order-independent: every
//! config is checked against a snapshot of the source relation's live
//! columns before any schema object is created.

#![deny(unsafe_code)]

pub mod chunking;
pub mod destination;
pub mod embedding;
pub mod errors;
pub mod formatting;
pub mod indexing;
pub mod loading;
pub mod processing;
pub mod scheduling;

pub use chunking::ChunkingConfig;
pub use destination::DestinationConfig;
pub use embedding::EmbeddingConfig;
pub use errors::{ConfigError, Result};
pub use formatting::{FormattingConfig, CHUNK_PLACEHOLDER};
pub use indexing::IndexingConfig;
pub use loading::{LoadingConfig, ParsingConfig};
pub use processing::ProcessingConfig;
pub use scheduling::SchedulingConfig;
