//! # vecsync-core
//!
//! Shared types for the vecsync vectorizer engine: primary-key
//! descriptors resolved from live catalog metadata, source schema
//! snapshots used for config validation, and ID/timestamp helpers.

#![deny(unsafe_code)]

pub mod ids;
pub mod types;

pub use ids::{generate_id, now_iso};
pub use types::{ColumnInfo, PkColumn, PkValues, PrimaryKeyDescriptor, SourceSchemaInfo};
