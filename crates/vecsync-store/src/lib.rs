//! # vecsync-store
//!
//! `SQLite` storage for the vectorizer engine:
//!
//! - **[`pool`]**: `r2d2` connection pool with WAL mode, foreign keys,
//!   and busy-timeout pragmas.
//! - **[`introspect`]**: live source-relation metadata resolution.
//! - **[`schema`]**: DDL builder emitting target/queue/view/trigger
//!   schemas from a resolved primary-key descriptor.
//! - **[`registry`]**: the vectorizer definition catalog.
//! - **[`queue`]**: the trigger-fed change queue with lease-based
//!   claiming.
//! - **[`target`]**: idempotent chunk-set writes.
//! - **[`errors_log`]**: the append-only failure record.
//! - **[`status`]**: the read-only monitoring surface.
//! - **[`lifecycle`]**: create / drop / enable / disable.

#![deny(unsafe_code)]

pub mod errors;
pub mod errors_log;
pub mod introspect;
pub mod lifecycle;
pub mod pool;
pub mod queue;
pub mod registry;
pub mod schema;
pub mod status;
pub mod target;
pub mod types;
pub mod values;

pub use errors::{Result, StoreError};
pub use errors_log::{ErrorRecord, ErrorRepository};
pub use lifecycle::{CreateVectorizerParams, LifecycleManager};
pub use pool::{ConnectionPool, PooledConnection};
pub use queue::{ClaimedEntry, QueueRepository};
pub use registry::VectorizerRegistry;
pub use schema::SchemaBuilder;
pub use status::{all_statuses, vectorizer_status, VectorizerStatus, PENDING_ITEMS_CAP};
pub use target::{decode_embedding, encode_embedding, ChunkRecord, TargetRepository};
pub use types::{VectorizerConfig, VectorizerDefinition};
