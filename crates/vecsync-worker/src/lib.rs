//! # vecsync-worker
//!
//! The embedding worker: claims batches from each enabled vectorizer's
//! change queue, runs the load / parse / chunk / format / embed / write
//! pipeline per source row, and acks or retries. Processing is
//! crash-safe by construction: claims are leases, target writes are
//! idempotent, and acks come last.

#![deny(unsafe_code)]

pub mod chunker;
pub mod errors;
pub mod formatter;
pub mod loader;
pub mod pipeline;
pub mod worker;

pub use chunker::Chunker;
pub use errors::{Result, WorkerError};
pub use formatter::Formatter;
pub use loader::{DocumentLoader, DocumentParser, PassthroughParser};
pub use pipeline::{KeyOutcome, Pipeline};
pub use worker::{RunStats, Worker, WorkerConfig};
