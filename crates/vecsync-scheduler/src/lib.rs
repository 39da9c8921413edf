//! # vecsync-scheduler
//!
//! Interval-based scheduling of vectorizer processing and the one-shot
//! ANN index policy. The scheduler owns no processing logic of its own:
//! it decides *when* a vectorizer's queue is drained and delegates the
//! draining to the worker.

#![deny(unsafe_code)]

pub mod indexing;
pub mod scheduler;

pub use indexing::{IndexDecision, IndexPolicyManager};
pub use scheduler::{Scheduler, SchedulerConfig};
