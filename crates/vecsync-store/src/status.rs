//! Read-only monitoring surface.

use rusqlite::Connection;
use serde::Serialize;

use crate::errors::Result;
use crate::errors_log::ErrorRepository;
use crate::queue::QueueRepository;
use crate::registry::VectorizerRegistry;
use crate::target::TargetRepository;

/// Queue-depth reporting cap. Counting stops one past this bound so a
/// deep backlog never costs a full scan; a capped report means "at
/// least this many".
pub const PENDING_ITEMS_CAP: i64 = 10_000;

/// Point-in-time health snapshot for one vectorizer.
#[derive(Clone, Debug, Serialize)]
pub struct VectorizerStatus {
    /// Stable vectorizer ID.
    pub id: String,
    /// Unique name.
    pub name: String,
    /// Source relation.
    pub source_table: String,
    /// Whether the worker loop processes this vectorizer.
    pub enabled: bool,
    /// Queued changes, capped at [`PENDING_ITEMS_CAP`] unless the
    /// exact count was requested.
    pub pending_items: i64,
    /// Whether `pending_items` hit the cap.
    pub pending_capped: bool,
    /// Queue rows that exhausted their delivery attempts.
    pub exhausted_items: i64,
    /// Embeddings written so far: target-table rows in table mode,
    /// populated source columns in column mode.
    pub embedding_count: i64,
    /// Failures recorded over the vectorizer's lifetime.
    pub error_count: i64,
}

/// Compute the status snapshot for one vectorizer by ID or name.
/// `exact` opts into a full backlog scan instead of the capped count.
pub fn vectorizer_status(
    conn: &Connection,
    reference: &str,
    exact: bool,
) -> Result<VectorizerStatus> {
    let def = VectorizerRegistry::resolve(conn, reference)?;
    let raw_pending = if exact {
        QueueRepository::pending_count_exact(conn, &def)?
    } else {
        QueueRepository::pending_count(conn, &def)?
    };
    let pending_capped = !exact && raw_pending > PENDING_ITEMS_CAP;
    let max_attempts = def.config.processing.max_attempts;
    Ok(VectorizerStatus {
        pending_items: if exact { raw_pending } else { raw_pending.min(PENDING_ITEMS_CAP) },
        pending_capped,
        exhausted_items: QueueRepository::exhausted_count(conn, &def, max_attempts)?,
        embedding_count: TargetRepository::row_count(conn, &def)?,
        error_count: ErrorRepository::count(conn, &def.id)?,
        id: def.id,
        name: def.name,
        source_table: def.source_table,
        enabled: def.enabled,
    })
}

/// Status snapshots for every registered vectorizer.
pub fn all_statuses(conn: &Connection, exact: bool) -> Result<Vec<VectorizerStatus>> {
    VectorizerRegistry::list(conn)?
        .into_iter()
        .map(|def| vectorizer_status(conn, &def.id, exact))
        .collect()
}
