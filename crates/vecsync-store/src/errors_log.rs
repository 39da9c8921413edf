//! Append-only failure record.
//!
//! Every failed processing attempt is recorded here with the key values
//! and error detail as JSON, so a backlog of poisoned rows can be
//! diagnosed without log archaeology. Rows are never updated.

use rusqlite::{params, Connection, Row};
use vecsync_core::now_iso;

use crate::errors::Result;

/// One recorded failure.
#[derive(Clone, Debug)]
pub struct ErrorRecord {
    /// Append sequence.
    pub err_id: i64,
    /// Owning vectorizer ID.
    pub vectorizer_id: String,
    /// When the failure was recorded (ISO 8601).
    pub recorded_at: String,
    /// Human-readable message.
    pub message: String,
    /// Structured detail (key values, stage, attempt count).
    pub details: Option<serde_json::Value>,
}

/// Access to the shared `vectorizer_errors` catalog table.
pub struct ErrorRepository;

impl ErrorRepository {
    /// Append a failure record.
    pub fn record(
        conn: &Connection,
        vectorizer_id: &str,
        message: &str,
        details: Option<&serde_json::Value>,
    ) -> Result<()> {
        let details_json = details.map(serde_json::to_string).transpose()?;
        conn.execute(
            "INSERT INTO vectorizer_errors (vectorizer_id, recorded_at, message, details) \
             VALUES (?1, ?2, ?3, ?4)",
            params![vectorizer_id, now_iso(), message, details_json],
        )?;
        Ok(())
    }

    /// Most recent failures for one vectorizer, newest first.
    pub fn list_recent(
        conn: &Connection,
        vectorizer_id: &str,
        limit: usize,
    ) -> Result<Vec<ErrorRecord>> {
        let mut stmt = conn.prepare(
            "SELECT err_id, vectorizer_id, recorded_at, message, details \
             FROM vectorizer_errors WHERE vectorizer_id = ?1 \
             ORDER BY err_id DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![vectorizer_id, limit as i64], Self::map_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row??);
        }
        Ok(records)
    }

    /// Total failures recorded for one vectorizer.
    pub fn count(conn: &Connection, vectorizer_id: &str) -> Result<i64> {
        Ok(conn.query_row(
            "SELECT count(*) FROM vectorizer_errors WHERE vectorizer_id = ?1",
            [vectorizer_id],
            |row| row.get(0),
        )?)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Result<ErrorRecord>> {
        let details: Option<String> = row.get(4)?;
        Ok((|| {
            Ok(ErrorRecord {
                err_id: row.get(0)?,
                vectorizer_id: row.get(1)?,
                recorded_at: row.get(2)?,
                message: row.get(3)?,
                details: details.as_deref().map(serde_json::from_str).transpose()?,
            })
        })())
    }
}
