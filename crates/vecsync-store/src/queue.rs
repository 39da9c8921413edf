//! The trigger-fed change queue.
//!
//! Dequeue is lease-based: a claim stamps `leased_by`/`leased_until` on
//! a batch of rows and returns them, so a crashed worker's rows become
//! claimable again once the lease expires without any recovery step.
//! Acking deletes only the claimed row IDs, never every row for the
//! key, so a change that arrives while the key is being processed stays
//! queued and is re-embedded on the next pass.

use chrono::{Duration, Utc};
use rusqlite::{params_from_iter, Connection};
use vecsync_core::PkValues;

use crate::errors::Result;
use crate::schema::quote_ident;
use crate::status::PENDING_ITEMS_CAP;
use crate::types::VectorizerDefinition;
use crate::values::sql_to_json;

/// One claimed queue row.
#[derive(Clone, Debug, PartialEq)]
pub struct ClaimedEntry {
    /// Queue row ID; acked or failed individually.
    pub q_id: i64,
    /// Source-row key values in key order.
    pub pk: PkValues,
    /// Delivery attempts so far (before this claim).
    pub attempts: i64,
}

/// Queue access for one vectorizer's generated queue table.
pub struct QueueRepository;

fn iso_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

fn iso_in(seconds: i64) -> String {
    (Utc::now() + Duration::seconds(seconds))
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

fn id_list(q_ids: &[i64]) -> String {
    q_ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl QueueRepository {
    /// Claim up to `limit` rows for `worker_id`, leasing them for
    /// `lease_secs`. Rows whose lease has expired are reclaimed; rows
    /// that have exhausted `max_attempts` are skipped. Oldest first.
    pub fn claim(
        conn: &Connection,
        def: &VectorizerDefinition,
        worker_id: &str,
        limit: usize,
        lease_secs: i64,
        max_attempts: u32,
    ) -> Result<Vec<ClaimedEntry>> {
        let queue = quote_ident(&def.queue_table);
        let pk_cols: Vec<String> =
            def.source_pk.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let query = format!(
            "UPDATE {queue} SET leased_by = ?1, leased_until = ?2 \
             WHERE q_id IN (\
                 SELECT q_id FROM {queue} \
                 WHERE (leased_until IS NULL OR leased_until < ?3) AND attempts < ?4 \
                 ORDER BY enqueued_at, q_id LIMIT ?5) \
             RETURNING q_id, attempts, {}",
            pk_cols.join(", "),
        );

        let mut stmt = conn.prepare(&query)?;
        let mut rows = stmt.query(rusqlite::params![
            worker_id,
            iso_in(lease_secs),
            iso_now(),
            max_attempts,
            limit as i64,
        ])?;

        let mut claimed = Vec::new();
        while let Some(row) = rows.next()? {
            let mut pk = PkValues::with_capacity(pk_cols.len());
            for i in 0..pk_cols.len() {
                pk.push(sql_to_json(row.get_ref(2 + i)?)?);
            }
            claimed.push(ClaimedEntry { q_id: row.get(0)?, pk, attempts: row.get(1)? });
        }
        // Claims are unordered within the UPDATE; restore age order.
        claimed.sort_by_key(|e| e.q_id);
        Ok(claimed)
    }

    /// Delete successfully processed rows.
    pub fn ack(conn: &Connection, def: &VectorizerDefinition, q_ids: &[i64]) -> Result<()> {
        if q_ids.is_empty() {
            return Ok(());
        }
        let query = format!(
            "DELETE FROM {} WHERE q_id IN ({})",
            quote_ident(&def.queue_table),
            id_list(q_ids),
        );
        conn.execute(&query, [])?;
        Ok(())
    }

    /// Record a failed delivery: bump the attempt counter and push the
    /// lease out by `backoff_secs`, so the retry lands on a later pass
    /// instead of the same drain loop burning every attempt at once.
    pub fn fail(
        conn: &Connection,
        def: &VectorizerDefinition,
        q_ids: &[i64],
        backoff_secs: i64,
    ) -> Result<()> {
        if q_ids.is_empty() {
            return Ok(());
        }
        let query = format!(
            "UPDATE {} SET attempts = attempts + 1, leased_by = NULL, leased_until = ?1 \
             WHERE q_id IN ({})",
            quote_ident(&def.queue_table),
            id_list(q_ids),
        );
        conn.execute(&query, [iso_in(backoff_secs)])?;
        Ok(())
    }

    /// Release rows after a provider rate limit: push the lease out by
    /// `backoff_secs` without counting an attempt.
    pub fn release_rate_limited(
        conn: &Connection,
        def: &VectorizerDefinition,
        q_ids: &[i64],
        backoff_secs: i64,
    ) -> Result<()> {
        if q_ids.is_empty() {
            return Ok(());
        }
        let query = format!(
            "UPDATE {} SET leased_by = NULL, leased_until = ?1 WHERE q_id IN ({})",
            quote_ident(&def.queue_table),
            id_list(q_ids),
        );
        conn.execute(&query, [iso_in(backoff_secs)])?;
        Ok(())
    }

    /// Re-arm rows that exhausted their attempts.
    pub fn reset_attempts(conn: &Connection, def: &VectorizerDefinition) -> Result<usize> {
        let query = format!(
            "UPDATE {} SET attempts = 0, leased_by = NULL, leased_until = NULL \
             WHERE attempts > 0",
            quote_ident(&def.queue_table),
        );
        Ok(conn.execute(&query, [])?)
    }

    /// Queue depth, capped at [`PENDING_ITEMS_CAP`] + 1 so the count
    /// never scans an unbounded backlog. A result above the cap means
    /// "more than the cap".
    pub fn pending_count(conn: &Connection, def: &VectorizerDefinition) -> Result<i64> {
        let query = format!(
            "SELECT count(*) FROM (SELECT 1 FROM {} LIMIT {})",
            quote_ident(&def.queue_table),
            PENDING_ITEMS_CAP + 1,
        );
        Ok(conn.query_row(&query, [], |row| row.get(0))?)
    }

    /// Exact queue depth; scans the whole backlog.
    pub fn pending_count_exact(conn: &Connection, def: &VectorizerDefinition) -> Result<i64> {
        let query = format!("SELECT count(*) FROM {}", quote_ident(&def.queue_table));
        Ok(conn.query_row(&query, [], |row| row.get(0))?)
    }

    /// Rows that exhausted their delivery attempts and await
    /// [`Self::reset_attempts`].
    pub fn exhausted_count(
        conn: &Connection,
        def: &VectorizerDefinition,
        max_attempts: u32,
    ) -> Result<i64> {
        let query = format!(
            "SELECT count(*) FROM {} WHERE attempts >= ?1",
            quote_ident(&def.queue_table),
        );
        Ok(conn.query_row(&query, [max_attempts], |row| row.get(0))?)
    }

    /// Enqueue rows directly (used by tests and backfill paths that
    /// bypass the triggers).
    pub fn enqueue(
        conn: &Connection,
        def: &VectorizerDefinition,
        pk: &PkValues,
    ) -> Result<()> {
        let pk_cols: Vec<String> =
            def.source_pk.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let placeholders: Vec<String> =
            (1..=pk.len()).map(|i| format!("?{i}")).collect();
        let query = format!(
            "INSERT INTO {} ({}, enqueued_at) VALUES ({}, '{}')",
            quote_ident(&def.queue_table),
            pk_cols.join(", "),
            placeholders.join(", "),
            iso_now(),
        );
        let values = crate::values::pk_to_sql(pk)?;
        conn.execute(&query, params_from_iter(values))?;
        Ok(())
    }
}
