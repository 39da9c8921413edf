//! The vectorizer definition catalog.
//!
//! Every operation takes a borrowed connection so the lifecycle layer
//! can compose catalog writes with schema provisioning in a single
//! transaction.

use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::errors::{Result, StoreError};
use crate::types::VectorizerDefinition;

/// Catalog access for vectorizer definitions.
pub struct VectorizerRegistry;

const CATALOG_DDL: &str = "
CREATE TABLE IF NOT EXISTS vectorizer (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL UNIQUE,
    source_table TEXT NOT NULL,
    target_table TEXT,
    view_name TEXT,
    queue_table TEXT NOT NULL,
    trigger_name TEXT NOT NULL,
    owner TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 1,
    source_pk TEXT NOT NULL,
    config TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS vectorizer_errors (
    err_id INTEGER PRIMARY KEY AUTOINCREMENT,
    vectorizer_id TEXT NOT NULL,
    recorded_at TEXT NOT NULL,
    message TEXT NOT NULL,
    details TEXT
);
CREATE INDEX IF NOT EXISTS vectorizer_errors_vec_idx
    ON vectorizer_errors (vectorizer_id, recorded_at);
CREATE TABLE IF NOT EXISTS vectorizer_index (
    vectorizer_id TEXT PRIMARY KEY,
    index_name TEXT NOT NULL,
    params TEXT NOT NULL,
    created_at TEXT NOT NULL
);
";

const SELECT_COLUMNS: &str = "seq, id, name, source_table, target_table, view_name, \
                              queue_table, trigger_name, owner, enabled, source_pk, \
                              config, created_at";

impl VectorizerRegistry {
    /// Create the catalog tables if they do not exist.
    pub fn install(conn: &Connection) -> Result<()> {
        conn.execute_batch(CATALOG_DDL)?;
        Ok(())
    }

    /// Allocate the next sequence number. Callers hold a write
    /// transaction, so the read-then-insert is race-free.
    pub fn next_seq(conn: &Connection) -> Result<i64> {
        let seq: i64 = conn.query_row(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM vectorizer",
            [],
            |row| row.get(0),
        )?;
        Ok(seq)
    }

    /// Insert a fully-built definition.
    pub fn insert(conn: &Connection, def: &VectorizerDefinition) -> Result<()> {
        conn.execute(
            "INSERT INTO vectorizer (seq, id, name, source_table, target_table, view_name, \
             queue_table, trigger_name, owner, enabled, source_pk, config, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                def.seq,
                def.id,
                def.name,
                def.source_table,
                def.target_table,
                def.view_name,
                def.queue_table,
                def.trigger_name,
                def.owner,
                def.enabled,
                serde_json::to_string(&def.source_pk)?,
                serde_json::to_string(&def.config)?,
                def.created_at,
            ],
        )?;
        Ok(())
    }

    /// Look up by stable ID.
    pub fn get_by_id(conn: &Connection, id: &str) -> Result<VectorizerDefinition> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM vectorizer WHERE id = ?1");
        conn.query_row(&query, [id], Self::map_row)
            .optional()?
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Look up by unique name.
    pub fn get_by_name(conn: &Connection, name: &str) -> Result<VectorizerDefinition> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM vectorizer WHERE name = ?1");
        conn.query_row(&query, [name], Self::map_row)
            .optional()?
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Resolve an ID-or-name reference, trying ID first.
    pub fn resolve(conn: &Connection, reference: &str) -> Result<VectorizerDefinition> {
        match Self::get_by_id(conn, reference) {
            Err(StoreError::NotFound(_)) => Self::get_by_name(conn, reference),
            other => other,
        }
    }

    /// All definitions in creation order.
    pub fn list(conn: &Connection) -> Result<Vec<VectorizerDefinition>> {
        let query = format!("SELECT {SELECT_COLUMNS} FROM vectorizer ORDER BY seq");
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([], Self::map_row)?;
        let mut defs = Vec::new();
        for row in rows {
            defs.push(row??);
        }
        Ok(defs)
    }

    /// Enabled definitions only, in creation order.
    pub fn list_enabled(conn: &Connection) -> Result<Vec<VectorizerDefinition>> {
        Ok(Self::list(conn)?.into_iter().filter(|d| d.enabled).collect())
    }

    /// Flip the enabled flag.
    pub fn set_enabled(conn: &Connection, id: &str, enabled: bool) -> Result<()> {
        let updated = conn.execute(
            "UPDATE vectorizer SET enabled = ?2 WHERE id = ?1",
            params![id, enabled],
        )?;
        if updated == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    /// Remove a definition and its error and index records.
    pub fn delete(conn: &Connection, id: &str) -> Result<()> {
        conn.execute("DELETE FROM vectorizer_errors WHERE vectorizer_id = ?1", [id])?;
        conn.execute("DELETE FROM vectorizer_index WHERE vectorizer_id = ?1", [id])?;
        let deleted = conn.execute("DELETE FROM vectorizer WHERE id = ?1", [id])?;
        if deleted == 0 {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }

    // Row → definition; JSON decode failures surface as a nested Result
    // because rusqlite's mapper can only fail with rusqlite errors.
    fn map_row(row: &Row<'_>) -> rusqlite::Result<Result<VectorizerDefinition>> {
        let source_pk: String = row.get(10)?;
        let config: String = row.get(11)?;
        Ok((|| {
            Ok(VectorizerDefinition {
                seq: row.get(0)?,
                id: row.get(1)?,
                name: row.get(2)?,
                source_table: row.get(3)?,
                target_table: row.get(4)?,
                view_name: row.get(5)?,
                queue_table: row.get(6)?,
                trigger_name: row.get(7)?,
                owner: row.get(8)?,
                enabled: row.get(9)?,
                source_pk: serde_json::from_str(&source_pk)?,
                config: serde_json::from_str(&config)?,
                created_at: row.get(12)?,
            })
        })())
    }
}
