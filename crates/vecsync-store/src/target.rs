//! Idempotent writes to the embedding destination.
//!
//! In table mode a source row's chunk set is replaced atomically: stale
//! tail chunks (from a previous, longer chunking) are deleted and each
//! surviving `(key, chunk_seq)` slot is upserted in place, keeping its
//! `embedding_uuid` stable across re-embeddings. Replaying the same
//! write is a no-op beyond refreshed chunk text and vectors. In column
//! mode the single embedding is written back onto the source row.

use rusqlite::{params_from_iter, Connection};
use vecsync_core::{generate_id, PkValues};

use crate::errors::{Result, StoreError};
use crate::schema::quote_ident;
use crate::types::VectorizerDefinition;
use crate::values::pk_to_sql;

/// One chunk ready to persist.
#[derive(Clone, Debug)]
pub struct ChunkRecord {
    /// Rendered chunk text (after formatting).
    pub chunk: String,
    /// Embedding vector.
    pub embedding: Vec<f32>,
}

/// Encode an embedding as a little-endian `f32` blob.
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(embedding.len() * 4);
    for lane in embedding {
        bytes.extend_from_slice(&lane.to_le_bytes());
    }
    bytes
}

/// Decode a little-endian `f32` blob back into an embedding.
pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Write access to one vectorizer's generated target table.
pub struct TargetRepository;

impl TargetRepository {
    /// Atomically replace the chunk set for one source row (table mode).
    pub fn replace_chunk_set(
        conn: &Connection,
        def: &VectorizerDefinition,
        pk: &PkValues,
        chunks: &[ChunkRecord],
    ) -> Result<()> {
        let Some(target) = &def.target_table else {
            return Err(StoreError::Provision("vectorizer has no target table".into()));
        };
        let target = quote_ident(target);
        let pk_cols: Vec<String> =
            def.source_pk.columns.iter().map(|c| quote_ident(&c.name)).collect();
        let pk_match: Vec<String> = pk_cols
            .iter()
            .enumerate()
            .map(|(i, col)| format!("{col} = ?{}", i + 1))
            .collect();
        let pk_values = pk_to_sql(pk)?;

        let tx = conn.unchecked_transaction()?;

        // Drop stale tail slots from a previously longer chunking.
        let delete = format!(
            "DELETE FROM {target} WHERE {} AND chunk_seq >= ?{}",
            pk_match.join(" AND "),
            pk_values.len() + 1,
        );
        {
            let mut values = pk_values.clone();
            values.push(rusqlite::types::Value::Integer(chunks.len() as i64));
            tx.execute(&delete, params_from_iter(values))?;
        }

        // Upsert each slot; the conflict path keeps embedding_uuid.
        let n = pk_values.len();
        let upsert = format!(
            "INSERT INTO {target} (embedding_uuid, {}, chunk_seq, chunk, embedding) \
             VALUES (?{}, {}, ?{}, ?{}, ?{}) \
             ON CONFLICT ({}, chunk_seq) DO UPDATE SET \
             chunk = excluded.chunk, embedding = excluded.embedding",
            pk_cols.join(", "),
            n + 1,
            (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", "),
            n + 2,
            n + 3,
            n + 4,
            pk_cols.join(", "),
        );
        {
            let mut stmt = tx.prepare(&upsert)?;
            for (seq, record) in chunks.iter().enumerate() {
                let mut values = pk_values.clone();
                values.push(rusqlite::types::Value::Text(generate_id("emb")));
                values.push(rusqlite::types::Value::Integer(seq as i64));
                values.push(rusqlite::types::Value::Text(record.chunk.clone()));
                values.push(rusqlite::types::Value::Blob(encode_embedding(&record.embedding)));
                stmt.execute(params_from_iter(values))?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Write one source row's embedding into the source-table column
    /// (column mode). `None` clears the column, which is how a row whose
    /// document went empty loses its stale vector.
    pub fn write_column_embedding(
        conn: &Connection,
        def: &VectorizerDefinition,
        pk: &PkValues,
        embedding: Option<&[f32]>,
    ) -> Result<()> {
        let Some(column) = def.config.destination.embedding_column() else {
            return Err(StoreError::Provision("vectorizer has no embedding column".into()));
        };
        let pk_match: Vec<String> = def
            .source_pk
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", quote_ident(&c.name), i + 2))
            .collect();
        let update = format!(
            "UPDATE {} SET {} = ?1 WHERE {}",
            quote_ident(&def.source_table),
            quote_ident(column),
            pk_match.join(" AND "),
        );
        let mut values = vec![match embedding {
            Some(vector) => rusqlite::types::Value::Blob(encode_embedding(vector)),
            None => rusqlite::types::Value::Null,
        }];
        values.extend(pk_to_sql(pk)?);
        conn.execute(&update, params_from_iter(values))?;
        Ok(())
    }

    /// Embedding rows written so far: target-table rows in table mode,
    /// populated embedding columns in column mode.
    pub fn row_count(conn: &Connection, def: &VectorizerDefinition) -> Result<i64> {
        let query = match (&def.target_table, def.config.destination.embedding_column()) {
            (Some(target), _) => format!("SELECT count(*) FROM {}", quote_ident(target)),
            (None, Some(column)) => format!(
                "SELECT count(*) FROM {} WHERE {} IS NOT NULL",
                quote_ident(&def.source_table),
                quote_ident(column),
            ),
            (None, None) => return Ok(0),
        };
        Ok(conn.query_row(&query, [], |row| row.get(0))?)
    }
}
