//! One-shot ANN index policy.
//!
//! The index is created once per vectorizer, when the target table has
//! grown past the configured row threshold and (optionally) the work
//! queue is empty. Creation is recorded in the `vectorizer_index`
//! catalog table together with the algorithm parameters the policy was
//! configured with, so later tooling can tell what the index was built
//! as.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::info;
use vecsync_core::now_iso;
use vecsync_store::{
    QueueRepository, Result, SchemaBuilder, TargetRepository, VectorizerDefinition,
    VectorizerRegistry,
};

/// Why the policy did or did not create an index this pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexDecision {
    /// No index is configured.
    NotConfigured,
    /// An index already exists for this vectorizer.
    AlreadyCreated,
    /// The target has not reached the row threshold yet.
    BelowThreshold,
    /// Waiting for the queue to drain first.
    QueueNotEmpty,
    /// The index was created this pass.
    Created,
}

/// Evaluates and applies the index policy.
pub struct IndexPolicyManager;

impl IndexPolicyManager {
    /// Evaluate the policy for one vectorizer, creating the index if
    /// every condition holds.
    pub fn ensure_index(
        conn: &Connection,
        def: &VectorizerDefinition,
    ) -> Result<IndexDecision> {
        let Some(min_rows) = def.config.indexing.min_rows() else {
            return Ok(IndexDecision::NotConfigured);
        };

        let existing: Option<String> = conn
            .query_row(
                "SELECT index_name FROM vectorizer_index WHERE vectorizer_id = ?1",
                [&def.id],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            return Ok(IndexDecision::AlreadyCreated);
        }

        let rows = TargetRepository::row_count(conn, def)?;
        if rows < min_rows as i64 {
            return Ok(IndexDecision::BelowThreshold);
        }

        if def.config.indexing.create_when_queue_empty()
            && QueueRepository::pending_count(conn, def)? > 0
        {
            return Ok(IndexDecision::QueueNotEmpty);
        }

        // Table mode indexes the generated store; column mode indexes
        // the embedding column on the source table itself.
        let (table, column) = match (&def.target_table, def.config.destination.embedding_column())
        {
            (Some(target), _) => (target.as_str(), "embedding"),
            (None, Some(col)) => (def.source_table.as_str(), col),
            (None, None) => return Ok(IndexDecision::NotConfigured),
        };
        let index_name = format!("{table}_{column}_idx");
        let builder = SchemaBuilder::new(&def.source_table, def.source_pk.clone());
        conn.execute_batch(&builder.embedding_index_ddl(table, &index_name, column))?;
        conn.execute(
            "INSERT INTO vectorizer_index (vectorizer_id, index_name, params, created_at) \
             VALUES (?1, ?2, ?3, ?4)",
            params![
                def.id,
                index_name,
                serde_json::to_string(&def.config.indexing)?,
                now_iso(),
            ],
        )?;
        info!(vectorizer_id = %def.id, index = %index_name, "created embedding index");
        Ok(IndexDecision::Created)
    }

    /// Evaluate the policy for every enabled vectorizer.
    pub fn ensure_all(conn: &Connection) -> Result<Vec<(String, IndexDecision)>> {
        VectorizerRegistry::list_enabled(conn)?
            .iter()
            .map(|def| Ok((def.id.clone(), Self::ensure_index(conn, def)?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vecsync_config::IndexingConfig;
    use vecsync_store::pool::new_in_memory;
    use vecsync_store::{ChunkRecord, CreateVectorizerParams, LifecycleManager, VectorizerConfig};

    fn config(indexing: serde_json::Value) -> VectorizerConfig {
        serde_json::from_value(json!({
            "loading": { "implementation": "column", "column_name": "body" },
            "embedding": { "implementation": "hash", "dimensions": 2 },
            "indexing": indexing,
        }))
        .unwrap()
    }

    fn setup(indexing: serde_json::Value) -> (LifecycleManager, VectorizerDefinition) {
        let pool = new_in_memory().unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch("CREATE TABLE docs (id INTEGER PRIMARY KEY, body TEXT)").unwrap();
        }
        let mgr = LifecycleManager::new(pool);
        let mut params = CreateVectorizerParams::new("docs", config(indexing), "alice");
        params.enqueue_existing = false;
        let def = mgr.create(params).unwrap();
        (mgr, def)
    }

    fn fill_target(mgr: &LifecycleManager, def: &VectorizerDefinition, rows: i64) {
        let conn = mgr.pool().get().unwrap();
        for i in 0..rows {
            conn.execute("INSERT OR IGNORE INTO docs VALUES (?1, 'b')", [i]).unwrap();
            let record = ChunkRecord { chunk: "c".into(), embedding: vec![0.0, 1.0] };
            TargetRepository::replace_chunk_set(&conn, def, &vec![json!(i)], &[record]).unwrap();
        }
    }

    fn index_exists(conn: &Connection, name: &str) -> bool {
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type = 'index' AND name = ?1",
                [name],
                |row| row.get(0),
            )
            .unwrap();
        count > 0
    }

    #[test]
    fn no_policy_no_index() {
        let (mgr, def) = setup(json!({ "implementation": "none" }));
        let conn = mgr.pool().get().unwrap();
        assert_eq!(
            IndexPolicyManager::ensure_index(&conn, &def).unwrap(),
            IndexDecision::NotConfigured
        );
    }

    #[test]
    fn waits_for_row_threshold() {
        let (mgr, def) = setup(json!({ "implementation": "hnsw", "min_rows": 5 }));
        fill_target(&mgr, &def, 3);
        let conn = mgr.pool().get().unwrap();
        assert_eq!(
            IndexPolicyManager::ensure_index(&conn, &def).unwrap(),
            IndexDecision::BelowThreshold
        );

        drop(conn);
        fill_target(&mgr, &def, 5);
        let conn = mgr.pool().get().unwrap();
        assert_eq!(
            IndexPolicyManager::ensure_index(&conn, &def).unwrap(),
            IndexDecision::Created
        );
        assert!(index_exists(
            &conn,
            &format!("{}_embedding_idx", def.target_table.as_deref().unwrap())
        ));
    }

    #[test]
    fn creation_is_one_shot() {
        let (mgr, def) = setup(json!({ "implementation": "hnsw", "min_rows": 1 }));
        fill_target(&mgr, &def, 2);
        let conn = mgr.pool().get().unwrap();
        assert_eq!(
            IndexPolicyManager::ensure_index(&conn, &def).unwrap(),
            IndexDecision::Created
        );
        assert_eq!(
            IndexPolicyManager::ensure_index(&conn, &def).unwrap(),
            IndexDecision::AlreadyCreated
        );
    }

    #[test]
    fn defers_until_queue_empty() {
        let (mgr, def) = setup(json!({
            "implementation": "diskann",
            "min_rows": 1,
            "create_when_queue_empty": true,
        }));
        fill_target(&mgr, &def, 2);
        {
            let conn = mgr.pool().get().unwrap();
            QueueRepository::enqueue(&conn, &def, &vec![json!(0)]).unwrap();
            assert_eq!(
                IndexPolicyManager::ensure_index(&conn, &def).unwrap(),
                IndexDecision::QueueNotEmpty
            );
            let claimed = QueueRepository::claim(&conn, &def, "w", 10, 60, 6).unwrap();
            let ids: Vec<i64> = claimed.iter().map(|e| e.q_id).collect();
            QueueRepository::ack(&conn, &def, &ids).unwrap();
        }
        let conn = mgr.pool().get().unwrap();
        assert_eq!(
            IndexPolicyManager::ensure_index(&conn, &def).unwrap(),
            IndexDecision::Created
        );
    }

    #[test]
    fn column_destination_indexes_the_source_column() {
        let pool = new_in_memory().unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "CREATE TABLE docs (id INTEGER PRIMARY KEY, body TEXT);\
                 INSERT INTO docs VALUES (1, 'b');",
            )
            .unwrap();
        }
        let mgr = LifecycleManager::new(pool);
        let config: VectorizerConfig = serde_json::from_value(json!({
            "loading": { "implementation": "column", "column_name": "body" },
            "embedding": { "implementation": "hash", "dimensions": 2 },
            "chunking": { "implementation": "none" },
            "destination": { "implementation": "column", "embedding_column": "vec" },
            "indexing": { "implementation": "hnsw", "min_rows": 1 },
        }))
        .unwrap();
        let def = mgr.create(CreateVectorizerParams::new("docs", config, "alice")).unwrap();

        let conn = mgr.pool().get().unwrap();
        TargetRepository::write_column_embedding(&conn, &def, &vec![json!(1)], Some(&[0.0, 1.0]))
            .unwrap();
        let claimed = QueueRepository::claim(&conn, &def, "w", 10, 60, 6).unwrap();
        let ids: Vec<i64> = claimed.iter().map(|e| e.q_id).collect();
        QueueRepository::ack(&conn, &def, &ids).unwrap();

        assert_eq!(
            IndexPolicyManager::ensure_index(&conn, &def).unwrap(),
            IndexDecision::Created
        );
        assert!(index_exists(&conn, "docs_vec_idx"));
    }

    #[test]
    fn records_algorithm_params() {
        let (mgr, def) = setup(json!({
            "implementation": "hnsw",
            "min_rows": 1,
            "m": 32,
            "create_when_queue_empty": false,
        }));
        fill_target(&mgr, &def, 1);
        let conn = mgr.pool().get().unwrap();
        let _ = IndexPolicyManager::ensure_index(&conn, &def).unwrap();

        let params: String = conn
            .query_row(
                "SELECT params FROM vectorizer_index WHERE vectorizer_id = ?1",
                [&def.id],
                |row| row.get(0),
            )
            .unwrap();
        let parsed: IndexingConfig = serde_json::from_str(&params).unwrap();
        assert!(matches!(parsed, IndexingConfig::Hnsw { m: 32, .. }));
    }
}
