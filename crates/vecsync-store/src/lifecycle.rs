//! Vectorizer lifecycle: create, drop, enable, disable.
//!
//! Creation is all-or-nothing: config validation runs against the
//! source relation's live columns first, then every schema object and
//! the catalog row are written in one transaction. A failure anywhere
//! rolls the whole thing back, leaving no partial objects.

use rusqlite::OptionalExtension;
use tracing::info;

use crate::errors::{Result, StoreError};
use crate::introspect;
use crate::pool::ConnectionPool;
use crate::queue::QueueRepository;
use crate::registry::VectorizerRegistry;
use crate::schema::{quote_ident, SchemaBuilder};
use crate::types::{VectorizerConfig, VectorizerDefinition};
use vecsync_config::DestinationConfig;
use vecsync_core::{generate_id, now_iso};

/// Parameters for creating a vectorizer.
#[derive(Clone, Debug)]
pub struct CreateVectorizerParams {
    /// Source relation to watch.
    pub source_table: String,
    /// Pipeline configuration.
    pub config: VectorizerConfig,
    /// Unique name; defaults to `<source>_v<seq>`.
    pub name: Option<String>,
    /// Target table name; defaults to `<source>_embedding_store`.
    /// Rejected for column-destination configs.
    pub target_table: Option<String>,
    /// View name; defaults to `<source>_embedding`. Rejected for
    /// column-destination configs.
    pub view_name: Option<String>,
    /// Owning principal; lifecycle operations are restricted to it.
    pub owner: String,
    /// Whether pre-existing source rows are enqueued at creation.
    pub enqueue_existing: bool,
}

impl CreateVectorizerParams {
    /// Minimal parameter set with defaulted names and backfill on.
    pub fn new(source_table: &str, config: VectorizerConfig, owner: &str) -> Self {
        Self {
            source_table: source_table.to_string(),
            config,
            name: None,
            target_table: None,
            view_name: None,
            owner: owner.to_string(),
            enqueue_existing: true,
        }
    }
}

/// Lifecycle operations over a shared connection pool.
pub struct LifecycleManager {
    pool: ConnectionPool,
}

impl LifecycleManager {
    /// Wrap a pool; installs the catalog tables lazily on first use.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Create a vectorizer: validate, provision, register, backfill.
    pub fn create(&self, params: CreateVectorizerParams) -> Result<VectorizerDefinition> {
        let conn = self.pool.get()?;
        VectorizerRegistry::install(&conn)?;

        let schema = introspect::source_schema(&conn, &params.source_table)?;
        let pk = schema
            .primary_key()
            .ok_or_else(|| StoreError::MissingPrimaryKey { table: params.source_table.clone() })?;
        params.config.validate(&schema)?;

        let tx = conn.unchecked_transaction()?;
        let seq = VectorizerRegistry::next_seq(&tx)?;
        let source = &params.source_table;
        let (target_table, view_name) = match params.config.destination {
            DestinationConfig::Table => (
                Some(
                    params
                        .target_table
                        .unwrap_or_else(|| format!("{source}_embedding_store")),
                ),
                Some(params.view_name.unwrap_or_else(|| format!("{source}_embedding"))),
            ),
            DestinationConfig::Column { .. } => {
                if params.target_table.is_some() || params.view_name.is_some() {
                    return Err(StoreError::Provision(
                        "column destination does not generate a target table or view".into(),
                    ));
                }
                (None, None)
            }
        };
        let def = VectorizerDefinition {
            seq,
            id: generate_id("vec"),
            name: params.name.unwrap_or_else(|| format!("{source}_v{seq}")),
            source_table: source.clone(),
            target_table,
            view_name,
            queue_table: format!("_vecsync_q_{seq}"),
            trigger_name: format!("_vecsync_trg_{seq}"),
            owner: params.owner,
            enabled: true,
            source_pk: pk.clone(),
            config: params.config,
            created_at: now_iso(),
        };

        for name in [&def.target_table, &def.view_name].into_iter().flatten() {
            if introspect::object_exists(&tx, name)? {
                return Err(StoreError::Provision(format!("object {name:?} already exists")));
            }
        }

        let builder = SchemaBuilder::new(source, pk);
        if let (Some(target), Some(view)) = (&def.target_table, &def.view_name) {
            tx.execute_batch(&builder.target_table_ddl(target))?;
            tx.execute_batch(&builder.view_ddl(view, target))?;
        } else if let Some(column) = def.config.destination.embedding_column() {
            tx.execute_batch(&builder.add_embedding_column_ddl(column))?;
        }
        tx.execute_batch(&builder.queue_table_ddl(&def.queue_table))?;
        tx.execute_batch(&builder.queue_index_ddl(&def.queue_table))?;
        tx.execute_batch(&builder.insert_trigger_ddl(&def.trigger_name, &def.queue_table))?;
        // In column mode the update trigger watches only the columns
        // that existed before provisioning, so the worker writing the
        // embedding back does not re-enqueue the row.
        let watched: Vec<&str> = if def.config.destination.embedding_column().is_some() {
            schema.column_names()
        } else {
            Vec::new()
        };
        tx.execute_batch(&builder.update_trigger_ddl(
            &def.trigger_name,
            &def.queue_table,
            &watched,
        ))?;

        VectorizerRegistry::insert(&tx, &def)?;

        let backfilled = if params.enqueue_existing {
            tx.execute(&builder.enqueue_existing_sql(&def.queue_table), [])?
        } else {
            0
        };

        tx.commit()?;
        info!(
            vectorizer_id = %def.id,
            name = %def.name,
            source = %def.source_table,
            backfilled,
            "created vectorizer"
        );
        Ok(def)
    }

    /// Drop a vectorizer: triggers, queue table, and catalog row. The
    /// embedding destination (target table and view, or the source
    /// column) is preserved unless `drop_target` is set, so
    /// already-computed embeddings survive a definition teardown.
    pub fn drop_vectorizer(
        &self,
        reference: &str,
        principal: &str,
        drop_target: bool,
    ) -> Result<()> {
        let conn = self.pool.get()?;
        let def = self.owned(&conn, reference, principal)?;

        let tx = conn.unchecked_transaction()?;
        let builder = SchemaBuilder::new(&def.source_table, def.source_pk.clone());
        for ddl in builder.drop_triggers_ddl(&def.trigger_name) {
            tx.execute_batch(&ddl)?;
        }
        tx.execute_batch(&SchemaBuilder::drop_table_ddl(&def.queue_table))?;
        if drop_target {
            if let Some(view) = &def.view_name {
                tx.execute_batch(&SchemaBuilder::drop_view_ddl(view))?;
            }
            if let Some(target) = &def.target_table {
                tx.execute_batch(&SchemaBuilder::drop_table_ddl(target))?;
            }
            if let Some(column) = def.config.destination.embedding_column() {
                // An index over the column blocks DROP COLUMN.
                let index: Option<String> = tx
                    .query_row(
                        "SELECT index_name FROM vectorizer_index WHERE vectorizer_id = ?1",
                        [&def.id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(index) = index {
                    tx.execute_batch(&format!("DROP INDEX IF EXISTS {}", quote_ident(&index)))?;
                }
                tx.execute_batch(&builder.drop_embedding_column_ddl(column))?;
            }
        }
        VectorizerRegistry::delete(&tx, &def.id)?;
        tx.commit()?;
        info!(vectorizer_id = %def.id, name = %def.name, drop_target, "dropped vectorizer");
        Ok(())
    }

    /// Resume processing.
    pub fn enable(&self, reference: &str, principal: &str) -> Result<()> {
        self.set_enabled(reference, principal, true)
    }

    /// Pause processing. The triggers stay installed, so changes keep
    /// accumulating in the queue while disabled.
    pub fn disable(&self, reference: &str, principal: &str) -> Result<()> {
        self.set_enabled(reference, principal, false)
    }

    /// Re-arm queue rows that exhausted their delivery attempts.
    pub fn reset_attempts(&self, reference: &str, principal: &str) -> Result<usize> {
        let conn = self.pool.get()?;
        let def = self.owned(&conn, reference, principal)?;
        let reset = QueueRepository::reset_attempts(&conn, &def)?;
        info!(vectorizer_id = %def.id, reset, "reset queue attempts");
        Ok(reset)
    }

    fn set_enabled(&self, reference: &str, principal: &str, enabled: bool) -> Result<()> {
        let conn = self.pool.get()?;
        let def = self.owned(&conn, reference, principal)?;
        VectorizerRegistry::set_enabled(&conn, &def.id, enabled)?;
        info!(vectorizer_id = %def.id, enabled, "toggled vectorizer");
        Ok(())
    }

    fn owned(
        &self,
        conn: &rusqlite::Connection,
        reference: &str,
        principal: &str,
    ) -> Result<VectorizerDefinition> {
        let def = VectorizerRegistry::resolve(conn, reference)?;
        if def.owner != principal {
            return Err(StoreError::Permission(format!(
                "vectorizer {:?} is owned by {:?}",
                def.name, def.owner
            )));
        }
        Ok(def)
    }
}
