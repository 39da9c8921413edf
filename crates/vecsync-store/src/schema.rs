//! DDL builder for generated schema objects.
//!
//! All DDL is emitted from a resolved [`PrimaryKeyDescriptor`] through
//! this builder; identifier quoting is centralized in [`quote_ident`]
//! and nothing is ever hard-coded to a fixed key shape.

use vecsync_core::PrimaryKeyDescriptor;

/// Quote an identifier for safe embedding in DDL/DML, doubling any
/// embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Comma-join the quoted key column names.
fn pk_column_list(pk: &PrimaryKeyDescriptor) -> String {
    pk.columns
        .iter()
        .map(|c| quote_ident(&c.name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Emits schema objects for one vectorizer.
#[derive(Clone, Debug)]
pub struct SchemaBuilder {
    source: String,
    pk: PrimaryKeyDescriptor,
}

impl SchemaBuilder {
    /// Create a builder for a source relation and its resolved key.
    pub fn new(source: &str, pk: PrimaryKeyDescriptor) -> Self {
        Self { source: source.to_string(), pk }
    }

    /// The resolved primary key.
    pub fn primary_key(&self) -> &PrimaryKeyDescriptor {
        &self.pk
    }

    /// Target table: surrogate uuid key, copied key columns, chunk
    /// sequence, chunk text, embedding blob. `(key…, chunk_seq)` is
    /// unique and the key columns cascade-delete with the source row.
    pub fn target_table_ddl(&self, target: &str) -> String {
        let key_columns: String = self
            .pk
            .columns
            .iter()
            .map(|c| format!("    {} {} NOT NULL,\n", quote_ident(&c.name), c.decl_type))
            .collect();
        format!(
            "CREATE TABLE {} (\n    embedding_uuid TEXT PRIMARY KEY,\n{key_columns}    \
             chunk_seq INTEGER NOT NULL,\n    chunk TEXT NOT NULL,\n    \
             embedding BLOB NOT NULL,\n    UNIQUE ({pk_list}, chunk_seq),\n    \
             FOREIGN KEY ({pk_list}) REFERENCES {source} ({pk_list}) ON DELETE CASCADE\n)",
            quote_ident(target),
            pk_list = pk_column_list(&self.pk),
            source = quote_ident(&self.source),
        )
    }

    /// Queue table: copied key columns plus enqueue timestamp, attempt
    /// counter, and the lease fields used by claim-based dequeue.
    pub fn queue_table_ddl(&self, queue: &str) -> String {
        let key_columns: String = self
            .pk
            .columns
            .iter()
            .map(|c| format!("    {} {} NOT NULL,\n", quote_ident(&c.name), c.decl_type))
            .collect();
        format!(
            "CREATE TABLE {} (\n    q_id INTEGER PRIMARY KEY AUTOINCREMENT,\n{key_columns}    \
             enqueued_at TEXT NOT NULL,\n    attempts INTEGER NOT NULL DEFAULT 0,\n    \
             leased_by TEXT,\n    leased_until TEXT\n)",
            quote_ident(queue),
        )
    }

    /// Index on the queue's key columns for efficient dequeue/ack.
    pub fn queue_index_ddl(&self, queue: &str) -> String {
        format!(
            "CREATE INDEX {} ON {} ({})",
            quote_ident(&format!("{queue}_pk_idx")),
            quote_ident(queue),
            pk_column_list(&self.pk),
        )
    }

    /// View: source left-joined to target, exposing all source columns
    /// plus `chunk`, `embedding`, `chunk_seq`, and the stable
    /// per-embedding `embedding_uuid`.
    pub fn view_ddl(&self, view: &str, target: &str) -> String {
        let join: String = self
            .pk
            .columns
            .iter()
            .map(|c| format!("t.{col} = s.{col}", col = quote_ident(&c.name)))
            .collect::<Vec<_>>()
            .join(" AND ");
        format!(
            "CREATE VIEW {} AS\nSELECT t.embedding_uuid, t.chunk_seq, t.chunk, t.embedding, s.*\n\
             FROM {} t\nLEFT JOIN {} s ON {join}",
            quote_ident(view),
            quote_ident(target),
            quote_ident(&self.source),
        )
    }

    /// `AFTER INSERT` trigger appending the new row's key to the queue.
    pub fn insert_trigger_ddl(&self, trigger: &str, queue: &str) -> String {
        self.trigger_ddl(&format!("{trigger}_ins"), "INSERT", queue)
    }

    /// `AFTER UPDATE` trigger appending the new row's key to the queue.
    /// A non-empty `watched` list restricts the trigger to those columns
    /// so embedding writes back onto the source row do not re-enqueue it.
    pub fn update_trigger_ddl(&self, trigger: &str, queue: &str, watched: &[&str]) -> String {
        let event = if watched.is_empty() {
            "UPDATE".to_string()
        } else {
            format!(
                "UPDATE OF {}",
                watched.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
            )
        };
        self.trigger_ddl(&format!("{trigger}_upd"), &event, queue)
    }

    fn trigger_ddl(&self, name: &str, event: &str, queue: &str) -> String {
        let new_values: String = self
            .pk
            .columns
            .iter()
            .map(|c| format!("NEW.{}", quote_ident(&c.name)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "CREATE TRIGGER {} AFTER {event} ON {}\nBEGIN\n    \
             INSERT INTO {} ({pk_list}, enqueued_at)\n    \
             VALUES ({new_values}, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'));\nEND",
            quote_ident(name),
            quote_ident(&self.source),
            quote_ident(queue),
            pk_list = pk_column_list(&self.pk),
        )
    }

    /// One-pass enqueue of all pre-existing source rows.
    pub fn enqueue_existing_sql(&self, queue: &str) -> String {
        format!(
            "INSERT INTO {} ({pk_list}, enqueued_at)\n\
             SELECT {pk_list}, strftime('%Y-%m-%dT%H:%M:%fZ', 'now') FROM {}",
            quote_ident(queue),
            quote_ident(&self.source),
            pk_list = pk_column_list(&self.pk),
        )
    }

    /// Index on an embedding column. ANN algorithm parameters are
    /// recorded in the index registry; the DDL itself is what the
    /// storage substrate supports.
    pub fn embedding_index_ddl(&self, table: &str, index_name: &str, column: &str) -> String {
        format!(
            "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
            quote_ident(index_name),
            quote_ident(table),
            quote_ident(column),
        )
    }

    /// Add a nullable embedding column onto the source table
    /// (column-destination mode).
    pub fn add_embedding_column_ddl(&self, column: &str) -> String {
        format!(
            "ALTER TABLE {} ADD COLUMN {} BLOB",
            quote_ident(&self.source),
            quote_ident(column),
        )
    }

    /// Remove the embedding column from the source table.
    pub fn drop_embedding_column_ddl(&self, column: &str) -> String {
        format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_ident(&self.source),
            quote_ident(column),
        )
    }

    /// Drop statements for the trigger pair.
    pub fn drop_triggers_ddl(&self, trigger: &str) -> Vec<String> {
        vec![
            format!("DROP TRIGGER IF EXISTS {}", quote_ident(&format!("{trigger}_ins"))),
            format!("DROP TRIGGER IF EXISTS {}", quote_ident(&format!("{trigger}_upd"))),
        ]
    }

    /// Drop statement for a table.
    pub fn drop_table_ddl(name: &str) -> String {
        format!("DROP TABLE IF EXISTS {}", quote_ident(name))
    }

    /// Drop statement for a view.
    pub fn drop_view_ddl(name: &str) -> String {
        format!("DROP VIEW IF EXISTS {}", quote_ident(name))
    }
}
