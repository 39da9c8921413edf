//! The per-key processing pipeline: load, parse, chunk, format, embed,
//! write.
//!
//! One invocation handles one source row end to end. The target write
//! replaces the row's whole chunk set atomically, so a crash between
//! claim and ack can only cause reprocessing, never a half-written or
//! duplicated chunk set.

use std::collections::BTreeMap;
use std::sync::Arc;

use rusqlite::params_from_iter;
use vecsync_config::{LoadingConfig, ParsingConfig};
use vecsync_core::PkValues;
use vecsync_embeddings::{EmbeddingError, EmbeddingProvider};
use vecsync_store::schema::quote_ident;
use vecsync_store::values::pk_to_sql;
use vecsync_store::{ChunkRecord, ConnectionPool, TargetRepository, VectorizerDefinition};

use crate::chunker::Chunker;
use crate::errors::{Result, WorkerError};
use crate::formatter::Formatter;
use crate::loader::{DocumentLoader, DocumentParser, PassthroughParser};

/// What processing one key amounted to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Chunks were embedded and written.
    Embedded {
        /// Number of chunks written.
        chunks: usize,
    },
    /// The payload was NULL or chunked to nothing; existing embeddings
    /// for the key were removed.
    Cleared,
    /// The source row no longer exists; nothing to do (cascade already
    /// removed its embeddings).
    SourceGone,
}

/// Raw payload as read from the source row.
enum Payload {
    Missing,
    Text(String),
    Bytes(Vec<u8>),
}

/// One vectorizer's processing pipeline.
pub struct Pipeline {
    def: Arc<VectorizerDefinition>,
    provider: Arc<dyn EmbeddingProvider>,
    loader: Option<Arc<dyn DocumentLoader>>,
    parser: Arc<dyn DocumentParser>,
    chunker: Chunker,
    formatter: Formatter,
}

impl Pipeline {
    /// Build a pipeline for a definition, resolving the formatter's
    /// column set against the live source schema. Without a registered
    /// parser, binary payloads under `auto` parsing are decoded as
    /// UTF-8.
    pub fn new(
        pool: &ConnectionPool,
        def: VectorizerDefinition,
        provider: Arc<dyn EmbeddingProvider>,
        loader: Option<Arc<dyn DocumentLoader>>,
        parser: Option<Arc<dyn DocumentParser>>,
    ) -> Result<Self> {
        let conn = pool.get().map_err(vecsync_store::StoreError::from)?;
        let schema = vecsync_store::introspect::source_schema(&conn, &def.source_table)?;
        let formatter = Formatter::new(&def.config.formatting, &schema);
        let chunker = Chunker::new(&def.config.chunking);
        Ok(Self {
            def: Arc::new(def),
            provider,
            loader,
            parser: parser.unwrap_or_else(|| Arc::new(PassthroughParser)),
            chunker,
            formatter,
        })
    }

    /// The definition this pipeline serves.
    pub fn definition(&self) -> &VectorizerDefinition {
        &self.def
    }

    /// Process one source row end to end.
    pub async fn process_key(&self, pool: &ConnectionPool, pk: &PkValues) -> Result<KeyOutcome> {
        // Read phase: no connection is held across an await.
        let row = {
            let conn = pool.get().map_err(vecsync_store::StoreError::from)?;
            self.fetch_row(&conn, pk)?
        };
        let Some(row) = row else {
            return Ok(KeyOutcome::SourceGone);
        };

        let text = match self.load_payload(&row).await? {
            Payload::Missing => return self.clear(pool, pk),
            Payload::Text(text) => self.parse_text(text),
            Payload::Bytes(bytes) => self.parse_bytes(&bytes).await?,
        };

        let chunks = self.chunker.chunk(&text);
        if chunks.is_empty() {
            return self.clear(pool, pk);
        }

        let display = display_values(&row);
        let formatted: Vec<String> =
            chunks.iter().map(|c| self.formatter.render(c, &display)).collect();

        let vectors = self.embed_batched(&formatted).await?;
        let records: Vec<ChunkRecord> = formatted
            .into_iter()
            .zip(vectors)
            .map(|(chunk, embedding)| ChunkRecord { chunk, embedding })
            .collect();

        {
            let conn = pool.get().map_err(vecsync_store::StoreError::from)?;
            if self.def.config.destination.embedding_column().is_some() {
                // Column mode: chunking "none" guarantees one record.
                TargetRepository::write_column_embedding(
                    &conn,
                    &self.def,
                    pk,
                    records.first().map(|r| r.embedding.as_slice()),
                )?;
            } else {
                TargetRepository::replace_chunk_set(&conn, &self.def, pk, &records)?;
            }
        }
        Ok(KeyOutcome::Embedded { chunks: records.len() })
    }

    fn clear(&self, pool: &ConnectionPool, pk: &PkValues) -> Result<KeyOutcome> {
        let conn = pool.get().map_err(vecsync_store::StoreError::from)?;
        if self.def.config.destination.embedding_column().is_some() {
            TargetRepository::write_column_embedding(&conn, &self.def, pk, None)?;
        } else {
            TargetRepository::replace_chunk_set(&conn, &self.def, pk, &[])?;
        }
        Ok(KeyOutcome::Cleared)
    }

    fn fetch_row(
        &self,
        conn: &rusqlite::Connection,
        pk: &PkValues,
    ) -> Result<Option<Vec<(String, rusqlite::types::Value)>>> {
        let pk_match: Vec<String> = self
            .def
            .source_pk
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ?{}", quote_ident(&c.name), i + 1))
            .collect();
        let query = format!(
            "SELECT * FROM {} WHERE {}",
            quote_ident(&self.def.source_table),
            pk_match.join(" AND "),
        );
        let mut stmt = conn.prepare(&query).map_err(vecsync_store::StoreError::from)?;
        let names: Vec<String> = stmt.column_names().iter().map(ToString::to_string).collect();
        let values = pk_to_sql(pk)?;
        let mut rows = stmt
            .query(params_from_iter(values))
            .map_err(vecsync_store::StoreError::from)?;
        let Some(row) = rows.next().map_err(vecsync_store::StoreError::from)? else {
            return Ok(None);
        };
        let mut out = Vec::with_capacity(names.len());
        for (i, name) in names.into_iter().enumerate() {
            let value: rusqlite::types::Value = row
                .get_ref(i)
                .map_err(vecsync_store::StoreError::from)?
                .into();
            out.push((name, value));
        }
        Ok(Some(out))
    }

    async fn load_payload(
        &self,
        row: &[(String, rusqlite::types::Value)],
    ) -> Result<Payload> {
        use rusqlite::types::Value;

        let column = self.def.config.loading.column_name();
        let value = row
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
            .ok_or_else(|| WorkerError::Load(format!("column {column:?} missing from row")))?;

        match (&self.def.config.loading, value) {
            (_, Value::Null) => Ok(Payload::Missing),
            (LoadingConfig::Column { .. }, Value::Text(s)) => Ok(Payload::Text(s.clone())),
            (LoadingConfig::Column { .. }, Value::Blob(b)) => Ok(Payload::Bytes(b.clone())),
            (LoadingConfig::Column { .. }, Value::Integer(i)) => {
                Ok(Payload::Text(i.to_string()))
            }
            (LoadingConfig::Column { .. }, Value::Real(f)) => Ok(Payload::Text(f.to_string())),
            (LoadingConfig::Uri { .. }, Value::Text(uri)) => {
                let loader = self.loader.as_ref().ok_or_else(|| {
                    WorkerError::Load("no document loader registered for uri loading".into())
                })?;
                Ok(Payload::Bytes(loader.load(uri).await?))
            }
            (LoadingConfig::Uri { .. }, _) => {
                Err(WorkerError::Load(format!("uri column {column:?} is not text")))
            }
        }
    }

    fn parse_text(&self, text: String) -> String {
        // Already text; both parsing modes pass it through.
        text
    }

    async fn parse_bytes(&self, bytes: &[u8]) -> Result<String> {
        match self.def.config.parsing {
            ParsingConfig::Auto => self.parser.parse(bytes).await,
            ParsingConfig::None => Err(WorkerError::Parse(
                "payload is not text and parsing is disabled".into(),
            )),
        }
    }

    async fn embed_batched(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = self.provider.max_batch_size().max(1);
        let dims = self.provider.dimensions();
        let mut vectors = Vec::with_capacity(texts.len());
        for window in texts.chunks(batch) {
            let mut batch_vectors = self.provider.embed(window).await?;
            if batch_vectors.len() != window.len() {
                return Err(EmbeddingError::ResponseMismatch(format!(
                    "sent {} texts, got {} vectors",
                    window.len(),
                    batch_vectors.len()
                ))
                .into());
            }
            if let Some(bad) = batch_vectors.iter().find(|v| v.len() != dims) {
                return Err(EmbeddingError::ResponseMismatch(format!(
                    "expected {dims} dimensions, got {}",
                    bad.len()
                ))
                .into());
            }
            vectors.append(&mut batch_vectors);
        }
        Ok(vectors)
    }
}

fn display_values(row: &[(String, rusqlite::types::Value)]) -> BTreeMap<String, String> {
    use rusqlite::types::Value;
    row.iter()
        .map(|(name, value)| {
            let display = match value {
                Value::Null | Value::Blob(_) => String::new(),
                Value::Integer(i) => i.to_string(),
                Value::Real(f) => f.to_string(),
                Value::Text(s) => s.clone(),
            };
            (name.clone(), display)
        })
        .collect()
}
