//! The worker loop: claim, process, ack.
//!
//! Exactly-once delivery per (source row, chunk) comes from the
//! claim/ack shape, not from any in-process state: a claim leases queue
//! rows, processing writes the target idempotently, and only then are
//! the claimed rows acked. A crash anywhere in between leaves the lease
//! to expire and the key to be reprocessed.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use vecsync_core::{generate_id, PkValues};
use vecsync_embeddings::ProviderFactory;
use vecsync_store::{
    ConnectionPool, ErrorRepository, QueueRepository, StoreError, VectorizerDefinition,
    VectorizerRegistry,
};

use crate::errors::{Result, WorkerError};
use crate::loader::{DocumentLoader, DocumentParser};
use crate::pipeline::{KeyOutcome, Pipeline};

/// Worker loop settings.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Identity stamped on claimed queue rows.
    pub worker_id: String,
    /// Sleep between polling passes.
    pub poll_interval: Duration,
    /// How long a claim holds its rows before they become reclaimable.
    pub lease_secs: i64,
    /// Backoff applied after a rate limit when the provider gives no
    /// retry hint.
    pub rate_limit_backoff_secs: i64,
    /// Only process this vectorizer (ID or name); all when unset.
    pub vectorizer: Option<String>,
    /// Overrides each vectorizer's configured processing concurrency.
    pub concurrency: Option<usize>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            worker_id: generate_id("worker"),
            poll_interval: Duration::from_secs(300),
            lease_secs: 300,
            rate_limit_backoff_secs: 60,
            vectorizer: None,
            concurrency: None,
        }
    }
}

/// Counters for one processing pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Keys embedded.
    pub embedded: usize,
    /// Keys whose embeddings were cleared (NULL or vanished payload).
    pub cleared: usize,
    /// Keys that failed and were left for retry.
    pub failed: usize,
    /// Whether a provider rate limit cut the pass short.
    pub rate_limited: bool,
}

impl RunStats {
    fn absorb(&mut self, other: RunStats) {
        self.embedded += other.embedded;
        self.cleared += other.cleared;
        self.failed += other.failed;
        self.rate_limited |= other.rate_limited;
    }
}

/// Processes the change queues of all enabled vectorizers.
pub struct Worker {
    pool: ConnectionPool,
    factory: ProviderFactory,
    loader: Option<Arc<dyn DocumentLoader>>,
    parser: Option<Arc<dyn DocumentParser>>,
    config: WorkerConfig,
    cancel: CancellationToken,
}

impl Worker {
    /// Create a worker over a pool and provider factory.
    pub fn new(pool: ConnectionPool, factory: ProviderFactory, config: WorkerConfig) -> Self {
        Self {
            pool,
            factory,
            loader: None,
            parser: None,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Register a document loader for `uri` loading configs.
    #[must_use]
    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Register a document parser for `auto` parsing configs. Binary
    /// payloads fall back to UTF-8 decoding when none is registered.
    #[must_use]
    pub fn with_parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Token that stops the polling loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Poll until cancelled: drain every enabled vectorizer's queue,
    /// sleep, repeat.
    pub async fn run(&self) -> Result<()> {
        info!(worker_id = %self.config.worker_id, "worker started");
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.run_once().await {
                Ok(stats) => {
                    debug!(
                        embedded = stats.embedded,
                        cleared = stats.cleared,
                        failed = stats.failed,
                        "pass complete"
                    );
                }
                Err(e) => error!(error = %e, "processing pass failed"),
            }
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.poll_interval) => {}
            }
        }
        info!(worker_id = %self.config.worker_id, "worker stopped");
        Ok(())
    }

    /// One pass: drain the queue of every enabled vectorizer, then
    /// return. A failure in one vectorizer does not stop the others.
    pub async fn run_once(&self) -> Result<RunStats> {
        let mut defs = {
            let conn = self.pool.get().map_err(StoreError::from)?;
            VectorizerRegistry::install(&conn)?;
            VectorizerRegistry::list_enabled(&conn).map_err(WorkerError::from)?
        };
        if let Some(filter) = &self.config.vectorizer {
            defs.retain(|d| &d.id == filter || &d.name == filter);
        }

        let mut stats = RunStats::default();
        for def in defs {
            match self.process_vectorizer(&def).await {
                Ok(vec_stats) => stats.absorb(vec_stats),
                Err(e) => {
                    error!(vectorizer_id = %def.id, error = %e, "vectorizer pass failed");
                    let conn = self.pool.get().map_err(StoreError::from)?;
                    ErrorRepository::record(&conn, &def.id, &e.to_string(), None)?;
                }
            }
        }
        Ok(stats)
    }

    /// Drain one vectorizer's queue in claimed batches.
    pub async fn process_vectorizer(&self, def: &VectorizerDefinition) -> Result<RunStats> {
        let provider = (self.factory)(&def.config.embedding)?;
        let pipeline = Arc::new(Pipeline::new(
            &self.pool,
            def.clone(),
            provider,
            self.loader.clone(),
            self.parser.clone(),
        )?);

        let processing = &def.config.processing;
        let mut stats = RunStats::default();
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            let claimed = {
                let conn = self.pool.get().map_err(StoreError::from)?;
                QueueRepository::claim(
                    &conn,
                    def,
                    &self.config.worker_id,
                    processing.batch_size,
                    self.config.lease_secs,
                    processing.max_attempts,
                )?
            };
            if claimed.is_empty() {
                break;
            }

            // Coalesce multiple queued changes for the same key: the
            // key is processed once and every claimed row acked.
            let mut groups: BTreeMap<String, (PkValues, Vec<i64>, i64)> = BTreeMap::new();
            for entry in claimed {
                let key =
                    serde_json::to_string(&entry.pk).map_err(StoreError::from)?;
                let group = groups
                    .entry(key)
                    .or_insert_with(|| (entry.pk.clone(), Vec::new(), entry.attempts));
                group.1.push(entry.q_id);
                group.2 = group.2.max(entry.attempts);
            }

            let batch = self
                .process_groups(def, &pipeline, groups.into_values().collect(), processing)
                .await?;
            stats.absorb(batch);
            if batch.rate_limited {
                break;
            }
        }
        Ok(stats)
    }

    async fn process_groups(
        &self,
        def: &VectorizerDefinition,
        pipeline: &Arc<Pipeline>,
        groups: Vec<(PkValues, Vec<i64>, i64)>,
        processing: &vecsync_config::ProcessingConfig,
    ) -> Result<RunStats> {
        let concurrency = self.config.concurrency.unwrap_or(processing.concurrency).max(1);
        let mut stats = RunStats::default();
        let mut join_set: JoinSet<(PkValues, Vec<i64>, i64, Result<KeyOutcome>)> =
            JoinSet::new();

        for (pk, q_ids, attempts) in groups {
            while join_set.len() >= concurrency {
                if let Some(joined) = join_set.join_next().await {
                    self.settle(def, joined, &mut stats)?;
                }
            }
            let pipeline = Arc::clone(pipeline);
            let pool = self.pool.clone();
            let _abort = join_set.spawn(async move {
                let result = pipeline.process_key(&pool, &pk).await;
                (pk, q_ids, attempts, result)
            });
        }
        while let Some(joined) = join_set.join_next().await {
            self.settle(def, joined, &mut stats)?;
        }
        Ok(stats)
    }

    /// Apply one key's outcome to the queue and error log.
    fn settle(
        &self,
        def: &VectorizerDefinition,
        joined: std::result::Result<
            (PkValues, Vec<i64>, i64, Result<KeyOutcome>),
            tokio::task::JoinError,
        >,
        stats: &mut RunStats,
    ) -> Result<()> {
        let Ok((pk, q_ids, attempts, result)) = joined else {
            // Task panicked; its rows stay leased and expire naturally.
            error!(vectorizer_id = %def.id, "pipeline task panicked");
            stats.failed += 1;
            return Ok(());
        };

        let conn = self.pool.get().map_err(StoreError::from)?;
        match result {
            Ok(outcome) => {
                QueueRepository::ack(&conn, def, &q_ids)?;
                match outcome {
                    KeyOutcome::Embedded { chunks } => {
                        debug!(vectorizer_id = %def.id, ?pk, chunks, "embedded");
                        stats.embedded += 1;
                    }
                    KeyOutcome::Cleared | KeyOutcome::SourceGone => stats.cleared += 1,
                }
            }
            Err(e) if e.is_rate_limit() => {
                let backoff = e
                    .retry_after_secs()
                    .map_or(self.config.rate_limit_backoff_secs, |s| s as i64);
                warn!(vectorizer_id = %def.id, backoff, "rate limited, deferring");
                QueueRepository::release_rate_limited(&conn, def, &q_ids, backoff)?;
                stats.rate_limited = true;
            }
            Err(e) => {
                warn!(vectorizer_id = %def.id, ?pk, error = %e, "key failed");
                // The backoff keeps the retry out of this drain loop:
                // one attempt per pass, not all of them at once.
                QueueRepository::fail(&conn, def, &q_ids, self.config.lease_secs)?;
                ErrorRepository::record(
                    &conn,
                    &def.id,
                    &e.to_string(),
                    Some(&serde_json::json!({ "pk": pk, "attempts": attempts + 1 })),
                )?;
                stats.failed += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use vecsync_embeddings::{
        default_provider_factory, EmbeddingError, EmbeddingProvider, HashEmbedder,
    };
    use vecsync_store::pool::{new_file, new_in_memory};
    use vecsync_store::{
        vectorizer_status, CreateVectorizerParams, LifecycleManager, TargetRepository,
        VectorizerConfig,
    };

    fn config(extra: serde_json::Value) -> VectorizerConfig {
        let mut base = json!({
            "loading": { "implementation": "column", "column_name": "body" },
            "embedding": { "implementation": "hash", "dimensions": 8 },
        });
        if let (Some(base_map), Some(extra_map)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra_map {
                let _ = base_map.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    fn test_worker_config() -> WorkerConfig {
        WorkerConfig {
            poll_interval: Duration::from_millis(10),
            ..WorkerConfig::default()
        }
    }

    fn setup_pool() -> ConnectionPool {
        let pool = new_in_memory().unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "CREATE TABLE docs (id INTEGER PRIMARY KEY, title TEXT, body TEXT)",
            )
            .unwrap();
        }
        pool
    }

    #[tokio::test]
    async fn drains_backlog_end_to_end() {
        let pool = setup_pool();
        let mgr = LifecycleManager::new(pool.clone());
        {
            let conn = pool.get().unwrap();
            conn.execute(
                "INSERT INTO docs VALUES (1, 'a', 'alpha text'), (2, 'b', 'beta text')",
                [],
            )
            .unwrap();
        }
        let def =
            mgr.create(CreateVectorizerParams::new("docs", config(json!({})), "alice")).unwrap();

        let worker = Worker::new(pool.clone(), default_provider_factory(), test_worker_config());
        let stats = worker.run_once().await.unwrap();
        assert_eq!(stats.embedded, 2);
        assert_eq!(stats.failed, 0);

        let conn = pool.get().unwrap();
        assert_eq!(TargetRepository::row_count(&conn, &def).unwrap(), 2);
        assert_eq!(vectorizer_status(&conn, &def.id, false).unwrap().pending_items, 0);
    }

    #[tokio::test]
    async fn insert_then_update_coalesces_to_one_embedding_pass() {
        let pool = setup_pool();
        let mgr = LifecycleManager::new(pool.clone());
        let def =
            mgr.create(CreateVectorizerParams::new("docs", config(json!({})), "alice")).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute("INSERT INTO docs VALUES (1, 'a', 'v1')", []).unwrap();
            conn.execute("UPDATE docs SET body = 'v2' WHERE id = 1", []).unwrap();
        }

        let worker = Worker::new(pool.clone(), default_provider_factory(), test_worker_config());
        let stats = worker.run_once().await.unwrap();
        // Two queue rows, one key: embedded once, both rows acked.
        assert_eq!(stats.embedded, 1);

        let conn = pool.get().unwrap();
        assert_eq!(vectorizer_status(&conn, &def.id, false).unwrap().pending_items, 0);
        let chunk: String = conn
            .query_row(
                &format!("SELECT chunk FROM \"{}\"", def.target_table.as_deref().unwrap()),
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(chunk, "v2");
    }

    #[tokio::test]
    async fn failures_are_recorded_and_become_dead_letters() {
        struct FailingProvider;
        #[async_trait]
        impl EmbeddingProvider for FailingProvider {
            async fn embed(
                &self,
                _texts: &[String],
            ) -> vecsync_embeddings::Result<Vec<Vec<f32>>> {
                Err(EmbeddingError::Provider("boom".into()))
            }
            fn dimensions(&self) -> usize {
                8
            }
        }

        let pool = setup_pool();
        let mgr = LifecycleManager::new(pool.clone());
        let cfg = config(json!({ "processing": { "max_attempts": 2 } }));
        let def = mgr.create(CreateVectorizerParams::new("docs", cfg, "alice")).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute("INSERT INTO docs VALUES (1, 'a', 'text')", []).unwrap();
        }

        let factory: ProviderFactory = Arc::new(|_| Ok(Arc::new(FailingProvider) as _));
        let worker = Worker::new(pool.clone(), factory, test_worker_config());

        // One attempt per pass: the failed row backs off, so rerunning
        // immediately finds nothing claimable.
        let stats = worker.run_once().await.unwrap();
        assert_eq!(stats.failed, 1);
        let stats = worker.run_once().await.unwrap();
        assert_eq!(stats.failed, 0);
        {
            let conn = pool.get().unwrap();
            assert_eq!(vectorizer_status(&conn, &def.id, false).unwrap().pending_items, 1);
            // Expire the backoff so the next pass retries.
            conn.execute(
                &format!("UPDATE \"{}\" SET leased_until = NULL", def.queue_table),
                [],
            )
            .unwrap();
        }

        let stats = worker.run_once().await.unwrap();
        assert_eq!(stats.failed, 1);

        // Dead letter: visible, no longer claimed.
        let conn = pool.get().unwrap();
        let status = vectorizer_status(&conn, &def.id, false).unwrap();
        assert_eq!(status.exhausted_items, 1);
        assert_eq!(status.error_count, 2);
        assert_eq!(status.embedding_count, 0);
    }

    #[tokio::test]
    async fn registered_parser_handles_binary_payloads() {
        struct HexDumpParser;
        #[async_trait]
        impl crate::loader::DocumentParser for HexDumpParser {
            async fn parse(&self, bytes: &[u8]) -> crate::errors::Result<String> {
                Ok(bytes.iter().map(|b| format!("{b:02x}")).collect())
            }
        }

        let pool = setup_pool();
        let mgr = LifecycleManager::new(pool.clone());
        let def =
            mgr.create(CreateVectorizerParams::new("docs", config(json!({})), "alice")).unwrap();
        {
            let conn = pool.get().unwrap();
            // Not valid UTF-8: only the registered parser can decode it.
            conn.execute("INSERT INTO docs VALUES (1, 'a', x'fffe00')", []).unwrap();
        }

        let worker = Worker::new(pool.clone(), default_provider_factory(), test_worker_config())
            .with_parser(Arc::new(HexDumpParser));
        let stats = worker.run_once().await.unwrap();
        assert_eq!(stats.embedded, 1);
        assert_eq!(stats.failed, 0);

        let conn = pool.get().unwrap();
        let chunk: String = conn
            .query_row(
                &format!("SELECT chunk FROM \"{}\"", def.target_table.as_deref().unwrap()),
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(chunk, "fffe00");
    }

    #[tokio::test]
    async fn rate_limit_defers_without_consuming_attempts() {
        struct RateLimitedProvider;
        #[async_trait]
        impl EmbeddingProvider for RateLimitedProvider {
            async fn embed(
                &self,
                _texts: &[String],
            ) -> vecsync_embeddings::Result<Vec<Vec<f32>>> {
                Err(EmbeddingError::RateLimited { retry_after_secs: Some(120) })
            }
            fn dimensions(&self) -> usize {
                8
            }
        }

        let pool = setup_pool();
        let mgr = LifecycleManager::new(pool.clone());
        let def =
            mgr.create(CreateVectorizerParams::new("docs", config(json!({})), "alice")).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute("INSERT INTO docs VALUES (1, 'a', 'text')", []).unwrap();
        }

        let factory: ProviderFactory = Arc::new(|_| Ok(Arc::new(RateLimitedProvider) as _));
        let worker = Worker::new(pool.clone(), factory, test_worker_config());
        let stats = worker.run_once().await.unwrap();
        assert!(stats.rate_limited);
        assert_eq!(stats.failed, 0);

        let conn = pool.get().unwrap();
        let status = vectorizer_status(&conn, &def.id, false).unwrap();
        // Still pending, no attempts burned, no error recorded.
        assert_eq!(status.pending_items, 1);
        assert_eq!(status.exhausted_items, 0);
        assert_eq!(status.error_count, 0);
    }

    #[tokio::test]
    async fn disabled_vectorizers_are_skipped() {
        let pool = setup_pool();
        let mgr = LifecycleManager::new(pool.clone());
        let def =
            mgr.create(CreateVectorizerParams::new("docs", config(json!({})), "alice")).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute("INSERT INTO docs VALUES (1, 'a', 'text')", []).unwrap();
        }
        mgr.disable(&def.id, "alice").unwrap();

        let worker = Worker::new(pool.clone(), default_provider_factory(), test_worker_config());
        let stats = worker.run_once().await.unwrap();
        assert_eq!(stats.embedded, 0);

        let conn = pool.get().unwrap();
        assert_eq!(vectorizer_status(&conn, &def.id, false).unwrap().pending_items, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_processing_embeds_every_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.db");
        let pool = new_file(path.to_str().unwrap(), 4).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch(
                "CREATE TABLE docs (id INTEGER PRIMARY KEY, title TEXT, body TEXT)",
            )
            .unwrap();
        }
        let mgr = LifecycleManager::new(pool.clone());
        let cfg = config(json!({ "processing": { "concurrency": 4, "batch_size": 16 } }));
        let def = mgr.create(CreateVectorizerParams::new("docs", cfg, "alice")).unwrap();
        {
            let conn = pool.get().unwrap();
            for i in 0..32 {
                conn.execute(
                    "INSERT INTO docs (id, title, body) VALUES (?1, 't', ?2)",
                    rusqlite::params![i, format!("document body {i}")],
                )
                .unwrap();
            }
        }

        let worker = Worker::new(pool.clone(), default_provider_factory(), test_worker_config());
        let stats = worker.run_once().await.unwrap();
        assert_eq!(stats.embedded, 32);

        let conn = pool.get().unwrap();
        assert_eq!(TargetRepository::row_count(&conn, &def).unwrap(), 32);
        assert_eq!(vectorizer_status(&conn, &def.id, false).unwrap().pending_items, 0);
    }

    #[tokio::test]
    async fn vectorizer_filter_limits_the_pass() {
        let pool = setup_pool();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch("CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)")
                .unwrap();
            conn.execute("INSERT INTO docs VALUES (1, 'a', 'doc text')", []).unwrap();
            conn.execute("INSERT INTO notes VALUES (1, 'note text')", []).unwrap();
        }
        let mgr = LifecycleManager::new(pool.clone());
        let docs =
            mgr.create(CreateVectorizerParams::new("docs", config(json!({})), "alice")).unwrap();
        let notes =
            mgr.create(CreateVectorizerParams::new("notes", config(json!({})), "alice")).unwrap();

        let cfg = WorkerConfig {
            vectorizer: Some(docs.name.clone()),
            ..test_worker_config()
        };
        let worker = Worker::new(pool.clone(), default_provider_factory(), cfg);
        let stats = worker.run_once().await.unwrap();
        assert_eq!(stats.embedded, 1);

        let conn = pool.get().unwrap();
        assert_eq!(vectorizer_status(&conn, &docs.id, false).unwrap().pending_items, 0);
        assert_eq!(vectorizer_status(&conn, &notes.id, false).unwrap().pending_items, 1);
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let pool = setup_pool();
        let worker =
            Worker::new(pool, default_provider_factory(), test_worker_config());
        let cancel = worker.cancellation_token();
        let handle = tokio::spawn(async move { worker.run().await });
        cancel.cancel();
        handle.await.unwrap().unwrap();
    }

    #[test]
    fn hash_factory_builds_for_test_config() {
        let factory = default_provider_factory();
        let provider = factory(&vecsync_config::EmbeddingConfig::Hash { dimensions: 4 }).unwrap();
        assert_eq!(provider.dimensions(), 4);
        let _ = HashEmbedder::new(4);
    }
}
