//! Interval scheduling.
//!
//! Each vectorizer carries its own scheduling config; the scheduler
//! wakes on a coarse tick, drains the queues of whichever vectorizers
//! have come due, and evaluates the index policy for each afterwards.
//! Vectorizers scheduled as `disabled` are never picked up here and
//! drain only through explicit worker runs.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vecsync_config::SchedulingConfig;
use vecsync_store::{ConnectionPool, StoreError, VectorizerRegistry};
use vecsync_worker::{Result, RunStats, Worker};

use crate::indexing::IndexPolicyManager;

/// Scheduler loop settings.
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Coarse wakeup interval; per-vectorizer intervals are checked
    /// against it, so effective scheduling resolution is one tick.
    pub tick: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick: Duration::from_secs(10) }
    }
}

/// Drives a [`Worker`] on each vectorizer's configured interval.
pub struct Scheduler {
    pool: ConnectionPool,
    worker: Arc<Worker>,
    config: SchedulerConfig,
    cancel: CancellationToken,
}

impl Scheduler {
    /// Create a scheduler over a pool and a worker.
    pub fn new(pool: ConnectionPool, worker: Arc<Worker>, config: SchedulerConfig) -> Self {
        Self { pool, worker, config, cancel: CancellationToken::new() }
    }

    /// Token that stops the loop when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tick until cancelled.
    pub async fn run(&self) -> Result<()> {
        info!("scheduler started");
        let mut next_due: HashMap<String, Instant> = HashMap::new();
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.tick(&mut next_due).await {
                error!(error = %e, "scheduler tick failed");
            }
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.config.tick) => {}
            }
        }
        info!("scheduler stopped");
        Ok(())
    }

    /// One pass: process every vectorizer that has come due and
    /// evaluate its index policy. Exposed for step-driven tests.
    pub async fn tick(&self, next_due: &mut HashMap<String, Instant>) -> Result<RunStats> {
        let defs = {
            let conn = self.pool.get().map_err(StoreError::from)?;
            VectorizerRegistry::install(&conn)?;
            VectorizerRegistry::list_enabled(&conn)?
        };
        // Forget schedules of dropped or disabled vectorizers.
        next_due.retain(|id, _| defs.iter().any(|d| &d.id == id));

        let now = Instant::now();
        let mut stats = RunStats::default();
        for def in defs {
            let SchedulingConfig::Interval { poll_interval_secs } = &def.config.scheduling
            else {
                continue;
            };
            let poll_interval_secs = *poll_interval_secs;
            if next_due.get(&def.id).is_some_and(|due| *due > now) {
                continue;
            }

            match self.worker.process_vectorizer(&def).await {
                Ok(pass) => {
                    debug!(vectorizer_id = %def.id, embedded = pass.embedded, "scheduled pass");
                    stats.embedded += pass.embedded;
                    stats.cleared += pass.cleared;
                    stats.failed += pass.failed;
                    stats.rate_limited |= pass.rate_limited;
                }
                Err(e) => error!(vectorizer_id = %def.id, error = %e, "scheduled pass failed"),
            }

            {
                let conn = self.pool.get().map_err(StoreError::from)?;
                if let Err(e) = IndexPolicyManager::ensure_index(&conn, &def) {
                    error!(vectorizer_id = %def.id, error = %e, "index policy failed");
                }
            }

            let _ = next_due
                .insert(def.id.clone(), now + Duration::from_secs(poll_interval_secs));
        }
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vecsync_embeddings::default_provider_factory;
    use vecsync_store::pool::new_in_memory;
    use vecsync_store::{
        vectorizer_status, CreateVectorizerParams, LifecycleManager, VectorizerConfig,
    };
    use vecsync_worker::WorkerConfig;

    fn config(scheduling: serde_json::Value) -> VectorizerConfig {
        serde_json::from_value(json!({
            "loading": { "implementation": "column", "column_name": "body" },
            "embedding": { "implementation": "hash", "dimensions": 4 },
            "scheduling": scheduling,
        }))
        .unwrap()
    }

    fn setup() -> (ConnectionPool, LifecycleManager) {
        let pool = new_in_memory().unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute_batch("CREATE TABLE docs (id INTEGER PRIMARY KEY, body TEXT)").unwrap();
        }
        (pool.clone(), LifecycleManager::new(pool))
    }

    fn scheduler(pool: &ConnectionPool) -> Scheduler {
        let worker = Arc::new(Worker::new(
            pool.clone(),
            default_provider_factory(),
            WorkerConfig::default(),
        ));
        Scheduler::new(pool.clone(), worker, SchedulerConfig::default())
    }

    #[tokio::test]
    async fn due_vectorizers_are_processed_on_tick() {
        let (pool, mgr) = setup();
        {
            let conn = pool.get().unwrap();
            conn.execute("INSERT INTO docs VALUES (1, 'text')", []).unwrap();
        }
        let cfg = config(json!({ "implementation": "interval", "poll_interval_secs": 3600 }));
        let def = mgr.create(CreateVectorizerParams::new("docs", cfg, "alice")).unwrap();

        let sched = scheduler(&pool);
        let mut next_due = HashMap::new();

        let stats = sched.tick(&mut next_due).await.unwrap();
        assert_eq!(stats.embedded, 1);

        // Interval has not elapsed: the next tick does nothing.
        {
            let conn = pool.get().unwrap();
            conn.execute("INSERT INTO docs VALUES (2, 'more')", []).unwrap();
        }
        let stats = sched.tick(&mut next_due).await.unwrap();
        assert_eq!(stats.embedded, 0);
        let conn = pool.get().unwrap();
        assert_eq!(vectorizer_status(&conn, &def.id, false).unwrap().pending_items, 1);
    }

    #[tokio::test]
    async fn disabled_scheduling_is_never_picked_up() {
        let (pool, mgr) = setup();
        {
            let conn = pool.get().unwrap();
            conn.execute("INSERT INTO docs VALUES (1, 'text')", []).unwrap();
        }
        let cfg = config(json!({ "implementation": "disabled" }));
        let def = mgr.create(CreateVectorizerParams::new("docs", cfg, "alice")).unwrap();

        let sched = scheduler(&pool);
        let mut next_due = HashMap::new();
        let stats = sched.tick(&mut next_due).await.unwrap();
        assert_eq!(stats.embedded, 0);

        // Still drainable through an explicit worker run.
        let worker = Worker::new(
            pool.clone(),
            default_provider_factory(),
            WorkerConfig::default(),
        );
        let stats = worker.run_once().await.unwrap();
        assert_eq!(stats.embedded, 1);
        let conn = pool.get().unwrap();
        assert_eq!(vectorizer_status(&conn, &def.id, false).unwrap().pending_items, 0);
    }

    #[tokio::test]
    async fn dropped_vectorizers_leave_the_schedule() {
        let (pool, mgr) = setup();
        let cfg = config(json!({ "implementation": "interval", "poll_interval_secs": 1 }));
        let def = mgr.create(CreateVectorizerParams::new("docs", cfg, "alice")).unwrap();

        let sched = scheduler(&pool);
        let mut next_due = HashMap::new();
        let _ = sched.tick(&mut next_due).await.unwrap();
        assert!(next_due.contains_key(&def.id));

        mgr.drop_vectorizer(&def.id, "alice", false).unwrap();
        let _ = sched.tick(&mut next_due).await.unwrap();
        assert!(next_due.is_empty());
    }

    #[tokio::test]
    async fn run_stops_on_cancellation() {
        let (pool, _mgr) = setup();
        let sched = scheduler(&pool);
        let cancel = sched.cancellation_token();
        let handle = tokio::spawn(async move { sched.run().await });
        cancel.cancel();
        handle.await.unwrap().unwrap();
    }
}
