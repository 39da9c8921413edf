//! # vecsync
//!
//! CLI binary: vectorizer lifecycle management and the worker and
//! scheduler loops over one `SQLite` database.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use vecsync_embeddings::default_provider_factory;
use vecsync_scheduler::{Scheduler, SchedulerConfig};
use vecsync_store::pool::{new_file, DEFAULT_POOL_SIZE};
use vecsync_store::{
    all_statuses, vectorizer_status, ConnectionPool, CreateVectorizerParams, LifecycleManager,
    VectorizerConfig, VectorizerRegistry,
};
use vecsync_worker::{Worker, WorkerConfig};

/// Vectorizer engine CLI.
#[derive(Parser, Debug)]
#[command(name = "vecsync", about = "Vectorizer engine over SQLite")]
struct Cli {
    /// Path to the `SQLite` database.
    #[arg(long, global = true, default_value = "vecsync.db")]
    db: PathBuf,

    /// Acting principal; defaults to $USER.
    #[arg(long, global = true)]
    owner: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a vectorizer from a pipeline config.
    Create {
        /// Source table to watch.
        #[arg(long)]
        source: String,
        /// Path to the pipeline config JSON file.
        #[arg(long)]
        config: PathBuf,
        /// Unique name (defaults to `<source>_v<seq>`).
        #[arg(long)]
        name: Option<String>,
        /// Skip enqueueing pre-existing source rows.
        #[arg(long)]
        no_backfill: bool,
    },
    /// Drop a vectorizer; the target table and view are kept.
    Drop {
        /// Vectorizer ID or name.
        vectorizer: String,
        /// Also drop the target table and view.
        #[arg(long)]
        drop_target: bool,
    },
    /// Resume processing for a vectorizer.
    Enable {
        /// Vectorizer ID or name.
        vectorizer: String,
    },
    /// Pause processing; changes keep queueing.
    Disable {
        /// Vectorizer ID or name.
        vectorizer: String,
    },
    /// Re-arm queue rows that exhausted their delivery attempts.
    Retry {
        /// Vectorizer ID or name.
        vectorizer: String,
    },
    /// Print health snapshots as JSON.
    Status {
        /// Vectorizer ID or name; all vectorizers when omitted.
        vectorizer: Option<String>,
        /// Count queued items exactly instead of capping the scan.
        #[arg(long)]
        exact: bool,
    },
    /// List registered vectorizers.
    List,
    /// Run the worker loop.
    Worker {
        /// Only process this vectorizer (ID or name).
        #[arg(long)]
        vectorizer: Option<String>,
        /// Seconds between polling passes.
        #[arg(long, default_value_t = 300)]
        poll_interval: u64,
        /// Override each vectorizer's configured concurrency.
        #[arg(long)]
        concurrency: Option<usize>,
        /// Drain every queue once, then exit.
        #[arg(long)]
        once: bool,
    },
    /// Run the per-vectorizer interval scheduler.
    Scheduler {
        /// Seconds between scheduler wakeups.
        #[arg(long, default_value_t = 10)]
        tick: u64,
    },
}

fn principal(cli: &Cli) -> String {
    cli.owner
        .clone()
        .or_else(|| std::env::var("USER").ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn open_pool(db: &PathBuf) -> Result<ConnectionPool> {
    let path = db.to_string_lossy();
    new_file(&path, DEFAULT_POOL_SIZE)
        .with_context(|| format!("failed to open database {path}"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let owner = principal(&cli);
    let pool = open_pool(&cli.db)?;
    let manager = LifecycleManager::new(pool.clone());

    match cli.command {
        Command::Create { source, config, name, no_backfill } => {
            let raw = std::fs::read_to_string(&config)
                .with_context(|| format!("failed to read {}", config.display()))?;
            let parsed: VectorizerConfig =
                serde_json::from_str(&raw).context("invalid pipeline config")?;
            let mut params = CreateVectorizerParams::new(&source, parsed, &owner);
            params.name = name;
            params.enqueue_existing = !no_backfill;
            let def = manager.create(params)?;
            println!("{}", serde_json::to_string_pretty(&def)?);
        }
        Command::Drop { vectorizer, drop_target } => {
            manager.drop_vectorizer(&vectorizer, &owner, drop_target)?;
            println!("dropped {vectorizer}");
        }
        Command::Enable { vectorizer } => {
            manager.enable(&vectorizer, &owner)?;
            println!("enabled {vectorizer}");
        }
        Command::Disable { vectorizer } => {
            manager.disable(&vectorizer, &owner)?;
            println!("disabled {vectorizer}");
        }
        Command::Retry { vectorizer } => {
            let reset = manager.reset_attempts(&vectorizer, &owner)?;
            println!("re-armed {reset} queue rows for {vectorizer}");
        }
        Command::Status { vectorizer, exact } => {
            let conn = pool.get()?;
            VectorizerRegistry::install(&conn)?;
            let json = match vectorizer {
                Some(reference) => {
                    serde_json::to_string_pretty(&vectorizer_status(&conn, &reference, exact)?)?
                }
                None => serde_json::to_string_pretty(&all_statuses(&conn, exact)?)?,
            };
            println!("{json}");
        }
        Command::List => {
            let conn = pool.get()?;
            VectorizerRegistry::install(&conn)?;
            for def in VectorizerRegistry::list(&conn)? {
                let state = if def.enabled { "enabled" } else { "disabled" };
                println!("{}  {}  {}  {}", def.id, def.name, def.source_table, state);
            }
        }
        Command::Worker { vectorizer, poll_interval, concurrency, once } => {
            let config = WorkerConfig {
                poll_interval: Duration::from_secs(poll_interval),
                vectorizer,
                concurrency,
                ..WorkerConfig::default()
            };
            let worker = Worker::new(pool, default_provider_factory(), config);
            if once {
                let stats = worker.run_once().await?;
                println!(
                    "embedded {} cleared {} failed {}",
                    stats.embedded, stats.cleared, stats.failed
                );
            } else {
                let cancel = worker.cancellation_token();
                let handle = tokio::spawn(async move { worker.run().await });
                tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
                tracing::info!("shutting down");
                cancel.cancel();
                handle.await.context("worker task panicked")??;
            }
        }
        Command::Scheduler { tick } => {
            let worker = Arc::new(Worker::new(
                pool.clone(),
                default_provider_factory(),
                WorkerConfig::default(),
            ));
            let config = SchedulerConfig { tick: Duration::from_secs(tick) };
            let scheduler = Scheduler::new(pool, worker, config);
            let cancel = scheduler.cancellation_token();
            let handle = tokio::spawn(async move { scheduler.run().await });
            tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
            tracing::info!("shutting down");
            cancel.cancel();
            handle.await.context("scheduler task panicked")??;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults() {
        let cli = Cli::parse_from(["vecsync", "list"]);
        assert_eq!(cli.db, PathBuf::from("vecsync.db"));
        assert!(matches!(cli.command, Command::List));
    }

    #[test]
    fn worker_flags_parse() {
        let cli =
            Cli::parse_from(["vecsync", "worker", "--poll-interval", "5", "--once"]);
        match cli.command {
            Command::Worker { poll_interval, once, vectorizer, concurrency } => {
                assert_eq!(poll_interval, 5);
                assert!(once);
                assert!(vectorizer.is_none());
                assert!(concurrency.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn create_flags_parse() {
        let cli = Cli::parse_from([
            "vecsync",
            "--db",
            "/tmp/x.db",
            "create",
            "--source",
            "articles",
            "--config",
            "pipeline.json",
            "--no-backfill",
        ]);
        assert_eq!(cli.db, PathBuf::from("/tmp/x.db"));
        match cli.command {
            Command::Create { source, no_backfill, .. } => {
                assert_eq!(source, "articles");
                assert!(no_backfill);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn owner_is_global() {
        let cli = Cli::parse_from(["vecsync", "--owner", "alice", "disable", "v1"]);
        assert_eq!(principal(&cli), "alice");
    }
}
