mod feed;
mod wiring;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use latch_core::app::{
    CheckpointStore, Coordinator, DenylistSeeder, DistributedLock, LatchConfig, QueuePublisher, RunReport,
};
use latch_core::ports::{Clock, SystemClock, UlidGenerator};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::feed::FeedFileTask;
use crate::wiring::Backends;

#[derive(Parser)]
#[command(name = "latch", about = "Lock-guarded suspect-domain import with one-time denylist seeding")]
struct Cli {
    /// Env file read before settings are loaded; missing is fine
    #[arg(long, global = true, default_value = ".env")]
    env_file: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Seed the denylist (once) and run one coordinated import cycle
    Run {
        /// Newline-delimited candidate domains for this cycle
        #[arg(long)]
        feed: Option<PathBuf>,
        /// Overrides LATCH_SEED_FILE
        #[arg(long)]
        seed_file: Option<PathBuf>,
    },
    /// Verify the queue is reachable and print its approximate depth
    Check,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let env_loaded = load_env_file(&cli.env_file);

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "latch", "interrupt received; cancelling");
            on_signal.cancel();
        }
    });

    let result = match env_loaded {
        Ok(()) => run(cli.command, &cancel).await,
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(target: "latch", error = %format!("{err:#}"), "latch failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn load_env_file(path: &Path) -> Result<()> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(err).with_context(|| format!("loading {}", path.display())),
    }
}

async fn run(command: Command, cancel: &CancellationToken) -> Result<()> {
    let config = LatchConfig::from_env().context("loading configuration")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let backends = Backends::connect(&config.backend, clock.clone()).await?;
    let publisher = QueuePublisher::new(backends.queue.clone(), config.queue_name.clone(), clock.clone());

    match command {
        Command::Check => check(&publisher, cancel).await,
        Command::Run { feed, seed_file } => {
            let checkpoints = CheckpointStore::new(backends.checkpoints.clone(), clock.clone());
            let lock = DistributedLock::new(backends.leases.clone());

            if let Some(path) = seed_file.or_else(|| config.seed_file.clone()) {
                let seeder = DenylistSeeder::new(
                    checkpoints.clone(),
                    backends.denylist.clone(),
                    config.seed_marker(),
                    clock.clone(),
                )
                .with_lock(lock.clone(), config.seed_lock.clone(), config.lock_duration);
                let report = seeder.seed(&path, cancel).await.context("seeding denylist")?;
                info!(target: "latch", ?report, "seeding step finished");
            }

            let coordinator = Coordinator::new(
                lock,
                checkpoints,
                publisher,
                clock.clone(),
                Arc::new(UlidGenerator::new(clock.clone())),
            );
            let body = FeedFileTask::new(feed, backends.denylist.clone(), clock);

            match coordinator
                .run(&config.import_task(), &body, cancel)
                .await
                .context("running import")?
            {
                RunReport::Completed { window, published } => info!(
                    target: "latch",
                    since = %window.since,
                    until = %window.until,
                    correlation_id = %window.correlation_id,
                    published,
                    "import completed"
                ),
                RunReport::Skipped(reason) => info!(target: "latch", ?reason, "import skipped"),
            }
            Ok(())
        }
    }
}

async fn check(publisher: &QueuePublisher, cancel: &CancellationToken) -> Result<()> {
    publisher
        .test_connection(cancel)
        .await
        .with_context(|| format!("checking queue {}", publisher.queue_name()))?;
    let stats = publisher
        .get_queue_stats(cancel)
        .await
        .context("reading queue stats")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}
