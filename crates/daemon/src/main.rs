use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use pulse_core::config::EngineConfig;
use pulse_daemon::config::{DaemonConfig, JobCadences};
use pulse_daemon::rng::SharedRng;
use pulse_daemon::state::Engine;
use pulse_daemon::{api, events, scheduler};
use pulse_store::{InMemoryStorage, SqliteStorage, Storage};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(name = "pulse-daemon", version, about = "Engagement orchestrator daemon")]
struct Cli {
    /// Where the HTTP API will listen, e.g. 127.0.0.1:8090
    #[arg(long, default_value = "127.0.0.1:8090")]
    listen: String,

    /// SQLite database file. Without it, state lives in memory only.
    #[arg(long, env = "PULSE_DB_PATH")]
    db_path: Option<PathBuf>,

    /// Shared secret expected in the admin header.
    #[arg(long, env = "PULSE_ADMIN_SECRET", default_value = "")]
    admin_secret: String,

    /// Engine tuning (TOML). Missing keys keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info")]
    log: String,

    /// Serve the API without background jobs.
    #[arg(long, default_value_t = false)]
    no_jobs: bool,

    /// Seed for the random source; omit for entropy.
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value_t = 30)]
    task_tick_seconds: u64,

    #[arg(long, default_value_t = 30)]
    stage_runner_seconds: u64,

    #[arg(long, default_value_t = 3600)]
    health_sweep_seconds: u64,

    #[arg(long, default_value_t = 6 * 3600)]
    distribution_seconds: u64,

    #[arg(long, default_value_t = 3600)]
    decay_seconds: u64,

    #[arg(long, default_value_t = 24 * 3600)]
    daily_publish_seconds: u64,
}

impl Cli {
    fn into_config(self) -> anyhow::Result<DaemonConfig> {
        let engine = EngineConfig::load_or_default(self.config.as_deref())?;
        Ok(DaemonConfig {
            listen: self.listen,
            db_path: self.db_path,
            admin_secret: self.admin_secret,
            jobs_enabled: !self.no_jobs,
            cadences: JobCadences {
                task_tick: Duration::from_secs(self.task_tick_seconds),
                stage_runner: Duration::from_secs(self.stage_runner_seconds),
                health_sweep: Duration::from_secs(self.health_sweep_seconds),
                distribution: Duration::from_secs(self.distribution_seconds),
                decay: Duration::from_secs(self.decay_seconds),
                daily_publish: Duration::from_secs(self.daily_publish_seconds),
            },
            engine,
            seed: self.seed,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log));
    fmt().with_target(false).with_env_filter(filter).init();

    let config = cli.into_config()?;
    info!(
        listen = %config.listen,
        db = ?config.db_path,
        jobs = config.jobs_enabled,
        "starting daemon"
    );
    if config.admin_secret.is_empty() {
        warn!("no admin secret configured; every admin request will be rejected");
    }

    let store: Arc<dyn Storage> = match &config.db_path {
        Some(path) => Arc::new(SqliteStorage::open(path).context("open store")?),
        None => Arc::new(InMemoryStorage::new()),
    };
    let rng = match config.seed {
        Some(seed) => SharedRng::seeded(seed),
        None => SharedRng::from_entropy(),
    };
    let engine = Arc::new(Engine::new(store, config.engine.clone(), rng));

    let (tx, rx) = events::channel();
    events::spawn_dispatcher(engine.clone(), rx);
    if config.jobs_enabled {
        scheduler::spawn_jobs(engine.clone(), &config.cadences);
    }

    let app = api::router(api::AppState::new(engine, tx, &config.admin_secret));

    let addr: SocketAddr = config.listen.parse()?;
    info!("listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("shutdown requested");
}
