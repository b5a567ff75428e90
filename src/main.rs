use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use kitsu_backup::backup::Coordinator;
use kitsu_backup::config::{AppConfig, CliConfig, FileConfig};
use kitsu_backup::kitsu::KitsuClient;
use kitsu_backup::object_store::S3ObjectStore;
use kitsu_backup::sync_store::SqliteSyncStateStore;

#[derive(Parser, Debug)]
#[command(version)]
struct CliArgs {
    /// Path to the TOML configuration file.
    #[clap(short, long, default_value = "conf.toml")]
    pub config: PathBuf,

    /// Concurrency policy: negative for unbounded, 0 for serial, positive
    /// for a bounded number of parallel transfers.
    #[clap(long, default_value_t = 0)]
    pub threads: i64,

    /// Minutes between backup passes.
    #[clap(long, default_value_t = 15)]
    pub poll_minutes: u64,

    /// Local directory for staging downloaded attachments.
    #[clap(long, default_value = "./staging")]
    pub staging_root: PathBuf,

    /// Path to the SQLite sync state database file.
    #[clap(long, default_value = "./sync_state.db")]
    pub state_db: PathBuf,

    /// Timeout in seconds for Kitsu requests.
    #[clap(long, default_value_t = 300)]
    pub kitsu_timeout_sec: u64,

    /// Run a single backup pass and exit instead of polling.
    #[clap(long)]
    pub once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    info!(
        "Starting kitsu-backup {}-{}",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    let file_config = FileConfig::load(&cli_args.config)?;
    let cli_config = CliConfig {
        threads: cli_args.threads,
        poll_minutes: cli_args.poll_minutes,
        staging_root: cli_args.staging_root,
        state_db_path: cli_args.state_db,
        kitsu_timeout_sec: cli_args.kitsu_timeout_sec,
    };
    let config = AppConfig::resolve(&cli_config, file_config)?;

    info!("Authenticating against {}", config.kitsu_host);
    let client = Arc::new(
        KitsuClient::authenticate(
            &config.kitsu_host,
            &config.kitsu_email,
            &config.kitsu_password,
            config.kitsu_timeout_sec,
        )
        .await
        .context("Kitsu authentication failed")?,
    );

    info!("Opening sync state database at {:?}", config.state_db_path);
    let sync_store = Arc::new(SqliteSyncStateStore::new(&config.state_db_path)?);

    let object_store = Arc::new(
        S3ObjectStore::new(config.s3.clone())
            .await
            .context("Failed to build S3 client")?,
    );

    let coordinator = Coordinator::new(
        client,
        sync_store,
        object_store,
        Arc::new(config.backup.clone()),
    );

    // First pass right away, then on the poll interval. Awaiting each run
    // here means passes can never overlap, however long one takes.
    info!("Running first backup pass");
    run_once(&coordinator).await?;

    if cli_args.once {
        return Ok(());
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(config.poll_minutes * 60));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Skip the immediate first tick, the first pass already ran.
    ticker.tick().await;

    loop {
        ticker.tick().await;
        info!("Running scheduled backup pass");
        if let Err(e) = run_once(&coordinator).await {
            error!("Backup pass failed: {:#}", e);
        }
    }
}

async fn run_once(coordinator: &Coordinator) -> Result<()> {
    let summary = coordinator.run().await?;
    info!(
        "Pass complete: {} succeeded, {} failed, {} skipped",
        summary.succeeded, summary.failed, summary.skipped
    );
    Ok(())
}
