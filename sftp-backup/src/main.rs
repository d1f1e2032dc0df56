//! sftp-backup - Main entry point
//!
//! Runs one backup and exits, or stays resident and runs on a cron schedule.

use anyhow::Result;
use clap::Parser;
use sftp_backup::daemon::{BackupScheduler, ShutdownCoordinator};
use sftp_backup::{utils, BackupRunner, Config};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file (environment and .env are used otherwise)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the dated archives
    #[arg(long, value_name = "DIR")]
    backup_dir: Option<PathBuf>,

    /// Number of archives to keep
    #[arg(short, long)]
    keep: Option<usize>,

    /// File with ignore patterns, one glob per line
    #[arg(long, value_name = "FILE")]
    ignore_file: Option<PathBuf>,

    /// Remote directory to back up
    #[arg(long, value_name = "PATH")]
    remote_dir: Option<String>,

    /// Cron expression (seconds first); stay resident and back up on schedule
    #[arg(long, value_name = "CRON")]
    schedule: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<String>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    json: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.backup_dir {
            config.backup.backup_dir = dir.clone();
        }
        if let Some(keep) = self.keep {
            config.backup.keep_num_backups = keep;
        }
        if let Some(file) = &self.ignore_file {
            config.backup.ignore_file = file.clone();
        }
        if let Some(root) = &self.remote_dir {
            config.remote.root = root.clone();
        }
        if let Some(schedule) = &self.schedule {
            config.backup.schedule = Some(schedule.clone());
        }
        if let Some(level) = &self.log_level {
            config.log.level = level.clone();
        }
    }

    /// Reject flags that make no sense for the mode `config` selects.
    fn check_mode(&self, config: &Config) -> Result<()> {
        if self.json && config.backup.schedule.is_some() {
            anyhow::bail!("--json prints a single run report and cannot be combined with a schedule");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };
    args.apply(&mut config);

    // Initialize logging
    utils::logger::init(&config.log.level)?;

    config.validate()?;
    args.check_mode(&config)?;

    tracing::info!(
        "Starting sftp-backup v{} ({}@{}:{}{})",
        env!("CARGO_PKG_VERSION"),
        config.remote.username,
        config.remote.host,
        config.remote.port,
        config.remote.root
    );

    let schedule = config.backup.schedule.clone();
    let runner = Arc::new(BackupRunner::new(config));

    match schedule {
        Some(cron) => run_scheduled(runner, &cron).await,
        None => run_once(runner, args.json).await,
    }
}

async fn run_once(runner: Arc<BackupRunner>, json: bool) -> Result<()> {
    let report = tokio::task::spawn_blocking(move || runner.run()).await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }

    Ok(())
}

async fn run_scheduled(runner: Arc<BackupRunner>, cron: &str) -> Result<()> {
    let shutdown = ShutdownCoordinator::new();

    let scheduler = BackupScheduler::new().await?;
    scheduler.schedule(cron, runner).await?;
    scheduler.start().await?;
    tracing::info!("Waiting for scheduled runs, press Ctrl+C to stop");

    shutdown.wait_for_signal().await;

    if let Err(e) = scheduler.shutdown().await {
        tracing::warn!("Scheduler shutdown error: {}", e);
    }
    scheduler.wait_idle().await;

    tracing::info!("Stopped");
    Ok(())
}
