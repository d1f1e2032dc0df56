//! Cron-driven backup runs for resident mode.

use crate::executor::{BackupReport, BackupRunner};
use crate::remote::Connector;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, Notify};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

/// Tracks whether a backup is in flight and wakes waiters when it ends.
#[derive(Debug, Default)]
pub struct RunState {
    running: AtomicBool,
    idle: Notify,
}

impl RunState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a run as started. Returns false if one already is.
    pub fn try_begin(&self) -> bool {
        !self.running.swap(true, Ordering::SeqCst)
    }

    /// Mark the current run as finished.
    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.idle.notify_waiters();
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Wait until no run is in flight.
    pub async fn wait_idle(&self) {
        loop {
            // Register before checking so a finish() in between is not lost.
            let notified = self.idle.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }
}

/// Runs one backup per cron tick, never two at once.
pub struct BackupScheduler {
    scheduler: Mutex<JobScheduler>,
    state: Arc<RunState>,
}

impl BackupScheduler {
    pub async fn new() -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            state: Arc::new(RunState::new()),
        })
    }

    /// Register `runner` to fire on `cron_expression` (seconds first, e.g.
    /// `0 0 3 * * *` for 03:00 daily).
    pub async fn schedule<C>(&self, cron_expression: &str, runner: Arc<BackupRunner<C>>) -> anyhow::Result<()>
    where
        C: Connector + Send + Sync + 'static,
    {
        let state = self.state.clone();

        let job = Job::new_async(cron_expression, move |_uuid, _lock| {
            let runner = runner.clone();
            let state = state.clone();
            Box::pin(async move {
                info!("Starting scheduled backup");
                match run_exclusive(runner, state).await {
                    Some(Ok(report)) => info!("Scheduled backup finished: {}", report.summary()),
                    Some(Err(e)) => error!(error = %e, "Scheduled backup failed"),
                    None => {}
                }
            })
        })?;

        self.scheduler.lock().await.add(job).await?;
        info!(cron = %cron_expression, "Backup scheduled");
        Ok(())
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.start().await?;
        Ok(())
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.shutdown().await?;
        Ok(())
    }

    /// True while a scheduled backup is in progress.
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Wait until no backup is in progress.
    pub async fn wait_idle(&self) {
        if self.is_running() {
            info!("Waiting for the running backup to finish...");
        }
        self.state.wait_idle().await;
    }
}

/// Run one backup on a blocking thread unless one is already in progress.
///
/// Returns `None` when the run was skipped.
pub async fn run_exclusive<C>(
    runner: Arc<BackupRunner<C>>,
    state: Arc<RunState>,
) -> Option<crate::Result<BackupReport>>
where
    C: Connector + Send + Sync + 'static,
{
    if !state.try_begin() {
        warn!("Skipping scheduled run: previous backup still running");
        return None;
    }

    let result = tokio::task::spawn_blocking(move || runner.run()).await;
    state.finish();

    match result {
        Ok(outcome) => Some(outcome),
        Err(e) => {
            error!(error = %e, "Backup task panicked");
            None
        }
    }
}
