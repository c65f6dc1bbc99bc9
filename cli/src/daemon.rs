//! Long-running scheduler host.
//!
//! Every `backup_needed` event runs the configured jobs as a batch on a background
//! thread. A trigger that arrives while a batch is still running is logged and dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use crossbeam_channel::{unbounded, Sender};
use engine::{AppConfig, BackupCoordinator, LogSink, Scheduler, SchedulerListener};
use tracing::{info, warn};

use crate::batch::run_batch;
use crate::progress::CliProgress;

enum DaemonEvent {
    BackupNeeded,
    NextTime(Option<DateTime<Local>>),
}

struct ChannelListener(Sender<DaemonEvent>);

impl SchedulerListener for ChannelListener {
    fn backup_needed(&self) {
        let _ = self.0.send(DaemonEvent::BackupNeeded);
    }

    fn next_time_changed(&self, next: Option<DateTime<Local>>) {
        let _ = self.0.send(DaemonEvent::NextTime(next));
    }
}

/// Run the scheduler until the process is stopped.
pub fn run_daemon(config_path: &Path, log: Arc<dyn LogSink>, verbose: bool) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let schedule = config.schedule();
    if !schedule.is_active() {
        eprintln!("No schedule enabled. Use `backup schedule --daily HH:MM` or `--every HOURS`.");
        return Ok(());
    }

    let (tx, rx) = unbounded();
    let mut scheduler = Scheduler::new(log.clone(), Box::new(ChannelListener(tx)));
    scheduler
        .apply(schedule, Local::now())
        .context("Invalid schedule in config")?;
    let _scheduler = scheduler.spawn();

    let coordinator = Arc::new(BackupCoordinator::new(log.clone()));
    let mut batch: Option<JoinHandle<()>> = None;
    info!(config = %config_path.display(), "daemon started");

    for event in rx.iter() {
        match event {
            DaemonEvent::NextTime(Some(at)) => {
                eprintln!("Next backup: {}", at.format("%Y/%m/%d %H:%M"));
            }
            DaemonEvent::NextTime(None) => eprintln!("Scheduled backups disabled."),
            DaemonEvent::BackupNeeded => {
                if batch.as_ref().map_or(false, |b| !b.is_finished()) {
                    warn!("scheduled backup skipped, previous batch still running");
                    log.log("Scheduled backup skipped: previous backup still running");
                    continue;
                }
                batch = Some(spawn_batch(
                    config_path.to_path_buf(),
                    Arc::clone(&coordinator),
                    verbose,
                ));
            }
        }
    }
    Ok(())
}

fn spawn_batch(
    config_path: PathBuf,
    coordinator: Arc<BackupCoordinator>,
    verbose: bool,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut config = match AppConfig::load(&config_path) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "cannot load config for scheduled backup");
                eprintln!("Scheduled backup failed: {}", e);
                return;
            }
        };

        let mut progress: Option<CliProgress> = None;
        let outcome = run_batch(&coordinator, &mut config, |_, update| {
            let renderer = progress.get_or_insert_with(|| CliProgress::new(verbose));
            renderer.handle_update(update);
            if update.is_terminal() {
                progress = None;
            }
        });

        match outcome {
            Ok(report) if report.outcomes.is_empty() => eprintln!("No backup jobs configured."),
            Ok(_) => {
                if let Err(e) = config.save(&config_path) {
                    warn!(error = %e, "failed to record backup times");
                }
            }
            Err(e) => eprintln!("Scheduled backup rejected: {}", e),
        }
    })
}
