//! Sequential batch runs of every configured job.
//!
//! Jobs run one at a time on the coordinator's worker thread. The next job is only
//! started once the previous job's terminal event has arrived, so the coordinator's
//! busy check never rejects a job of the same batch.

use std::sync::Arc;

use engine::{AppConfig, BackupCoordinator, EngineError, JobSpec, ProgressUpdate, RunResult};
use tracing::{info, warn};

/// Outcome of one job of a batch.
#[derive(Debug)]
pub struct JobOutcome {
    pub name: String,
    pub result: Result<RunResult, EngineError>,
}

impl JobOutcome {
    pub fn succeeded(&self) -> bool {
        matches!(&self.result, Ok(r) if r.overall_success)
    }
}

/// Outcomes of a batch, in run order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(JobOutcome::succeeded)
    }
}

/// Run every job of `config` in order and record `lastBackupTime` for the ones that
/// succeeded. The caller persists `config` afterwards.
///
/// `on_update` sees every event of every job.
///
/// # Errors
/// `ConcurrentRunRejected` if a run outside this batch holds the coordinator.
pub fn run_batch<F>(
    coordinator: &Arc<BackupCoordinator>,
    config: &mut AppConfig,
    mut on_update: F,
) -> Result<BatchReport, EngineError>
where
    F: FnMut(&JobSpec, &ProgressUpdate),
{
    let specs = config.job_specs();
    let mut report = BatchReport::default();
    if specs.is_empty() {
        info!("no backup jobs configured");
        return Ok(report);
    }

    info!(jobs = specs.len(), "batch started");
    for (index, spec) in specs.into_iter().enumerate() {
        let handle = coordinator.spawn_job(spec.clone())?;

        for update in handle.updates.iter() {
            on_update(&spec, &update);
            if update.is_terminal() {
                break;
            }
        }

        let result = handle.join();
        match &result {
            Ok(run) if run.overall_success => {
                config.mark_backed_up(index, run.finished_at);
            }
            Ok(run) => {
                warn!(job = %spec.name, failed = run.failed_items.len(), "job finished with failures")
            }
            Err(e) => warn!(job = %spec.name, error = %e, "job aborted"),
        }
        report.outcomes.push(JobOutcome {
            name: spec.name,
            result,
        });
    }

    info!(
        jobs = report.outcomes.len(),
        ok = report.all_succeeded(),
        "batch finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::MemoryLog;
    use std::fs;
    use tempfile::TempDir;

    fn coordinator() -> Arc<BackupCoordinator> {
        Arc::new(BackupCoordinator::new(Arc::new(MemoryLog::new())))
    }

    #[test]
    fn test_batch_runs_jobs_in_order_and_marks_success() {
        let temp = TempDir::new().expect("Failed to create temp dir");
        let src = temp.path().join("src");
        fs::create_dir_all(&src).expect("Failed to create src");
        fs::write(src.join("a.txt"), "a").expect("Failed to write file");

        let mut config = AppConfig::default();
        config.add_job(&JobSpec::standard("first", &src, temp.path().join("d1")));
        config.add_job(&JobSpec::standard("broken", temp.path().join("missing"), temp.path().join("d2")));
        config.add_job(&JobSpec::standard("third", &src, temp.path().join("d3")));

        let mut seen = Vec::new();
        let report = run_batch(&coordinator(), &mut config, |spec, update| {
            if update.is_terminal() {
                seen.push(spec.name.clone());
            }
        })
        .expect("Batch should run");

        assert_eq!(seen, vec!["first", "broken", "third"]);
        assert!(!report.all_succeeded());
        assert!(report.outcomes[0].succeeded());
        assert!(matches!(
            report.outcomes[1].result,
            Err(EngineError::SourceNotFound { .. })
        ));
        assert!(temp.path().join("d3").join("a.txt").exists());

        let jobs = config.jobs();
        assert!(jobs[0].last_backup_time.is_some());
        assert!(jobs[1].last_backup_time.is_none());
        assert!(jobs[2].last_backup_time.is_some());
    }

    #[test]
    fn test_empty_batch_is_not_an_error() {
        let mut config = AppConfig::default();
        let report = run_batch(&coordinator(), &mut config, |_, _| {}).expect("Batch should run");
        assert!(report.outcomes.is_empty());
        assert!(report.all_succeeded());
    }
}
