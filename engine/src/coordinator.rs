//! Run coordination: one backup at a time.
//!
//! `BackupCoordinator` owns the single busy flag of the engine. A run request made while
//! another run is active is rejected immediately with `ConcurrentRunRejected`; it is
//! never queued. Callers that want several jobs run them one after another, starting
//! the next one when the previous one's terminal event arrives.
//!
//! Jobs run either on the caller's thread (`run_job`) or on a dedicated worker thread
//! (`spawn_job`), in which case events arrive over a crossbeam channel.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver};
use tracing::{info, warn};

use crate::copy::{check_source, CopyEngine};
use crate::error::{EngineError, Result};
use crate::locator::{SaveFolderLocator, DEFAULT_MAX_DEPTH};
use crate::log::LogSink;
use crate::model::{JobMode, JobSpec, RunNotice, RunResult};
use crate::progress::{ChannelProgress, ProgressCallback, ProgressUpdate, Reporter};
use crate::save_copier::SaveDataCopier;

/// Progress reported once the save-folder search starts.
const SEARCH_PROGRESS: u8 = 10;
/// Progress reported once save folders have been found; copying fills the rest.
const FOUND_PROGRESS: u8 = 30;

/// Cooperative cancellation flag, checked between items.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Handle to a job running on a worker thread.
pub struct JobHandle {
    /// Events of the run, in emission order; the last one is terminal.
    pub updates: Receiver<ProgressUpdate>,
    cancel: CancelToken,
    thread: JoinHandle<Result<RunResult>>,
}

impl JobHandle {
    /// Request cooperative cancellation of this run.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the worker to finish and return its outcome.
    pub fn join(self) -> Result<RunResult> {
        match self.thread.join() {
            Ok(outcome) => outcome,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Dispatches jobs to the copy components and enforces the one-run-at-a-time rule.
///
/// States are `Idle -> Running -> Idle`; a failed or cancelled run returns to idle like
/// a successful one, with the outcome carried by the result.
pub struct BackupCoordinator {
    log: Arc<dyn LogSink>,
    copy_engine: CopyEngine,
    copier: SaveDataCopier,
    locator: SaveFolderLocator,
    busy: AtomicBool,
    current: Mutex<CancelToken>,
    progress: AtomicU8,
}

impl BackupCoordinator {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        Self::with_locator(log, SaveFolderLocator::new())
    }

    /// Coordinator using a custom save-folder locator (extra conventions).
    pub fn with_locator(log: Arc<dyn LogSink>, locator: SaveFolderLocator) -> Self {
        BackupCoordinator {
            copy_engine: CopyEngine::new(log.clone()),
            copier: SaveDataCopier::new(log.clone()),
            log,
            locator,
            busy: AtomicBool::new(false),
            current: Mutex::new(CancelToken::new()),
            progress: AtomicU8::new(0),
        }
    }

    /// True while a run is active.
    pub fn is_running(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Last progress value of the active (or most recent) run.
    pub fn progress(&self) -> u8 {
        self.progress.load(Ordering::SeqCst)
    }

    /// Request cancellation of the active run. No effect when idle.
    pub fn cancel(&self) {
        if self.is_running() {
            self.current_token().cancel();
            info!("cancellation requested");
        }
    }

    /// Run a job on the calling thread.
    ///
    /// Events go to `callback`, ending with exactly one `on_error` or `on_completed`.
    ///
    /// # Errors
    /// `ConcurrentRunRejected` if another run is active (no event is emitted and the
    /// active run is not affected), or the setup failure that aborted the run.
    pub fn run_job(
        &self,
        job: &JobSpec,
        callback: Option<&dyn ProgressCallback>,
    ) -> Result<RunResult> {
        let cancel = self.try_begin(job)?;
        self.execute(job, &cancel, callback)
    }

    /// Run a job on a worker thread.
    ///
    /// The busy flag is taken before this returns, so a rejection is reported here and
    /// not through the handle.
    pub fn spawn_job(self: &Arc<Self>, job: JobSpec) -> Result<JobHandle> {
        let cancel = self.try_begin(&job)?;
        let (tx, rx) = unbounded();
        let coordinator = Arc::clone(self);
        let token = cancel.clone();

        let thread = thread::spawn(move || {
            let channel = ChannelProgress::new(tx);
            coordinator.execute(&job, &token, Some(&channel))
        });

        Ok(JobHandle {
            updates: rx,
            cancel,
            thread,
        })
    }

    fn current_token(&self) -> MutexGuard<'_, CancelToken> {
        match self.current.lock() {
            Ok(token) => token,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn try_begin(&self, job: &JobSpec) -> Result<CancelToken> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!(job = %job.name, "run rejected, another backup is active");
            self.log
                .log(&format!("Backup already running, request for '{}' rejected", job.name));
            return Err(EngineError::ConcurrentRunRejected {
                job: job.name.clone(),
            });
        }

        let token = CancelToken::new();
        *self.current_token() = token.clone();
        Ok(token)
    }

    /// Body of a run; the busy flag is already held and is released before the
    /// terminal event goes out.
    fn execute(
        &self,
        job: &JobSpec,
        cancel: &CancelToken,
        callback: Option<&dyn ProgressCallback>,
    ) -> Result<RunResult> {
        let busy = BusyGuard(&self.busy);
        let mut reporter =
            Reporter::new(self.log.as_ref(), callback).mirror_progress(&self.progress);
        info!(job = %job.name, mode = %job.mode, "backup started");
        reporter.log(&format!("Starting backup: {} ({})", job.name, job.mode));

        let outcome = match &job.mode {
            JobMode::Standard => self.copy_engine.run_with(
                &job.name,
                &job.source_path,
                &job.destination_path,
                &job.exclusions,
                cancel,
                &mut reporter,
            ),
            JobMode::GameSave { folder_names } => {
                self.run_game_save(job, folder_names, cancel, &mut reporter)
            }
        };

        drop(busy);

        match &outcome {
            Ok(result) => {
                info!(
                    job = %job.name,
                    success = result.overall_success,
                    processed = result.processed_items,
                    failed = result.failed_items.len(),
                    "backup finished"
                );
                reporter.completed(result);
            }
            Err(e) => {
                warn!(job = %job.name, error = %e, "backup aborted");
                reporter.error(e);
            }
        }
        outcome
    }

    fn run_game_save(
        &self,
        job: &JobSpec,
        folder_names: &[String],
        cancel: &CancelToken,
        reporter: &mut Reporter<'_>,
    ) -> Result<RunResult> {
        let source = &job.source_path;
        let destination = &job.destination_path;
        check_source(source)?;
        create_destination(destination)?;

        let mut result = RunResult::begin(&job.name);
        reporter.log(&format!(
            "Searching for save folders in {} ({})",
            source.display(),
            folder_names.join(", ")
        ));
        reporter.progress(SEARCH_PROGRESS);

        let found = self.locator.find(source, folder_names, DEFAULT_MAX_DEPTH);
        if found.is_empty() {
            result.notice = Some(RunNotice::NoSaveFoldersFound);
            reporter.log("No save folders found, nothing to back up");
            reporter.progress(100);
            return Ok(result.finish());
        }

        reporter.log(&format!("Found {} save folders", found.len()));
        for folder in &found {
            reporter.log(&format!("  {}", folder.path.display()));
        }
        reporter.progress(FOUND_PROGRESS);

        self.copier
            .copy_with(&found, destination, cancel, reporter, &mut result, (FOUND_PROGRESS, 100));

        if result.overall_success {
            reporter.log(&format!(
                "Save data backup finished: {} folders copied",
                result.succeeded_items
            ));
        } else if !result.is_cancelled() {
            reporter.log(&format!(
                "Save data backup finished with errors: {} of {} folders copied",
                result.succeeded_items, result.total_items
            ));
        }
        Ok(result.finish())
    }
}

/// Clears the busy flag when dropped, including while unwinding out of a callback.
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

fn create_destination(destination: &Path) -> Result<()> {
    fs::create_dir_all(destination).map_err(|e| EngineError::DestinationCreateFailed {
        path: destination.to_path_buf(),
        source: e,
    })
}
