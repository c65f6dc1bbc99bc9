//! Progress reporting.
//!
//! This module defines the ProgressCallback trait, which decouples the backup engine
//! from any specific UI technology (CLI, GUI, daemon). Callbacks are invoked
//! synchronously, in emission order, on the thread running the job.
//!
//! For callers that run a job on a worker thread, `ChannelProgress` turns the
//! callbacks into owned `ProgressUpdate` messages on a crossbeam channel.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};

use crossbeam_channel::Sender;

use crate::error::EngineError;
use crate::log::LogSink;
use crate::model::RunResult;

/// Trait for receiving events from a backup run.
///
/// A run emits any number of progress/file/directory/log events, then exactly one
/// terminal event: `on_error` for a fatal setup failure, or `on_completed`.
pub trait ProgressCallback: Send {
    /// Overall progress, 0..=100, non-decreasing within a run.
    fn on_progress(&self, percent: u8);

    /// A file was copied (`success = true`) or failed.
    fn on_file_processed(&self, path: &Path, success: bool);

    /// A destination directory was created (`created = true`) or could not be.
    fn on_directory_processed(&self, path: &Path, created: bool);

    /// A human-readable log line.
    fn on_log_message(&self, message: &str);

    /// The run was aborted before copying anything.
    fn on_error(&self, error: &EngineError);

    /// The run finished (successfully, with failures, or cancelled).
    fn on_completed(&self, result: &RunResult);
}

/// Owned form of the callback events, for channels.
#[derive(Debug, Clone)]
pub enum ProgressUpdate {
    Progress(u8),
    FileProcessed { path: PathBuf, success: bool },
    DirectoryProcessed { path: PathBuf, created: bool },
    Log(String),
    /// Terminal: fatal setup error, rendered for display
    Failed(String),
    /// Terminal: run finished
    Completed(RunResult),
}

impl ProgressUpdate {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressUpdate::Failed(_) | ProgressUpdate::Completed(_))
    }
}

/// A ProgressCallback implementation that sends updates over a channel.
///
/// Send failures (receiver dropped) are ignored; the run continues.
pub struct ChannelProgress {
    sender: Sender<ProgressUpdate>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressUpdate>) -> Self {
        ChannelProgress { sender }
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_progress(&self, percent: u8) {
        let _ = self.sender.send(ProgressUpdate::Progress(percent));
    }

    fn on_file_processed(&self, path: &Path, success: bool) {
        let _ = self.sender.send(ProgressUpdate::FileProcessed {
            path: path.to_path_buf(),
            success,
        });
    }

    fn on_directory_processed(&self, path: &Path, created: bool) {
        let _ = self.sender.send(ProgressUpdate::DirectoryProcessed {
            path: path.to_path_buf(),
            created,
        });
    }

    fn on_log_message(&self, message: &str) {
        let _ = self.sender.send(ProgressUpdate::Log(message.to_string()));
    }

    fn on_error(&self, error: &EngineError) {
        let _ = self.sender.send(ProgressUpdate::Failed(error.to_string()));
    }

    fn on_completed(&self, result: &RunResult) {
        let _ = self.sender.send(ProgressUpdate::Completed(result.clone()));
    }
}

/// Per-run event emitter shared by the copy components.
///
/// Log lines go to both the log sink and the callback; progress is clamped so it
/// never decreases within one reporter's lifetime.
pub(crate) struct Reporter<'a> {
    log: &'a dyn LogSink,
    callback: Option<&'a dyn ProgressCallback>,
    mirror: Option<&'a AtomicU8>,
    last_progress: u8,
}

impl<'a> Reporter<'a> {
    pub(crate) fn new(log: &'a dyn LogSink, callback: Option<&'a dyn ProgressCallback>) -> Self {
        Reporter {
            log,
            callback,
            mirror: None,
            last_progress: 0,
        }
    }

    /// Also store every emitted progress value in `slot`.
    pub(crate) fn mirror_progress(mut self, slot: &'a AtomicU8) -> Self {
        slot.store(0, Ordering::SeqCst);
        self.mirror = Some(slot);
        self
    }

    pub(crate) fn progress(&mut self, percent: u8) {
        let percent = percent.min(100).max(self.last_progress);
        self.last_progress = percent;
        if let Some(slot) = self.mirror {
            slot.store(percent, Ordering::SeqCst);
        }
        if let Some(callback) = self.callback {
            callback.on_progress(percent);
        }
    }

    pub(crate) fn last_progress(&self) -> u8 {
        self.last_progress
    }

    pub(crate) fn file(&self, path: &Path, success: bool) {
        if let Some(callback) = self.callback {
            callback.on_file_processed(path, success);
        }
    }

    pub(crate) fn directory(&self, path: &Path, created: bool) {
        if let Some(callback) = self.callback {
            callback.on_directory_processed(path, created);
        }
    }

    pub(crate) fn log(&self, message: &str) {
        self.log.log(message);
        if let Some(callback) = self.callback {
            callback.on_log_message(message);
        }
    }

    pub(crate) fn error(&self, error: &EngineError) {
        self.log(&error.to_string());
        if let Some(callback) = self.callback {
            callback.on_error(error);
        }
    }

    pub(crate) fn completed(&self, result: &RunResult) {
        if let Some(callback) = self.callback {
            callback.on_completed(result);
        }
    }
}

/// Integer percentage, floored.
pub(crate) fn percent_of(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
