// Test helper: ProgressCallback that records every invocation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::EngineError;
use crate::model::RunResult;
use crate::progress::ProgressCallback;

#[derive(Debug, Clone)]
pub(crate) enum Recorded {
    Progress(u8),
    File(PathBuf, bool),
    Directory(PathBuf, bool),
    Log(String),
    Error(String),
    Completed(RunResult),
}

pub(crate) struct RecordingCallback {
    calls: Mutex<Vec<Recorded>>,
}

impl RecordingCallback {
    pub(crate) fn new() -> Self {
        RecordingCallback {
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn progress_values(&self) -> Vec<u8> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Recorded::Progress(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn created_dirs(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Recorded::Directory(p, true) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn failed_dirs(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Recorded::Directory(p, false) => Some(p),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn logs(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Recorded::Log(m) => Some(m),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Recorded) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ProgressCallback for RecordingCallback {
    fn on_progress(&self, percent: u8) {
        self.push(Recorded::Progress(percent));
    }

    fn on_file_processed(&self, path: &Path, success: bool) {
        self.push(Recorded::File(path.to_path_buf(), success));
    }

    fn on_directory_processed(&self, path: &Path, created: bool) {
        self.push(Recorded::Directory(path.to_path_buf(), created));
    }

    fn on_log_message(&self, message: &str) {
        self.push(Recorded::Log(message.to_string()));
    }

    fn on_error(&self, error: &EngineError) {
        self.push(Recorded::Error(error.to_string()));
    }

    fn on_completed(&self, result: &RunResult) {
        self.push(Recorded::Completed(result.clone()));
    }
}
