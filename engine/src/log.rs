//! User-facing backup log.
//!
//! A `LogSink` is handed to each component that produces log lines; callers compose
//! the sink they want (memory ring buffer for a log panel, file, tracing, or several
//! at once). This is separate from `tracing` diagnostics, which every module emits
//! regardless of the sink.

use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::Local;

/// Default number of entries kept by `MemoryLog`.
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

const TIMESTAMP_FORMAT: &str = "[%Y/%m/%d %H:%M:%S] ";

/// Receiver of human-readable log lines.
pub trait LogSink: Send + Sync {
    fn log(&self, message: &str);
}

fn stamp(message: &str) -> String {
    format!("{}{}", Local::now().format(TIMESTAMP_FORMAT), message)
}

/// Bounded in-memory log; the oldest entries are dropped first.
#[derive(Debug)]
pub struct MemoryLog {
    capacity: usize,
    entries: Mutex<VecDeque<String>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        MemoryLog {
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<String> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Remove every entry, then record that the log was cleared.
    pub fn clear(&self) {
        {
            let mut entries = match self.entries.lock() {
                Ok(entries) => entries,
                Err(poisoned) => poisoned.into_inner(),
            };
            entries.clear();
        }
        self.log("Log cleared");
    }
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for MemoryLog {
    fn log(&self, message: &str) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.push_back(stamp(message));
        while entries.len() > self.capacity {
            entries.pop_front();
        }
    }
}

/// Appends timestamped lines to a file.
///
/// Write failures are reported through `tracing` and otherwise ignored so that a full
/// disk never aborts a backup run.
#[derive(Debug)]
pub struct FileLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileLog {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)
    }
}

impl LogSink for FileLog {
    fn log(&self, message: &str) {
        let _guard = self.lock.lock();
        if let Err(e) = self.append(&stamp(message)) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to append to log file");
        }
    }
}

/// Forwards log lines to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn log(&self, message: &str) {
        tracing::info!(target: "backup_log", "{}", message);
    }
}

/// Broadcasts every line to several sinks.
#[derive(Default, Clone)]
pub struct FanoutLog {
    sinks: Vec<Arc<dyn LogSink>>,
}

impl FanoutLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl LogSink for FanoutLog {
    fn log(&self, message: &str) {
        for sink in &self.sinks {
            sink.log(message);
        }
    }
}
