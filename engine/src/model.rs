//! Core data model for backup jobs.
//!
//! This module defines the main data structures for representing backup runs:
//! - JobSpec: one backup unit (source, destination, filters, mode)
//! - ExclusionSet: the three pattern collections a Standard copy skips
//! - RunResult: the transient outcome of one run
//! - JobMode, RunNotice, FailedItem: enums and records controlling and describing a run

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use uuid::Uuid;

use crate::error::ItemErrorKind;

/// The description of one backup unit.
///
/// Owned by the caller (job editor, config file); the engine only reads it for the
/// duration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    /// Display name
    pub name: String,

    /// Root source directory
    pub source_path: PathBuf,

    /// Root destination directory
    pub destination_path: PathBuf,

    /// What a Standard copy skips
    pub exclusions: ExclusionSet,

    /// Copy strategy
    pub mode: JobMode,

    /// When the job last completed successfully
    pub last_backup_time: Option<DateTime<Local>>,
}

impl JobSpec {
    /// Create a Standard-mode job with no exclusions.
    pub fn standard<S, P, Q>(name: S, source: P, destination: Q) -> Self
    where
        S: Into<String>,
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
    {
        JobSpec {
            name: name.into(),
            source_path: source.into(),
            destination_path: destination.into(),
            exclusions: ExclusionSet::default(),
            mode: JobMode::Standard,
            last_backup_time: None,
        }
    }

    /// Create a GameSave-mode job searching for the given folder names.
    pub fn game_save<S, P, Q>(name: S, source: P, destination: Q, folder_names: Vec<String>) -> Self
    where
        S: Into<String>,
        P: Into<PathBuf>,
        Q: Into<PathBuf>,
    {
        JobSpec {
            mode: JobMode::GameSave { folder_names },
            ..JobSpec::standard(name, source, destination)
        }
    }

    pub fn with_exclusions(mut self, exclusions: ExclusionSet) -> Self {
        self.exclusions = exclusions;
        self
    }
}

/// The copy strategy of a job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum JobMode {
    /// Mirror the whole source tree, minus exclusions
    #[default]
    Standard,
    /// Extract only folders with these names (plus known save-location conventions)
    GameSave { folder_names: Vec<String> },
}

impl JobMode {
    /// Numeric code used by the persisted job record.
    pub fn code(&self) -> u8 {
        match self {
            JobMode::Standard => 0,
            JobMode::GameSave { .. } => 1,
        }
    }
}

impl std::fmt::Display for JobMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobMode::Standard => write!(f, "Standard"),
            JobMode::GameSave { .. } => write!(f, "GameSave"),
        }
    }
}

/// The three pattern collections that decide what a Standard copy skips.
///
/// File and folder patterns are case-insensitive wildcards (`*` = any run of
/// characters). Extensions are stored with a leading dot, lower-cased.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionSet {
    pub files: Vec<String>,
    pub folders: Vec<String>,
    extensions: Vec<String>,
}

impl ExclusionSet {
    pub fn new<F, D, E>(files: F, folders: D, extensions: E) -> Self
    where
        F: IntoIterator,
        F::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
        E: IntoIterator,
        E::Item: AsRef<str>,
    {
        let mut set = ExclusionSet {
            files: files.into_iter().map(Into::into).collect(),
            folders: folders.into_iter().map(Into::into).collect(),
            extensions: Vec::new(),
        };
        for ext in extensions {
            set.add_extension(ext.as_ref());
        }
        set
    }

    /// Add an extension, normalizing it to `.ext` lower case. Blank input is ignored.
    pub fn add_extension(&mut self, ext: &str) {
        if let Some(normalized) = normalize_extension(ext) {
            if !self.extensions.contains(&normalized) {
                self.extensions.push(normalized);
            }
        }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.folders.is_empty() && self.extensions.is_empty()
    }
}

/// Normalize a user-supplied extension to `.ext`, lower-cased.
pub fn normalize_extension(ext: &str) -> Option<String> {
    let trimmed = ext.trim().trim_start_matches('.');
    if trimmed.is_empty() {
        None
    } else {
        Some(format!(".{}", trimmed.to_lowercase()))
    }
}

/// A single item that failed during a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem {
    pub path: PathBuf,
    pub kind: ItemErrorKind,
    pub reason: String,
}

impl FailedItem {
    pub fn new(path: &Path, kind: ItemErrorKind, reason: impl Into<String>) -> Self {
        FailedItem {
            path: path.to_path_buf(),
            kind,
            reason: reason.into(),
        }
    }
}

/// Conditions worth reporting that are not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunNotice {
    /// The filtered file list was empty
    NoItemsToCopy,
    /// GameSave mode found no save folders
    NoSaveFoldersFound,
    /// The run stopped at a cancellation checkpoint
    Cancelled,
}

/// Outcome of one copy run. Transient; never persisted by the engine.
#[derive(Debug, Clone)]
pub struct RunResult {
    /// Unique identifier for this run
    pub run_id: Uuid,

    /// Name of the job that produced this result
    pub job_name: String,

    /// Number of items the run planned to process
    pub total_items: usize,

    /// Items the loop reached (succeeded or failed)
    pub processed_items: usize,

    /// Items copied successfully
    pub succeeded_items: usize,

    /// Per-item failures, in the order they happened
    pub failed_items: Vec<FailedItem>,

    /// Conjunction of every per-item outcome (false when cancelled)
    pub overall_success: bool,

    /// Non-error condition worth surfacing
    pub notice: Option<RunNotice>,

    /// When the run started
    pub started_at: DateTime<Local>,

    /// When the run finished
    pub finished_at: DateTime<Local>,
}

impl RunResult {
    pub(crate) fn begin(job_name: &str) -> Self {
        let now = Local::now();
        RunResult {
            run_id: Uuid::new_v4(),
            job_name: job_name.to_string(),
            total_items: 0,
            processed_items: 0,
            succeeded_items: 0,
            failed_items: Vec::new(),
            overall_success: true,
            notice: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub(crate) fn record_failure(&mut self, item: FailedItem) {
        self.overall_success = false;
        self.failed_items.push(item);
    }

    pub(crate) fn finish(mut self) -> Self {
        self.finished_at = Local::now();
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.notice == Some(RunNotice::Cancelled)
    }
}
