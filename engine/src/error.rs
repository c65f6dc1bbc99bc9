//! Error types for the backup engine.
//!
//! The primary error type is `EngineError`, which represents request-level errors
//! that prevent a run from being executed (or a config from being loaded). File-level
//! errors are recorded in `RunResult::failed_items`, not as EngineError.

use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a request before (or instead of) any copying.
///
/// Per-item failures (a single file that could not be copied, a directory that could
/// not be created) never abort a run; they are `FailedItem`s in the run result.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Source directory does not exist
    #[error("Source directory not found: {}", path.display())]
    SourceNotFound { path: PathBuf },

    /// Source exists but is not a directory
    #[error("Source is not a directory: {}", path.display())]
    SourceNotADirectory { path: PathBuf },

    /// Destination root could not be created
    #[error("Failed to create destination directory: {}", path.display())]
    DestinationCreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A run was requested while another one is still active
    #[error("A backup is already running; request for '{job}' rejected")]
    ConcurrentRunRejected { job: String },

    /// An exclusion pattern could not be compiled
    #[error("Invalid exclusion pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Schedule settings out of range
    #[error("Invalid schedule: {reason}")]
    InvalidSchedule { reason: String },

    /// Config file could not be read
    #[error("Failed to read config file: {}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file could not be written
    #[error("Failed to write config file: {}", path.display())]
    ConfigWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Config file is not valid JSON for the expected document
    #[error("Failed to parse config file {}: {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No configured job matched the lookup
    #[error("No backup job named '{name}'")]
    JobNotFound { name: String },
}

impl EngineError {
    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::DestinationCreateFailed { source, .. }
            | Self::ConfigRead { source, .. }
            | Self::ConfigWrite { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }

    /// True for the rejection of a concurrent run request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::ConcurrentRunRejected { .. })
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Classification of a per-item failure inside a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemErrorKind {
    /// A file could not be copied (read, remove or write failed)
    FileCopyFailed,
    /// A mirrored destination directory could not be created
    DirectoryCreateFailed,
    /// Part of the source tree could not be read while listing it
    ScanFailed,
}

impl Display for ItemErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemErrorKind::FileCopyFailed => write!(f, "file copy failed"),
            ItemErrorKind::DirectoryCreateFailed => write!(f, "directory creation failed"),
            ItemErrorKind::ScanFailed => write!(f, "scan failed"),
        }
    }
}
