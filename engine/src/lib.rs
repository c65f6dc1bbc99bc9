//! # BackUP Engine - Personal Backup Library
//!
//! A headless backup engine: mirror a folder tree into a destination, or pull only the
//! save-data folders out of a games directory, on demand or on a schedule.
//! Designed as the foundation for multiple front ends (CLI, daemon, GUI).
//!
//! ## Overview
//!
//! The engine features:
//! - Standard mode: filtered recursive copy with case-insensitive wildcard exclusions
//! - GameSave mode: bounded-depth save-folder search plus whole-folder copy per owner
//! - Per-item error isolation (one bad file never aborts a run)
//! - One run at a time, enforced by the coordinator; cooperative cancellation
//! - Progress reporting via callbacks or a channel (decoupled from UI technology)
//! - Daily and periodic scheduling driven by a single timer
//! - JSON persistence of jobs and schedule settings
//!
//! ## Basic Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use engine::{BackupCoordinator, ExclusionSet, JobSpec, MemoryLog};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let log = Arc::new(MemoryLog::new());
//! let coordinator = BackupCoordinator::new(log.clone());
//!
//! let job = JobSpec::standard("documents", "/home/me/docs", "/mnt/backup/docs")
//!     .with_exclusions(ExclusionSet::new(["*.tmp"], ["node_modules"], [".log"]));
//!
//! let result = coordinator.run_job(&job, None)?;
//! println!(
//!     "{} of {} files copied",
//!     result.succeeded_items, result.total_items
//! );
//! for line in log.entries() {
//!     println!("{}", line);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (JobSpec, JobMode, ExclusionSet, RunResult)
//! - **error**: Error types and handling
//! - **filter**: Exclusion matching
//! - **fs_ops**: Low-level filesystem operations
//! - **copy**: Standard-mode copy engine
//! - **locator**: Save-folder search
//! - **save_copier**: GameSave-mode copy
//! - **coordinator**: Single-run dispatch and worker threads
//! - **progress**: Progress callback trait and channel adapter
//! - **log**: User-facing log sinks
//! - **scheduler**: Daily/periodic trigger computation and timer
//! - **config**: Persisted settings

pub mod model;
pub mod error;
pub mod filter;
pub mod fs_ops;
pub mod copy;
pub mod locator;
pub mod save_copier;
pub mod coordinator;
pub mod progress;
pub mod log;
pub mod scheduler;
pub mod config;

#[cfg(test)]
mod test_support;

// Re-export main types and functions
pub use model::{ExclusionSet, FailedItem, JobMode, JobSpec, RunNotice, RunResult};
pub use error::{EngineError, ItemErrorKind, Result};
pub use filter::{EntryKind, PathFilter};
pub use copy::{CopyEngine, CopyPlan, PlannedFile};
pub use locator::{FoundFolder, SaveConvention, SaveFolderLocator, WwwSaveConvention, DEFAULT_MAX_DEPTH};
pub use save_copier::SaveDataCopier;
pub use coordinator::{BackupCoordinator, CancelToken, JobHandle};
pub use progress::{ChannelProgress, ProgressCallback, ProgressUpdate};
pub use log::{FanoutLog, FileLog, LogSink, MemoryLog, TracingLog};
pub use scheduler::{next_trigger, ScheduleConfig, Scheduler, SchedulerHandle, SchedulerListener, TriggerKind};
pub use config::{AppConfig, JobRecord, ScheduleRecord};
