//! Standard-mode copy: mirror a filtered source tree into a destination.
//!
//! A run has two phases:
//! - Planning: walk the source tree in lexical order, pruning excluded directories
//!   and dropping excluded files, into a flat list of files to copy
//! - Copying: process the list in order, creating mirrored directories on demand
//!
//! Individual file errors are recorded in the result but do NOT stop the run.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::coordinator::CancelToken;
use crate::error::{EngineError, ItemErrorKind, Result};
use crate::filter::{EntryKind, PathFilter};
use crate::fs_ops;
use crate::log::LogSink;
use crate::model::{ExclusionSet, FailedItem, RunNotice, RunResult};
use crate::progress::{percent_of, ProgressCallback, Reporter};

/// One file selected for copying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    /// Full source path
    pub source_path: PathBuf,
    /// Path relative to the source root
    pub relative_path: PathBuf,
}

/// The filtered file list of a run, plus any part of the tree that could not be read.
#[derive(Debug, Default)]
pub struct CopyPlan {
    pub files: Vec<PlannedFile>,
    pub scan_failures: Vec<FailedItem>,
}

/// Copies a source tree into a destination, applying a `PathFilter`.
pub struct CopyEngine {
    log: Arc<dyn LogSink>,
}

impl CopyEngine {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        CopyEngine { log }
    }

    /// Enumerate the files a run would copy.
    ///
    /// Excluded directories are pruned: their contents are never read. Symbolic links
    /// to directories are not followed.
    pub fn plan(&self, source: &Path, filter: &PathFilter) -> CopyPlan {
        let mut plan = CopyPlan::default();

        let walker = WalkDir::new(source)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                if !entry.file_type().is_dir() {
                    return true;
                }
                match entry.path().strip_prefix(source) {
                    Ok(rel) => !filter.is_excluded(rel, EntryKind::Directory),
                    Err(_) => true,
                }
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().unwrap_or(source).to_path_buf();
                    warn!(path = %path.display(), error = %e, "failed to read part of source tree");
                    plan.scan_failures
                        .push(FailedItem::new(&path, ItemErrorKind::ScanFailed, e.to_string()));
                    continue;
                }
            };

            if entry.file_type().is_dir() {
                continue;
            }
            if entry.file_type().is_symlink() && entry.path().is_dir() {
                debug!(path = %entry.path().display(), "skipping symlinked directory");
                continue;
            }

            let rel = match entry.path().strip_prefix(source) {
                Ok(rel) => rel.to_path_buf(),
                Err(_) => continue,
            };
            if filter.is_excluded(&rel, EntryKind::File) {
                debug!(path = %rel.display(), "excluded");
                continue;
            }

            plan.files.push(PlannedFile {
                source_path: entry.path().to_path_buf(),
                relative_path: rel,
            });
        }

        plan
    }

    /// Run a Standard-mode copy.
    ///
    /// Emits progress, file, directory and log events through `callback`. The terminal
    /// `on_completed`/`on_error` event is left to the caller.
    ///
    /// # Errors
    /// Setup failures only: missing source, invalid exclusion pattern, destination root
    /// that cannot be created. Nothing is copied and no progress is emitted in that case.
    pub fn run(
        &self,
        job_name: &str,
        source: &Path,
        destination: &Path,
        exclusions: &ExclusionSet,
        cancel: &CancelToken,
        callback: Option<&dyn ProgressCallback>,
    ) -> Result<RunResult> {
        let mut reporter = Reporter::new(self.log.as_ref(), callback);
        self.run_with(job_name, source, destination, exclusions, cancel, &mut reporter)
    }

    pub(crate) fn run_with(
        &self,
        job_name: &str,
        source: &Path,
        destination: &Path,
        exclusions: &ExclusionSet,
        cancel: &CancelToken,
        reporter: &mut Reporter<'_>,
    ) -> Result<RunResult> {
        check_source(source)?;
        let filter = PathFilter::new(exclusions)?;
        fs::create_dir_all(destination).map_err(|e| EngineError::DestinationCreateFailed {
            path: destination.to_path_buf(),
            source: e,
        })?;

        let mut result = RunResult::begin(job_name);
        let plan = self.plan(source, &filter);
        for failure in plan.scan_failures {
            reporter.log(&format!(
                "Could not read {}: {}",
                failure.path.display(),
                failure.reason
            ));
            result.record_failure(failure);
        }

        result.total_items = plan.files.len();
        info!(job = job_name, total = result.total_items, "starting standard copy");

        if result.total_items == 0 {
            result.notice = Some(RunNotice::NoItemsToCopy);
            reporter.log("No files to back up");
            reporter.progress(100);
            return Ok(result.finish());
        }

        let mut failed_dirs: HashSet<PathBuf> = HashSet::new();

        for file in &plan.files {
            if cancel.is_cancelled() {
                result.notice = Some(RunNotice::Cancelled);
                result.overall_success = false;
                reporter.log(&format!(
                    "Backup cancelled after {} of {} files",
                    result.processed_items, result.total_items
                ));
                let current = reporter.last_progress();
                reporter.progress(current);
                return Ok(result.finish());
            }

            let target = destination.join(&file.relative_path);
            match self.copy_one(file, &target, &mut failed_dirs, &mut result, reporter) {
                Ok(bytes) => {
                    result.succeeded_items += 1;
                    debug!(file = %file.relative_path.display(), bytes, "copied");
                    reporter.file(&file.source_path, true);
                }
                Err(reason) => {
                    warn!(file = %file.source_path.display(), %reason, "file copy failed");
                    reporter.log(&format!(
                        "File copy failed: {} -> {} ({})",
                        file.source_path.display(),
                        target.display(),
                        reason
                    ));
                    result.record_failure(FailedItem::new(
                        &file.source_path,
                        ItemErrorKind::FileCopyFailed,
                        reason,
                    ));
                    reporter.file(&file.source_path, false);
                }
            }

            result.processed_items += 1;
            reporter.progress(percent_of(result.processed_items, result.total_items));
        }

        if result.overall_success {
            reporter.log(&format!("Backup finished: {} files copied", result.succeeded_items));
        } else {
            reporter.log(&format!(
                "Backup finished with errors: {} of {} files copied, {} failures",
                result.succeeded_items,
                result.total_items,
                result.failed_items.len()
            ));
        }

        Ok(result.finish())
    }

    fn copy_one(
        &self,
        file: &PlannedFile,
        target: &Path,
        failed_dirs: &mut HashSet<PathBuf>,
        result: &mut RunResult,
        reporter: &Reporter<'_>,
    ) -> std::result::Result<u64, String> {
        if let Some(parent) = target.parent() {
            if failed_dirs.contains(parent) {
                return Err(format!("destination directory unavailable: {}", parent.display()));
            }
            let created = fs_ops::create_dirs_reporting(parent, |dir, ok| {
                reporter.directory(dir, ok);
                if ok {
                    reporter.log(&format!("Created folder: {}", dir.display()));
                }
            });
            if let Err(e) = created {
                reporter.log(&format!("Failed to create folder: {} ({})", parent.display(), e));
                result.record_failure(FailedItem::new(
                    parent,
                    ItemErrorKind::DirectoryCreateFailed,
                    e.to_string(),
                ));
                failed_dirs.insert(parent.to_path_buf());
                return Err(format!("destination directory unavailable: {}", parent.display()));
            }
        }

        fs_ops::copy_file_replacing(&file.source_path, target).map_err(|e| e.to_string())
    }
}

/// Validate that `source` exists and is a directory.
pub(crate) fn check_source(source: &Path) -> Result<()> {
    match fs::metadata(source) {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(EngineError::SourceNotADirectory {
            path: source.to_path_buf(),
        }),
        Err(_) => Err(EngineError::SourceNotFound {
            path: source.to_path_buf(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::MemoryLog;
    use crate::test_support::RecordingCallback;

    fn engine() -> CopyEngine {
        CopyEngine::new(Arc::new(MemoryLog::new()))
    }

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent");
        }
        fs::write(path, contents).expect("Failed to write file");
    }

    #[test]
    fn test_plan_is_lexical_and_prunes_excluded_dirs() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("b.txt"), "b");
        write(&src.join("a.txt"), "a");
        write(&src.join("cache").join("big.bin"), "x");
        write(&src.join("sub").join("c.txt"), "c");

        let set = ExclusionSet::new(Vec::<String>::new(), ["cache"], Vec::<String>::new());
        let filter = PathFilter::new(&set).expect("Failed to compile");
        let plan = engine().plan(&src, &filter);

        let rels: Vec<_> = plan.files.iter().map(|f| f.relative_path.clone()).collect();
        assert_eq!(
            rels,
            vec![
                PathBuf::from("a.txt"),
                PathBuf::from("b.txt"),
                PathBuf::from("sub").join("c.txt"),
            ]
        );
        assert!(plan.scan_failures.is_empty());
    }

    #[test]
    fn test_run_copies_and_reports_progress() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("a.txt"), "a");
        write(&src.join("b.log"), "b");
        write(&src.join("sub").join("c.txt"), "c");
        let dst = temp_dir.path().join("dst");

        let set = ExclusionSet::new(Vec::<String>::new(), Vec::<String>::new(), [".log"]);
        let progress = RecordingCallback::new();
        let result = engine()
            .run("job", &src, &dst, &set, &CancelToken::new(), Some(&progress))
            .expect("Run should succeed");

        assert!(result.overall_success);
        assert_eq!(result.total_items, 2);
        assert_eq!(result.succeeded_items, 2);
        assert_eq!(progress.progress_values(), vec![50, 100]);
        assert!(dst.join("a.txt").exists());
        assert!(dst.join("sub").join("c.txt").exists());
        assert!(!dst.join("b.log").exists());
        assert_eq!(progress.created_dirs(), vec![dst.join("sub")]);
    }

    #[test]
    fn test_run_replaces_existing_destination_files() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("file1.txt"), "source");
        let dst = temp_dir.path().join("dst");
        write(&dst.join("file1.txt"), "existing");

        engine()
            .run("job", &src, &dst, &ExclusionSet::default(), &CancelToken::new(), None)
            .expect("Run should succeed");

        let contents = fs::read_to_string(dst.join("file1.txt")).expect("Failed to read file");
        assert_eq!(contents, "source");
    }

    #[test]
    fn test_run_with_nothing_to_copy_reports_100() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("only.log"), "x");
        let dst = temp_dir.path().join("dst");

        let set = ExclusionSet::new(Vec::<String>::new(), Vec::<String>::new(), [".LOG"]);
        let progress = RecordingCallback::new();
        let result = engine()
            .run("job", &src, &dst, &set, &CancelToken::new(), Some(&progress))
            .expect("Run should succeed");

        assert!(result.overall_success);
        assert_eq!(result.notice, Some(RunNotice::NoItemsToCopy));
        assert_eq!(progress.progress_values(), vec![100]);
    }

    #[test]
    fn test_run_missing_source_is_fatal_without_progress() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let progress = RecordingCallback::new();
        let err = engine()
            .run(
                "job",
                &temp_dir.path().join("nonexistent"),
                &temp_dir.path().join("dst"),
                &ExclusionSet::default(),
                &CancelToken::new(),
                Some(&progress),
            )
            .unwrap_err();

        assert!(matches!(err, EngineError::SourceNotFound { .. }));
        assert!(progress.progress_values().is_empty());
        assert!(!temp_dir.path().join("dst").exists());
    }

    #[test]
    fn test_run_destination_blocked_by_file_is_fatal() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("a.txt"), "a");
        let dst = temp_dir.path().join("dst");
        write(&dst, "not a directory");

        let err = engine()
            .run("job", &src, &dst, &ExclusionSet::default(), &CancelToken::new(), None)
            .unwrap_err();
        assert!(matches!(err, EngineError::DestinationCreateFailed { .. }));
    }

    #[test]
    fn test_run_continues_after_directory_failure() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("blocked").join("x.txt"), "x");
        write(&src.join("ok.txt"), "ok");
        let dst = temp_dir.path().join("dst");
        // A file where the mirrored directory should go
        write(&dst.join("blocked"), "in the way");

        let progress = RecordingCallback::new();
        let result = engine()
            .run("job", &src, &dst, &ExclusionSet::default(), &CancelToken::new(), Some(&progress))
            .expect("Run should complete");

        assert!(!result.overall_success);
        assert_eq!(result.processed_items, 2);
        assert_eq!(result.succeeded_items, 1);
        assert!(result
            .failed_items
            .iter()
            .any(|f| f.kind == ItemErrorKind::FileCopyFailed));
        assert!(result
            .failed_items
            .iter()
            .any(|f| f.kind == ItemErrorKind::DirectoryCreateFailed));
        assert!(progress.failed_dirs().contains(&dst.join("blocked")));
        assert!(dst.join("ok.txt").exists());
        assert_eq!(progress.progress_values(), vec![50, 100]);
    }

    #[test]
    fn test_run_stops_when_cancelled() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        write(&src.join("a.txt"), "a");
        write(&src.join("b.txt"), "b");
        let dst = temp_dir.path().join("dst");

        let cancel = CancelToken::new();
        cancel.cancel();
        let progress = RecordingCallback::new();
        let result = engine()
            .run("job", &src, &dst, &ExclusionSet::default(), &cancel, Some(&progress))
            .expect("Run should return a result");

        assert!(result.is_cancelled());
        assert!(!result.overall_success);
        assert_eq!(result.processed_items, 0);
        assert_eq!(progress.progress_values(), vec![0]);
        assert!(!dst.join("a.txt").exists());
    }
}
