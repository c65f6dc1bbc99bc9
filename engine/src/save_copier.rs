//! GameSave-mode copy: place each located save folder under its owner.
//!
//! A folder found at `<...>/GameA/savedata` lands in `<dest>/GameA/savedata`; one found
//! through the `www/save` convention at `<...>/GameB/www/save` lands in
//! `<dest>/GameB/www/save`. Folders are copied in full (hidden files included, no
//! exclusion filtering) with the same replace-then-copy semantics as Standard mode.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::coordinator::CancelToken;
use crate::error::ItemErrorKind;
use crate::fs_ops::{self, TreeEntry};
use crate::locator::FoundFolder;
use crate::log::LogSink;
use crate::model::{FailedItem, RunNotice, RunResult};
use crate::progress::{ProgressCallback, Reporter};

/// Copies located save folders into a destination organized by owner.
pub struct SaveDataCopier {
    log: Arc<dyn LogSink>,
}

impl SaveDataCopier {
    pub fn new(log: Arc<dyn LogSink>) -> Self {
        SaveDataCopier { log }
    }

    /// Copy every folder; true only if all of them copied without error.
    ///
    /// A failing folder is logged and the remaining folders are still processed.
    pub fn copy_all(
        &self,
        found: &[FoundFolder],
        dest_root: &Path,
        callback: Option<&dyn ProgressCallback>,
    ) -> bool {
        self.run("save data", found, dest_root, &CancelToken::new(), callback)
            .overall_success
    }

    /// Copy every folder, reporting progress from 0 to 100 and returning the full result.
    pub fn run(
        &self,
        job_name: &str,
        found: &[FoundFolder],
        dest_root: &Path,
        cancel: &CancelToken,
        callback: Option<&dyn ProgressCallback>,
    ) -> RunResult {
        let mut reporter = Reporter::new(self.log.as_ref(), callback);
        let mut result = RunResult::begin(job_name);
        self.copy_with(found, dest_root, cancel, &mut reporter, &mut result, (0, 100));
        result.finish()
    }

    /// Core loop shared with the coordinator, which owns the surrounding progress span.
    ///
    /// Progress moves linearly from `span.0` to `span.1` as folders complete.
    pub(crate) fn copy_with(
        &self,
        found: &[FoundFolder],
        dest_root: &Path,
        cancel: &CancelToken,
        reporter: &mut Reporter<'_>,
        result: &mut RunResult,
        span: (u8, u8),
    ) {
        result.total_items = found.len();
        let (start, end) = span;
        let width = end.saturating_sub(start) as usize;

        for folder in found {
            if cancel.is_cancelled() {
                result.notice = Some(RunNotice::Cancelled);
                result.overall_success = false;
                reporter.log(&format!(
                    "Backup cancelled after {} of {} save folders",
                    result.processed_items, result.total_items
                ));
                let current = reporter.last_progress();
                reporter.progress(current);
                return;
            }

            if self.copy_folder(folder, dest_root, reporter, result) {
                result.succeeded_items += 1;
            } else {
                result.overall_success = false;
            }

            result.processed_items += 1;
            let step = width * result.processed_items / result.total_items.max(1);
            reporter.progress(start.saturating_add(step as u8));
        }
    }

    fn copy_folder(
        &self,
        folder: &FoundFolder,
        dest_root: &Path,
        reporter: &Reporter<'_>,
        result: &mut RunResult,
    ) -> bool {
        let target = dest_root.join(folder.relative_destination());
        reporter.log(&format!(
            "Copying save data: {} -> {}",
            folder.path.display(),
            target.display()
        ));

        if let Some(parent) = target.parent() {
            let created = fs_ops::create_dirs_reporting(parent, |dir, ok| reporter.directory(dir, ok));
            if let Err(e) = created {
                reporter.log(&format!(
                    "Save data copy failed: cannot create {} ({})",
                    parent.display(),
                    e
                ));
                result.record_failure(FailedItem::new(
                    parent,
                    ItemErrorKind::DirectoryCreateFailed,
                    e.to_string(),
                ));
                return false;
            }
        }
        if !target.exists() {
            match fs::create_dir(&target) {
                Ok(()) => reporter.directory(&target, true),
                Err(e) => {
                    reporter.directory(&target, false);
                    reporter.log(&format!(
                        "Save data copy failed: cannot create {} ({})",
                        target.display(),
                        e
                    ));
                    result.record_failure(FailedItem::new(
                        &target,
                        ItemErrorKind::DirectoryCreateFailed,
                        e.to_string(),
                    ));
                    return false;
                }
            }
        }

        let mut files = 0usize;
        let mut ok = true;
        let walked = fs_ops::copy_tree(&folder.path, &target, |entry| match entry {
            TreeEntry::File { path, result: Ok(_) } => {
                files += 1;
                reporter.file(path, true);
            }
            TreeEntry::File { path, result: Err(e) } => {
                ok = false;
                warn!(file = %path.display(), error = %e, "save file copy failed");
                reporter.log(&format!("File copy failed: {} ({})", path.display(), e));
                reporter.file(path, false);
                result.record_failure(FailedItem::new(path, ItemErrorKind::FileCopyFailed, e.to_string()));
            }
            TreeEntry::Directory { path, result: Ok(()) } => {
                reporter.directory(path, true);
            }
            TreeEntry::Directory { path, result: Err(e) } => {
                ok = false;
                reporter.log(&format!("Failed to create folder: {} ({})", path.display(), e));
                reporter.directory(path, false);
                result.record_failure(FailedItem::new(
                    path,
                    ItemErrorKind::DirectoryCreateFailed,
                    e.to_string(),
                ));
            }
        });

        if let Err(e) = walked {
            reporter.log(&format!(
                "Save data copy failed: cannot read {} ({})",
                folder.path.display(),
                e
            ));
            result.record_failure(FailedItem::new(
                &folder.path,
                ItemErrorKind::ScanFailed,
                e.to_string(),
            ));
            return false;
        }

        if ok {
            info!(owner = %folder.owner(), files, "save folder copied");
            reporter.log(&format!(
                "Save data copied: {} ({} files)",
                target.display(),
                files
            ));
        } else {
            reporter.log(&format!("Save data copied with errors: {}", target.display()));
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{SaveFolderLocator, DEFAULT_MAX_DEPTH};
    use crate::log::MemoryLog;
    use crate::test_support::RecordingCallback;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent");
        }
        fs::write(path, contents).expect("Failed to write file");
    }

    #[test]
    fn test_copies_into_owner_layout() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("games");
        write(&src.join("GameA/savedata/file1"), "a");
        write(&src.join("GameA/savedata/.meta"), "hidden");
        write(&src.join("GameB/www/save/file2"), "b");
        let dst = temp_dir.path().join("backup");

        let found = SaveFolderLocator::new().find(&src, &["savedata".to_string()], DEFAULT_MAX_DEPTH);
        let log = Arc::new(MemoryLog::new());
        let copier = SaveDataCopier::new(log.clone());
        let progress = RecordingCallback::new();

        assert!(copier.copy_all(&found, &dst, Some(&progress)));
        assert!(dst.join("GameA/savedata/file1").exists());
        assert!(dst.join("GameA/savedata/.meta").exists());
        assert!(dst.join("GameB/www/save/file2").exists());

        // One message before and one after each folder
        let logs = progress.logs();
        assert_eq!(logs.iter().filter(|m| m.starts_with("Copying save data")).count(), 2);
        assert_eq!(logs.iter().filter(|m| m.starts_with("Save data copied")).count(), 2);
        assert_eq!(log.entries().len(), logs.len());
        assert_eq!(progress.progress_values(), vec![50, 100]);
    }

    #[test]
    fn test_failed_folder_does_not_stop_the_rest() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("games");
        write(&src.join("GameB/savedata/ok.sav"), "ok");
        let dst = temp_dir.path().join("backup");

        let found = vec![
            FoundFolder::named(src.join("GameA/savedata"), "savedata"),
            FoundFolder::named(src.join("GameB/savedata"), "savedata"),
        ];
        let copier = SaveDataCopier::new(Arc::new(MemoryLog::new()));
        let result = copier.run("job", &found, &dst, &CancelToken::new(), None);

        assert!(!result.overall_success);
        assert_eq!(result.processed_items, 2);
        assert_eq!(result.succeeded_items, 1);
        assert!(dst.join("GameB/savedata/ok.sav").exists());
        assert_eq!(result.failed_items[0].path, src.join("GameA/savedata"));
    }

    #[test]
    fn test_existing_backup_is_refreshed() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("games");
        write(&src.join("GameA/savedata/slot1"), "new");
        let dst = temp_dir.path().join("backup");
        write(&dst.join("GameA/savedata/slot1"), "old");

        let found = vec![FoundFolder::named(src.join("GameA/savedata"), "savedata")];
        let copier = SaveDataCopier::new(Arc::new(MemoryLog::new()));
        assert!(copier.copy_all(&found, &dst, None));
        assert_eq!(
            fs::read_to_string(dst.join("GameA/savedata/slot1")).expect("Failed to read"),
            "new"
        );
    }

    #[test]
    fn test_cancel_before_first_folder_copies_nothing() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("games");
        write(&src.join("GameA/savedata/slot1"), "a");
        write(&src.join("GameB/savedata/slot1"), "b");
        let dst = temp_dir.path().join("backup");

        let found = vec![
            FoundFolder::named(src.join("GameA/savedata"), "savedata"),
            FoundFolder::named(src.join("GameB/savedata"), "savedata"),
        ];
        let cancel = CancelToken::new();
        cancel.cancel();
        let progress = RecordingCallback::new();
        let copier = SaveDataCopier::new(Arc::new(MemoryLog::new()));
        let result = copier.run("job", &found, &dst, &cancel, Some(&progress));

        assert!(result.is_cancelled());
        assert!(!result.overall_success);
        assert_eq!(result.total_items, 2);
        assert_eq!(result.processed_items, 0);
        assert!(result.failed_items.is_empty());
        assert_eq!(progress.progress_values(), vec![0]);
        assert!(!dst.join("GameA").exists());
        assert!(progress.logs().iter().any(|m| m.starts_with("Backup cancelled after 0 of 2")));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_directory_inside_save_folder_is_skipped() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("games");
        write(&src.join("GameA/savedata/slot1"), "1");
        write(&src.join("elsewhere/other.sav"), "o");
        std::os::unix::fs::symlink(
            src.join("elsewhere"),
            src.join("GameA/savedata/link"),
        )
        .expect("Failed to symlink");
        let dst = temp_dir.path().join("backup");

        let found = vec![FoundFolder::named(src.join("GameA/savedata"), "savedata")];
        let copier = SaveDataCopier::new(Arc::new(MemoryLog::new()));
        let result = copier.run("job", &found, &dst, &CancelToken::new(), None);

        assert!(result.overall_success);
        assert!(result.failed_items.is_empty());
        assert!(dst.join("GameA/savedata/slot1").is_file());
        assert!(!dst.join("GameA/savedata/link").exists());
    }
}
