//! Filesystem operations module.
//!
//! This module provides low-level operations for:
//! - Copying files (replacing an existing destination) with mtime preservation
//! - Creating mirrored directories one level at a time, so each creation can be reported
//! - Deep-copying a whole folder, with no filtering
//!
//! Everything here returns `io::Error`; callers decide whether a failure is fatal or
//! per-item.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Copy a file from source to destination, replacing any existing file.
///
/// An existing destination file is removed first, so read-only targets from a previous
/// run do not block the copy. The source modification time is carried over when the
/// platform allows it.
///
/// # Returns
/// Number of bytes copied
pub fn copy_file_replacing(src: &Path, dst: &Path) -> io::Result<u64> {
    match fs::symlink_metadata(dst) {
        Ok(meta) if meta.is_dir() => {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "destination exists and is a directory",
            ));
        }
        Ok(_) => fs::remove_file(dst)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut src_file = fs::File::open(src)?;
    let src_mtime = src_file.metadata().ok().and_then(|m| m.modified().ok());

    let mut dst_file = fs::File::create(dst)?;
    let bytes_copied = io::copy(&mut src_file, &mut dst_file)?;
    drop(dst_file);

    // Preserve modification time if available
    if let Some(mtime) = src_mtime {
        let _ = filetime::set_file_mtime(dst, filetime::FileTime::from_system_time(mtime));
    }

    Ok(bytes_copied)
}

/// Ancestors of `dir` (including itself) that do not exist yet, outermost first.
pub fn missing_dirs(dir: &Path) -> Vec<PathBuf> {
    let mut missing: Vec<PathBuf> = dir
        .ancestors()
        .take_while(|p| !p.as_os_str().is_empty() && fs::symlink_metadata(p).is_err())
        .map(Path::to_path_buf)
        .collect();
    missing.reverse();
    missing
}

/// Create `dir` and any missing parents, one level at a time.
///
/// `on_created` is called once per directory this call attempted to create, in order.
/// Stops at the first failure and returns it.
pub fn create_dirs_reporting<F>(dir: &Path, mut on_created: F) -> io::Result<()>
where
    F: FnMut(&Path, bool),
{
    if let Ok(meta) = fs::metadata(dir) {
        if meta.is_dir() {
            return Ok(());
        }
        on_created(dir, false);
        return Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            "path exists but is not a directory",
        ));
    }

    for path in missing_dirs(dir) {
        match fs::create_dir(&path) {
            Ok(()) => on_created(&path, true),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => {}
            Err(e) => {
                on_created(&path, false);
                return Err(e);
            }
        }
    }
    Ok(())
}

/// Outcome of copying one entry during a tree copy.
#[derive(Debug)]
pub enum TreeEntry<'a> {
    Directory { path: &'a Path, result: io::Result<()> },
    File { path: &'a Path, result: io::Result<u64> },
}

/// Deep-copy `src` into `dst`, including hidden files, with no filtering.
///
/// Entries are visited in lexical order. Symlinked directories are skipped, the same
/// way a filtered copy skips them. Per-entry failures are passed to `on_entry` and the
/// walk continues. Returns `Err` only if `src` itself cannot be read.
pub fn copy_tree<F>(src: &Path, dst: &Path, mut on_entry: F) -> io::Result<()>
where
    F: FnMut(TreeEntry<'_>),
{
    fs::read_dir(src)?;
    fs::create_dir_all(dst)?;

    for entry in WalkDir::new(src).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| src.to_path_buf());
                let err = e
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::new(io::ErrorKind::Other, "filesystem loop"));
                on_entry(TreeEntry::Directory {
                    path: &path,
                    result: Err(err),
                });
                continue;
            }
        };

        if entry.file_type().is_symlink() && entry.path().is_dir() {
            debug!(path = %entry.path().display(), "skipping symlinked directory");
            continue;
        }

        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            if target.is_dir() {
                continue;
            }
            let result = fs::create_dir_all(&target);
            on_entry(TreeEntry::Directory {
                path: &target,
                result,
            });
        } else {
            let result = copy_file_replacing(entry.path(), &target);
            on_entry(TreeEntry::File {
                path: entry.path(),
                result,
            });
        }
    }

    Ok(())
}
