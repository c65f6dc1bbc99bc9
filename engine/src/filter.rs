//! Exclusion filtering for Standard-mode copies.
//!
//! Patterns are compiled once per run into case-insensitive glob sets. A pattern is
//! tested against both the bare entry name and the path relative to the source root,
//! with `/` as separator on every platform. `*` crosses separators, so `logs/*`
//! excludes everything below a top-level `logs` directory.

use std::path::Path;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::error::{EngineError, Result};
use crate::model::ExclusionSet;

/// Whether a candidate is a file or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// Compiled form of an `ExclusionSet`.
#[derive(Debug, Clone)]
pub struct PathFilter {
    files: GlobSet,
    folders: GlobSet,
    extensions: Vec<String>,
}

impl PathFilter {
    /// Compile the patterns of an exclusion set.
    ///
    /// # Errors
    /// Returns `EngineError::InvalidPattern` for a pattern globset cannot parse
    /// (for example an unclosed `[`).
    pub fn new(exclusions: &ExclusionSet) -> Result<Self> {
        Ok(PathFilter {
            files: build_set(&exclusions.files)?,
            folders: build_set(&exclusions.folders)?,
            extensions: exclusions.extensions().to_vec(),
        })
    }

    /// A filter that excludes nothing.
    pub fn allow_all() -> Self {
        PathFilter {
            files: GlobSet::empty(),
            folders: GlobSet::empty(),
            extensions: Vec::new(),
        }
    }

    /// Decide whether an entry is excluded.
    ///
    /// `relative_path` is the entry's path relative to the job's source root; its last
    /// component is the bare name.
    pub fn is_excluded(&self, relative_path: &Path, kind: EntryKind) -> bool {
        let name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let relative = slash_path(relative_path);

        match kind {
            EntryKind::Directory => {
                self.folders.is_match(&name) || self.folders.is_match(&relative)
            }
            EntryKind::File => {
                if self.files.is_match(&name) || self.files.is_match(&relative) {
                    return true;
                }
                match dotted_extension(relative_path) {
                    Some(ext) => self.extensions.iter().any(|e| *e == ext),
                    None => false,
                }
            }
        }
    }
}

fn build_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            continue;
        }
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .literal_separator(false)
            .backslash_escape(false)
            .build()
            .map_err(|e| EngineError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.kind().to_string(),
            })?;
        builder.add(glob);
    }
    builder.build().map_err(|e| EngineError::InvalidPattern {
        pattern: patterns.join(", "),
        reason: e.to_string(),
    })
}

/// Relative path rendered with `/` separators.
pub(crate) fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn dotted_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
}
