//! Save-folder search for GameSave mode.
//!
//! The locator walks a source tree down to a depth budget looking for folders with
//! configured names. Engine-specific layouts that cannot be expressed as a plain name
//! are handled by `SaveConvention` rules, applied to every subdirectory the search
//! visits. The built-in rule is `WwwSaveConvention` (`<game>/www/save`).

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, warn};

/// Depth budget used when the caller does not specify one.
pub const DEFAULT_MAX_DEPTH: i32 = 10;

/// Owner name used when a found folder has no enclosing directory name.
pub const FALLBACK_OWNER: &str = "_root";

/// A located save folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFolder {
    /// Full path of the save folder
    pub path: PathBuf,

    /// Number of trailing path components that form the save location itself
    /// (1 for `savedata`, 2 for `www/save`). The component just above them is the owner.
    pub kept_segments: usize,
}

impl FoundFolder {
    /// A folder matched by name; every component of `name` is kept.
    pub fn named(path: PathBuf, name: &str) -> Self {
        let kept = Path::new(name)
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .count()
            .max(1);
        FoundFolder {
            path,
            kept_segments: kept,
        }
    }

    fn normal_components(&self) -> Vec<String> {
        self.path
            .components()
            .filter_map(|c| match c {
                Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect()
    }

    /// Name of the application that owns this save folder.
    pub fn owner(&self) -> String {
        let parts = self.normal_components();
        if parts.len() > self.kept_segments {
            parts[parts.len() - self.kept_segments - 1].clone()
        } else {
            FALLBACK_OWNER.to_string()
        }
    }

    /// Path below the destination root: `<owner>/<kept segments>`.
    pub fn relative_destination(&self) -> PathBuf {
        let parts = self.normal_components();
        let kept = self.kept_segments.min(parts.len());
        let mut rel = PathBuf::from(self.owner());
        for part in &parts[parts.len() - kept..] {
            rel.push(part);
        }
        rel
    }
}

/// A known save-location layout that a name search alone would miss.
pub trait SaveConvention: Send + Sync {
    /// Short label for logs.
    fn label(&self) -> &str;

    /// Inspect a visited subdirectory; return a save folder found through it.
    fn locate(&self, dir: &Path) -> Option<FoundFolder>;
}

/// Games built on web-export engines keep saves in `<game>/www/save`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WwwSaveConvention;

impl SaveConvention for WwwSaveConvention {
    fn label(&self) -> &str {
        "www/save"
    }

    fn locate(&self, dir: &Path) -> Option<FoundFolder> {
        if dir.file_name()? != "www" {
            return None;
        }
        let save = dir.join("save");
        if save.is_dir() {
            Some(FoundFolder {
                path: save,
                kept_segments: 2,
            })
        } else {
            None
        }
    }
}

/// Bounded-depth search for save folders.
pub struct SaveFolderLocator {
    conventions: Vec<Box<dyn SaveConvention>>,
}

impl Default for SaveFolderLocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SaveFolderLocator {
    /// Locator with the built-in conventions.
    pub fn new() -> Self {
        SaveFolderLocator {
            conventions: vec![Box::new(WwwSaveConvention)],
        }
    }

    /// Locator that only matches by name.
    pub fn without_conventions() -> Self {
        SaveFolderLocator {
            conventions: Vec::new(),
        }
    }

    pub fn with_convention(mut self, convention: Box<dyn SaveConvention>) -> Self {
        self.conventions.push(convention);
        self
    }

    /// Search `root` for folders named in `target_names`.
    ///
    /// Each level consumes one unit of `max_depth`: with a budget of 0 nothing is
    /// searched, with 1 only the direct children of `root` are checked. Results are
    /// sorted, de-duplicated, and folders nested inside another result are dropped
    /// (the outer folder is copied in full anyway). Unreadable directories are skipped.
    /// A list with no non-blank names matches nothing, conventions included.
    pub fn find(&self, root: &Path, target_names: &[String], max_depth: i32) -> Vec<FoundFolder> {
        if target_names.iter().all(|name| name.trim().is_empty()) {
            debug!(root = %root.display(), "no save folder names given");
            return Vec::new();
        }
        let mut found = Vec::new();
        self.visit(root, target_names, max_depth, &mut found);
        dedup(found)
    }

    /// Same as `find`, returning only the paths.
    pub fn find_paths(&self, root: &Path, target_names: &[String], max_depth: i32) -> Vec<PathBuf> {
        self.find(root, target_names, max_depth)
            .into_iter()
            .map(|f| f.path)
            .collect()
    }

    fn visit(&self, dir: &Path, names: &[String], depth: i32, found: &mut Vec<FoundFolder>) {
        if depth <= 0 {
            return;
        }

        for name in names {
            if name.trim().is_empty() {
                continue;
            }
            let candidate = dir.join(name);
            if candidate.is_dir() {
                debug!(path = %candidate.display(), "save folder matched by name");
                found.push(FoundFolder::named(candidate, name));
            }
        }

        for sub in subdirectories(dir) {
            for convention in &self.conventions {
                if let Some(hit) = convention.locate(&sub) {
                    debug!(path = %hit.path.display(), rule = convention.label(), "save folder matched by convention");
                    found.push(hit);
                }
            }
            self.visit(&sub, names, depth - 1, found);
        }
    }
}

/// Real (non-symlink) subdirectories of `dir`, sorted by name.
fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(path = %dir.display(), error = %e, "cannot read directory during save search");
            return Vec::new();
        }
    };

    let mut dirs: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|entry| entry.path())
        .collect();
    dirs.sort();
    dirs
}

fn dedup(mut found: Vec<FoundFolder>) -> Vec<FoundFolder> {
    // Same path found twice: keep the variant that preserves the most structure
    found.sort_by(|a, b| a.path.cmp(&b.path).then(b.kept_segments.cmp(&a.kept_segments)));

    let mut result: Vec<FoundFolder> = Vec::with_capacity(found.len());
    for folder in found {
        if let Some(last) = result.last() {
            if folder.path.starts_with(&last.path) {
                continue;
            }
        }
        result.push(folder);
    }
    result
}
