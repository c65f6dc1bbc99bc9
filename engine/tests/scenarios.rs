//! End-to-end runs through `BackupCoordinator` on real temporary directory trees.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use engine::{
    BackupCoordinator, EngineError, ExclusionSet, JobSpec, MemoryLog, ProgressCallback,
    ProgressUpdate, RunNotice, RunResult, SaveFolderLocator, DEFAULT_MAX_DEPTH,
};

#[derive(Default)]
struct Recorder {
    progress: Mutex<Vec<u8>>,
    logs: Mutex<Vec<String>>,
    completed: Mutex<Vec<RunResult>>,
    errors: Mutex<Vec<String>>,
}

impl Recorder {
    fn progress(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }
}

impl ProgressCallback for Recorder {
    fn on_progress(&self, percent: u8) {
        self.progress.lock().unwrap().push(percent);
    }

    fn on_file_processed(&self, _path: &Path, _success: bool) {}

    fn on_directory_processed(&self, _path: &Path, _created: bool) {}

    fn on_log_message(&self, message: &str) {
        self.logs.lock().unwrap().push(message.to_string());
    }

    fn on_error(&self, error: &EngineError) {
        self.errors.lock().unwrap().push(error.to_string());
    }

    fn on_completed(&self, result: &RunResult) {
        self.completed.lock().unwrap().push(result.clone());
    }
}

fn write(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent");
    }
    fs::write(path, contents).expect("Failed to write file");
}

fn coordinator() -> Arc<BackupCoordinator> {
    Arc::new(BackupCoordinator::new(Arc::new(MemoryLog::new())))
}

fn tree(root: &Path) -> Vec<PathBuf> {
    let mut entries: Vec<PathBuf> = walkdir_like(root)
        .into_iter()
        .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
        .collect();
    entries.sort();
    entries
}

fn walkdir_like(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir).expect("Failed to read dir") {
        let path = entry.expect("Failed to read entry").path();
        if path.is_dir() {
            out.extend(walkdir_like(&path));
        }
        out.push(path);
    }
    out
}

#[test]
fn test_extension_exclusion_and_progress() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let src = temp_dir.path().join("src");
    write(&src.join("a.txt"), "a");
    write(&src.join("b.log"), "b");
    write(&src.join("sub/c.txt"), "c");
    let dst = temp_dir.path().join("dst");

    let job = JobSpec::standard("docs", &src, &dst)
        .with_exclusions(ExclusionSet::new(Vec::<String>::new(), Vec::<String>::new(), [".log"]));
    let recorder = Recorder::default();
    let result = coordinator().run_job(&job, Some(&recorder)).expect("Run failed");

    assert!(result.overall_success);
    assert_eq!(
        tree(&dst),
        vec![PathBuf::from("a.txt"), PathBuf::from("sub"), PathBuf::from("sub/c.txt")]
    );
    assert_eq!(recorder.progress(), vec![50, 100]);
    assert_eq!(recorder.completed.lock().unwrap().len(), 1);
}

#[test]
fn test_excluded_folder_never_appears() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let src = temp_dir.path().join("src");
    write(&src.join("cache/d.txt"), "d");
    write(&src.join("e.txt"), "e");
    let dst = temp_dir.path().join("dst");

    let job = JobSpec::standard("docs", &src, &dst)
        .with_exclusions(ExclusionSet::new(Vec::<String>::new(), ["cache"], Vec::<String>::new()));
    coordinator().run_job(&job, None).expect("Run failed");

    assert_eq!(tree(&dst), vec![PathBuf::from("e.txt")]);
}

#[test]
fn test_file_patterns_and_extension_case() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let src = temp_dir.path().join("src");
    write(&src.join("keep.md"), "k");
    write(&src.join("Thumbs.db"), "t");
    write(&src.join("notes/draft~1.tmp"), "d");
    write(&src.join("notes/a.txt"), "a");
    let dst = temp_dir.path().join("dst");

    let job = JobSpec::standard("docs", &src, &dst).with_exclusions(ExclusionSet::new(
        ["thumbs.db", "*~*"],
        Vec::<String>::new(),
        [".TXT"],
    ));
    let result = coordinator().run_job(&job, None).expect("Run failed");

    assert_eq!(result.total_items, 1);
    assert_eq!(tree(&dst), vec![PathBuf::from("keep.md")]);
}

#[test]
fn test_empty_file_list_completes_at_100() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let src = temp_dir.path().join("src");
    fs::create_dir_all(&src).expect("Failed to create src");

    let recorder = Recorder::default();
    let result = coordinator()
        .run_job(&JobSpec::standard("empty", &src, temp_dir.path().join("dst")), Some(&recorder))
        .expect("Run failed");

    assert!(result.overall_success);
    assert_eq!(result.notice, Some(RunNotice::NoItemsToCopy));
    assert_eq!(recorder.progress().last(), Some(&100));
}

#[test]
fn test_game_save_layout() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let src = temp_dir.path().join("games");
    write(&src.join("GameA/savedata/file1"), "1");
    write(&src.join("GameB/www/save/file2"), "2");
    let dst = temp_dir.path().join("backup");

    let names = vec!["savedata".to_string()];
    let found = SaveFolderLocator::new().find_paths(&src, &names, DEFAULT_MAX_DEPTH);
    assert_eq!(
        found,
        vec![src.join("GameA/savedata"), src.join("GameB/www/save")]
    );

    let recorder = Recorder::default();
    let result = coordinator()
        .run_job(&JobSpec::game_save("saves", &src, &dst, names), Some(&recorder))
        .expect("Run failed");

    assert!(result.overall_success);
    assert!(dst.join("GameA/savedata/file1").is_file());
    assert!(dst.join("GameB/www/save/file2").is_file());
    assert_eq!(recorder.progress().last(), Some(&100));
}

#[test]
fn test_locator_depth_zero_and_www_rule() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let root = temp_dir.path();
    fs::create_dir_all(root.join("savedata")).expect("Failed to create dirs");
    fs::create_dir_all(root.join("Game/www/save")).expect("Failed to create dirs");

    let locator = SaveFolderLocator::new();
    let names = vec!["savedata".to_string()];
    assert!(locator.find_paths(root, &names, 0).is_empty());
    assert!(locator
        .find_paths(root, &names, DEFAULT_MAX_DEPTH)
        .contains(&root.join("Game/www/save")));
}

#[test]
fn test_batch_of_two_jobs_run_back_to_back() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let src1 = temp_dir.path().join("one");
    write(&src1.join("a.txt"), "a");
    let src2 = temp_dir.path().join("two");
    write(&src2.join("b.txt"), "b");
    write(&src2.join("c.txt"), "c");

    let coordinator = coordinator();
    let jobs = vec![
        JobSpec::standard("one", &src1, temp_dir.path().join("d1")),
        JobSpec::standard("two", &src2, temp_dir.path().join("d2")),
    ];

    let mut progress_per_job = Vec::new();
    for job in jobs {
        let handle = coordinator.spawn_job(job).expect("Spawn rejected");
        let mut values = Vec::new();
        for update in handle.updates.iter() {
            match update {
                ProgressUpdate::Progress(p) => values.push(p),
                ProgressUpdate::Completed(_) => break,
                ProgressUpdate::Failed(msg) => panic!("job failed: {}", msg),
                _ => {}
            }
        }
        handle.join().expect("Run failed");
        progress_per_job.push(values);
    }

    assert_eq!(progress_per_job, vec![vec![100], vec![50, 100]]);
}

#[test]
fn test_missing_source_reports_error_event() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let recorder = Recorder::default();
    let result = coordinator().run_job(
        &JobSpec::standard("gone", temp_dir.path().join("nope"), temp_dir.path().join("dst")),
        Some(&recorder),
    );

    assert!(matches!(result, Err(EngineError::SourceNotFound { .. })));
    assert_eq!(recorder.errors.lock().unwrap().len(), 1);
    assert!(recorder.completed.lock().unwrap().is_empty());
    assert!(recorder.progress().is_empty());
}
