//! Terminal rendering of backup events.

use std::cell::Cell;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use engine::{EngineError, ProgressCallback, ProgressUpdate, RunNotice, RunResult};

/// CLI implementation of ProgressCallback: a progress bar on stderr plus a summary.
pub struct CliProgress {
    verbose: bool,
    start_time: Instant,
    last_percent: Cell<Option<u8>>,
}

impl CliProgress {
    pub fn new(verbose: bool) -> Self {
        CliProgress {
            verbose,
            start_time: Instant::now(),
            last_percent: Cell::new(None),
        }
    }

    /// Render an event received over a job channel.
    pub fn handle_update(&self, update: &ProgressUpdate) {
        match update {
            ProgressUpdate::Progress(p) => self.on_progress(*p),
            ProgressUpdate::FileProcessed { path, success } => self.on_file_processed(path, *success),
            ProgressUpdate::DirectoryProcessed { path, created } => {
                self.on_directory_processed(path, *created)
            }
            ProgressUpdate::Log(message) => self.on_log_message(message),
            ProgressUpdate::Failed(message) => {
                self.end_bar();
                eprintln!("Backup aborted: {}", message);
            }
            ProgressUpdate::Completed(result) => self.on_completed(result),
        }
    }

    pub fn format_duration(elapsed: Duration) -> String {
        let secs = elapsed.as_secs();
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, mins, secs)
        } else if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}s", secs)
        }
    }

    pub fn progress_bar(percent: u8) -> String {
        let percent = percent.min(100) as usize;
        let filled = percent / 5;
        format!("[{}{}] {}%", "=".repeat(filled), " ".repeat(20 - filled), percent)
    }

    fn end_bar(&self) {
        if self.last_percent.take().is_some() {
            eprintln!();
        }
    }
}

impl ProgressCallback for CliProgress {
    fn on_progress(&self, percent: u8) {
        if self.last_percent.get() == Some(percent) {
            return;
        }
        self.last_percent.set(Some(percent));
        eprint!("\rProgress: {}", Self::progress_bar(percent));
        let _ = std::io::stderr().flush();
    }

    fn on_file_processed(&self, path: &Path, success: bool) {
        if !success {
            self.end_bar();
            eprintln!("Failed: {}", path.display());
        } else if self.verbose {
            self.end_bar();
            eprintln!("Copied: {}", path.display());
        }
    }

    fn on_directory_processed(&self, path: &Path, created: bool) {
        if !created {
            self.end_bar();
            eprintln!("Could not create folder: {}", path.display());
        }
    }

    fn on_log_message(&self, message: &str) {
        if self.verbose {
            self.end_bar();
            eprintln!("{}", message);
        }
    }

    fn on_error(&self, _error: &EngineError) {
        // Reported by the caller with the returned error
        self.end_bar();
    }

    fn on_completed(&self, result: &RunResult) {
        self.end_bar();
        match result.notice {
            Some(RunNotice::Cancelled) => eprintln!("Backup '{}' cancelled.", result.job_name),
            Some(RunNotice::NoItemsToCopy) => eprintln!("Backup '{}': nothing to copy.", result.job_name),
            Some(RunNotice::NoSaveFoldersFound) => {
                eprintln!("Backup '{}': no save folders found.", result.job_name)
            }
            None => eprintln!("Backup '{}' complete!", result.job_name),
        }

        eprintln!(
            "Summary: {} of {} items copied, {} failed",
            result.succeeded_items,
            result.total_items,
            result.failed_items.len()
        );
        eprintln!("Elapsed: {}", Self::format_duration(self.start_time.elapsed()));

        if !result.failed_items.is_empty() {
            eprintln!();
            eprintln!("Failed items:");
            for item in &result.failed_items {
                eprintln!("  {} ({}): {}", item.path.display(), item.kind, item.reason);
            }
        }
    }
}
