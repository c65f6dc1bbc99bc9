//! BackUP - Command-line front end for the backup engine.
//!
//! Runs ad-hoc and configured backup jobs, edits the persisted job list and schedule,
//! and hosts the scheduler as a long-running process. Progress goes to stderr.
//!
//! Exit codes: 0 success, 1 completed with failed items, 2 fatal error.

mod batch;
mod daemon;
mod progress;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use engine::config::{default_config_path, parse_time_of_day};
use engine::{
    next_trigger, AppConfig, BackupCoordinator, EngineError, ExclusionSet, FileLog, JobSpec,
    LogSink,
};
use tracing_subscriber::EnvFilter;

use crate::batch::run_batch;
use crate::progress::CliProgress;

/// BackUP - Back up folders and game saves
#[derive(Parser, Debug)]
#[command(name = "backup")]
#[command(version = "0.1.0")]
#[command(about = "Back up folders and game saves, on demand or on a schedule")]
struct Cli {
    /// Config file (default: ~/.shirafuka_backup/config.json)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a one-off backup job
    Run {
        /// Job name used in logs
        #[arg(long, default_value = "manual")]
        name: String,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Run every configured job, one after another
    RunAll,

    /// List configured jobs
    List,

    /// Add a job to the config
    Add {
        /// Job name
        #[arg(long)]
        name: String,

        #[command(flatten)]
        job: JobArgs,
    },

    /// Remove a job from the config
    Remove {
        /// Job name
        name: String,
    },

    /// Show or change the schedule
    Schedule(ScheduleArgs),

    /// Run scheduled backups until stopped
    Daemon,
}

/// Options describing one job.
#[derive(Args, Debug, Clone)]
struct JobArgs {
    /// Source directory
    #[arg(long, value_name = "PATH")]
    src: PathBuf,

    /// Destination directory
    #[arg(long, value_name = "PATH")]
    dst: PathBuf,

    /// Skip files whose name or relative path matches (wildcards, case-insensitive)
    #[arg(long = "exclude-file", value_name = "PATTERN")]
    exclude_files: Vec<String>,

    /// Skip folders whose name or relative path matches
    #[arg(long = "exclude-folder", value_name = "PATTERN")]
    exclude_folders: Vec<String>,

    /// Skip files with this extension
    #[arg(long = "exclude-ext", value_name = "EXT")]
    exclude_exts: Vec<String>,

    /// Save-folder name to look for; switches the job to game-save mode
    #[arg(long = "save-folder", value_name = "NAME")]
    save_folders: Vec<String>,
}

impl JobArgs {
    fn to_spec(&self, name: &str) -> JobSpec {
        let spec = if self.save_folders.is_empty() {
            JobSpec::standard(name, &self.src, &self.dst)
        } else {
            JobSpec::game_save(name, &self.src, &self.dst, self.save_folders.clone())
        };
        spec.with_exclusions(ExclusionSet::new(
            self.exclude_files.iter().cloned(),
            self.exclude_folders.iter().cloned(),
            &self.exclude_exts,
        ))
    }
}

#[derive(Args, Debug, Clone, Default)]
struct ScheduleArgs {
    /// Daily backup time (HH:MM)
    #[arg(long, value_name = "HH:MM", conflicts_with = "no_daily")]
    daily: Option<String>,

    /// Disable the daily backup
    #[arg(long)]
    no_daily: bool,

    /// Periodic backup interval in hours
    #[arg(long, value_name = "HOURS", conflicts_with = "no_periodic")]
    every: Option<u32>,

    /// Disable the periodic backup
    #[arg(long)]
    no_periodic: bool,
}

/// How a command that completed should be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    CompletedWithFailures,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let exit_code = match run_cli(&cli) {
        Ok(Outcome::Success) => 0,
        Ok(Outcome::CompletedWithFailures) => 1,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main CLI logic - separated for testability
fn run_cli(cli: &Cli) -> Result<Outcome> {
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => default_config_path().ok_or_else(|| anyhow!("Cannot determine home directory"))?,
    };
    let log: Arc<dyn LogSink> = Arc::new(FileLog::new(config_path.with_file_name("backup.log")));

    match &cli.command {
        Command::Run { name, job } => run_one(&job.to_spec(name), log, cli.verbose),
        Command::RunAll => run_all(&config_path, log, cli.verbose),
        Command::List => {
            list_jobs(&AppConfig::load(&config_path)?);
            Ok(Outcome::Success)
        }
        Command::Add { name, job } => {
            add_job(&config_path, &job.to_spec(name))?;
            Ok(Outcome::Success)
        }
        Command::Remove { name } => {
            remove_job(&config_path, name)?;
            Ok(Outcome::Success)
        }
        Command::Schedule(args) => {
            edit_schedule(&config_path, args)?;
            Ok(Outcome::Success)
        }
        Command::Daemon => {
            daemon::run_daemon(&config_path, log, cli.verbose)?;
            Ok(Outcome::Success)
        }
    }
}

fn run_one(spec: &JobSpec, log: Arc<dyn LogSink>, verbose: bool) -> Result<Outcome> {
    eprintln!("Backing up '{}' ({})", spec.name, spec.mode);
    eprintln!("  Source: {}", spec.source_path.display());
    eprintln!("  Destination: {}", spec.destination_path.display());

    let coordinator = BackupCoordinator::new(log);
    let progress = CliProgress::new(verbose);
    let result = coordinator.run_job(spec, Some(&progress))?;

    Ok(if result.overall_success {
        Outcome::Success
    } else {
        Outcome::CompletedWithFailures
    })
}

fn run_all(config_path: &Path, log: Arc<dyn LogSink>, verbose: bool) -> Result<Outcome> {
    let mut config = AppConfig::load(config_path)?;
    let coordinator = Arc::new(BackupCoordinator::new(log));

    let mut progress: Option<CliProgress> = None;
    let report = run_batch(&coordinator, &mut config, |spec, update| {
        let renderer = progress.get_or_insert_with(|| {
            eprintln!("Backing up '{}'", spec.name);
            CliProgress::new(verbose)
        });
        renderer.handle_update(update);
        if update.is_terminal() {
            progress = None;
        }
    })?;

    if report.outcomes.is_empty() {
        eprintln!("No backup jobs configured.");
        return Ok(Outcome::Success);
    }
    config.save(config_path)?;

    eprintln!();
    for outcome in &report.outcomes {
        let status = match &outcome.result {
            Ok(r) if r.overall_success => "ok".to_string(),
            Ok(r) => format!("{} failed", r.failed_items.len()),
            Err(e) => format!("aborted: {}", e),
        };
        eprintln!("  {}: {}", outcome.name, status);
    }

    Ok(if report.all_succeeded() {
        Outcome::Success
    } else {
        Outcome::CompletedWithFailures
    })
}

fn list_jobs(config: &AppConfig) {
    if config.jobs().is_empty() {
        println!("No backup jobs configured.");
        return;
    }
    for spec in config.job_specs() {
        let last = spec
            .last_backup_time
            .map(|t| t.format("%Y/%m/%d %H:%M").to_string())
            .unwrap_or_else(|| "never".to_string());
        println!(
            "{} [{}] {} -> {} (last backup: {})",
            spec.name,
            spec.mode,
            spec.source_path.display(),
            spec.destination_path.display(),
            last
        );
    }
}

fn add_job(config_path: &Path, spec: &JobSpec) -> Result<()> {
    let mut config = AppConfig::load(config_path)?;
    if config
        .find_job(&spec.name, &spec.source_path, &spec.destination_path)
        .is_some()
    {
        bail!("Job '{}' already exists", spec.name);
    }
    config.add_job(spec);
    config.save(config_path)?;
    eprintln!("Added job '{}'", spec.name);
    Ok(())
}

fn remove_job(config_path: &Path, name: &str) -> Result<()> {
    let mut config = AppConfig::load(config_path)?;
    let index = config
        .find_job_by_name(name)
        .ok_or_else(|| EngineError::JobNotFound {
            name: name.to_string(),
        })?;
    config.remove_job(index);
    config.save(config_path)?;
    eprintln!("Removed job '{}'", name);
    Ok(())
}

fn edit_schedule(config_path: &Path, args: &ScheduleArgs) -> Result<()> {
    let mut config = AppConfig::load(config_path)?;
    let mut schedule = config.schedule();
    let before = schedule.clone();

    if let Some(value) = &args.daily {
        schedule.daily_time = parse_time_of_day(value)
            .with_context(|| format!("Invalid time '{}', expected HH:MM", value))?;
        schedule.daily_enabled = true;
    }
    if args.no_daily {
        schedule.daily_enabled = false;
    }
    if let Some(hours) = args.every {
        schedule.periodic_interval_hours = hours;
        schedule.periodic_enabled = true;
    }
    if args.no_periodic {
        schedule.periodic_enabled = false;
    }

    if schedule != before {
        schedule.validate()?;
        config.set_schedule(&schedule);
        config.save(config_path)?;
    }

    let daily = if schedule.daily_enabled {
        schedule.daily_time.format("%H:%M").to_string()
    } else {
        "off".to_string()
    };
    let periodic = if schedule.periodic_enabled {
        format!("every {} hours", schedule.periodic_interval_hours)
    } else {
        "off".to_string()
    };
    println!("Daily: {}", daily);
    println!("Periodic: {}", periodic);
    match next_trigger(&schedule, &Local::now()) {
        Some(at) => println!("Next backup: {}", at.format("%Y/%m/%d %H:%M")),
        None => println!("Next backup: not scheduled"),
    }
    Ok(())
}
