//! Persisted application settings: backup jobs, default destination and schedule.
//!
//! The document is JSON with camelCase keys, stored by default at
//! `~/.shirafuka_backup/config.json`:
//!
//! ```json
//! {
//!   "backupConfigs": [{ "name": "...", "sourcePath": "...", "destinationPath": "...",
//!                       "lastBackupTime": "...", "excludedFiles": [], "excludedFolders": [],
//!                       "excludedExtensions": [],
//!                       "extraData": { "backupMode": 0, "saveDataFolders": [] } }],
//!   "defaultBackupDestination": "...",
//!   "backupScheduler": { "scheduleEnabled": false, "scheduledTime": "03:00",
//!                        "periodicEnabled": false, "periodicInterval": 8 }
//! }
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::model::{ExclusionSet, JobMode, JobSpec};
use crate::scheduler::{ScheduleConfig, DEFAULT_INTERVAL_HOURS};

const CONFIG_DIR_NAME: &str = ".shirafuka_backup";
const CONFIG_FILE_NAME: &str = "config.json";
const TIME_OF_DAY_FORMAT: &str = "%H:%M";

/// Location of the config file under the user's home directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
}

/// `<Documents>/Backups`, or `~/Backups` where there is no documents folder.
pub fn default_backup_destination() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_default()
        .join("Backups")
}

/// Mode-specific settings of a persisted job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtraData {
    /// 0 = Standard, 1 = GameSave
    pub backup_mode: i64,
    pub save_data_folders: Vec<String>,
}

/// One job as stored in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub name: String,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    #[serde(default)]
    pub last_backup_time: Option<String>,
    #[serde(default)]
    pub excluded_files: Vec<String>,
    #[serde(default)]
    pub excluded_folders: Vec<String>,
    #[serde(default)]
    pub excluded_extensions: Vec<String>,
    #[serde(default)]
    pub extra_data: ExtraData,
}

impl From<&JobSpec> for JobRecord {
    fn from(spec: &JobSpec) -> Self {
        let extra_data = match &spec.mode {
            JobMode::Standard => ExtraData::default(),
            JobMode::GameSave { folder_names } => ExtraData {
                backup_mode: i64::from(spec.mode.code()),
                save_data_folders: folder_names.clone(),
            },
        };

        JobRecord {
            name: spec.name.clone(),
            source_path: spec.source_path.clone(),
            destination_path: spec.destination_path.clone(),
            last_backup_time: spec.last_backup_time.map(format_backup_time),
            excluded_files: spec.exclusions.files.clone(),
            excluded_folders: spec.exclusions.folders.clone(),
            excluded_extensions: spec.exclusions.extensions().to_vec(),
            extra_data,
        }
    }
}

impl JobRecord {
    /// Typed job description. Unknown modes load as Standard.
    pub fn to_spec(&self) -> JobSpec {
        let mode = match self.extra_data.backup_mode {
            1 => JobMode::GameSave {
                folder_names: self.extra_data.save_data_folders.clone(),
            },
            0 => JobMode::Standard,
            other => {
                warn!(job = %self.name, mode = other, "unknown backup mode, using Standard");
                JobMode::Standard
            }
        };

        JobSpec {
            name: self.name.clone(),
            source_path: self.source_path.clone(),
            destination_path: self.destination_path.clone(),
            exclusions: ExclusionSet::new(
                self.excluded_files.iter().cloned(),
                self.excluded_folders.iter().cloned(),
                &self.excluded_extensions,
            ),
            mode,
            last_backup_time: self.last_backup_time.as_deref().and_then(parse_backup_time),
        }
    }

    fn same_identity(&self, name: &str, source: &Path, destination: &Path) -> bool {
        self.name == name && self.source_path == source && self.destination_path == destination
    }
}

/// Schedule settings as stored in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScheduleRecord {
    pub schedule_enabled: bool,
    /// "HH:MM"
    pub scheduled_time: String,
    pub periodic_enabled: bool,
    /// Hours
    pub periodic_interval: i64,
}

impl Default for ScheduleRecord {
    fn default() -> Self {
        ScheduleRecord::from(&ScheduleConfig::default())
    }
}

impl From<&ScheduleConfig> for ScheduleRecord {
    fn from(config: &ScheduleConfig) -> Self {
        ScheduleRecord {
            schedule_enabled: config.daily_enabled,
            scheduled_time: config.daily_time.format(TIME_OF_DAY_FORMAT).to_string(),
            periodic_enabled: config.periodic_enabled,
            periodic_interval: i64::from(config.periodic_interval_hours),
        }
    }
}

impl ScheduleRecord {
    /// Typed settings. An unreadable time or a non-positive interval falls back to the
    /// default value.
    pub fn to_config(&self) -> ScheduleConfig {
        let defaults = ScheduleConfig::default();

        let daily_time = parse_time_of_day(&self.scheduled_time).unwrap_or_else(|| {
            warn!(value = %self.scheduled_time, "invalid scheduled time, using default");
            defaults.daily_time
        });
        let periodic_interval_hours = match u32::try_from(self.periodic_interval) {
            Ok(hours) if hours > 0 => hours,
            _ => {
                warn!(value = self.periodic_interval, "invalid periodic interval, using default");
                DEFAULT_INTERVAL_HOURS
            }
        };

        ScheduleConfig {
            daily_enabled: self.schedule_enabled,
            daily_time,
            periodic_enabled: self.periodic_enabled,
            periodic_interval_hours,
        }
    }
}

/// The whole settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppConfig {
    pub backup_configs: Vec<JobRecord>,
    pub default_backup_destination: PathBuf,
    pub backup_scheduler: ScheduleRecord,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            backup_configs: Vec::new(),
            default_backup_destination: default_backup_destination(),
            backup_scheduler: ScheduleRecord::default(),
        }
    }
}

impl AppConfig {
    /// Load settings from `path`. A missing file gives the default document.
    pub fn load(path: &Path) -> Result<Self> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file, using defaults");
                return Ok(AppConfig::default());
            }
            Err(e) => {
                return Err(EngineError::ConfigRead {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&content).map_err(|e| EngineError::ConfigParse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write settings to `path`, creating its directory if needed.
    pub fn save(&self, path: &Path) -> Result<()> {
        let write_err = |e: io::Error| EngineError::ConfigWrite {
            path: path.to_path_buf(),
            source: e,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| write_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        fs::write(path, content).map_err(write_err)?;
        debug!(path = %path.display(), jobs = self.backup_configs.len(), "config saved");
        Ok(())
    }

    pub fn jobs(&self) -> &[JobRecord] {
        &self.backup_configs
    }

    pub fn job_specs(&self) -> Vec<JobSpec> {
        self.backup_configs.iter().map(JobRecord::to_spec).collect()
    }

    /// Append a job. Incomplete jobs are accepted with a warning.
    pub fn add_job(&mut self, spec: &JobSpec) {
        if spec.name.trim().is_empty()
            || spec.source_path.as_os_str().is_empty()
            || spec.destination_path.as_os_str().is_empty()
        {
            warn!(job = %spec.name, "adding job with an empty name, source or destination");
        }
        self.backup_configs.push(JobRecord::from(spec));
    }

    /// Replace the job at `index`.
    pub fn update_job(&mut self, index: usize, spec: &JobSpec) -> Result<()> {
        match self.backup_configs.get_mut(index) {
            Some(record) => {
                *record = JobRecord::from(spec);
                Ok(())
            }
            None => Err(EngineError::JobNotFound {
                name: spec.name.clone(),
            }),
        }
    }

    /// Remove the job at `index`; out-of-range indexes are ignored.
    pub fn remove_job(&mut self, index: usize) -> Option<JobRecord> {
        if index < self.backup_configs.len() {
            Some(self.backup_configs.remove(index))
        } else {
            None
        }
    }

    /// Index of the job with this name, source and destination.
    pub fn find_job(&self, name: &str, source: &Path, destination: &Path) -> Option<usize> {
        self.backup_configs
            .iter()
            .position(|r| r.same_identity(name, source, destination))
    }

    /// Index of the first job with this name.
    pub fn find_job_by_name(&self, name: &str) -> Option<usize> {
        self.backup_configs.iter().position(|r| r.name == name)
    }

    pub fn schedule(&self) -> ScheduleConfig {
        self.backup_scheduler.to_config()
    }

    pub fn set_schedule(&mut self, config: &ScheduleConfig) {
        self.backup_scheduler = ScheduleRecord::from(config);
    }

    /// Record a successful backup of the job at `index`.
    pub fn mark_backed_up(&mut self, index: usize, at: DateTime<Local>) -> bool {
        match self.backup_configs.get_mut(index) {
            Some(record) => {
                record.last_backup_time = Some(format_backup_time(at));
                true
            }
            None => false,
        }
    }
}

fn format_backup_time(at: DateTime<Local>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, false)
}

/// Parse an ISO-8601 timestamp, with or without an offset (naive = local time).
fn parse_backup_time(value: &str) -> Option<DateTime<Local>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Local));
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
        .or_else(|| {
            warn!(value, "unreadable last backup time");
            None
        })
}

/// Parse "HH:MM" (or "HH:MM:SS").
pub fn parse_time_of_day(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, TIME_OF_DAY_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}
