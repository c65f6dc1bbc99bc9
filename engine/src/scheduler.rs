//! Backup scheduling.
//!
//! Two optional trigger mechanisms share a single timer:
//! - Daily: a fixed wall-clock time every day
//! - Periodic: a fixed number of hours counted from the last (re)computation
//!
//! After every configuration change and every fire the next trigger time is recomputed
//! as the earlier of the enabled candidates. Changing the settings restarts the periodic
//! countdown from that moment.

use std::fmt::{self, Display};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Local, NaiveDateTime, NaiveTime, TimeZone, Timelike};
use crossbeam_channel::{after, never, select, unbounded, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::error::{EngineError, Result};
use crate::log::LogSink;

/// Default daily trigger hour.
pub const DEFAULT_DAILY_HOUR: u32 = 3;

/// Default periodic interval in hours.
pub const DEFAULT_INTERVAL_HOURS: u32 = 8;

/// Longest DST gap we step over when localizing a daily time.
const MAX_GAP_MINUTES: i64 = 180;

/// Schedule settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub daily_enabled: bool,
    pub daily_time: NaiveTime,
    pub periodic_enabled: bool,
    pub periodic_interval_hours: u32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            daily_enabled: false,
            daily_time: NaiveTime::from_hms_opt(DEFAULT_DAILY_HOUR, 0, 0).unwrap_or_default(),
            periodic_enabled: false,
            periodic_interval_hours: DEFAULT_INTERVAL_HOURS,
        }
    }
}

impl ScheduleConfig {
    pub fn validate(&self) -> Result<()> {
        if self.periodic_enabled && self.periodic_interval_hours == 0 {
            return Err(EngineError::InvalidSchedule {
                reason: "periodic interval must be at least 1 hour".to_string(),
            });
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.daily_enabled || self.periodic_enabled
    }
}

/// Which mechanism produced a trigger time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    Daily(NaiveTime),
    Periodic(u32),
}

impl Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerKind::Daily(at) => write!(f, "daily backup ({})", at.format("%H:%M")),
            TriggerKind::Periodic(hours) => write!(f, "periodic backup (every {} hours)", hours),
        }
    }
}

/// Next trigger time for `config` as seen at `now`, or `None` when nothing is enabled.
pub fn next_trigger<Tz: TimeZone>(config: &ScheduleConfig, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    next_trigger_with_kind(config, now).map(|(at, _)| at)
}

fn next_trigger_with_kind<Tz: TimeZone>(
    config: &ScheduleConfig,
    now: &DateTime<Tz>,
) -> Option<(DateTime<Tz>, TriggerKind)> {
    let daily = if config.daily_enabled {
        next_daily(config.daily_time, now).map(|at| (at, TriggerKind::Daily(config.daily_time)))
    } else {
        None
    };
    let periodic = if config.periodic_enabled {
        let at = now.clone() + Duration::hours(i64::from(config.periodic_interval_hours));
        Some((at, TriggerKind::Periodic(config.periodic_interval_hours)))
    } else {
        None
    };

    match (daily, periodic) {
        (Some(d), Some(p)) => Some(if p.0 < d.0 { p } else { d }),
        (d, p) => d.or(p),
    }
}

/// Today at `at` if that is still strictly in the future, otherwise tomorrow at `at`.
fn next_daily<Tz: TimeZone>(at: NaiveTime, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();

    if let Some(candidate) = localize(&tz, today.and_time(at)) {
        if candidate > *now {
            return Some(candidate);
        }
    }
    localize(&tz, today.succ_opt()?.and_time(at))
}

/// Map a wall-clock time to an instant. Ambiguous times take the earlier instant; times
/// inside a DST gap move to the first valid minute after it.
fn localize<Tz: TimeZone>(tz: &Tz, local: NaiveDateTime) -> Option<DateTime<Tz>> {
    if let Some(instant) = tz.from_local_datetime(&local).earliest() {
        return Some(instant);
    }

    let minute = NaiveTime::from_hms_opt(local.hour(), local.minute(), 0)?;
    let base = local.date().and_time(minute);
    (1..=MAX_GAP_MINUTES)
        .map(|m| base + Duration::minutes(m))
        .find_map(|candidate| tz.from_local_datetime(&candidate).earliest())
}

/// Receiver of scheduler events.
pub trait SchedulerListener: Send {
    /// A backup should run now.
    fn backup_needed(&self);

    /// The next trigger time changed (`None`: scheduling disabled).
    fn next_time_changed(&self, next: Option<DateTime<Local>>);
}

/// Schedule state: settings plus the derived next trigger time.
pub struct Scheduler {
    config: ScheduleConfig,
    next: Option<(DateTime<Local>, TriggerKind)>,
    log: Arc<dyn LogSink>,
    listener: Box<dyn SchedulerListener>,
}

impl Scheduler {
    /// A scheduler with default (disabled) settings.
    pub fn new(log: Arc<dyn LogSink>, listener: Box<dyn SchedulerListener>) -> Self {
        Scheduler {
            config: ScheduleConfig::default(),
            next: None,
            log,
            listener,
        }
    }

    pub fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    pub fn next_trigger_time(&self) -> Option<DateTime<Local>> {
        self.next.map(|(at, _)| at)
    }

    /// Time left until the next trigger; zero if it is already due.
    pub fn time_until_next(&self, now: DateTime<Local>) -> Option<StdDuration> {
        self.next_trigger_time()
            .map(|at| (at - now).to_std().unwrap_or(StdDuration::ZERO))
    }

    /// Replace the settings and recompute the next trigger time.
    pub fn apply(&mut self, config: ScheduleConfig, now: DateTime<Local>) -> Result<()> {
        config.validate()?;
        self.config = config;
        self.recompute(now);
        Ok(())
    }

    /// The timer expired: request a backup and arm the next trigger.
    pub fn fire(&mut self, now: DateTime<Local>) {
        let reason = match self.next {
            Some((_, kind)) => kind.to_string(),
            None => "backup".to_string(),
        };
        info!(%reason, "scheduled backup triggered");
        self.log.log(&format!("Scheduled backup triggered: {}", reason));
        self.listener.backup_needed();
        self.recompute(now);
    }

    fn is_due(&self, now: DateTime<Local>) -> bool {
        matches!(self.next, Some((at, _)) if at <= now)
    }

    fn recompute(&mut self, now: DateTime<Local>) {
        let next = next_trigger_with_kind(&self.config, &now);
        if next == self.next {
            return;
        }
        self.next = next;

        match next {
            Some((at, kind)) => {
                debug!(next = %at, %kind, "next backup armed");
                self.log.log(&format!(
                    "Next scheduled backup: {} ({})",
                    at.format("%Y/%m/%d %H:%M"),
                    kind
                ));
            }
            None => self.log.log("Scheduled backups disabled"),
        }
        self.listener.next_time_changed(next.map(|(at, _)| at));
    }

    /// Run the timer on a worker thread.
    pub fn spawn(self) -> SchedulerHandle {
        let (tx, rx) = unbounded();
        let thread = thread::spawn(move || self.run_loop(rx));
        SchedulerHandle {
            control: tx,
            thread: Some(thread),
        }
    }

    fn run_loop(mut self, control: Receiver<Control>) {
        self.recompute(Local::now());

        loop {
            let timer = match self.time_until_next(Local::now()) {
                Some(wait) => after(wait),
                None => never(),
            };

            select! {
                recv(control) -> msg => match msg {
                    Ok(Control::Update(config)) => {
                        if let Err(e) = self.apply(config, Local::now()) {
                            warn!(error = %e, "schedule update rejected");
                            self.log.log(&e.to_string());
                        }
                    }
                    Ok(Control::Stop) | Err(_) => break,
                },
                recv(timer) -> _ => {
                    let now = Local::now();
                    // Monotonic and wall clocks can disagree slightly; re-arm if early
                    if self.is_due(now) {
                        self.fire(now);
                    }
                }
            }
        }
        debug!("scheduler stopped");
    }
}

enum Control {
    Update(ScheduleConfig),
    Stop,
}

/// Control handle for a running scheduler. Dropping it stops the scheduler.
pub struct SchedulerHandle {
    control: Sender<Control>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Replace the schedule settings of the running scheduler.
    pub fn update(&self, config: ScheduleConfig) -> Result<()> {
        config.validate()?;
        let _ = self.control.send(Control::Update(config));
        Ok(())
    }

    /// Stop the timer and wait for the worker thread to exit.
    pub fn stop(self) {
        drop(self);
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        let _ = self.control.send(Control::Stop);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
