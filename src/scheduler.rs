//! Time-triggered actions.
//!
//! The [`Scheduler`] owns a list of [`ScheduleEntry`]s and is advanced by a
//! fixed tick. Each tick it asks every entry whether it is due and runs the
//! due actions one after another through an [`ActionHandler`].
//!
//! Two trigger kinds exist:
//!
//! - **Interval**: due on the first tick after start, then whenever at least
//!   `every` has passed on the monotonic clock since it last fired.
//! - **Clock**: due when the UTC weekday, hour and minute match. It fires at
//!   most once per matching minute, however many ticks land inside it. When
//!   a long tick jumps over the target minute, the next tick catches up,
//!   as long as the target is less than [`CLOCK_CATCH_UP_MINUTES`] old.
//!
//! A failing or panicking action is logged and forgotten. It never stops
//! the other actions of the tick, or later ticks.

use crate::models::{DigestKind, SourceKind};
use chrono::{DateTime, Datelike, Days, NaiveDate, TimeDelta, Utc, Weekday};
use futures::FutureExt;
use std::any::Any;
use std::error::Error;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// How late a clock trigger may still fire after a tick overran its minute.
pub const CLOCK_CATCH_UP_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Interval {
        every: Duration,
    },
    Clock {
        weekday: Weekday,
        hour: u32,
        minute: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Check a source for new items.
    Monitor(SourceKind),
    /// Build and deliver a digest.
    Digest(DigestKind),
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Monitor(source) => write!(f, "monitor:{source}"),
            Action::Digest(kind) => write!(f, "digest:{kind}"),
        }
    }
}

/// A trigger, its action, and when it last fired.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub trigger: Trigger,
    pub action: Action,
    last_fired_at: Option<Instant>,
    last_fired_on: Option<NaiveDate>,
    last_polled: Option<DateTime<Utc>>,
}

impl ScheduleEntry {
    pub fn interval(every: Duration, action: Action) -> Self {
        Self::new(Trigger::Interval { every }, action)
    }

    pub fn clock(weekday: Weekday, hour: u32, minute: u32, action: Action) -> Self {
        Self::new(
            Trigger::Clock {
                weekday,
                hour,
                minute,
            },
            action,
        )
    }

    fn new(trigger: Trigger, action: Action) -> Self {
        Self {
            trigger,
            action,
            last_fired_at: None,
            last_fired_on: None,
            last_polled: None,
        }
    }

    /// Whether the entry fires now. Firing is recorded, so asking again
    /// within the same window answers `false`.
    pub fn poll(&mut self, now_utc: DateTime<Utc>, now: Instant) -> bool {
        match self.trigger {
            Trigger::Interval { every } => {
                let due = self
                    .last_fired_at
                    .is_none_or(|last| now.saturating_duration_since(last) >= every);
                if due {
                    self.last_fired_at = Some(now);
                }
                due
            }
            Trigger::Clock {
                weekday,
                hour,
                minute,
            } => {
                let previous = self.last_polled.replace(now_utc);
                let Some(target) = last_occurrence(now_utc, weekday, hour, minute) else {
                    return false;
                };
                let late = now_utc - target;
                let on_time = late < TimeDelta::minutes(1);
                let caught_up = !on_time
                    && late < TimeDelta::minutes(CLOCK_CATCH_UP_MINUTES)
                    && previous.is_some_and(|prev| prev < target);
                // Only one minute per day can match, so the date alone marks
                // the minute as handled.
                let due =
                    (on_time || caught_up) && self.last_fired_on != Some(target.date_naive());
                if due {
                    if caught_up {
                        warn!(
                            action = %self.action,
                            late_secs = late.num_seconds(),
                            "Clock trigger fired late"
                        );
                    }
                    self.last_fired_on = Some(target.date_naive());
                }
                due
            }
        }
    }
}

/// Start of the most recent `weekday hour:minute` at or before `now`.
fn last_occurrence(
    now: DateTime<Utc>,
    weekday: Weekday,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Utc>> {
    let days_back =
        (7 + now.weekday().num_days_from_monday() - weekday.num_days_from_monday()) % 7;
    let date = now.date_naive().checked_sub_days(Days::new(u64::from(days_back)))?;
    let at = date.and_hms_opt(hour, minute, 0)?.and_utc();
    if at > now {
        at.checked_sub_days(Days::new(7))
    } else {
        Some(at)
    }
}

/// Runs scheduled actions.
pub trait ActionHandler {
    async fn handle(&self, action: Action) -> Result<(), Box<dyn Error + Send + Sync>>;
}

/// Outcome counts for one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ran: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct Scheduler {
    entries: Vec<ScheduleEntry>,
    period: Duration,
}

impl Scheduler {
    pub fn new(entries: Vec<ScheduleEntry>, period: Duration) -> Self {
        Self { entries, period }
    }

    /// Actions due at this instant, in entry order.
    pub fn due(&mut self, now_utc: DateTime<Utc>, now: Instant) -> Vec<Action> {
        self.entries
            .iter_mut()
            .filter_map(|entry| entry.poll(now_utc, now).then_some(entry.action))
            .collect()
    }

    /// Run every due action, isolating failures.
    #[instrument(level = "debug", skip_all, fields(at = %now_utc))]
    pub async fn tick<H: ActionHandler>(
        &mut self,
        handler: &H,
        now_utc: DateTime<Utc>,
        now: Instant,
    ) -> TickReport {
        let mut report = TickReport::default();
        for action in self.due(now_utc, now) {
            report.ran += 1;
            info!(%action, "Running scheduled action");
            match AssertUnwindSafe(handler.handle(action)).catch_unwind().await {
                Ok(Ok(())) => debug!(%action, "Action finished"),
                Ok(Err(e)) => {
                    report.failed += 1;
                    error!(%action, error = %e, "Action failed");
                }
                Err(panic) => {
                    report.failed += 1;
                    error!(%action, panic = %panic_message(&*panic), "Action panicked");
                }
            }
        }
        report
    }

    /// Tick until `shutdown` resolves.
    pub async fn run<H, S>(&mut self, handler: &H, shutdown: S)
    where
        H: ActionHandler,
        S: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            entries = self.entries.len(),
            period_secs = self.period.as_secs_f64(),
            "Scheduler started"
        );
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested; scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick(handler, Utc::now(), Instant::now()).await;
                }
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
