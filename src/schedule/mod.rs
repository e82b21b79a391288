//! Schedules - pure computation of upcoming occurrence timestamps
//!
//! A [`Schedule`] is built once, validated at construction, and queried
//! repeatedly via [`Schedule::next`]. It never holds a cursor: every call
//! recomputes the series from scratch, so repeated calls with the same
//! arguments return the same occurrences.

mod cron;

pub use self::cron::{CronParseError, CronSchedule};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

/// Error types for schedule construction
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("interval must be positive, got {0}")]
    NonPositiveInterval(Duration),

    #[error("invalid cron expression {expression:?}")]
    InvalidCron {
        expression: String,
        #[source]
        source: CronParseError,
    },
}

/// When a flow should run
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Never produces occurrences; the flow only runs on demand
    None,
    /// Fixed increments from a start timestamp
    Interval(IntervalSchedule),
    /// Occurrences defined by a cron expression
    Cron(CronSchedule),
    /// An explicit list of timestamps
    Dates(DateSchedule),
}

impl Schedule {
    /// Build an interval schedule; fails unless the interval is positive
    pub fn interval(start: DateTime<Utc>, interval: Duration) -> Result<Self, ScheduleError> {
        IntervalSchedule::new(start, interval).map(Schedule::Interval)
    }

    /// Build a cron schedule; fails unless the expression parses
    pub fn cron(expression: &str) -> Result<Self, ScheduleError> {
        CronSchedule::new(expression).map(Schedule::Cron)
    }

    /// Build a schedule from an explicit (unordered) list of dates
    pub fn dates(dates: Vec<DateTime<Utc>>) -> Self {
        Schedule::Dates(DateSchedule::new(dates))
    }

    /// The next `n` occurrences at or after `on_or_after`, ascending.
    ///
    /// When `on_or_after` is `None` the anchor is the wall clock at call
    /// time, re-evaluated on every call. Returns fewer than `n` items when
    /// the series is exhausted; never fails at query time.
    pub fn next(&self, n: usize, on_or_after: Option<DateTime<Utc>>) -> Vec<DateTime<Utc>> {
        let anchor = on_or_after.unwrap_or_else(Utc::now);
        match self {
            Schedule::None => Vec::new(),
            Schedule::Interval(s) => s.next_from(n, anchor),
            Schedule::Cron(s) => s.next_from(n, anchor),
            Schedule::Dates(s) => s.next_from(n, anchor),
        }
    }
}

/// A schedule formed by adding fixed increments to a start timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalSchedule {
    start: DateTime<Utc>,
    interval: Duration,
}

impl IntervalSchedule {
    pub fn new(start: DateTime<Utc>, interval: Duration) -> Result<Self, ScheduleError> {
        if interval <= Duration::zero() {
            return Err(ScheduleError::NonPositiveInterval(interval));
        }
        Ok(Self { start, interval })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// The series `start + k * interval` filtered to `>= on_or_after`,
    /// truncated to `n` terms. Generated lazily from the first eligible
    /// term; the series ends early at the representable time horizon
    /// rather than overflowing.
    pub fn next_from(&self, n: usize, on_or_after: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let Some(first) = self.first_at_or_after(on_or_after) else {
            return Vec::new();
        };
        std::iter::successors(Some(first), |d| d.checked_add_signed(self.interval))
            .take(n)
            .collect()
    }

    /// Skip directly to the smallest `start + k * interval >= instant`
    fn first_at_or_after(&self, instant: DateTime<Utc>) -> Option<DateTime<Utc>> {
        if instant <= self.start {
            return Some(self.start);
        }
        let step = self.interval.num_nanoseconds();
        let elapsed = (instant - self.start).num_nanoseconds();
        match (step, elapsed) {
            (Some(step), Some(elapsed)) => {
                // Both positive here, so this is a plain ceiling division.
                let k = elapsed.div_euclid(step) + i64::from(elapsed.rem_euclid(step) != 0);
                let offset = Duration::nanoseconds(step.checked_mul(k)?);
                self.start.checked_add_signed(offset)
            }
            // Spans past ~292 years overflow nanoseconds; the interval is
            // huge in that case, so stepping through is cheap.
            _ => std::iter::successors(Some(self.start), |d| d.checked_add_signed(self.interval))
                .find(|d| *d >= instant),
        }
    }
}

/// A schedule from an explicit collection of timestamps
///
/// The input collection is unordered; sorting happens at query time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateSchedule {
    dates: Vec<DateTime<Utc>>,
}

impl DateSchedule {
    pub fn new(dates: Vec<DateTime<Utc>>) -> Self {
        Self { dates }
    }

    pub fn dates(&self) -> &[DateTime<Utc>] {
        &self.dates
    }

    pub fn next_from(&self, n: usize, on_or_after: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let mut upcoming: Vec<DateTime<Utc>> = self
            .dates
            .iter()
            .copied()
            .filter(|d| *d >= on_or_after)
            .collect();
        upcoming.sort_unstable();
        upcoming.truncate(n);
        upcoming
    }
}
