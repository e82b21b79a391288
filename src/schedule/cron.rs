//! Cron expression schedules

use chrono::{DateTime, Duration, Utc};
use std::str::FromStr;

/// Parse failure reported by the cron evaluator
pub type CronParseError = cron::error::Error;

/// The cron evaluator's `after` iterator excludes its anchor, while
/// `Schedule::next` promises an inclusive lower bound. Shifting the anchor
/// back by the evaluator's minimum granularity (one second) keeps a
/// timestamp that lands exactly on `on_or_after` in the results.
const INCLUSIVE_BOUND_SHIFT_SECS: i64 = 1;

/// A schedule whose occurrences are defined by a cron expression
///
/// The expression is validated when the schedule is built; querying never
/// fails. Standard 5-field expressions are accepted and normalized to the
/// 6-field form the evaluator requires.
#[derive(Debug, Clone)]
pub struct CronSchedule {
    expression: String,
    compiled: cron::Schedule,
}

impl CronSchedule {
    pub fn new(expression: &str) -> Result<Self, super::ScheduleError> {
        let normalized = normalize_cron(expression);
        let compiled =
            cron::Schedule::from_str(&normalized).map_err(|source| super::ScheduleError::InvalidCron {
                expression: expression.to_string(),
                source,
            })?;
        Ok(Self {
            expression: expression.to_string(),
            compiled,
        })
    }

    /// The expression as the caller supplied it
    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn next_from(&self, n: usize, on_or_after: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let anchor = on_or_after - Duration::seconds(INCLUSIVE_BOUND_SHIFT_SECS);
        self.compiled.after(&anchor).take(n).collect()
    }
}

/// Normalize a 5-field cron expression to 6-field by prepending "0 " for seconds.
///
/// The `cron` crate requires 6 fields: `sec min hour day-of-month month day-of-week`.
/// Standard cron expressions use 5 fields: `min hour day-of-month month day-of-week`.
fn normalize_cron(expression: &str) -> String {
    let trimmed = expression.trim();
    let field_count = trimmed.split_whitespace().count();
    if field_count == 5 {
        format!("0 {}", trimmed)
    } else {
        // Already 6-field (or invalid); pass through as-is.
        trimmed.to_string()
    }
}
