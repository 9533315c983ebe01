//! Cron-driven full-sync trigger.
//!
//! Schedules are evaluated in local time. The schedule library expects a
//! seconds field, so classic five-field expressions get seconds pinned to
//! zero before parsing.

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local};
use cron::Schedule;

/// Parse a cron expression, accepting both five-field and six/seven-field
/// forms.
pub fn parse_schedule(expr: &str) -> Result<Schedule, String> {
    let fields = expr.split_whitespace().count();
    let normalized = if fields == 5 {
        format!("0 {expr}")
    } else {
        expr.to_string()
    };
    Schedule::from_str(&normalized).map_err(|e| e.to_string())
}

/// Time until the next occurrence after `now`, if the schedule has one.
pub fn next_delay(schedule: &Schedule, now: DateTime<Local>) -> Option<Duration> {
    let next = schedule.after(&now).next()?;
    (next - now).to_std().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn five_field_expression_is_normalized() {
        let schedule = parse_schedule("*/5 * * * *").expect("parse");
        let now = Local.with_ymd_and_hms(2024, 1, 1, 12, 0, 30).unwrap();
        let delay = next_delay(&schedule, now).expect("next");
        assert_eq!(delay, Duration::from_secs(4 * 60 + 30));
    }

    #[test]
    fn six_field_expression_passes_through() {
        let schedule = parse_schedule("30 * * * * *").expect("parse");
        let now = Local.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let delay = next_delay(&schedule, now).expect("next");
        assert_eq!(delay, Duration::from_secs(30));
    }

    #[test]
    fn nonsense_expression_is_an_error() {
        assert!(parse_schedule("every full moon").is_err());
    }
}
