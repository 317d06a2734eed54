//! Parsing and recurrence for task schedule strings, per spec.md §6:
//! either an `"RRULE:FREQ=…;…"` recurrence rule or an ISO-8601 datetime
//! (one-shot; naive datetimes are treated as UTC).

use chrono::{DateTime, NaiveDateTime, Utc};
use rrule::{RRuleSet, Tz};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid schedule format: {0}")]
    InvalidFormat(String),
}

/// The first occurrence strictly after `now`, used when a task is created.
/// A one-shot schedule already in the past yields `None`, per the ground
/// truth's `next_run_ts` (`if dt_value <= after: return None`) — callers
/// creating a task from such a schedule should treat that as rejection.
pub fn initial_next_run(schedule: &str, now: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    match schedule.strip_prefix("RRULE:") {
        Some(rule) => next_occurrence_after(rule, now),
        None => {
            let at = parse_one_shot(schedule)?;
            Ok((at > now).then_some(at))
        }
    }
}

/// The next occurrence strictly after `last_run`, used once a task fires.
/// A one-shot ISO schedule never recurs, so this always yields `None` for
/// that branch — the caller is expected to disable the task when it does.
pub fn recompute_next_run(schedule: &str, last_run: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    match schedule.strip_prefix("RRULE:") {
        Some(rule) => next_occurrence_after(rule, last_run),
        None => {
            parse_one_shot(schedule)?;
            Ok(None)
        }
    }
}

fn parse_one_shot(schedule: &str) -> Result<DateTime<Utc>, ScheduleError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(schedule) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(schedule, format) {
            return Ok(naive.and_utc());
        }
    }
    Err(ScheduleError::InvalidFormat(schedule.to_string()))
}

fn next_occurrence_after(rule: &str, after: DateTime<Utc>) -> Result<Option<DateTime<Utc>>, ScheduleError> {
    let dtstart = after.format("DTSTART:%Y%m%dT%H%M%SZ").to_string();
    let full = format!("{dtstart}\nRRULE:{rule}");
    let set: RRuleSet = full
        .parse()
        .map_err(|e| ScheduleError::InvalidFormat(format!("{rule}: {e}")))?;

    let after_tz = after.with_timezone(&Tz::UTC);
    let result = set.after(after_tz).all(1);
    Ok(result.dates.first().map(|dt| dt.with_timezone(&Utc)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn one_shot_iso_datetime_is_accepted() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = initial_next_run("2026-06-01T09:00:00Z", now).unwrap();
        assert!(next.is_some());
    }

    #[test]
    fn one_shot_never_recurs() {
        let fired_at = Utc.with_ymd_and_hms(2026, 6, 1, 9, 0, 0).unwrap();
        let next = recompute_next_run("2026-06-01T09:00:00Z", fired_at).unwrap();
        assert!(next.is_none());
    }

    #[test]
    fn one_shot_in_the_past_yields_no_next_run() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let next = initial_next_run("2000-01-01T00:00:00Z", now).unwrap();
        assert!(next.is_none());
    }

    #[test]
    fn rrule_daily_advances_by_one_day() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 9, 0, 0).unwrap();
        let next = initial_next_run("RRULE:FREQ=DAILY;INTERVAL=1", now)
            .unwrap()
            .unwrap();
        assert!(next > now);
        assert_eq!(next.date_naive(), (now + chrono::Duration::days(1)).date_naive());
    }

    #[test]
    fn unrecognized_schedule_strings_are_rejected() {
        assert!(initial_next_run("not a schedule", Utc::now()).is_err());
    }
}
