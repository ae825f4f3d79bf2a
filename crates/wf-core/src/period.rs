//! Observation-period clock math.
//!
//! Valve quotas are budgeted over fixed observation periods anchored to
//! midnight UTC: a period starts at the largest multiple of the period
//! length since midnight. With the default 7200 s period this lands on
//! even hours (12:00, 14:00, ...), matching what installers expect to
//! see on a dial.

use chrono::{DateTime, Duration, NaiveTime, Utc};
use chrono::Timelike;

/// Start of the observation period containing `now`.
///
/// Callers validate `period_s > 0`; values below 1 s clamp to 1 s.
pub fn period_start(now: DateTime<Utc>, period_s: f64) -> DateTime<Utc> {
    let period = period_s.max(1.0) as i64;
    let since_midnight = i64::from(now.num_seconds_from_midnight());
    let slot_start = since_midnight - since_midnight % period;
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    midnight + Duration::seconds(slot_start)
}

/// Seconds elapsed since the start of the current observation period.
pub fn period_elapsed_s(now: DateTime<Utc>, period_s: f64) -> f64 {
    seconds_between(period_start(now, period_s), now)
}

/// Signed seconds from `earlier` to `later` (negative if reversed).
pub fn seconds_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    (later - earlier).num_milliseconds() as f64 / 1000.0
}
