//! Civil-time conversion for the forecast region
//!
//! Spots use a fixed Central European daylight-saving rule: UTC+2 from the last
//! Sunday of March (00:00 UTC) up to the last Sunday of October (00:00 UTC),
//! UTC+1 otherwise. Civil values are returned as `NaiveDateTime` wall-clock
//! readings so they can never be confused with real UTC instants.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, Timelike, Utc};

/// Offset in hours while daylight saving is in effect
const SUMMER_OFFSET_HOURS: i64 = 2;

/// Offset in hours outside daylight saving
const WINTER_OFFSET_HOURS: i64 = 1;

/// Returns midnight UTC of the last Sunday of `month` in `year`.
///
/// Only used for March and October, both of which have 31 days.
fn last_sunday_of(year: i32, month: u32) -> Option<DateTime<Utc>> {
    let last_day = NaiveDate::from_ymd_opt(year, month, 31)?;
    let back = i64::from(last_day.weekday().num_days_from_sunday());
    let sunday = last_day - Duration::days(back);
    Some(sunday.and_hms_opt(0, 0, 0)?.and_utc())
}

/// Whether daylight saving applies at the given UTC instant
pub fn is_dst(instant: DateTime<Utc>) -> bool {
    let year = instant.year();
    match (last_sunday_of(year, 3), last_sunday_of(year, 10)) {
        (Some(start), Some(end)) => instant >= start && instant < end,
        _ => false,
    }
}

/// UTC offset in hours at the given instant
pub fn offset_hours(instant: DateTime<Utc>) -> i64 {
    if is_dst(instant) {
        SUMMER_OFFSET_HOURS
    } else {
        WINTER_OFFSET_HOURS
    }
}

/// Converts a UTC instant to the civil wall-clock reading
pub fn to_civil(instant: DateTime<Utc>) -> NaiveDateTime {
    instant.naive_utc() + Duration::hours(offset_hours(instant))
}

/// Converts a civil wall-clock reading back to UTC.
///
/// The rule is evaluated on the wall-clock value read as if it were UTC, so the
/// hour around each switch is resolved towards the pre-switch offset.
pub fn civil_to_utc(civil: NaiveDateTime) -> DateTime<Utc> {
    let as_utc = civil.and_utc();
    as_utc - Duration::hours(offset_hours(as_utc))
}

/// Civil hour of day (0-23) for a UTC instant
pub fn civil_hour(instant: DateTime<Utc>) -> u32 {
    to_civil(instant).hour()
}

/// Hours since the epoch of a civil wall-clock reading, with fractional part
pub fn civil_epoch_hours(civil: NaiveDateTime) -> f64 {
    civil.and_utc().timestamp() as f64 / 3600.0
}

/// Whole hours since the epoch of a civil wall-clock reading
pub fn civil_epoch_hour_floor(civil: NaiveDateTime) -> i64 {
    civil.and_utc().timestamp().div_euclid(3600)
}

/// Formats a fractional civil epoch hour as `HH:MM`
pub fn format_epoch_hour(hour: f64) -> String {
    let secs = (hour * 3600.0).round() as i64;
    match DateTime::from_timestamp(secs, 0) {
        Some(dt) => dt.format("%H:%M").to_string(),
        None => "00:00".to_string(),
    }
}
