//! Time and volume unit conversions.
//!
//! The hydrodynamic side keeps time in seconds from its cold start. The
//! hydrologic side counts elapsed minutes and stamps its boundary series in
//! Julian days. Everything inside the coupler is converted to seconds.

use chrono::{DateTime, Utc};

/// Time tolerance (s) used by every synchronization comparison.
pub const TIME_TOL: f64 = 1.0e-3;

/// Minimum number of entries in an exchanged boundary series.
pub const SERIES_LENGTH: usize = 4;

/// Floor added to a degenerate flux window so the division stays finite.
pub const FLUX_EPSILON: f64 = 1.0e-20;

/// Seconds per minute.
pub const SECONDS_PER_MINUTE: f64 = 60.0;

/// Seconds per day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Minutes per day.
pub const MINUTES_PER_DAY: f64 = 1_440.0;

/// Cubic feet to cubic metres.
pub const CUFT_TO_CUM: f64 = 0.028_316_846_592;

/// Julian day number of 1970-01-01T00:00:00Z.
pub const UNIX_EPOCH_JULIAN: f64 = 2_440_587.5;

/// Convert elapsed minutes to seconds.
#[inline]
pub fn minutes_to_seconds(minutes: f64) -> f64 {
    minutes * SECONDS_PER_MINUTE
}

/// Convert seconds to elapsed minutes.
#[inline]
pub fn seconds_to_minutes(seconds: f64) -> f64 {
    seconds / SECONDS_PER_MINUTE
}

/// Convert a duration in seconds to days.
#[inline]
pub fn seconds_to_days(seconds: f64) -> f64 {
    seconds / SECONDS_PER_DAY
}

/// Convert a duration in days to seconds.
#[inline]
pub fn days_to_seconds(days: f64) -> f64 {
    days * SECONDS_PER_DAY
}

/// Calendar date of a Julian day, for log output.
///
/// Returns `None` when the value is outside chrono's representable range.
pub fn julian_to_datetime(julian_day: f64) -> Option<DateTime<Utc>> {
    let seconds = days_to_seconds(julian_day - UNIX_EPOCH_JULIAN);
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1.0e9).round().min(999_999_999.0) as u32;
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Julian day of a calendar date.
pub fn datetime_to_julian(datetime: &DateTime<Utc>) -> f64 {
    let seconds = datetime.timestamp() as f64 + f64::from(datetime.timestamp_subsec_nanos()) * 1.0e-9;
    UNIX_EPOCH_JULIAN + seconds_to_days(seconds)
}
