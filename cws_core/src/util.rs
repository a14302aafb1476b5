//! Unit and time helpers for cws_core.

use chrono::TimeDelta;
use cws_traits::Timestamp;

pub const NANOS_PER_SEC: f64 = 1e9;
pub const CM_PER_M: f64 = 100.0;
/// Cubic centimeters in one liter.
pub const CM3_PER_L: f64 = 1000.0;
pub const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Signed hours from `from` to `to`, at millisecond resolution.
#[inline]
pub fn hours_between(from: Timestamp, to: Timestamp) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

/// Convert fractional hours into a `TimeDelta`; `None` when not representable.
#[inline]
pub fn delta_from_hours(hours: f64) -> Option<TimeDelta> {
    if !hours.is_finite() || hours < 0.0 {
        return None;
    }
    let ms = (hours * MILLIS_PER_HOUR).round();
    if ms >= i64::MAX as f64 {
        return None;
    }
    TimeDelta::try_milliseconds(ms as i64)
}
