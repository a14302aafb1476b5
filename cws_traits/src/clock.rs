use chrono::{DateTime, TimeDelta, Utc};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Wall-clock timestamp attached to readings and records.
pub type Timestamp = DateTime<Utc>;

/// Clock abstraction shared by the ranging hot path and the orchestration loop.
///
/// - now(): monotonic instant, used for pulse timing and bounded waits
/// - sleep(): sleeps for the provided duration (implementations may simulate)
/// - wall_clock(): calendar time stamped onto readings
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);
    fn wall_clock(&self) -> Timestamp;

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        dur.as_millis().min(u128::from(u64::MAX)) as u64
    }
}

/// Default, real-time clock backed by `std::time::Instant` and the system calendar.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }

    #[inline]
    fn wall_clock(&self) -> Timestamp {
        Utc::now()
    }
}

/// Deterministic clock whose time only moves when told to.
///
/// now() = origin + offset, wall_clock() = wall_origin + offset.
/// sleep(d) advances internal time by d without actually sleeping.
/// Clones share the same offset, so a simulated peripheral and the code
/// under test observe one timeline.
#[derive(Debug, Clone)]
pub struct ManualClock {
    origin: Instant,
    wall_origin: Timestamp,
    offset: Arc<Mutex<Duration>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Clock whose wall time starts at `wall_origin`.
    pub fn starting_at(wall_origin: Timestamp) -> Self {
        Self {
            origin: Instant::now(),
            wall_origin,
            offset: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// Advance the clock by the given duration.
    pub fn advance(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = off.saturating_add(d);
        }
    }

    /// Set the absolute offset relative to origin.
    pub fn set_offset(&self, d: Duration) {
        if let Ok(mut off) = self.offset.lock() {
            *off = d;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, d: Duration) {
        self.advance(d);
    }

    fn wall_clock(&self) -> Timestamp {
        TimeDelta::from_std(self.elapsed())
            .ok()
            .and_then(|d| self.wall_origin.checked_add_signed(d))
            .unwrap_or(self.wall_origin)
    }
}
