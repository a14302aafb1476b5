//! Consumption-rate tracking and time-to-empty forecast.
//!
//! Readings since the last refill feed two exponentially weighted
//! least-squares trends of volume over time: a short one (τ = 24 h by
//! default) and a long one (τ = 168 h). Each trend's consumption rate is its
//! negated slope, so level jitter averages out instead of ratcheting into a
//! phantom drain. The blended rate weights them 2:1 and is floored at zero.
//! A rise above the noise threshold is a refill: both trends restart from
//! the refill reading.

use std::collections::VecDeque;

use chrono::TimeDelta;
use cws_traits::Timestamp;
use tracing::{debug, info, warn};

use crate::config::ForecastCfg;
use crate::util::{delta_from_hours, hours_between};
use crate::volume::VolumeReading;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Forecast {
    EmptyAt(Timestamp),
    Unknown,
}

impl Forecast {
    pub fn empty_at(&self) -> Option<Timestamp> {
        match self {
            Forecast::EmptyAt(t) => Some(*t),
            Forecast::Unknown => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefillEvent {
    pub at: Timestamp,
    pub from_l: f64,
    pub to_l: f64,
}

impl RefillEvent {
    pub fn added_l(&self) -> f64 {
        self.to_l - self.from_l
    }
}

/// Exponentially weighted least-squares fit of volume against time.
///
/// Times are hours relative to the newest reading; the sums are shifted on
/// every push so they stay small however long the window runs.
#[derive(Debug, Clone, Copy, Default)]
struct WeightedTrend {
    w: f64,
    t: f64,
    tt: f64,
    v: f64,
    tv: f64,
}

impl WeightedTrend {
    /// Trend holding just `volume_l` at the origin.
    fn starting_at(volume_l: f64) -> Self {
        Self {
            w: 1.0,
            v: volume_l,
            ..Self::default()
        }
    }

    fn push(&mut self, volume_l: f64, dt_h: f64, tau_h: f64) {
        // move the origin forward by dt: t -> t - dt
        self.tt += dt_h * dt_h * self.w - 2.0 * dt_h * self.t;
        self.tv -= dt_h * self.v;
        self.t -= dt_h * self.w;

        let decay = (-dt_h / tau_h).exp();
        self.w *= decay;
        self.t *= decay;
        self.tt *= decay;
        self.v *= decay;
        self.tv *= decay;

        self.w += 1.0;
        self.v += volume_l;
    }

    /// Signed consumption rate (L/h, positive when draining); `None` until
    /// two readings carry weight.
    fn rate_lph(&self) -> Option<f64> {
        let den = self.w * self.tt - self.t * self.t;
        if !(den.is_finite() && den > 0.0) {
            return None;
        }
        let slope = (self.w * self.tv - self.t * self.v) / den;
        slope.is_finite().then_some(-slope)
    }
}

#[derive(Debug, Clone)]
pub struct ConsumptionForecaster {
    cfg: ForecastCfg,
    history: VecDeque<VolumeReading>,
    refills: VecDeque<RefillEvent>,
    anchor: Option<VolumeReading>,
    intervals_since_anchor: usize,
    short: WeightedTrend,
    long: WeightedTrend,
}

impl Default for ConsumptionForecaster {
    fn default() -> Self {
        Self::new(ForecastCfg::default())
    }
}

impl ConsumptionForecaster {
    pub fn new(cfg: ForecastCfg) -> Self {
        Self {
            cfg,
            history: VecDeque::new(),
            refills: VecDeque::new(),
            anchor: None,
            intervals_since_anchor: 0,
            short: WeightedTrend::default(),
            long: WeightedTrend::default(),
        }
    }

    pub fn cfg(&self) -> &ForecastCfg {
        &self.cfg
    }

    pub fn ingest(&mut self, reading: VolumeReading) {
        if !reading.volume_l.is_finite() {
            warn!(volume_l = reading.volume_l, "non-finite volume ignored");
            return;
        }

        match self.history.back().copied() {
            None => self.restart_at(reading),
            Some(prev) if hours_between(prev.taken_at, reading.taken_at) <= 0.0 => {
                warn!(
                    at = %reading.taken_at,
                    last = %prev.taken_at,
                    "reading not newer than history, ignored"
                );
                return;
            }
            Some(prev) => {
                let rise = reading.volume_l - prev.volume_l;
                if rise > self.cfg.noise_threshold_l {
                    info!(
                        from_l = prev.volume_l,
                        to_l = reading.volume_l,
                        "refill detected"
                    );
                    self.refills.push_back(RefillEvent {
                        at: reading.taken_at,
                        from_l: prev.volume_l,
                        to_l: reading.volume_l,
                    });
                    self.restart_at(reading);
                } else {
                    let dt_h = hours_between(prev.taken_at, reading.taken_at);
                    self.short.push(reading.volume_l, dt_h, self.cfg.short_tau_h);
                    self.long.push(reading.volume_l, dt_h, self.cfg.long_tau_h);
                    self.intervals_since_anchor += 1;
                    debug!(
                        change_l = rise,
                        dt_h,
                        short_lph = ?self.short.rate_lph(),
                        "consumption interval"
                    );
                }
            }
        }

        self.history.push_back(reading);
        self.prune(reading.taken_at);
    }

    fn restart_at(&mut self, reading: VolumeReading) {
        self.anchor = Some(reading);
        self.intervals_since_anchor = 0;
        self.short = WeightedTrend::starting_at(reading.volume_l);
        self.long = WeightedTrend::starting_at(reading.volume_l);
    }

    fn prune(&mut self, newest: Timestamp) {
        let Some(keep) = delta_from_hours(self.cfg.retention_h) else {
            return;
        };
        let Some(cutoff) = newest.checked_sub_signed(keep) else {
            return;
        };
        while self.history.front().is_some_and(|r| r.taken_at < cutoff) {
            self.history.pop_front();
        }
        while self.refills.front().is_some_and(|e| e.at < cutoff) {
            self.refills.pop_front();
        }
    }

    pub fn short_rate_lph(&self) -> Option<f64> {
        self.short.rate_lph().map(|r| r.max(0.0))
    }

    pub fn long_rate_lph(&self) -> Option<f64> {
        self.long.rate_lph().map(|r| r.max(0.0))
    }

    /// Weighted blend of the short and long trends, never negative; `None`
    /// before the first post-refill interval.
    pub fn blended_rate_lph(&self) -> Option<f64> {
        let (s, l) = (self.short.rate_lph()?, self.long.rate_lph()?);
        let total = self.cfg.short_weight + self.cfg.long_weight;
        if total <= 0.0 {
            return None;
        }
        Some(((self.cfg.short_weight * s + self.cfg.long_weight * l) / total).max(0.0))
    }

    pub fn latest(&self) -> Option<&VolumeReading> {
        self.history.back()
    }

    /// Retained readings, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &VolumeReading> {
        self.history.iter()
    }

    /// Retained refill events, oldest first.
    pub fn refills(&self) -> impl Iterator<Item = &RefillEvent> {
        self.refills.iter()
    }

    pub fn latest_refill(&self) -> Option<&RefillEvent> {
        self.refills.back()
    }

    /// Start of the current consumption window (first reading or last refill).
    pub fn window_start(&self) -> Option<Timestamp> {
        self.anchor.map(|a| a.taken_at)
    }

    pub fn readings_in_window(&self) -> usize {
        if self.anchor.is_some() {
            self.intervals_since_anchor + 1
        } else {
            0
        }
    }

    /// Time left at the blended rate, from the latest reading.
    pub fn time_to_empty(&self) -> Option<TimeDelta> {
        let rate = self.blended_rate_lph()?;
        if !(rate > self.cfg.min_rate_lph && rate > f64::EPSILON) {
            return None;
        }
        let latest = self.history.back()?;
        delta_from_hours(latest.volume_l.max(0.0) / rate)
    }

    pub fn forecast_empty_at(&self) -> Forecast {
        let Some(left) = self.time_to_empty() else {
            return Forecast::Unknown;
        };
        self.history
            .back()
            .and_then(|latest| latest.taken_at.checked_add_signed(left))
            .map_or(Forecast::Unknown, Forecast::EmptyAt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trend_needs_two_readings() {
        let mut t = WeightedTrend::starting_at(10.0);
        assert_eq!(t.rate_lph(), None);
        t.push(8.5, 0.5, 24.0);
        assert!((t.rate_lph().unwrap() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn trend_of_a_straight_line_is_its_slope() {
        // exact for any weighting and uneven spacing
        let mut t = WeightedTrend::starting_at(30.0);
        let mut at = 0.0;
        for dt in [0.25, 2.0, 0.1, 7.5, 1.0] {
            at += dt;
            t.push(30.0 - 0.4 * at, dt, 24.0);
        }
        assert!((t.rate_lph().unwrap() - 0.4).abs() < 1e-9);
    }

    #[test]
    fn rising_trend_is_negative_rate() {
        let mut t = WeightedTrend::starting_at(10.0);
        t.push(10.2, 1.0, 24.0);
        assert!(t.rate_lph().unwrap() < 0.0);
    }

    #[test]
    fn refill_added_volume() {
        let e = RefillEvent {
            at: chrono::Utc::now(),
            from_l: 3.0,
            to_l: 17.5,
        };
        assert_eq!(e.added_l(), 14.5);
    }
}
