//! Ultrasonic distance from a burst of echo measurements.
//!
//! A sample is `sample_count` independent trigger/echo cycles separated by a
//! settle pause. Timed-out echoes are dropped, the single highest and lowest
//! of the rest are trimmed, and the mean round trip is halved and scaled by
//! the speed of sound at the given air temperature.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cws_traits::{Clock, InputLine, OutputLine, Timestamp};
use tracing::{debug, warn};

use crate::config::RangingCfg;
use crate::error::RangingError;
use crate::pulse::PulseTimer;
use crate::speed_of_sound::speed_of_sound;
use crate::util::{CM_PER_M, NANOS_PER_SEC};

/// Fewest echoes that still leave one value after outlier trimming.
pub const MIN_VALID_ECHOES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceSample {
    pub distance_cm: f64,
    pub temperature_c: f64,
    pub taken_at: Timestamp,
    /// Echoes that contributed before trimming.
    pub valid_echoes: usize,
}

/// Mean of `samples` without its single largest and single smallest element.
/// `None` when fewer than three samples are given.
pub fn trimmed_mean_ns(samples: &[u64]) -> Option<f64> {
    if samples.len() < MIN_VALID_ECHOES {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_unstable();
    let inner = &sorted[1..sorted.len() - 1];
    let sum: u128 = inner.iter().map(|&v| u128::from(v)).sum();
    Some(sum as f64 / inner.len() as f64)
}

/// One-way distance in centimeters for a round-trip echo time.
#[inline]
pub fn round_trip_to_cm(round_trip_ns: f64, temp_c: f64) -> f64 {
    let one_way_ns = round_trip_ns / 2.0;
    one_way_ns * speed_of_sound(temp_c) / NANOS_PER_SEC * CM_PER_M
}

pub struct AcousticRanger<T, E, C> {
    timer: PulseTimer<T, E, C>,
    cfg: RangingCfg,
    cancel: Option<Arc<AtomicBool>>,
}

impl<T, E, C> AcousticRanger<T, E, C>
where
    T: OutputLine,
    E: InputLine,
    C: Clock,
{
    pub fn new(trigger: T, echo: E, clock: C, cfg: RangingCfg) -> Self {
        Self {
            timer: PulseTimer::new(trigger, echo, clock),
            cfg,
            cancel: None,
        }
    }

    /// Abandon a sample at the next settle boundary once `flag` is set.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn cfg(&self) -> &RangingCfg {
        &self.cfg
    }

    pub fn clock(&self) -> &C {
        self.timer.clock()
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }

    /// Distance sample using the configured echo count.
    pub fn calc_distance(&mut self, temp_c: f64) -> Result<DistanceSample, RangingError> {
        self.calc_distance_with(temp_c, self.cfg.sample_count)
    }

    pub fn calc_distance_with(
        &mut self,
        temp_c: f64,
        sample_count: u32,
    ) -> Result<DistanceSample, RangingError> {
        let mut valid_ns: Vec<u64> = Vec::with_capacity(sample_count as usize);

        for i in 0..sample_count {
            if i > 0 {
                self.timer.clock().sleep(self.cfg.settle);
            }
            if self.cancelled() {
                debug!(taken = i, "ranging cancelled");
                return Err(RangingError::Cancelled);
            }
            match self
                .timer
                .measure_pulse(self.cfg.idle_timeout, self.cfg.echo_timeout)
            {
                Ok(width) => {
                    valid_ns.push(width.as_nanos().min(u128::from(u64::MAX)) as u64);
                }
                Err(reason) => debug!(echo = i, %reason, "echo discarded"),
            }
        }

        let valid = valid_ns.len();
        let mean_ns = trimmed_mean_ns(&valid_ns).ok_or(RangingError::InsufficientSamples {
            valid,
            required: MIN_VALID_ECHOES,
        })?;

        let mut distance_cm = round_trip_to_cm(mean_ns, temp_c);
        if !(distance_cm.is_finite() && distance_cm >= 0.0) {
            warn!(distance_cm, mean_ns, temp_c, "non-physical distance clamped to 0");
            distance_cm = 0.0;
        }

        debug!(
            distance_cm,
            temp_c,
            valid,
            requested = sample_count,
            "distance sample"
        );
        Ok(DistanceSample {
            distance_cm,
            temperature_c: temp_c,
            taken_at: self.timer.clock().wall_clock(),
            valid_echoes: valid,
        })
    }
}
