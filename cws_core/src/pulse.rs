//! Single trigger/echo cycle with bounded edge waits.
//!
//! The echo line is sampled in tight batches and the deadline is only
//! consulted between batches, so an edge is timestamped within a few line
//! reads of when it happened.

use std::time::{Duration, Instant};

use cws_traits::{Clock, InputLine, Level, OutputLine};
use tracing::trace;

use crate::error::PulseTimeout;

/// Width of the trigger pulse.
pub const TRIGGER_WIDTH: Duration = Duration::from_micros(10);
/// Echo reads between deadline checks.
pub const POLL_BATCH: usize = 1000;

const ECHO_IDLE: Level = Level::Low;
const ECHO_ACTIVE: Level = Level::High;

/// Outcome of one trigger/echo cycle: the echo width, or which wait ran out.
pub type PulseMeasurement = Result<Duration, PulseTimeout>;

pub struct PulseTimer<T, E, C> {
    trigger: T,
    echo: E,
    clock: C,
}

impl<T, E, C> PulseTimer<T, E, C>
where
    T: OutputLine,
    E: InputLine,
    C: Clock,
{
    /// Takes ownership of both lines; the trigger is driven idle immediately.
    pub fn new(mut trigger: T, echo: E, clock: C) -> Self {
        trigger.set_output(Level::Low);
        Self {
            trigger,
            echo,
            clock,
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Fire one trigger pulse and time the echo.
    ///
    /// `wait_for_idle` bounds the wait for a quiet echo line before triggering;
    /// `max_wait` bounds each of the two echo edges separately.
    pub fn measure_pulse(&mut self, wait_for_idle: Duration, max_wait: Duration) -> PulseMeasurement {
        self.wait_for(ECHO_IDLE, wait_for_idle)
            .ok_or(PulseTimeout::Idle)?;

        self.trigger.set_output(Level::High);
        self.clock.sleep(TRIGGER_WIDTH);
        self.trigger.set_output(Level::Low);

        let start = self
            .wait_for(ECHO_ACTIVE, max_wait)
            .ok_or(PulseTimeout::Start)?;
        let stop = self
            .wait_for(ECHO_IDLE, max_wait)
            .ok_or(PulseTimeout::Stop)?;

        let width = stop.saturating_duration_since(start);
        trace!(width_us = width.as_micros() as u64, "echo pulse");
        Ok(width)
    }

    /// Poll the echo line until it reads `level`, returning the instant it was seen.
    fn wait_for(&mut self, level: Level, bound: Duration) -> Option<Instant> {
        let deadline = self.clock.now() + bound;
        loop {
            for _ in 0..POLL_BATCH {
                if self.echo.read_input() == level {
                    return Some(self.clock.now());
                }
            }
            if self.clock.now() >= deadline {
                return None;
            }
        }
    }
}
