//! Simulated peripherals for host builds and tests.
//!
//! The sonar pair shares one clock with the code under test. On a
//! `ManualClock` every echo-line read advances the clock by a fixed step, so
//! bounded waits and pulse widths play out deterministically without real
//! time passing; on a `MonotonicClock` the echo plays out in real time.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use cws_traits::{
    BoxError, Clock, Indicator, InputLine, Level, ManualClock, MonotonicClock, OutputLine,
    TemperatureSource, WaterOutSensor,
};

/// Delay between the trigger falling edge and the echo rising edge.
pub const ECHO_DELAY: Duration = Duration::from_micros(200);
/// Clock advance per echo-line read.
pub const DEFAULT_READ_STEP: Duration = Duration::from_micros(1);

/// Clock a simulated peripheral can drive forward on each line access.
pub trait SimClock: Clock {
    fn tick(&self, step: Duration);
}

impl SimClock for ManualClock {
    fn tick(&self, step: Duration) {
        self.advance(step);
    }
}

impl SimClock for MonotonicClock {
    fn tick(&self, _step: Duration) {}
}

#[derive(Debug)]
struct SonarState<C> {
    clock: C,
    step: Duration,
    distance_cm: f64,
    drain_cm_per_echo: f64,
    temperature_c: f64,
    no_echo: bool,
    stuck_high: bool,
    script: VecDeque<Option<Duration>>,
    trigger_high: bool,
    pulse: Option<(Instant, Duration)>,
    echoes_fired: usize,
}

impl<C: SimClock> SonarState<C> {
    fn echo_width(&self) -> Duration {
        let c = 331.0 + 0.6 * self.temperature_c.clamp(0.0, 100.0);
        let round_trip_s = 2.0 * (self.distance_cm.max(0.0) / 100.0) / c;
        Duration::from_nanos((round_trip_s * 1e9).round() as u64)
    }

    fn fire(&mut self) {
        self.echoes_fired += 1;
        let width = match self.script.pop_front() {
            Some(scripted) => scripted,
            None if self.no_echo => None,
            None => {
                let w = self.echo_width();
                self.distance_cm += self.drain_cm_per_echo;
                Some(w)
            }
        };
        self.pulse = width.map(|w| (self.clock.now() + ECHO_DELAY, w));
    }

    fn level(&mut self) -> Level {
        if self.stuck_high {
            return Level::High;
        }
        let now = self.clock.now();
        match self.pulse {
            Some((rise, width)) if now >= rise && now < rise + width => Level::High,
            Some((rise, width)) if now >= rise + width => {
                self.pulse = None;
                Level::Low
            }
            _ => Level::Low,
        }
    }
}

/// HC-SR04 stand-in. Echo width follows the configured distance and air
/// temperature unless a script of explicit widths is queued.
#[derive(Debug)]
pub struct SimulatedSonar<C = ManualClock> {
    state: Arc<Mutex<SonarState<C>>>,
}

impl<C> Clone for SimulatedSonar<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<C: SimClock> SimulatedSonar<C> {
    pub fn new(clock: C, distance_cm: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(SonarState {
                clock,
                step: DEFAULT_READ_STEP,
                distance_cm,
                drain_cm_per_echo: 0.0,
                temperature_c: 20.0,
                no_echo: false,
                stuck_high: false,
                script: VecDeque::new(),
                trigger_high: false,
                pulse: None,
                echoes_fired: 0,
            })),
        }
    }

    fn with_state(&self, f: impl FnOnce(&mut SonarState<C>)) {
        if let Ok(mut s) = self.state.lock() {
            f(&mut s);
        }
    }

    pub fn with_temperature(self, temperature_c: f64) -> Self {
        self.with_state(|s| s.temperature_c = temperature_c);
        self
    }

    /// Distance added after every generated echo (water level dropping).
    pub fn with_drain(self, cm_per_echo: f64) -> Self {
        self.with_state(|s| s.drain_cm_per_echo = cm_per_echo);
        self
    }

    pub fn with_read_step(self, step: Duration) -> Self {
        self.with_state(|s| s.step = step);
        self
    }

    /// Queue explicit echo widths; `None` means that trigger gets no echo.
    pub fn with_script(self, widths: impl IntoIterator<Item = Option<Duration>>) -> Self {
        self.with_state(|s| s.script.extend(widths));
        self
    }

    pub fn set_distance_cm(&self, distance_cm: f64) {
        self.with_state(|s| s.distance_cm = distance_cm);
    }

    pub fn set_temperature_c(&self, temperature_c: f64) {
        self.with_state(|s| s.temperature_c = temperature_c);
    }

    pub fn set_no_echo(&self, no_echo: bool) {
        self.with_state(|s| s.no_echo = no_echo);
    }

    /// Hold the echo line active, as a wedged sensor does.
    pub fn set_stuck_high(&self, stuck: bool) {
        self.with_state(|s| s.stuck_high = stuck);
    }

    pub fn distance_cm(&self) -> f64 {
        self.state.lock().map(|s| s.distance_cm).unwrap_or(f64::NAN)
    }

    pub fn echoes_fired(&self) -> usize {
        self.state.lock().map(|s| s.echoes_fired).unwrap_or(0)
    }

    /// The trigger and echo lines, to be handed to the ranger.
    pub fn lines(&self) -> (SimTrigger<C>, SimEcho<C>) {
        (
            SimTrigger {
                state: self.state.clone(),
            },
            SimEcho {
                state: self.state.clone(),
            },
        )
    }
}

pub struct SimTrigger<C = ManualClock> {
    state: Arc<Mutex<SonarState<C>>>,
}

impl<C: SimClock> OutputLine for SimTrigger<C> {
    fn set_output(&mut self, level: Level) {
        if let Ok(mut s) = self.state.lock() {
            match level {
                Level::High => s.trigger_high = true,
                Level::Low => {
                    if s.trigger_high {
                        s.trigger_high = false;
                        s.fire();
                    }
                }
            }
        }
    }
}

pub struct SimEcho<C = ManualClock> {
    state: Arc<Mutex<SonarState<C>>>,
}

impl<C: SimClock> InputLine for SimEcho<C> {
    fn read_input(&mut self) -> Level {
        match self.state.lock() {
            Ok(mut s) => {
                let step = s.step;
                s.clock.tick(step);
                s.level()
            }
            Err(_) => Level::Low,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SimulatedThermometer {
    temperature_c: f64,
    humidity_pct: Option<f64>,
    pressure_hpa: Option<f64>,
    fail: bool,
}

impl SimulatedThermometer {
    pub fn new(temperature_c: f64) -> Self {
        Self {
            temperature_c,
            humidity_pct: None,
            pressure_hpa: None,
            fail: false,
        }
    }

    /// Thermometer whose every read errors.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(f64::NAN)
        }
    }

    pub fn with_humidity(mut self, pct: f64) -> Self {
        self.humidity_pct = Some(pct);
        self
    }

    pub fn with_pressure(mut self, hpa: f64) -> Self {
        self.pressure_hpa = Some(hpa);
        self
    }

    fn read(&self, value: f64) -> Result<f64, BoxError> {
        if self.fail {
            return Err(Box::new(crate::error::HwError::Timeout));
        }
        Ok(value)
    }
}

impl TemperatureSource for SimulatedThermometer {
    fn read_temperature_c(&mut self) -> Result<f64, BoxError> {
        self.read(self.temperature_c)
    }

    fn read_humidity_pct(&mut self) -> Option<Result<f64, BoxError>> {
        self.humidity_pct.map(|v| self.read(v))
    }

    fn read_pressure_hpa(&mut self) -> Option<Result<f64, BoxError>> {
        self.pressure_hpa.map(|v| self.read(v))
    }
}

/// Indicator that records its state; clones observe the same lamp.
#[derive(Debug, Clone, Default)]
pub struct SimulatedIndicator {
    on: Arc<AtomicBool>,
    switches: Arc<AtomicUsize>,
}

impl SimulatedIndicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of on/off transitions so far.
    pub fn switches(&self) -> usize {
        self.switches.load(Ordering::Relaxed)
    }
}

impl Indicator for SimulatedIndicator {
    fn set(&mut self, on: bool) -> Result<(), BoxError> {
        if self.on.swap(on, Ordering::Relaxed) != on {
            self.switches.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedWaterOut {
    out: Arc<AtomicBool>,
}

impl SimulatedWaterOut {
    pub fn new(out: bool) -> Self {
        Self {
            out: Arc::new(AtomicBool::new(out)),
        }
    }

    pub fn set(&self, out: bool) {
        self.out.store(out, Ordering::Relaxed);
    }
}

impl WaterOutSensor for SimulatedWaterOut {
    fn is_water_out(&mut self) -> Result<bool, BoxError> {
        Ok(self.out.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pulse_once(sonar: &SimulatedSonar, clock: &ManualClock) -> Option<Duration> {
        let (mut trig, mut echo) = sonar.lines();
        trig.set_output(Level::High);
        clock.advance(Duration::from_micros(10));
        trig.set_output(Level::Low);
        let deadline = clock.now() + Duration::from_millis(50);
        let mut rise = None;
        while clock.now() < deadline {
            let level = echo.read_input();
            match (rise, level) {
                (None, Level::High) => rise = Some(clock.now()),
                (Some(r), Level::Low) => return Some(clock.now() - r),
                _ => {}
            }
        }
        None
    }

    #[test]
    fn echo_width_tracks_distance() {
        let clock = ManualClock::new();
        let sonar = SimulatedSonar::new(clock.clone(), 34.3);
        // 2 * 0.343 m / 343 m/s = 2 ms
        let w = pulse_once(&sonar, &clock).unwrap();
        assert_eq!(w, Duration::from_millis(2));
    }

    #[test]
    fn scripted_gap_produces_no_echo() {
        let clock = ManualClock::new();
        let sonar = SimulatedSonar::new(clock.clone(), 10.0).with_script([None]);
        assert!(pulse_once(&sonar, &clock).is_none());
        assert_eq!(sonar.echoes_fired(), 1);
    }

    #[test]
    fn drain_moves_the_surface_away() {
        let clock = ManualClock::new();
        let sonar = SimulatedSonar::new(clock.clone(), 10.0).with_drain(0.5);
        pulse_once(&sonar, &clock);
        pulse_once(&sonar, &clock);
        assert!((sonar.distance_cm() - 11.0).abs() < 1e-9);
    }

    #[test]
    fn indicator_counts_transitions_only() {
        let mut led = SimulatedIndicator::new();
        let view = led.clone();
        led.set(true).unwrap();
        led.set(true).unwrap();
        led.toggle().unwrap();
        assert_eq!(view.switches(), 2);
        assert!(!view.is_on());
    }

    #[test]
    fn real_time_sonar_echoes() {
        let clock = MonotonicClock::new();
        let sonar = SimulatedSonar::new(clock, 17.15);
        let (mut trig, mut echo) = sonar.lines();
        trig.set_output(Level::High);
        trig.set_output(Level::Low);
        let deadline = clock.now() + Duration::from_millis(100);
        let mut saw_high = false;
        while clock.now() < deadline {
            if echo.read_input() == Level::High {
                saw_high = true;
                break;
            }
        }
        assert!(saw_high);
    }
}
