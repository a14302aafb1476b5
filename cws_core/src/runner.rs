//! Measurement cycle orchestration and the long-running monitor loop.
//!
//! A [`Monitor`] owns one of every peripheral handle plus the forecaster and
//! is driven from a single thread. Between cycles the loop blinks the status
//! pattern on the indicator, waiting on the shutdown channel so a stop
//! request is honoured within one blink phase.

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use cws_traits::{
    BoxError, Clock, Indicator, InputLine, OutputLine, TemperatureSource, WaterOutSensor,
};
use tracing::{debug, info, warn};

use crate::config::AlertCfg;
use crate::error::{CoreError, RangingError, Result};
use crate::forecast::{ConsumptionForecaster, Forecast, RefillEvent};
use crate::hw_error::map_hw_error;
use crate::ranger::AcousticRanger;
use crate::record::{LogRecord, RecordSink};
use crate::speed_of_sound::REFERENCE_TEMP_C;
use crate::status::{BlinkPattern, StatusInputs, SystemStatus, classify};
use crate::volume::VolumeEstimator;

/// Outcome of one [`Monitor::run_cycle`].
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// The appended record; `None` when ranging failed this cycle.
    pub record: Option<LogRecord>,
    pub ranging_error: Option<RangingError>,
    pub status: SystemStatus,
    /// Consecutive cycles without a distance sample.
    pub failed_cycles: u32,
}

pub struct Monitor<T, E, C> {
    ranger: AcousticRanger<T, E, C>,
    estimator: VolumeEstimator,
    forecaster: ConsumptionForecaster,
    sink: Box<dyn RecordSink>,
    thermometer: Option<Box<dyn TemperatureSource>>,
    fallback_temp_c: f64,
    water_out: Option<Box<dyn WaterOutSensor>>,
    alerts: AlertCfg,
    failed_cycles: u32,
    status: SystemStatus,
}

impl<T, E, C> Monitor<T, E, C>
where
    T: OutputLine,
    E: InputLine,
    C: Clock,
{
    pub fn new(
        ranger: AcousticRanger<T, E, C>,
        estimator: VolumeEstimator,
        forecaster: ConsumptionForecaster,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        Self {
            ranger,
            estimator,
            forecaster,
            sink,
            thermometer: None,
            fallback_temp_c: REFERENCE_TEMP_C,
            water_out: None,
            alerts: AlertCfg::default(),
            failed_cycles: 0,
            status: SystemStatus::Normal,
        }
    }

    pub fn with_thermometer(mut self, thermometer: Box<dyn TemperatureSource>) -> Self {
        self.thermometer = Some(thermometer);
        self
    }

    /// Temperature assumed when no thermometer is fitted or a read fails.
    pub fn with_fallback_temperature(mut self, temp_c: f64) -> Self {
        self.fallback_temp_c = temp_c;
        self
    }

    pub fn with_water_out(mut self, sensor: Box<dyn WaterOutSensor>) -> Self {
        self.water_out = Some(sensor);
        self
    }

    pub fn with_alerts(mut self, alerts: AlertCfg) -> Self {
        self.alerts = alerts;
        self
    }

    pub fn status(&self) -> SystemStatus {
        self.status
    }

    pub fn failed_cycles(&self) -> u32 {
        self.failed_cycles
    }

    pub fn forecaster(&self) -> &ConsumptionForecaster {
        &self.forecaster
    }

    pub fn estimator(&self) -> &VolumeEstimator {
        &self.estimator
    }

    pub fn ranger_mut(&mut self) -> &mut AcousticRanger<T, E, C> {
        &mut self.ranger
    }

    fn read_temperature(&mut self) -> f64 {
        let Some(thermometer) = self.thermometer.as_mut() else {
            return self.fallback_temp_c;
        };
        match thermometer.read_temperature_c() {
            Ok(t) if t.is_finite() => t,
            Ok(t) => {
                warn!(
                    reading = t,
                    fallback_c = self.fallback_temp_c,
                    "non-finite temperature, using fallback"
                );
                self.fallback_temp_c
            }
            Err(e) => {
                let mapped = map_hw_error(&*e);
                warn!(
                    error = %mapped,
                    fallback_c = self.fallback_temp_c,
                    "temperature read failed, using fallback"
                );
                self.fallback_temp_c
            }
        }
    }

    /// Optional humidity or pressure channel. Failures and non-finite
    /// values are logged and recorded as absent.
    fn read_air(
        &mut self,
        quantity: &'static str,
        read: fn(&mut dyn TemperatureSource) -> Option<std::result::Result<f64, BoxError>>,
    ) -> Option<f64> {
        let thermometer = self.thermometer.as_mut()?;
        match read(thermometer.as_mut())? {
            Ok(v) if v.is_finite() => Some(v),
            Ok(v) => {
                warn!(quantity, reading = v, "non-finite air reading dropped");
                None
            }
            Err(e) => {
                let mapped = map_hw_error(&*e);
                warn!(quantity, error = %mapped, "air sensor read failed");
                None
            }
        }
    }

    fn read_water_out(&mut self) -> Option<bool> {
        let sensor = self.water_out.as_mut()?;
        match sensor.is_water_out() {
            Ok(out) => Some(out),
            Err(e) => {
                let mapped = map_hw_error(&*e);
                warn!(error = %mapped, "water-out sensor read failed");
                None
            }
        }
    }

    /// Run one measurement cycle.
    ///
    /// Too few echoes is reported in the returned [`CycleReport`], not as an
    /// error. Cancellation and record sink failures are returned as errors;
    /// on a sink failure the forecaster has already taken the reading.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let temp_c = self.read_temperature();
        let humidity_pct = self.read_air("humidity", |t| t.read_humidity_pct());
        let pressure_hpa = self.read_air("pressure", |t| t.read_pressure_hpa());
        let hall_out = self.read_water_out();

        let sample = match self.ranger.calc_distance(temp_c) {
            Ok(sample) => sample,
            Err(RangingError::Cancelled) => return Err(RangingError::Cancelled.into()),
            Err(e) => {
                self.failed_cycles = self.failed_cycles.saturating_add(1);
                let sensor_fault = self.failed_cycles >= self.alerts.max_failed_cycles;
                self.status = if sensor_fault {
                    SystemStatus::SensorFault
                } else if hall_out == Some(true) {
                    SystemStatus::WaterOut
                } else {
                    self.status
                };
                warn!(
                    error = %e,
                    failed_cycles = self.failed_cycles,
                    status = %self.status,
                    "no distance this cycle"
                );
                return Ok(CycleReport {
                    record: None,
                    ranging_error: Some(e),
                    status: self.status,
                    failed_cycles: self.failed_cycles,
                });
            }
        };
        if self.failed_cycles > 0 {
            info!(after = self.failed_cycles, "ranging recovered");
        }
        self.failed_cycles = 0;

        let reading = self.estimator.estimate_sample(&sample);
        self.forecaster.ingest(reading);
        let forecast = self.forecaster.forecast_empty_at();
        let refill_added_l = self
            .forecaster
            .latest_refill()
            .filter(|e| e.at == reading.taken_at)
            .map(RefillEvent::added_l);
        if let Some(added_l) = refill_added_l {
            info!(added_l, at = %reading.taken_at, "reservoir refilled");
        }

        let water_out = hall_out == Some(true) || self.estimator.at_empty_mark(sample.distance_cm);
        self.status = classify(
            &StatusInputs {
                sensor_fault: false,
                water_out,
                pct_full: Some(reading.pct_full),
                temperature_c: Some(temp_c),
            },
            &self.alerts,
        );

        let record = LogRecord {
            timestamp: sample.taken_at,
            temperature_c: temp_c,
            humidity_pct,
            pressure_hpa,
            distance_cm: sample.distance_cm,
            volume_l: reading.volume_l,
            pct_full: reading.pct_full,
            water_out: hall_out,
            refill_added_l,
            rate_lph: self.forecaster.blended_rate_lph(),
            forecast_empty_at: forecast.empty_at(),
            status: self.status,
        };
        info!(
            distance_cm = record.distance_cm,
            volume_l = record.volume_l,
            pct_full = record.pct_full,
            temp_c,
            status = %record.status,
            empty_at = ?record.forecast_empty_at,
            "cycle"
        );
        if matches!(forecast, Forecast::Unknown) {
            debug!("forecast unknown");
        }

        self.sink.append(&record)?;

        Ok(CycleReport {
            record: Some(record),
            ranging_error: None,
            status: self.status,
            failed_cycles: 0,
        })
    }
}

/// Whether `e` is a record sink failure the loop can ride through.
fn is_sink_error(e: &eyre::Report) -> bool {
    matches!(e.downcast_ref::<CoreError>(), Some(CoreError::Sink(_)))
}

fn is_cancelled(e: &eyre::Report) -> bool {
    matches!(e.downcast_ref::<RangingError>(), Some(RangingError::Cancelled))
}

fn set_indicator(indicator: &mut dyn Indicator, on: bool) {
    if let Err(e) = indicator.set(on) {
        warn!(error = %e, "indicator update failed");
    }
}

/// Wait up to `d` for a shutdown request. A closed channel counts as one.
fn wait_shutdown(shutdown: &Receiver<()>, d: Duration) -> bool {
    match shutdown.recv_timeout(d) {
        Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
        Err(RecvTimeoutError::Timeout) => false,
    }
}

/// Blink `pattern` until `deadline`, or until shutdown when there is none.
/// Returns true if shutdown was requested.
fn blink_until(
    indicator: &mut dyn Indicator,
    pattern: BlinkPattern,
    deadline: Option<Instant>,
    shutdown: &Receiver<()>,
) -> bool {
    loop {
        for (on, phase) in [(true, pattern.on), (false, pattern.off)] {
            let left = match deadline {
                Some(d) => d.saturating_duration_since(Instant::now()),
                None => Duration::MAX,
            };
            if left.is_zero() {
                return false;
            }
            set_indicator(indicator, on);
            if wait_shutdown(shutdown, phase.min(left)) {
                return true;
            }
        }
    }
}

/// Run cycles every `interval` until shutdown, cancellation, or `max_cycles`.
///
/// Returns the number of completed cycles. Ranging shortfalls and record
/// sink failures are logged and the loop carries on; any other cycle error
/// ends the loop. The indicator is switched off on every exit path.
pub fn run_loop<T, E, C>(
    monitor: &mut Monitor<T, E, C>,
    indicator: &mut dyn Indicator,
    shutdown: &Receiver<()>,
    interval: Duration,
    max_cycles: Option<u64>,
) -> Result<u64>
where
    T: OutputLine,
    E: InputLine,
    C: Clock,
{
    let mut cycles: u64 = 0;
    info!(interval_s = interval.as_secs_f64(), ?max_cycles, "monitor started");

    let outcome = loop {
        match shutdown.try_recv() {
            Ok(()) | Err(TryRecvError::Disconnected) => {
                info!("shutdown requested");
                break Ok(cycles);
            }
            Err(TryRecvError::Empty) => {}
        }

        let started = Instant::now();
        match monitor.run_cycle() {
            Ok(_) => {}
            Err(e) if is_cancelled(&e) => {
                info!("cycle cancelled");
                break Ok(cycles);
            }
            Err(e) if is_sink_error(&e) => warn!(error = %e, "record not written"),
            Err(e) => break Err(e),
        }
        cycles += 1;

        if max_cycles.is_some_and(|m| cycles >= m) {
            break Ok(cycles);
        }
        // None when the interval runs past the end of Instant's range
        let deadline = started.checked_add(interval);
        if blink_until(indicator, monitor.status().pattern(), deadline, shutdown) {
            info!("shutdown requested");
            break Ok(cycles);
        }
    };

    set_indicator(indicator, false);
    info!(cycles, "monitor stopped");
    outcome
}
