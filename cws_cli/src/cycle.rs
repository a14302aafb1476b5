//! Peripheral assembly (hardware or simulator) and monitor construction.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use cws_config::Config;
use cws_core::record::CsvFileSink;
use cws_core::{
    AcousticRanger, AlertCfg, ConsumptionForecaster, ForecastCfg, LogRecord, Monitor, RangingCfg,
    RecordSink, ReservoirGeometry, VolumeEstimator,
};
use cws_traits::{Clock, Indicator, InputLine, OutputLine, TemperatureSource, WaterOutSensor};
use eyre::WrapErr;

use crate::output;

/// Every peripheral handle the monitor needs, opened once per process.
pub struct Peripherals<T, E, C> {
    pub trigger: T,
    pub echo: E,
    pub clock: C,
    pub thermometer: Option<Box<dyn TemperatureSource>>,
    pub water_out: Option<Box<dyn WaterOutSensor>>,
    pub indicator: Box<dyn Indicator>,
    pub backend: &'static str,
}

/// Appends to the CSV log and echoes each record to stdout.
pub struct PrintingSink {
    inner: CsvFileSink,
    json: bool,
}

impl PrintingSink {
    pub fn open(path: &str, json: bool) -> eyre::Result<Self> {
        let inner = CsvFileSink::open(path).wrap_err("open record file")?;
        Ok(Self { inner, json })
    }
}

impl RecordSink for PrintingSink {
    fn append(&mut self, record: &LogRecord) -> Result<(), cws_core::CoreError> {
        self.inner.append(record)?;
        output::print_record(record, self.json);
        Ok(())
    }
}

pub fn estimator(cfg: &Config) -> eyre::Result<VolumeEstimator> {
    let geometry = ReservoirGeometry::from(&cfg.reservoir);
    let est = VolumeEstimator::new(geometry)
        .and_then(|e| e.with_floor_height(cfg.reservoir.floor_height_cm))
        .map_err(eyre::Report::new)?;
    Ok(est)
}

/// Wire peripherals, config and record sink into a monitor.
/// Returns the indicator separately; the run loop drives it.
pub fn build_monitor<T, E, C>(
    cfg: &Config,
    hw: Peripherals<T, E, C>,
    ranging: RangingCfg,
    cancel: Arc<AtomicBool>,
    sink: Box<dyn RecordSink>,
) -> eyre::Result<(Monitor<T, E, C>, Box<dyn Indicator>)>
where
    T: OutputLine,
    E: InputLine,
    C: Clock,
{
    let ranger = AcousticRanger::new(hw.trigger, hw.echo, hw.clock, ranging).with_cancel(cancel);
    let forecaster = ConsumptionForecaster::new(ForecastCfg::from(&cfg.forecast));
    let mut monitor = Monitor::new(ranger, estimator(cfg)?, forecaster, sink)
        .with_alerts(AlertCfg::from(&cfg.alerts))
        .with_fallback_temperature(cfg.temperature.fallback_c);
    if let Some(t) = hw.thermometer {
        monitor = monitor.with_thermometer(t);
    }
    if let Some(w) = hw.water_out {
        monitor = monitor.with_water_out(w);
    }
    Ok((monitor, hw.indicator))
}

#[cfg(not(feature = "hardware"))]
pub use sim::open;

#[cfg(not(feature = "hardware"))]
mod sim {
    use super::*;
    use cws_hardware::{
        SimEcho, SimTrigger, SimulatedIndicator, SimulatedSonar, SimulatedThermometer,
        SimulatedWaterOut,
    };
    use cws_traits::MonotonicClock;
    use tracing::info;

    pub type SimPeripherals =
        Peripherals<SimTrigger<MonotonicClock>, SimEcho<MonotonicClock>, MonotonicClock>;

    fn env_f64(key: &str) -> eyre::Result<Option<f64>> {
        match std::env::var(key) {
            Ok(v) => v
                .trim()
                .parse::<f64>()
                .map(Some)
                .map_err(|e| eyre::eyre!("{key}={v:?}: {e}")),
            Err(_) => Ok(None),
        }
    }

    /// Simulated sonar running on real time, tuned through `CWS_TEST_SIM_*`.
    pub fn open(cfg: &Config) -> eyre::Result<SimPeripherals> {
        let r = &cfg.reservoir;
        let distance_cm = env_f64("CWS_TEST_SIM_DISTANCE_CM")?
            .unwrap_or((r.empty_distance_cm + r.full_distance_cm) / 2.0);
        let drain = env_f64("CWS_TEST_SIM_DRAIN_CM")?.unwrap_or(0.0);
        let temp_c = env_f64("CWS_TEST_SIM_TEMP_C")?.unwrap_or(cfg.temperature.fallback_c);

        let clock = MonotonicClock::new();
        let sonar = SimulatedSonar::new(clock, distance_cm)
            .with_temperature(temp_c)
            .with_drain(drain);
        if std::env::var("CWS_TEST_SIM_TIMEOUT").is_ok_and(|v| v == "1") {
            sonar.set_no_echo(true);
        }
        let (trigger, echo) = sonar.lines();
        let mut thermometer = SimulatedThermometer::new(temp_c);
        if let Some(rh) = env_f64("CWS_TEST_SIM_HUMIDITY_PCT")? {
            thermometer = thermometer.with_humidity(rh);
        }
        if let Some(hpa) = env_f64("CWS_TEST_SIM_PRESSURE_HPA")? {
            thermometer = thermometer.with_pressure(hpa);
        }
        info!(distance_cm, temp_c, drain, "simulated peripherals");

        Ok(Peripherals {
            trigger,
            echo,
            clock,
            thermometer: Some(Box::new(thermometer)),
            water_out: cfg
                .pins
                .hall
                .map(|_| Box::new(SimulatedWaterOut::new(false)) as Box<dyn WaterOutSensor>),
            indicator: Box::new(SimulatedIndicator::new()),
            backend: "sim",
        })
    }
}

#[cfg(feature = "hardware")]
pub use hw::open;

#[cfg(feature = "hardware")]
mod hw {
    use super::*;
    use cws_hardware::{
        Ds3231, EchoPin, HallSensor, IioThermometer, RtcClock, StatusLed, TriggerPin, open_sonar,
    };
    use cws_traits::{MonotonicClock, Timestamp};
    use std::time::{Duration, Instant};
    use tracing::info;

    /// Wall time from the DS3231 when enabled, otherwise system time.
    pub enum HostClock {
        System(MonotonicClock),
        Rtc(RtcClock),
    }

    impl Clock for HostClock {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, d: Duration) {
            match self {
                HostClock::System(c) => c.sleep(d),
                HostClock::Rtc(c) => c.sleep(d),
            }
        }

        fn wall_clock(&self) -> Timestamp {
            match self {
                HostClock::System(c) => c.wall_clock(),
                HostClock::Rtc(c) => c.wall_clock(),
            }
        }
    }

    pub type HwPeripherals = Peripherals<TriggerPin, EchoPin, HostClock>;

    pub fn open(cfg: &Config) -> eyre::Result<HwPeripherals> {
        let p = &cfg.pins;
        let (trigger, echo) = open_sonar(p.trigger, p.echo)
            .wrap_err_with(|| format!("open sonar pins (trigger {}, echo {})", p.trigger, p.echo))?;
        let led = StatusLed::open(p.led, p.led_sink, false)
            .wrap_err_with(|| format!("open led pin {}", p.led))?;
        let water_out = match p.hall {
            Some(pin) => Some(Box::new(
                HallSensor::open(pin).wrap_err_with(|| format!("open hall pin {pin}"))?,
            ) as Box<dyn WaterOutSensor>),
            None => None,
        };
        let thermometer = cfg
            .temperature
            .iio_path
            .as_ref()
            .map(|path| {
                Box::new(IioThermometer::new(path).with_siblings()) as Box<dyn TemperatureSource>
            });
        let clock = if cfg.rtc.enabled {
            let rtc = Ds3231::open(cfg.rtc.i2c_bus, cfg.rtc.address).wrap_err("open rtc")?;
            HostClock::Rtc(RtcClock::new(rtc))
        } else {
            HostClock::System(MonotonicClock::new())
        };
        info!(trigger = p.trigger, echo = p.echo, led = p.led, hall = ?p.hall, "gpio peripherals");

        Ok(Peripherals {
            trigger,
            echo,
            clock,
            thermometer,
            water_out,
            indicator: Box::new(led),
            backend: "hardware",
        })
    }
}
