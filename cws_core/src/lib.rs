#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Reservoir monitoring core (hardware-agnostic).
//!
//! Turns ultrasonic echo timings into a water volume and a time-to-empty
//! forecast. All hardware interactions go through the `cws_traits` line,
//! sensor and clock traits.
//!
//! ## Pipeline
//!
//! - **Pulse timing**: one trigger/echo cycle with bounded waits (`pulse`)
//! - **Ranging**: trimmed mean over a burst of echoes, temperature compensated (`ranger`, `speed_of_sound`)
//! - **Volume**: cylinder model between empty and full reference marks (`volume`)
//! - **Forecast**: blended short/long consumption rate with refill detection (`forecast`)
//! - **Orchestration**: one cycle per interval, status LED, CSV records (`runner`, `status`, `record`)

pub mod config;
pub mod conversions;
pub mod error;
pub mod forecast;
pub mod hw_error;
pub mod mocks;
pub mod pulse;
pub mod ranger;
pub mod record;
pub mod runner;
pub mod speed_of_sound;
pub mod status;
pub mod util;
pub mod volume;

pub use config::{AlertCfg, ForecastCfg, RangingCfg};
pub use error::{CoreError, GeometryError, PulseTimeout, RangingError, Result};
pub use forecast::{ConsumptionForecaster, Forecast, RefillEvent};
pub use pulse::{PulseMeasurement, PulseTimer};
pub use ranger::{AcousticRanger, DistanceSample, MIN_VALID_ECHOES};
pub use record::{CsvFileSink, LogRecord, RecordSink};
pub use runner::{CycleReport, Monitor, run_loop};
pub use speed_of_sound::speed_of_sound;
pub use status::{BlinkPattern, SystemStatus};
pub use volume::{ReservoirGeometry, VolumeEstimator, VolumeReading};
