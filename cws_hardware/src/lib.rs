pub mod bcd;
pub mod ds3231;
pub mod error;
#[cfg(feature = "hardware")]
pub mod gpio;
pub mod iio;
pub mod sim;

pub use error::HwError;
pub use iio::IioThermometer;
pub use sim::{
    SimClock, SimEcho, SimTrigger, SimulatedIndicator, SimulatedSonar, SimulatedThermometer,
    SimulatedWaterOut,
};

#[cfg(feature = "hardware")]
pub use ds3231::{Ds3231, RtcClock};
#[cfg(feature = "hardware")]
pub use gpio::{EchoPin, HallSensor, StatusLed, TriggerPin, open_sonar};
