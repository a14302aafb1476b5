//! rppal-backed lines and simple GPIO peripherals.
//!
//! Pins are acquired at construction and rppal resets them when the owning
//! value is dropped, on every exit path.

use std::time::Duration;

use cws_traits::{BoxError, Indicator, InputLine, Level, OutputLine, WaterOutSensor};
use rppal::gpio::{Gpio, InputPin, OutputPin};

use crate::error::{HwError, Result};

/// Time the ranging module needs after power-up before the first trigger.
const SONAR_INIT_DELAY: Duration = Duration::from_millis(200);

fn gpio_err(e: rppal::gpio::Error) -> HwError {
    HwError::Gpio(e.to_string())
}

pub struct TriggerPin {
    pin: OutputPin,
}

impl OutputLine for TriggerPin {
    #[inline]
    fn set_output(&mut self, level: Level) {
        match level {
            Level::High => self.pin.set_high(),
            Level::Low => self.pin.set_low(),
        }
    }
}

pub struct EchoPin {
    pin: InputPin,
}

impl InputLine for EchoPin {
    #[inline]
    fn read_input(&mut self) -> Level {
        Level::from(self.pin.is_high())
    }
}

/// Open the HC-SR04 trigger (idle low) and echo (pull-up) lines.
pub fn open_sonar(trigger_pin: u8, echo_pin: u8) -> Result<(TriggerPin, EchoPin)> {
    let gpio = Gpio::new().map_err(gpio_err)?;
    let trigger = gpio.get(trigger_pin).map_err(gpio_err)?.into_output_low();
    let echo = gpio.get(echo_pin).map_err(gpio_err)?.into_input_pullup();
    std::thread::sleep(SONAR_INIT_DELAY);
    tracing::debug!(trigger_pin, echo_pin, "sonar lines opened");
    Ok((TriggerPin { pin: trigger }, EchoPin { pin: echo }))
}

/// Status LED. In sink mode the pin provides ground, so "on" drives it low.
pub struct StatusLed {
    pin: OutputPin,
    sink: bool,
    on: bool,
}

impl StatusLed {
    pub fn open(pin: u8, sink: bool, initially_on: bool) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let pin = gpio.get(pin).map_err(gpio_err)?.into_output();
        let mut led = Self {
            pin,
            sink,
            on: initially_on,
        };
        led.drive();
        Ok(led)
    }

    fn drive(&mut self) {
        if self.on != self.sink {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

impl Indicator for StatusLed {
    fn set(&mut self, on: bool) -> std::result::Result<(), BoxError> {
        self.on = on;
        self.drive();
        Ok(())
    }

    fn is_on(&self) -> bool {
        self.on
    }
}

/// Open-collector hall-effect switch on a pulled-up input; a magnet near the
/// sensor (float at the bottom) pulls the line low.
pub struct HallSensor {
    pin: InputPin,
}

impl HallSensor {
    pub fn open(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(gpio_err)?;
        let pin = gpio.get(pin).map_err(gpio_err)?.into_input_pullup();
        Ok(Self { pin })
    }
}

impl WaterOutSensor for HallSensor {
    fn is_water_out(&mut self) -> std::result::Result<bool, BoxError> {
        Ok(self.pin.is_low())
    }
}
