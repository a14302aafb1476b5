#![cfg(feature = "hardware")]

use cws_hardware::gpio::{StatusLed, open_sonar};
use cws_traits::{Indicator, InputLine, Level, OutputLine};

// NOTE: these only make sense on a Raspberry Pi with the sensor wired to the
// pins below; they exercise acquisition and release rather than timing.

#[test]
fn sonar_lines_open_and_release() {
    let (mut trig, mut echo) = open_sonar(23, 24).expect("open sonar pins");
    trig.set_output(Level::Low);
    let _ = echo.read_input();
    drop((trig, echo));
    // pins are free again after drop
    let _again = open_sonar(23, 24).expect("reopen sonar pins");
}

#[test]
fn led_toggles() {
    let mut led = StatusLed::open(25, true, false).expect("open led");
    assert!(led.toggle().unwrap());
    assert!(!led.toggle().unwrap());
}
