//! DS3231 real-time clock: register codec plus the I2C driver (feature `hardware`).
//!
//! Only date and time are supported, always 24-hour; alarms and the square-wave
//! output are disabled on open. The chip is assumed to hold UTC.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::bcd::{from_bcd, to_bcd};
use crate::error::{HwError, Result};

pub const DEFAULT_ADDRESS: u16 = 0x68;
pub const REG_SECONDS: u8 = 0x00;
pub const REG_CONTROL: u8 = 0x0E;

const HOUR_MASK: u8 = 0x3F; // drops the 12/24 selector
const MONTH_MASK: u8 = 0x1F; // drops the century flag
const SECOND_MASK: u8 = 0x7F;

fn field(regs: &[u8; 7], idx: usize, mask: u8, name: &str) -> Result<u32> {
    from_bcd(regs[idx] & mask)
        .map(u32::from)
        .ok_or_else(|| HwError::InvalidRtcData(format!("{name} register {:#04x}", regs[idx])))
}

/// Decode the seven time-keeping registers (seconds through year).
pub fn decode_datetime(regs: &[u8; 7]) -> Result<NaiveDateTime> {
    let sec = field(regs, 0, SECOND_MASK, "seconds")?;
    let min = field(regs, 1, 0x7F, "minutes")?;
    let hour = field(regs, 2, HOUR_MASK, "hours")?;
    let day = field(regs, 4, 0x3F, "date")?;
    let month = field(regs, 5, MONTH_MASK, "month")?;
    let year = 2000 + field(regs, 6, 0xFF, "year")? as i32;

    NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(hour, min, sec))
        .ok_or_else(|| {
            HwError::InvalidRtcData(format!(
                "{year:04}-{month:02}-{day:02} {hour:02}:{min:02}:{sec:02} is not a valid time"
            ))
        })
}

/// Encode a date-time into the seven time-keeping registers.
/// Day-of-week is written 1..=7 starting Monday.
pub fn encode_datetime(dt: &NaiveDateTime) -> Result<[u8; 7]> {
    let year = dt.year();
    if !(2000..=2099).contains(&year) {
        return Err(HwError::InvalidRtcData(format!(
            "year {year} outside 2000..=2099"
        )));
    }
    Ok([
        to_bcd(dt.second() as u8),
        to_bcd(dt.minute() as u8),
        to_bcd(dt.hour() as u8),
        to_bcd(dt.weekday().number_from_monday() as u8),
        to_bcd(dt.day() as u8),
        to_bcd(dt.month() as u8),
        to_bcd((year - 2000) as u8),
    ])
}

#[cfg(feature = "hardware")]
pub use driver::{Ds3231, RtcClock};

#[cfg(feature = "hardware")]
mod driver {
    use super::*;
    use chrono::Utc;
    use cws_traits::{Clock, Timestamp};
    use rppal::i2c::I2c;
    use std::time::{Duration, Instant};

    fn i2c_err(e: rppal::i2c::Error) -> HwError {
        HwError::I2c(e.to_string())
    }

    pub struct Ds3231 {
        i2c: I2c,
    }

    impl Ds3231 {
        pub fn open(bus: u8, address: u16) -> Result<Self> {
            let mut i2c = I2c::with_bus(bus).map_err(i2c_err)?;
            i2c.set_slave_address(address).map_err(i2c_err)?;
            i2c.smbus_write_byte(REG_CONTROL, 0).map_err(i2c_err)?;
            tracing::debug!(bus, address, "ds3231 opened");
            Ok(Self { i2c })
        }

        pub fn read_datetime(&self) -> Result<NaiveDateTime> {
            let mut regs = [0u8; 7];
            self.i2c
                .block_read(REG_SECONDS, &mut regs)
                .map_err(i2c_err)?;
            decode_datetime(&regs)
        }

        pub fn set_datetime(&self, dt: &NaiveDateTime) -> Result<()> {
            let regs = encode_datetime(dt)?;
            self.i2c.block_write(REG_SECONDS, &regs).map_err(i2c_err)
        }
    }

    /// Clock whose wall time comes from the RTC; monotonic time stays on the host.
    pub struct RtcClock {
        rtc: Ds3231,
    }

    impl RtcClock {
        pub fn new(rtc: Ds3231) -> Self {
            Self { rtc }
        }
    }

    impl Clock for RtcClock {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn sleep(&self, d: Duration) {
            if !d.is_zero() {
                std::thread::sleep(d);
            }
        }

        fn wall_clock(&self) -> Timestamp {
            match self.rtc.read_datetime() {
                Ok(dt) => dt.and_utc(),
                Err(e) => {
                    tracing::warn!(error = %e, "rtc read failed, using system time");
                    Utc::now()
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_datasheet_layout() {
        // 2023-05-10 21:34:56, Wednesday; hour carries the 24h bit clear, month the century bit set
        let regs = [0x56, 0x34, 0x21, 0x03, 0x10, 0x85, 0x23];
        let dt = decode_datetime(&regs).unwrap();
        assert_eq!(dt.to_string(), "2023-05-10 21:34:56");
    }

    #[test]
    fn encode_then_decode_preserves_time() {
        let dt = NaiveDate::from_ymd_opt(2031, 12, 31)
            .unwrap()
            .and_hms_opt(23, 59, 58)
            .unwrap();
        let regs = encode_datetime(&dt).unwrap();
        assert_eq!(regs[3], 0x03); // Wednesday
        assert_eq!(decode_datetime(&regs).unwrap(), dt);
    }

    #[test]
    fn rejects_years_outside_the_chip_range() {
        let dt = NaiveDate::from_ymd_opt(1999, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert!(matches!(
            encode_datetime(&dt),
            Err(HwError::InvalidRtcData(_))
        ));
    }

    #[test]
    fn rejects_impossible_dates_and_bad_nibbles() {
        let feb_30 = [0x00, 0x00, 0x00, 0x01, 0x30, 0x02, 0x24];
        assert!(decode_datetime(&feb_30).is_err());
        let bad_minutes = [0x00, 0x7A, 0x00, 0x01, 0x01, 0x01, 0x24];
        assert!(decode_datetime(&bad_minutes).is_err());
    }
}
