//! Temperature-compensated speed of sound in air.

pub const SPEED_AT_ZERO_C: f64 = 331.0;
pub const SPEED_GAIN_PER_C: f64 = 0.6;
pub const MIN_TEMP_C: f64 = 0.0;
pub const MAX_TEMP_C: f64 = 100.0;
/// Used in place of a temperature that is not a number.
pub const REFERENCE_TEMP_C: f64 = 20.0;

/// Propagation speed in m/s for `temp_c`, clamped to [0, 100] °C.
#[inline]
pub fn speed_of_sound(temp_c: f64) -> f64 {
    let t = if temp_c.is_nan() {
        REFERENCE_TEMP_C
    } else {
        temp_c.clamp(MIN_TEMP_C, MAX_TEMP_C)
    };
    SPEED_AT_ZERO_C + SPEED_GAIN_PER_C * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_points() {
        assert_eq!(speed_of_sound(0.0), 331.0);
        assert!((speed_of_sound(20.0) - 343.0).abs() < 1e-9);
        assert!((speed_of_sound(100.0) - 391.0).abs() < 1e-9);
    }

    #[test]
    fn clamps_out_of_range() {
        assert_eq!(speed_of_sound(-40.0), speed_of_sound(0.0));
        assert_eq!(speed_of_sound(250.0), speed_of_sound(100.0));
        assert_eq!(speed_of_sound(f64::NEG_INFINITY), 331.0);
        assert_eq!(speed_of_sound(f64::INFINITY), 391.0);
    }

    #[test]
    fn nan_uses_reference_temperature() {
        assert_eq!(speed_of_sound(f64::NAN), speed_of_sound(REFERENCE_TEMP_C));
    }
}
