//! Human-readable error descriptions and structured JSON error formatting.

use cws_core::error::{CoreError, GeometryError, RangingError};
use serde_json::json;

/// Exit status for too few echoes in a measurement.
pub const EXIT_INSUFFICIENT_SAMPLES: i32 = 3;
/// Exit status when a measurement was interrupted.
pub const EXIT_CANCELLED: i32 = 4;

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(re) = err.downcast_ref::<RangingError>() {
        return match re {
            RangingError::InsufficientSamples { valid, required } => format!(
                "What happened: The ultrasonic sensor returned {valid} usable echoes; at least {required} are needed.\nLikely causes: Trigger/echo wiring, no 5V on the sensor, the surface out of range, or echo timeouts set too low.\nHow to fix: Check [pins] trigger/echo, verify power, and consider raising ranging.echo_timeout_ms in the config."
            ),
            RangingError::Cancelled => {
                "What happened: Measurement was interrupted.\nLikely causes: Ctrl-C or a shutdown signal during ranging.\nHow to fix: Nothing to fix; rerun when ready.".to_string()
            }
        };
    }

    if let Some(ce) = err.downcast_ref::<CoreError>() {
        return match ce {
            CoreError::Timeout => "What happened: A sensor read timed out.\nLikely causes: Sensor not wired correctly or not powered.\nHow to fix: Verify wiring and power, then rerun self-check.".to_string(),
            CoreError::Sink(msg) => format!(
                "What happened: The measurement record could not be written ({msg}).\nLikely causes: Missing directory, read-only filesystem, or full disk.\nHow to fix: Check records.path in the config and the free space on that filesystem."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    if let Some(ge) = err.downcast_ref::<GeometryError>() {
        return format!(
            "What happened: Invalid reservoir geometry ({ge}).\nLikely causes: Swapped empty/full distances or a missing radius.\nHow to fix: Edit [reservoir] in the config."
        );
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open sonar") || lower.contains("open led") || lower.contains("open hall") {
        return format!(
            "What happened: Failed to initialize GPIO pins ({msg}).\nLikely causes: Incorrect pin numbers or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process may access /dev/gpiomem."
        );
    }

    if lower.contains("open rtc") || lower.contains("i2c") {
        return format!(
            "What happened: Could not talk to the DS3231 real-time clock ({msg}).\nLikely causes: I2C disabled, wrong bus or address, or the module is not fitted.\nHow to fix: Enable I2C, check [rtc] i2c_bus/address, or set rtc.enabled = false."
        );
    }

    if lower.contains("invalid configuration") || lower.contains("parse config") {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: Missing [pins] or [reservoir], or out-of-range values.\nHow to fix: Edit the TOML config and try again. Details: {msg}"
        );
    }

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nHow to fix: Pass --config with the path to a TOML config. Details: {msg}"
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 3 for too few echoes, 4 for cancellation, otherwise 1.
/// Usage errors exit with 2 from clap before any of this runs.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    match err.downcast_ref::<RangingError>() {
        Some(RangingError::InsufficientSamples { .. }) => EXIT_INSUFFICIENT_SAMPLES,
        Some(RangingError::Cancelled) => EXIT_CANCELLED,
        None => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    let msg = humanize(err);
    let obj = match err.downcast_ref::<RangingError>() {
        Some(RangingError::InsufficientSamples { valid, required }) => json!({
            "reason": "InsufficientSamples",
            "details": { "valid": valid, "required": required },
            "message": msg,
        }),
        Some(RangingError::Cancelled) => json!({ "reason": "Cancelled", "message": msg }),
        None => match err.downcast_ref::<CoreError>() {
            Some(CoreError::Sink(_)) => json!({ "reason": "Sink", "message": msg }),
            Some(CoreError::Timeout) => json!({ "reason": "Timeout", "message": msg }),
            _ => json!({ "reason": "Error", "message": msg }),
        },
    };
    obj.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes() {
        let e = eyre::Report::new(RangingError::InsufficientSamples {
            valid: 1,
            required: 3,
        });
        assert_eq!(exit_code_for_error(&e), 3);
        assert_eq!(exit_code_for_error(&eyre::Report::new(RangingError::Cancelled)), 4);
        assert_eq!(exit_code_for_error(&eyre::eyre!("boom")), 1);
    }

    #[test]
    fn json_carries_reason_and_details() {
        let e = eyre::Report::new(RangingError::InsufficientSamples {
            valid: 0,
            required: 3,
        });
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&e)).unwrap();
        assert_eq!(v["reason"], "InsufficientSamples");
        assert_eq!(v["details"]["valid"], 0);
        assert!(v["message"].as_str().unwrap().contains("usable echoes"));
    }

    #[test]
    fn sink_errors_point_at_records_path() {
        let e = eyre::Report::new(CoreError::Sink("disk full".into()));
        assert!(humanize(&e).contains("records.path"));
    }
}
