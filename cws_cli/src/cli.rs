//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "cws", version, about = "Chicken watering reservoir monitor")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/cws_config.toml")]
    pub config: PathBuf,

    /// Print records and errors as JSON lines; logs go to stderr as JSON
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides [logging].level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

/// Memory locking mode for real-time operation.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RtLock {
    /// Do not lock memory
    None,
    /// Lock currently resident pages
    Current,
    /// Lock current and future pages
    All,
}

impl RtLock {
    #[inline]
    pub fn os_default() -> Self {
        #[cfg(target_os = "linux")]
        {
            return RtLock::Current;
        }
        #[allow(unreachable_code)]
        RtLock::None
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Measure every interval, blink the status LED, append records
    Run {
        /// Seconds between cycles (overrides [schedule].interval_s)
        #[arg(
            long,
            value_name = "SECS",
            value_parser = clap::value_parser!(u64).range(1..=cws_config::MAX_INTERVAL_S)
        )]
        interval_s: Option<u64>,
        /// Stop after this many cycles
        #[arg(long, value_name = "N")]
        cycles: Option<u64>,
        /// Enable real-time mode (SCHED_FIFO, mlockall)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Enable real-time mode on Linux.\n\nAttempts SCHED_FIFO priority and calls mlockall to lock the process address space into RAM. This reduces jitter while timing echo pulses but may require elevated privileges or ulimits (e.g., memlock)."
        )]
        rt: bool,
        /// Real-time priority for SCHED_FIFO (1..=max)
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Select memory locking mode for --rt: none, current, or all
        #[arg(long, value_enum, value_name = "MODE")]
        rt_lock: Option<RtLock>,
    },
    /// Take one measurement and print the record
    Measure {
        /// Echoes per sample (overrides [ranging].sample_count)
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(3..=100))]
        samples: Option<u32>,
    },
    /// Volume for a sensor-to-surface distance, using the configured reservoir
    Estimate {
        #[arg(long, value_name = "CM", allow_negative_numbers = true)]
        distance_cm: f64,
    },
    /// Read or set the real-time clock
    Rtc {
        #[command(subcommand)]
        action: RtcAction,
    },
    /// Open every configured peripheral and take one reading
    SelfCheck,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum RtcAction {
    /// Print the RTC date and time
    Show,
    /// Set the RTC from system time
    Sync,
}
