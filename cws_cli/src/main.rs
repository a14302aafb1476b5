mod cli;
mod cycle;
mod error_fmt;
mod output;
mod rt;

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use clap::Parser;
use cws_config::Config;
use cws_core::{RangingCfg, run_loop};
use cws_traits::{Clock, InputLine, OutputLine};
use eyre::WrapErr;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

use crate::cli::{Cli, Commands, FILE_GUARD, JSON_MODE, RtLock, RtcAction};
use crate::cycle::{Peripherals, PrintingSink};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(e) = real_main(cli) {
        tracing::error!(error = %e, "command failed");
        if JSON_MODE.get().copied().unwrap_or(false) {
            println!("{}", format_error_json(&e));
        } else {
            eprintln!("{}", humanize(&e));
        }
        std::process::exit(exit_code_for_error(&e));
    }
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    color_eyre::install()?;
    let cfg = cws_config::load_file(&cli.config)?;
    init_tracing(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    info!(config = %cli.config.display(), "configuration loaded");

    match cli.cmd {
        Commands::Estimate { distance_cm } => estimate(&cfg, distance_cm, cli.json),
        Commands::Rtc { action } => rtc(&cfg, action, cli.json),
        cmd => {
            let hw = cycle::open(&cfg)?;
            dispatch(&cfg, cmd, hw, cli.json)
        }
    }
}

fn init_tracing(
    json: bool,
    level: Option<&str>,
    logging: &cws_config::Logging,
) -> eyre::Result<()> {
    let level = level.or(logging.level.as_deref()).unwrap_or("info");
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .wrap_err_with(|| format!("invalid log level {level:?}"))?;

    // Console logs go to stderr so stdout carries only command output
    let console = if json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .boxed()
    };

    let file = match logging.file.as_deref() {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|d| !d.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| eyre::eyre!("logging.file has no file name: {}", path.display()))?;
            let appender = match logging.rotation.as_deref().unwrap_or("never") {
                "daily" => tracing_appender::rolling::daily(dir, name),
                "hourly" => tracing_appender::rolling::hourly(dir, name),
                "never" => tracing_appender::rolling::never(dir, name),
                other => eyre::bail!("logging.rotation must be never, daily or hourly, got {other:?}"),
            };
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = FILE_GUARD.set(guard);
            Some(fmt::layer().json().with_ansi(false).with_writer(writer))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| eyre::eyre!("init logging: {e}"))
}

fn dispatch<T, E, C>(
    cfg: &Config,
    cmd: Commands,
    hw: Peripherals<T, E, C>,
    json: bool,
) -> eyre::Result<()>
where
    T: OutputLine,
    E: InputLine,
    C: Clock,
{
    let backend = hw.backend;
    let cancel = Arc::new(AtomicBool::new(false));
    let mut ranging = RangingCfg::from(&cfg.ranging);

    match cmd {
        Commands::Run {
            interval_s,
            cycles,
            rt,
            rt_prio,
            rt_lock,
        } => {
            rt::setup_rt_once(rt, rt_prio, rt_lock.unwrap_or(RtLock::os_default()));

            let (tx, rx) = crossbeam_channel::bounded::<()>(1);
            let flag = cancel.clone();
            ctrlc::set_handler(move || {
                flag.store(true, Ordering::Relaxed);
                let _ = tx.try_send(());
            })
            .wrap_err("install Ctrl-C handler")?;

            let sink = PrintingSink::open(&cfg.records.path, json)?;
            let (mut monitor, mut indicator) =
                cycle::build_monitor(cfg, hw, ranging, cancel, Box::new(sink))?;
            let interval = Duration::from_secs(interval_s.unwrap_or(cfg.schedule.interval_s));
            info!(backend, records = %cfg.records.path, "starting monitor");

            let done = run_loop(&mut monitor, indicator.as_mut(), &rx, interval, cycles)?;
            output::print_value(
                json,
                json!({ "cycles": done, "status": monitor.status().as_str() }),
                || format!("Stopped after {done} cycles (status {}).", monitor.status()),
            );
            Ok(())
        }
        Commands::Measure { samples } => {
            if let Some(n) = samples {
                ranging.sample_count = n;
            }
            let sink = PrintingSink::open(&cfg.records.path, json)?;
            let (mut monitor, _indicator) =
                cycle::build_monitor(cfg, hw, ranging, cancel, Box::new(sink))?;
            let report = monitor.run_cycle()?;
            if let Some(e) = report.ranging_error {
                return Err(e.into());
            }
            Ok(())
        }
        Commands::SelfCheck => self_check(cfg, hw, ranging, json),
        Commands::Estimate { .. } | Commands::Rtc { .. } => {
            eyre::bail!("command does not use the sensor peripherals")
        }
    }
}

fn self_check<T, E, C>(
    cfg: &Config,
    mut hw: Peripherals<T, E, C>,
    ranging: RangingCfg,
    json: bool,
) -> eyre::Result<()>
where
    T: OutputLine,
    E: InputLine,
    C: Clock,
{
    let temperature = match hw.thermometer.as_mut().map(|t| t.read_temperature_c()) {
        Some(Ok(t)) => json!({ "ok": true, "celsius": t }),
        Some(Err(e)) => {
            warn!(error = %e, "thermometer read failed");
            json!({ "ok": false, "error": e.to_string() })
        }
        None => json!({ "ok": true, "fallback_c": cfg.temperature.fallback_c }),
    };
    let temp_c = temperature["celsius"]
        .as_f64()
        .unwrap_or(cfg.temperature.fallback_c);

    let water_out = match hw.water_out.as_mut().map(|w| w.is_water_out()) {
        Some(Ok(out)) => json!({ "ok": true, "water_out": out }),
        Some(Err(e)) => json!({ "ok": false, "error": e.to_string() }),
        None => json!(null),
    };

    let indicator = match hw.indicator.set(true).and_then(|()| hw.indicator.set(false)) {
        Ok(()) => json!({ "ok": true }),
        Err(e) => json!({ "ok": false, "error": e.to_string() }),
    };

    let wall = hw.clock.wall_clock();
    let mut ranger = cws_core::AcousticRanger::new(hw.trigger, hw.echo, hw.clock, ranging);
    let sample = ranger.calc_distance(temp_c)?;

    output::print_value(
        json,
        json!({
            "backend": hw.backend,
            "sonar": { "ok": true, "distance_cm": sample.distance_cm, "valid_echoes": sample.valid_echoes },
            "thermometer": temperature.clone(),
            "water_out": water_out.clone(),
            "indicator": indicator.clone(),
            "clock": wall.to_rfc3339(),
        }),
        || {
            format!(
                "backend: {}\nsonar: ok, {:.2} cm from {} echoes\nthermometer: {}\nwater-out: {}\nindicator: {}\nclock: {}\nOK",
                hw.backend,
                sample.distance_cm,
                sample.valid_echoes,
                temperature,
                water_out,
                indicator,
                wall.to_rfc3339()
            )
        },
    );
    Ok(())
}

fn estimate(cfg: &Config, distance_cm: f64, json: bool) -> eyre::Result<()> {
    let est = cycle::estimator(cfg)?;
    let reading = est.estimate(distance_cm, chrono::Utc::now());
    output::print_estimate(distance_cm, &reading, &est, json);
    Ok(())
}

#[cfg(feature = "hardware")]
fn rtc(cfg: &Config, action: RtcAction, json: bool) -> eyre::Result<()> {
    let rtc = cws_hardware::Ds3231::open(cfg.rtc.i2c_bus, cfg.rtc.address).wrap_err("open rtc")?;
    let dt = match action {
        RtcAction::Show => rtc.read_datetime().wrap_err("read rtc")?,
        RtcAction::Sync => {
            let now = chrono::Utc::now().naive_utc();
            rtc.set_datetime(&now).wrap_err("write rtc")?;
            info!(%now, "rtc set from system time");
            now
        }
    };
    output::print_value(
        json,
        json!({ "rtc": dt.and_utc().to_rfc3339(), "simulated": false }),
        || format!("RTC: {dt} UTC"),
    );
    Ok(())
}

#[cfg(not(feature = "hardware"))]
fn rtc(_cfg: &Config, action: RtcAction, json: bool) -> eyre::Result<()> {
    let now = chrono::Utc::now();
    if matches!(action, RtcAction::Sync) {
        info!("simulated rtc follows system time; nothing to sync");
    }
    output::print_value(
        json,
        json!({ "rtc": now.to_rfc3339(), "simulated": true }),
        || format!("RTC (simulated): {} UTC", now.naive_utc()),
    );
    Ok(())
}
