//! `From` implementations bridging `cws_config` types to `cws_core` types.

use std::time::Duration;

use crate::config::{AlertCfg, ForecastCfg, RangingCfg};
use crate::volume::ReservoirGeometry;

// ── RangingCfg ───────────────────────────────────────────────────────────────

impl From<&cws_config::RangingCfg> for RangingCfg {
    fn from(c: &cws_config::RangingCfg) -> Self {
        Self {
            sample_count: c.sample_count,
            settle: Duration::from_millis(c.settle_ms),
            idle_timeout: Duration::from_millis(c.idle_timeout_ms),
            echo_timeout: Duration::from_millis(c.echo_timeout_ms),
        }
    }
}

// ── ReservoirGeometry ────────────────────────────────────────────────────────

impl From<&cws_config::ReservoirCfg> for ReservoirGeometry {
    fn from(c: &cws_config::ReservoirCfg) -> Self {
        Self {
            radius_cm: c.radius_cm,
            empty_distance_cm: c.empty_distance_cm,
            full_distance_cm: c.full_distance_cm,
            bucket_capacity_l: c.bucket_capacity_l,
            bucket_count: c.bucket_count,
        }
    }
}

// ── ForecastCfg ──────────────────────────────────────────────────────────────

impl From<&cws_config::ForecastCfg> for ForecastCfg {
    fn from(c: &cws_config::ForecastCfg) -> Self {
        Self {
            noise_threshold_l: c.noise_threshold_l,
            short_tau_h: c.short_tau_h,
            long_tau_h: c.long_tau_h,
            short_weight: c.short_weight,
            long_weight: c.long_weight,
            retention_h: c.retention_h,
            min_rate_lph: c.min_rate_lph,
        }
    }
}

// ── AlertCfg ─────────────────────────────────────────────────────────────────

impl From<&cws_config::Alerts> for AlertCfg {
    fn from(c: &cws_config::Alerts) -> Self {
        Self {
            low_water_pct: c.low_water_pct,
            temp_low_c: c.temp_low_c,
            temp_high_c: c.temp_high_c,
            max_failed_cycles: c.max_failed_cycles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranging_ms_become_durations() {
        let c = cws_config::RangingCfg {
            sample_count: 7,
            settle_ms: 60,
            idle_timeout_ms: 30,
            echo_timeout_ms: 40,
        };
        let r = RangingCfg::from(&c);
        assert_eq!(r.sample_count, 7);
        assert_eq!(r.settle, Duration::from_millis(60));
        assert_eq!(r.idle_timeout, Duration::from_millis(30));
        assert_eq!(r.echo_timeout, Duration::from_millis(40));
    }

    #[test]
    fn default_sections_match_core_defaults() {
        let f = ForecastCfg::from(&cws_config::ForecastCfg::default());
        let d = ForecastCfg::default();
        assert_eq!(f.short_tau_h, d.short_tau_h);
        assert_eq!(f.retention_h, d.retention_h);
        let a = AlertCfg::from(&cws_config::Alerts::default());
        assert_eq!(a.max_failed_cycles, AlertCfg::default().max_failed_cycles);
    }
}
