#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parse and validation errors are fine; panics are not.
    if let Ok(cfg) = cws_config::load_toml(data) {
        if cfg.validate().is_ok() {
            // A validated reservoir must always build an estimator
            let geometry = cws_core::ReservoirGeometry::from(&cfg.reservoir);
            assert!(cws_core::VolumeEstimator::new(geometry).is_ok());
        }
    }
});
