use thiserror::Error;

/// Why a single echo measurement produced no reading.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PulseTimeout {
    #[error("echo line never returned to idle before trigger")]
    Idle,
    #[error("echo pulse never started")]
    Start,
    #[error("echo pulse never ended")]
    Stop,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RangingError {
    #[error("insufficient echo samples: {valid} valid, at least {required} required")]
    InsufficientSamples { valid: usize, required: usize },
    #[error("ranging cancelled")]
    Cancelled,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("radius_cm must be > 0, got {0}")]
    Radius(f64),
    #[error("full_distance_cm must be >= 0, got {0}")]
    NegativeFull(f64),
    #[error("empty_distance_cm ({empty}) must be greater than full_distance_cm ({full})")]
    References { empty: f64, full: f64 },
    #[error("floor height must be > 0, got {0}")]
    Floor(f64),
}

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("sensor error: {0}")]
    Sensor(String),
    #[error("timeout waiting for sensor")]
    Timeout,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("record sink error: {0}")]
    Sink(String),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
