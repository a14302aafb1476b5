//! Surface distance to remaining volume for a cylindrical reservoir.

use std::f64::consts::PI;

use cws_traits::Timestamp;
use tracing::warn;

use crate::error::GeometryError;
use crate::ranger::DistanceSample;
use crate::util::CM3_PER_L;

/// Water height used when the surface reads at or below the empty mark.
pub const DEFAULT_FLOOR_HEIGHT_CM: f64 = 0.01;

/// Reservoir shape and sensor reference distances. Fixed for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReservoirGeometry {
    pub radius_cm: f64,
    /// Sensor-to-surface distance at which the reservoir is empty.
    pub empty_distance_cm: f64,
    /// Sensor-to-surface distance at which the reservoir is full.
    pub full_distance_cm: f64,
    pub bucket_capacity_l: f64,
    pub bucket_count: u32,
}

impl ReservoirGeometry {
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !(self.radius_cm.is_finite() && self.radius_cm > 0.0) {
            return Err(GeometryError::Radius(self.radius_cm));
        }
        if !(self.full_distance_cm.is_finite() && self.full_distance_cm >= 0.0) {
            return Err(GeometryError::NegativeFull(self.full_distance_cm));
        }
        if !(self.empty_distance_cm.is_finite() && self.empty_distance_cm > self.full_distance_cm)
        {
            return Err(GeometryError::References {
                empty: self.empty_distance_cm,
                full: self.full_distance_cm,
            });
        }
        Ok(())
    }

    pub fn cross_section_cm2(&self) -> f64 {
        PI * self.radius_cm * self.radius_cm
    }

    /// Volume between the empty and full marks.
    pub fn max_volume_l(&self) -> f64 {
        (self.empty_distance_cm - self.full_distance_cm) * self.cross_section_cm2() / CM3_PER_L
    }

    /// Rated capacity from the bucket count.
    pub fn nominal_capacity_l(&self) -> f64 {
        self.bucket_capacity_l * f64::from(self.bucket_count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeReading {
    pub volume_l: f64,
    /// Percentage of `max_volume_l`, within [0, 100].
    pub pct_full: f64,
    pub taken_at: Timestamp,
}

#[derive(Debug, Clone)]
pub struct VolumeEstimator {
    geometry: ReservoirGeometry,
    floor_height_cm: f64,
}

impl VolumeEstimator {
    pub fn new(geometry: ReservoirGeometry) -> Result<Self, GeometryError> {
        geometry.validate()?;
        Ok(Self {
            geometry,
            floor_height_cm: DEFAULT_FLOOR_HEIGHT_CM,
        })
    }

    pub fn with_floor_height(mut self, floor_height_cm: f64) -> Result<Self, GeometryError> {
        if !(floor_height_cm.is_finite() && floor_height_cm > 0.0) {
            return Err(GeometryError::Floor(floor_height_cm));
        }
        self.floor_height_cm = floor_height_cm;
        Ok(self)
    }

    pub fn geometry(&self) -> &ReservoirGeometry {
        &self.geometry
    }

    /// Water column above the empty mark; never zero, negative or NaN.
    pub fn water_height_cm(&self, distance_cm: f64) -> f64 {
        water_height_cm(distance_cm, &self.geometry, self.floor_height_cm)
    }

    /// Whether the surface is at or beyond the empty mark.
    pub fn at_empty_mark(&self, distance_cm: f64) -> bool {
        let raw = self.geometry.empty_distance_cm - distance_cm;
        raw.is_nan() || raw <= 0.0
    }

    pub fn estimate(&self, distance_cm: f64, taken_at: Timestamp) -> VolumeReading {
        reading_for_height(self.water_height_cm(distance_cm), &self.geometry, taken_at)
    }

    pub fn estimate_sample(&self, sample: &DistanceSample) -> VolumeReading {
        self.estimate(sample.distance_cm, sample.taken_at)
    }
}

/// Volume for a distance using the default floor height.
pub fn estimate(distance_cm: f64, geometry: &ReservoirGeometry, taken_at: Timestamp) -> VolumeReading {
    reading_for_height(
        water_height_cm(distance_cm, geometry, DEFAULT_FLOOR_HEIGHT_CM),
        geometry,
        taken_at,
    )
}

fn water_height_cm(distance_cm: f64, geometry: &ReservoirGeometry, floor_height_cm: f64) -> f64 {
    let raw = geometry.empty_distance_cm - distance_cm;
    if raw > 0.0 {
        raw
    } else {
        warn!(
            distance_cm,
            empty_distance_cm = geometry.empty_distance_cm,
            "surface at or beyond empty mark, using floor height"
        );
        floor_height_cm
    }
}

fn reading_for_height(height_cm: f64, geometry: &ReservoirGeometry, taken_at: Timestamp) -> VolumeReading {
    let volume_l = height_cm * geometry.cross_section_cm2() / CM3_PER_L;
    let max_l = geometry.max_volume_l();
    let pct_full = if max_l > 0.0 {
        (volume_l / max_l * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    };
    VolumeReading {
        volume_l,
        pct_full,
        taken_at,
    }
}
