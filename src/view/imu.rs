//! Inertial measurement carried alongside a frame.

use nalgebra::{UnitQuaternion, Vector3};

/// Single IMU measurement.
///
/// The orientation field is the integrated device orientation as reported by
/// the sensor fusion on the IMU itself; inertial-aided trackers use it as a
/// rotation prior. Raw rates are kept for trackers that integrate themselves.
#[derive(Debug, Clone, Copy)]
pub struct ImuSample {
    pub timestamp_s: f64,
    /// Device orientation (world ← body).
    pub orientation: UnitQuaternion<f64>,
    pub accel: Vector3<f64>,
    pub gyro: Vector3<f64>,
}

impl ImuSample {
    pub fn from_orientation(timestamp_s: f64, orientation: UnitQuaternion<f64>) -> Self {
        Self {
            timestamp_s,
            orientation,
            accel: Vector3::zeros(),
            gyro: Vector3::zeros(),
        }
    }
}
