//! Camera calibration: pinhole intrinsics and the RGB-D calibration bundle.

use serde::Deserialize;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn num_pixels(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Pinhole camera intrinsics.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct Intrinsics {
    pub fx: f64,
    pub fy: f64,
    pub cx: f64,
    pub cy: f64,
}

impl Intrinsics {
    /// Project a camera-frame point (z > 0) to pixel coordinates.
    pub fn project(&self, x: f64, y: f64, z: f64) -> (f64, f64) {
        (self.fx * x / z + self.cx, self.fy * y / z + self.cy)
    }

    /// Back-project a pixel at depth `z` into the camera frame.
    pub fn unproject(&self, u: f64, v: f64, z: f64) -> nalgebra::Vector3<f64> {
        nalgebra::Vector3::new((u - self.cx) * z / self.fx, (v - self.cy) * z / self.fy, z)
    }

    /// Intrinsics scaled for a resized image (e.g. a downsampled raycast).
    pub fn scaled(&self, sx: f64, sy: f64) -> Self {
        Self {
            fx: self.fx * sx,
            fy: self.fy * sy,
            cx: self.cx * sx,
            cy: self.cy * sy,
        }
    }
}

/// Calibration for an RGB-D sensor pair.
///
/// The depth image size defaults to the RGB size when not given separately,
/// matching the common case of registered depth.
#[derive(Debug, Clone, Deserialize)]
pub struct RgbdCalib {
    pub rgb_intrinsics: Intrinsics,
    pub depth_intrinsics: Intrinsics,
    pub rgb_size: ImageSize,
    pub depth_size: ImageSize,
    /// Multiplier converting raw integer depth to meters (e.g. 1/1000 for mm).
    pub depth_scale: f64,
}

impl RgbdCalib {
    pub fn new(
        intrinsics: Intrinsics,
        rgb_size: ImageSize,
        depth_size: Option<ImageSize>,
        depth_scale: f64,
    ) -> Self {
        Self {
            rgb_intrinsics: intrinsics,
            depth_intrinsics: intrinsics,
            rgb_size,
            depth_size: depth_size.unwrap_or(rgb_size),
            depth_scale,
        }
    }
}
