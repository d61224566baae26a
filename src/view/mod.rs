//! Per-frame calibrated input: the `View` and its builder.
//!
//! A `View` is the only representation of the current frame the rest of the
//! engine sees. It is rebuilt wholesale every frame; no frame history is
//! retained.

pub mod builder;
pub mod imu;

pub use builder::RgbdViewBuilder;
pub use imu::ImuSample;

use image::{ImageBuffer, Luma, RgbaImage};

use crate::camera::Intrinsics;
use crate::error::EngineError;

/// Raw color input frame (RGBA, as delivered by the sensor driver).
pub type ColorFrame = RgbaImage;

/// Raw depth input frame (sensor integer units, 0 = missing).
pub type RawDepthFrame = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Filtered metric depth map (meters, <= 0.0 marks invalid pixels).
pub type DepthMap = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Calibrated, filtered input for one frame.
#[derive(Debug)]
pub struct View {
    /// Metric depth in meters; non-positive values are invalid.
    pub depth: DepthMap,
    /// Color image registered to the depth frame.
    pub color: ColorFrame,
    /// Intrinsics of the depth camera.
    pub intrinsics: Intrinsics,
    /// Optional inertial sample taken with this frame.
    pub imu: Option<ImuSample>,
}

impl View {
    /// Depth at a pixel, or `None` when missing/invalid.
    pub fn depth_at(&self, u: u32, v: u32) -> Option<f64> {
        let d = self.depth.get_pixel(u, v).0[0] as f64;
        (d > 0.0).then_some(d)
    }
}

/// Converts raw sensor frames into a calibrated `View`.
///
/// Fails only on malformed input (dimension mismatch); the engine guarantees
/// no state is mutated when `build` fails.
pub trait ViewBuilder {
    fn build(
        &mut self,
        color: &ColorFrame,
        raw_depth: &RawDepthFrame,
        imu: Option<ImuSample>,
    ) -> Result<View, EngineError>;
}
