//! Default view builder: validation, metric conversion, depth cleanup.

use image::Luma;

use crate::camera::RgbdCalib;
use crate::error::EngineError;

use super::{ColorFrame, DepthMap, ImuSample, RawDepthFrame, View, ViewBuilder};

/// Neighborhood depth spread (meters) beyond which a pixel is treated as a
/// flying pixel and invalidated.
const MAX_NEIGHBOR_SPREAD_M: f32 = 0.08;

/// Standard RGB-D view builder.
///
/// Converts raw integer depth to meters using the calibrated depth scale,
/// clamps to the configured working range, and invalidates flying pixels at
/// depth discontinuities (these otherwise poison both ICP and fusion).
pub struct RgbdViewBuilder {
    calib: RgbdCalib,
    min_depth_m: f32,
    max_depth_m: f32,
}

impl RgbdViewBuilder {
    pub fn new(calib: RgbdCalib, min_depth_m: f32, max_depth_m: f32) -> Self {
        Self {
            calib,
            min_depth_m,
            max_depth_m,
        }
    }

    fn check_dims(
        &self,
        got_w: u32,
        got_h: u32,
        want_w: u32,
        want_h: u32,
    ) -> Result<(), EngineError> {
        if got_w != want_w || got_h != want_h {
            return Err(EngineError::InvalidFrame {
                expected_width: want_w,
                expected_height: want_h,
                got_width: got_w,
                got_height: got_h,
            });
        }
        Ok(())
    }
}

impl ViewBuilder for RgbdViewBuilder {
    fn build(
        &mut self,
        color: &ColorFrame,
        raw_depth: &RawDepthFrame,
        imu: Option<ImuSample>,
    ) -> Result<View, EngineError> {
        let rgb = self.calib.rgb_size;
        let d = self.calib.depth_size;
        self.check_dims(color.width(), color.height(), rgb.width, rgb.height)?;
        self.check_dims(raw_depth.width(), raw_depth.height(), d.width, d.height)?;

        // Raw units -> meters, with range gating.
        let mut depth = DepthMap::new(d.width, d.height);
        for (x, y, px) in raw_depth.enumerate_pixels() {
            let m = px.0[0] as f32 * self.calib.depth_scale as f32;
            let valid = m >= self.min_depth_m && m <= self.max_depth_m;
            depth.put_pixel(x, y, Luma([if valid { m } else { 0.0 }]));
        }

        // Invalidate flying pixels: valid depth whose 4-neighborhood spread
        // is too large sits on a discontinuity edge.
        let mut filtered = depth.clone();
        for y in 1..d.height.saturating_sub(1) {
            for x in 1..d.width.saturating_sub(1) {
                let c = depth.get_pixel(x, y).0[0];
                if c <= 0.0 {
                    continue;
                }
                let neighbors = [
                    depth.get_pixel(x - 1, y).0[0],
                    depth.get_pixel(x + 1, y).0[0],
                    depth.get_pixel(x, y - 1).0[0],
                    depth.get_pixel(x, y + 1).0[0],
                ];
                let spread = neighbors
                    .iter()
                    .filter(|&&n| n > 0.0)
                    .map(|&n| (n - c).abs())
                    .fold(0.0f32, f32::max);
                if spread > MAX_NEIGHBOR_SPREAD_M {
                    filtered.put_pixel(x, y, Luma([0.0]));
                }
            }
        }

        Ok(View {
            depth: filtered,
            color: color.clone(),
            intrinsics: self.calib.depth_intrinsics,
            imu,
        })
    }
}
