//! Default software renderer over raycast results.

use image::{Rgba, RgbaImage};

use crate::mapping::{RenderState, Scene};
use crate::view::DepthMap;

use super::{ImageType, VisualisationEngine};

const MISS_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

pub struct SceneRenderer;

impl SceneRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SceneRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl VisualisationEngine for SceneRenderer {
    fn render(&self, scene: &Scene, rs: &RenderState, ty: ImageType) -> RgbaImage {
        let mut out = RgbaImage::from_pixel(rs.width(), rs.height(), MISS_COLOR);
        let camera = rs.pose.translation;
        let max_weight = scene.params().max_weight as f64;

        for v in 0..rs.height() {
            for u in 0..rs.width() {
                let Some((point, normal)) = rs.surface_at(u, v) else {
                    continue;
                };
                let px = match ty {
                    ImageType::ShadedSurface => {
                        // Headlight shading: light co-located with camera.
                        let to_cam = camera - point;
                        let l = if to_cam.norm() > 1e-12 {
                            to_cam.normalize()
                        } else {
                            *normal
                        };
                        let g = (normal.dot(&l).max(0.0) * 255.0) as u8;
                        Rgba([g, g, g, 255])
                    }
                    ImageType::ColorFromVolume => {
                        let [r, g, b] = scene.color_at(point);
                        Rgba([r, g, b, 255])
                    }
                    ImageType::Normals => {
                        let map = |c: f64| ((c * 0.5 + 0.5) * 255.0) as u8;
                        Rgba([map(normal.x), map(normal.y), map(normal.z), 255])
                    }
                    ImageType::Confidence => {
                        // Red (fresh) to green (saturated weight).
                        let w = scene.weight_at(point) as f64 / max_weight;
                        Rgba([(255.0 * (1.0 - w)) as u8, (255.0 * w) as u8, 0, 255])
                    }
                    // Input passthrough is handled by the engine before the
                    // renderer is consulted.
                    ImageType::InputColor | ImageType::InputDepth => MISS_COLOR,
                };
                out.put_pixel(u, v, px);
            }
        }
        out
    }
}

/// Grayscale colormap of a metric depth map, normalized to its valid range.
pub fn colormap_depth(depth: &DepthMap) -> RgbaImage {
    let mut min = f32::INFINITY;
    let mut max = f32::NEG_INFINITY;
    for p in depth.pixels() {
        let d = p.0[0];
        if d > 0.0 {
            min = min.min(d);
            max = max.max(d);
        }
    }
    let range = (max - min).max(1e-6);

    let mut out = RgbaImage::from_pixel(depth.width(), depth.height(), MISS_COLOR);
    for (x, y, p) in depth.enumerate_pixels() {
        let d = p.0[0];
        if d > 0.0 {
            let g = (255.0 * (1.0 - (d - min) / range)) as u8;
            out.put_pixel(x, y, Rgba([g, g, g, 255]));
        }
    }
    out
}
