//! Downsampled-depth frame fingerprints.
//!
//! A frame is summarized by averaging its metric depth over a coarse grid.
//! Matching is RMS difference over cells where both frames have depth; the
//! candidate is accepted when the best distance falls under a threshold.

use tracing::debug;

use crate::geometry::SE3;
use crate::view::View;

use super::{FrameDescriptor, PoseDatabase, Relocaliser};

/// Fingerprint grid resolution.
const GRID_W: u32 = 16;
const GRID_H: u32 = 12;

/// Minimum fraction of grid cells both descriptors must cover for a
/// comparison to be meaningful.
const MIN_OVERLAP: f64 = 0.3;

pub struct DepthFingerprintRelocaliser {
    /// RMS depth difference (meters) below which a match is accepted.
    acceptance_dist_m: f64,
}

impl DepthFingerprintRelocaliser {
    pub fn new(acceptance_dist_m: f64) -> Self {
        Self { acceptance_dist_m }
    }

    fn distance(a: &FrameDescriptor, b: &FrameDescriptor) -> Option<f64> {
        let mut sum_sq = 0.0f64;
        let mut n = 0usize;
        for (&da, &db) in a.cells.iter().zip(&b.cells) {
            if da > 0.0 && db > 0.0 {
                let d = (da - db) as f64;
                sum_sq += d * d;
                n += 1;
            }
        }
        let overlap = n as f64 / a.cells.len() as f64;
        (overlap >= MIN_OVERLAP).then(|| (sum_sq / n as f64).sqrt())
    }
}

impl Relocaliser for DepthFingerprintRelocaliser {
    fn describe(&self, view: &View) -> FrameDescriptor {
        let w = view.depth.width();
        let h = view.depth.height();
        let mut cells = Vec::with_capacity((GRID_W * GRID_H) as usize);

        for gy in 0..GRID_H {
            for gx in 0..GRID_W {
                let x0 = gx * w / GRID_W;
                let x1 = (gx + 1) * w / GRID_W;
                let y0 = gy * h / GRID_H;
                let y1 = (gy + 1) * h / GRID_H;

                let mut sum = 0.0f64;
                let mut n = 0usize;
                for y in y0..y1 {
                    for x in x0..x1 {
                        if let Some(d) = view.depth_at(x, y) {
                            sum += d;
                            n += 1;
                        }
                    }
                }
                cells.push(if n > 0 { (sum / n as f64) as f32 } else { 0.0 });
            }
        }
        FrameDescriptor { cells }
    }

    fn query(&self, view: &View, db: &PoseDatabase) -> Option<SE3> {
        let query = self.describe(view);
        let mut best: Option<(f64, &SE3)> = None;

        for (desc, pose) in db.entries() {
            let Some(dist) = Self::distance(&query, desc) else {
                continue;
            };
            if best.as_ref().map_or(true, |(d, _)| dist < *d) {
                best = Some((dist, pose));
            }
        }

        match best {
            Some((dist, pose)) if dist <= self.acceptance_dist_m => {
                debug!(dist, "relocalization candidate accepted");
                Some(pose.clone())
            }
            Some((dist, _)) => {
                debug!(dist, "best relocalization candidate above threshold");
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Intrinsics;
    use crate::view::{ColorFrame, DepthMap};
    use image::{Luma, Rgba};
    use nalgebra::Vector3;

    const W: u32 = 64;
    const H: u32 = 48;

    fn view_with_depth(f: impl Fn(u32, u32) -> f32) -> View {
        let mut depth = DepthMap::new(W, H);
        for (x, y, px) in depth.enumerate_pixels_mut() {
            *px = Luma([f(x, y)]);
        }
        View {
            depth,
            color: ColorFrame::from_pixel(W, H, Rgba([0, 0, 0, 255])),
            intrinsics: Intrinsics {
                fx: 60.0,
                fy: 60.0,
                cx: 32.0,
                cy: 24.0,
            },
            imu: None,
        }
    }

    #[test]
    fn test_matches_similar_frame() {
        let reloc = DepthFingerprintRelocaliser::new(0.2);
        let stored = view_with_depth(|x, _| 1.0 + x as f32 * 0.01);
        let query = view_with_depth(|x, _| 1.02 + x as f32 * 0.01);

        let mut db = PoseDatabase::new();
        let pose = SE3::from_translation(Vector3::new(0.0, 0.0, 0.5));
        db.insert(reloc.describe(&stored), pose.clone());

        let hit = reloc.query(&query, &db).expect("should match");
        assert_eq!(hit, pose);
    }

    #[test]
    fn test_rejects_dissimilar_frame() {
        let reloc = DepthFingerprintRelocaliser::new(0.2);
        let stored = view_with_depth(|_, _| 1.0);
        let query = view_with_depth(|_, _| 3.0);

        let mut db = PoseDatabase::new();
        db.insert(reloc.describe(&stored), SE3::identity());
        assert!(reloc.query(&query, &db).is_none());
    }

    #[test]
    fn test_empty_database_misses() {
        let reloc = DepthFingerprintRelocaliser::new(0.2);
        let query = view_with_depth(|_, _| 1.0);
        assert!(reloc.query(&query, &PoseDatabase::new()).is_none());
    }
}
