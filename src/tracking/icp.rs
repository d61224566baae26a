//! Frame-to-model tracker: projective data association with point-to-plane
//! ICP, refined by damped Gauss-Newton on the left-multiplied twist.

use nalgebra::{Matrix6, Vector6};
use tracing::debug;

use crate::geometry::SE3;
use crate::mapping::RenderState;
use crate::view::View;

use super::{TrackOutput, Tracker, TrackingVerdict};

/// Pixel stride when sampling depth for correspondences.
const SAMPLE_STRIDE: u32 = 2;
/// Point-to-plane residual gate in meters.
const MAX_RESIDUAL_M: f64 = 0.1;
/// Minimum valid reference pixels below which tracking cannot run at all.
const MIN_REFERENCE_PIXELS: usize = 100;
/// Levenberg damping added to the normal equations.
const DAMPING: f64 = 1e-6;

const MIN_INLIER_RATIO_GOOD: f64 = 0.55;
const MIN_INLIER_RATIO_POOR: f64 = 0.25;
const MAX_MEAN_RESIDUAL_GOOD_M: f64 = 0.03;

/// ICP-based tracker refining the prior pose against the live raycast.
pub struct ProjectiveIcpTracker {
    iterations: usize,
    /// When set, an IMU orientation sample on the view replaces the prior's
    /// rotation before refinement.
    use_imu_orientation: bool,
}

impl ProjectiveIcpTracker {
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            use_imu_orientation: false,
        }
    }

    pub fn with_imu_orientation(mut self, enabled: bool) -> Self {
        self.use_imu_orientation = enabled;
        self
    }

    /// One linearization pass. Returns (H, b, inliers, residual_sum, sampled).
    fn accumulate(
        &self,
        view: &View,
        pose: &SE3,
        reference: &RenderState,
    ) -> (Matrix6<f64>, Vector6<f64>, usize, f64, usize) {
        let mut h = Matrix6::<f64>::zeros();
        let mut b = Vector6::<f64>::zeros();
        let mut inliers = 0usize;
        let mut residual_sum = 0.0f64;
        let mut sampled = 0usize;

        let ref_pose_inv = reference.pose.inverse();

        for v in (0..view.depth.height()).step_by(SAMPLE_STRIDE as usize) {
            for u in (0..view.depth.width()).step_by(SAMPLE_STRIDE as usize) {
                let Some(d) = view.depth_at(u, v) else {
                    continue;
                };
                sampled += 1;

                let p_world =
                    pose.transform_point(&view.intrinsics.unproject(u as f64, v as f64, d));

                // Associate by projecting into the reference raycast.
                let q_cam = ref_pose_inv.transform_point(&p_world);
                if q_cam.z <= 0.0 {
                    continue;
                }
                let (pu, pv) = reference.intrinsics.project(q_cam.x, q_cam.y, q_cam.z);
                let (pu, pv) = (pu.round(), pv.round());
                if pu < 0.0
                    || pv < 0.0
                    || pu >= reference.width() as f64
                    || pv >= reference.height() as f64
                {
                    continue;
                }
                let Some((q, n)) = reference.surface_at(pu as u32, pv as u32) else {
                    continue;
                };

                let r = n.dot(&(p_world - q));
                if r.abs() > MAX_RESIDUAL_M {
                    continue;
                }

                // dr/d(ω,v) for the left twist: [(p × n), n].
                let pxn = p_world.cross(n);
                let mut j = Vector6::<f64>::zeros();
                j.fixed_rows_mut::<3>(0).copy_from(&pxn);
                j.fixed_rows_mut::<3>(3).copy_from(n);

                let jt = j.transpose();
                b += j.scale(-r);
                h += j * jt;
                inliers += 1;
                residual_sum += r.abs();
            }
        }
        (h, b, inliers, residual_sum, sampled)
    }
}

impl Tracker for ProjectiveIcpTracker {
    fn track(&mut self, view: &View, prior: &SE3, reference: &RenderState) -> TrackOutput {
        if reference.num_valid() < MIN_REFERENCE_PIXELS {
            debug!(
                valid = reference.num_valid(),
                "reference raycast too sparse to track against"
            );
            return TrackOutput {
                pose: prior.clone(),
                verdict: TrackingVerdict::Failed,
            };
        }

        let mut pose = prior.clone();
        if self.use_imu_orientation {
            if let Some(imu) = &view.imu {
                pose.rotation = imu.orientation;
            }
        }

        for _ in 0..self.iterations {
            let (mut h, b, inliers, _, _) = self.accumulate(view, &pose, reference);
            if inliers < 6 {
                break;
            }
            for i in 0..6 {
                h[(i, i)] += DAMPING;
            }
            let Some(dx) = h.lu().solve(&b) else {
                break;
            };
            let omega = dx.fixed_rows::<3>(0).into_owned();
            let vel = dx.fixed_rows::<3>(3).into_owned();
            pose = pose.left_update(&omega, &vel);
            if dx.norm() < 1e-7 {
                break;
            }
        }

        // Score the converged pose.
        let (_, _, inliers, residual_sum, sampled) = self.accumulate(view, &pose, reference);
        if sampled == 0 || inliers < 6 {
            return TrackOutput {
                pose: prior.clone(),
                verdict: TrackingVerdict::Failed,
            };
        }
        let inlier_ratio = inliers as f64 / sampled as f64;
        let mean_residual = residual_sum / inliers as f64;
        debug!(inlier_ratio, mean_residual, "icp converged");

        let verdict = if inlier_ratio >= MIN_INLIER_RATIO_GOOD
            && mean_residual <= MAX_MEAN_RESIDUAL_GOOD_M
        {
            TrackingVerdict::Good
        } else if inlier_ratio >= MIN_INLIER_RATIO_POOR {
            TrackingVerdict::Poor
        } else {
            TrackingVerdict::Failed
        };

        TrackOutput {
            pose: if verdict == TrackingVerdict::Failed {
                prior.clone()
            } else {
                pose
            },
            verdict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Intrinsics;
    use crate::view::DepthMap;
    use crate::view::ColorFrame;
    use approx::assert_relative_eq;
    use image::{Luma, Rgba};
    use nalgebra::Vector3;

    const W: u32 = 64;
    const H: u32 = 48;

    fn intrinsics() -> Intrinsics {
        Intrinsics {
            fx: 60.0,
            fy: 60.0,
            cx: W as f64 / 2.0,
            cy: H as f64 / 2.0,
        }
    }

    /// Reference raycast of a flat wall at world z = 2, seen from identity.
    fn wall_reference() -> RenderState {
        let k = intrinsics();
        let mut rs = RenderState::new(W, H, k);
        for v in 0..H {
            for u in 0..W {
                let p = k.unproject(u as f64, v as f64, 2.0);
                rs.set_hit(u, v, p, Vector3::new(0.0, 0.0, -1.0));
            }
        }
        rs.pose = SE3::identity();
        rs
    }

    /// View of the same wall from a camera moved forward by `dz`.
    fn wall_view(dz: f64) -> View {
        let k = intrinsics();
        let mut depth = DepthMap::new(W, H);
        for (_, _, px) in depth.enumerate_pixels_mut() {
            *px = Luma([(2.0 - dz) as f32]);
        }
        View {
            depth,
            color: ColorFrame::from_pixel(W, H, Rgba([0, 0, 0, 255])),
            intrinsics: k,
            imu: None,
        }
    }

    #[test]
    fn test_recovers_forward_translation() {
        let mut tracker = ProjectiveIcpTracker::new(12);
        let out = tracker.track(&wall_view(0.05), &SE3::identity(), &wall_reference());
        assert_eq!(out.verdict, TrackingVerdict::Good);
        assert_relative_eq!(out.pose.translation.z, 0.05, epsilon = 5e-3);
    }

    #[test]
    fn test_perfect_prior_is_good_with_near_zero_update() {
        let mut tracker = ProjectiveIcpTracker::new(12);
        let out = tracker.track(&wall_view(0.0), &SE3::identity(), &wall_reference());
        assert_eq!(out.verdict, TrackingVerdict::Good);
        assert!(out.pose.translation.norm() < 1e-3);
    }

    #[test]
    fn test_sparse_reference_fails() {
        let mut tracker = ProjectiveIcpTracker::new(12);
        let empty = RenderState::new(W, H, intrinsics());
        let prior = SE3::from_translation(Vector3::new(1.0, 2.0, 3.0));
        let out = tracker.track(&wall_view(0.0), &prior, &empty);
        assert_eq!(out.verdict, TrackingVerdict::Failed);
        // Failed tracking must hand back the prior untouched.
        assert_eq!(out.pose, prior);
    }
}
