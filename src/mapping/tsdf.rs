//! TSDF integration and raycasting over the voxel block scene.

use crate::camera::Intrinsics;
use crate::error::EngineError;
use crate::geometry::SE3;
use crate::view::View;

use super::render_state::RenderState;
use super::scene::{Scene, VoxelCoord, BLOCK_SIZE};
use super::DenseMapper;

/// Pixel stride used during the block allocation sweep. Allocation only
/// needs to touch each block once, so a sparse sweep is sufficient.
const ALLOC_STRIDE: u32 = 4;

/// Voxel-based dense mapper: weighted-average TSDF fusion plus sphere-free
/// ray marching for surface prediction.
pub struct TsdfMapper {
    min_range_m: f64,
    max_range_m: f64,
}

impl TsdfMapper {
    pub fn new(min_range_m: f64, max_range_m: f64) -> Self {
        Self {
            min_range_m,
            max_range_m,
        }
    }

    /// Allocate every block intersected by the truncation band around the
    /// observed depth, sweeping a subset of pixels.
    fn allocate(&self, view: &View, pose: &SE3, scene: &mut Scene) -> Result<(), EngineError> {
        let mu = scene.params().truncation_m as f64;
        let step = scene.params().voxel_size_m as f64 * BLOCK_SIZE as f64 * 0.5;

        for v in (0..view.depth.height()).step_by(ALLOC_STRIDE as usize) {
            for u in (0..view.depth.width()).step_by(ALLOC_STRIDE as usize) {
                let Some(d) = view.depth_at(u, v) else {
                    continue;
                };
                let p_cam = view.intrinsics.unproject(u as f64, v as f64, d);
                let ray_len = p_cam.norm();
                let dir = p_cam / ray_len;

                let mut t = (ray_len - mu).max(0.0);
                let t_end = ray_len + mu;
                while t <= t_end {
                    let p_world = pose.transform_point(&(dir * t));
                    let vc = scene.world_to_voxel(&p_world);
                    scene.allocate_for(vc)?;
                    t += step.min(mu);
                }
            }
        }
        Ok(())
    }

    /// Update every allocated voxel visible in this view.
    fn integrate(&self, view: &View, pose: &SE3, scene: &mut Scene) {
        let mu = scene.params().truncation_m as f64;
        let max_weight = scene.params().max_weight;
        let t_cw = pose.inverse();
        let w = view.depth.width();
        let h = view.depth.height();

        let blocks: Vec<_> = scene.block_coords().copied().collect();
        for bc in blocks {
            for dz in 0..BLOCK_SIZE as i32 {
                for dy in 0..BLOCK_SIZE as i32 {
                    for dx in 0..BLOCK_SIZE as i32 {
                        let vc = VoxelCoord {
                            x: bc.x * BLOCK_SIZE as i32 + dx,
                            y: bc.y * BLOCK_SIZE as i32 + dy,
                            z: bc.z * BLOCK_SIZE as i32 + dz,
                        };
                        let p_world = scene.voxel_center(vc);
                        let p_cam = t_cw.transform_point(&p_world);
                        if p_cam.z < self.min_range_m || p_cam.z > self.max_range_m {
                            continue;
                        }
                        let (uf, vf) = view.intrinsics.project(p_cam.x, p_cam.y, p_cam.z);
                        let (u, v) = (uf.round(), vf.round());
                        if u < 0.0 || v < 0.0 || u >= w as f64 || v >= h as f64 {
                            continue;
                        }
                        let (u, v) = (u as u32, v as u32);
                        let Some(d_obs) = view.depth_at(u, v) else {
                            continue;
                        };

                        // Signed distance along the viewing direction.
                        let eta = d_obs - p_cam.z;
                        if eta < -mu {
                            continue;
                        }
                        let sdf_obs = (eta / mu).clamp(-1.0, 1.0) as f32;

                        let near_surface = eta.abs() < mu;
                        // The color frame may be smaller than the depth map;
                        // pixels outside it fuse geometry only.
                        let color = (u < view.color.width() && v < view.color.height())
                            .then(|| view.color.get_pixel(u, v).0);
                        let Some(voxel) = scene.voxel_mut(vc) else {
                            continue;
                        };
                        let wt = voxel.weight as f32;
                        voxel.sdf = (voxel.sdf * wt + sdf_obs) / (wt + 1.0);
                        if near_surface {
                            if let Some(color) = color {
                                for c in 0..3 {
                                    let old = voxel.color[c] as f32;
                                    voxel.color[c] =
                                        ((old * wt + color[c] as f32) / (wt + 1.0)) as u8;
                                }
                            }
                        }
                        voxel.weight = voxel.weight.saturating_add(1).min(max_weight);
                    }
                }
            }
        }
    }
}

impl DenseMapper for TsdfMapper {
    fn fuse(&mut self, view: &View, pose: &SE3, scene: &mut Scene) -> Result<(), EngineError> {
        self.allocate(view, pose, scene)?;
        self.integrate(view, pose, scene);
        Ok(())
    }

    fn raycast(&self, scene: &Scene, pose: &SE3, intrinsics: &Intrinsics, out: &mut RenderState) {
        let mu = scene.params().truncation_m as f64;
        let fine_step = scene.params().voxel_size_m as f64 * 0.5;
        let coarse_step = mu * 0.75;
        let origin = pose.translation;

        for v in 0..out.height() {
            for u in 0..out.width() {
                let dir_cam = intrinsics.unproject(u as f64, v as f64, 1.0).normalize();
                let dir = pose.transform_direction(&dir_cam);

                let mut t = self.min_range_m;
                let mut prev_t = t;
                let mut prev_sdf = 1.0f32;
                let mut hit = false;

                while t <= self.max_range_m {
                    let sdf = scene.sdf_at(&(origin + dir * t));
                    if sdf <= 0.0 {
                        // Zero crossing between prev_t and t.
                        let denom = (prev_sdf - sdf) as f64;
                        let frac = if denom.abs() > 1e-12 {
                            prev_sdf as f64 / denom
                        } else {
                            0.5
                        };
                        let t_hit = prev_t + (t - prev_t) * frac;
                        let point = origin + dir * t_hit;
                        let grad = scene.sdf_gradient(&point);
                        if grad.norm() > 1e-12 {
                            out.set_hit(u, v, point, grad.normalize());
                        } else {
                            out.set_miss(u, v);
                        }
                        hit = true;
                        break;
                    }
                    prev_t = t;
                    prev_sdf = sdf;
                    // Far from surface the SDF is saturated and we can stride
                    // a large fraction of the truncation band safely.
                    t += if sdf >= 0.9 { coarse_step } else { fine_step };
                }
                if !hit {
                    out.set_miss(u, v);
                }
            }
        }
        out.pose = pose.clone();
        out.intrinsics = *intrinsics;
    }
}
