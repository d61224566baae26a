//! Cached raycast of the scene from a given pose.
//!
//! The live render state is the tracker's reference surface for the next
//! frame, so it must always hold a raycast from the most recent accepted
//! pose. The freeview render state serves visualization queries only and is
//! never read by the tracker.

use nalgebra::Vector3;

use crate::camera::Intrinsics;
use crate::geometry::SE3;

/// Per-pixel raycast result: surface points and normals in world space.
pub struct RenderState {
    width: u32,
    height: u32,
    /// World-space surface point per pixel (row-major).
    points: Vec<Vector3<f64>>,
    /// World-space surface normal per pixel.
    normals: Vec<Vector3<f64>>,
    /// Whether the ray at this pixel hit surface.
    valid: Vec<bool>,
    /// Pose the raycast was taken from (camera → world).
    pub pose: SE3,
    /// Intrinsics the raycast was taken with.
    pub intrinsics: Intrinsics,
}

impl RenderState {
    pub fn new(width: u32, height: u32, intrinsics: Intrinsics) -> Self {
        let n = width as usize * height as usize;
        Self {
            width,
            height,
            points: vec![Vector3::zeros(); n],
            normals: vec![Vector3::zeros(); n],
            valid: vec![false; n],
            pose: SE3::identity(),
            intrinsics,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, u: u32, v: u32) -> usize {
        v as usize * self.width as usize + u as usize
    }

    /// Invalidate every pixel (e.g. after a scene reset).
    pub fn clear(&mut self) {
        self.valid.iter_mut().for_each(|v| *v = false);
        self.pose = SE3::identity();
    }

    pub fn set_hit(&mut self, u: u32, v: u32, point: Vector3<f64>, normal: Vector3<f64>) {
        let i = self.index(u, v);
        self.points[i] = point;
        self.normals[i] = normal;
        self.valid[i] = true;
    }

    pub fn set_miss(&mut self, u: u32, v: u32) {
        let i = self.index(u, v);
        self.valid[i] = false;
    }

    /// Surface point and normal at a pixel, if the ray hit.
    pub fn surface_at(&self, u: u32, v: u32) -> Option<(&Vector3<f64>, &Vector3<f64>)> {
        let i = self.index(u, v);
        self.valid[i].then(|| (&self.points[i], &self.normals[i]))
    }

    /// Number of pixels with a surface hit.
    pub fn num_valid(&self) -> usize {
        self.valid.iter().filter(|&&v| v).count()
    }
}
