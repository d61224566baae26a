//! On-demand surface mesh extraction from the scene.
//!
//! A `Mesh` is a point-in-time snapshot: it is not kept in sync with
//! ongoing fusion, and a stale mesh never invalidates the scene.

pub mod extract;

pub use extract::BlockMesher;

use nalgebra::Vector3;

use crate::mapping::Scene;

/// Triangle-soup snapshot of the scene surface.
pub struct Mesh {
    pub vertices: Vec<Vector3<f32>>,
    /// Vertex indices, three per triangle.
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

/// Extracts a full surface mesh from the current scene.
pub trait MeshingEngine {
    fn extract(&self, scene: &Scene) -> Mesh;
}
