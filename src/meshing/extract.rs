//! Zero-crossing surface extraction.
//!
//! For every pair of observed neighbor voxels whose SDF changes sign, a
//! quad is emitted at the interpolated crossing, perpendicular to the pair
//! axis. Coarser than marching cubes but watertight enough for inspection
//! snapshots, and easily replaced behind the `MeshingEngine` trait.

use nalgebra::Vector3;

use crate::mapping::scene::{Scene, VoxelCoord, BLOCK_SIZE};

use super::{Mesh, MeshingEngine};

const AXES: [[i32; 3]; 3] = [[1, 0, 0], [0, 1, 0], [0, 0, 1]];

pub struct BlockMesher;

impl BlockMesher {
    pub fn new() -> Self {
        Self
    }

    fn emit_face(mesh: &mut Mesh, center: Vector3<f64>, axis: usize, half: f64) {
        // Face plane spanned by the two axes perpendicular to `axis`.
        let (a, b) = match axis {
            0 => (Vector3::new(0.0, half, 0.0), Vector3::new(0.0, 0.0, half)),
            1 => (Vector3::new(half, 0.0, 0.0), Vector3::new(0.0, 0.0, half)),
            _ => (Vector3::new(half, 0.0, 0.0), Vector3::new(0.0, half, 0.0)),
        };
        let base = mesh.vertices.len() as u32;
        for corner in [center - a - b, center + a - b, center + a + b, center - a + b] {
            mesh.vertices
                .push(Vector3::new(corner.x as f32, corner.y as f32, corner.z as f32));
        }
        mesh.triangles.push([base, base + 1, base + 2]);
        mesh.triangles.push([base, base + 2, base + 3]);
    }
}

impl Default for BlockMesher {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshingEngine for BlockMesher {
    fn extract(&self, scene: &Scene) -> Mesh {
        let mut mesh = Mesh::empty();
        let voxel_size = scene.params().voxel_size_m as f64;
        let half = voxel_size * 0.5;

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
                        let Some(voxel) = scene.voxel(vc) else { continue };
                        if voxel.weight == 0 {
                            continue;
                        }

                        for (axis, step) in AXES.iter().enumerate() {
                            let nc = VoxelCoord {
                                x: vc.x + step[0],
                                y: vc.y + step[1],
                                z: vc.z + step[2],
                            };
                            let Some(neighbor) = scene.voxel(nc) else { continue };
                            if neighbor.weight == 0 {
                                continue;
                            }
                            if (voxel.sdf >= 0.0) == (neighbor.sdf >= 0.0) {
                                continue;
                            }

                            // Interpolate the crossing along the pair axis.
                            let denom = (voxel.sdf - neighbor.sdf) as f64;
                            let frac = if denom.abs() > 1e-12 {
                                voxel.sdf as f64 / denom
                            } else {
                                0.5
                            };
                            let mut center = scene.voxel_center(vc);
                            center[axis] += frac * voxel_size;
                            Self::emit_face(&mut mesh, center, axis, half);
                        }
                    }
                }
            }
        }
        mesh
    }
}
