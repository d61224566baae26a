//! The persistent volumetric world model.
//!
//! Geometry is stored as a truncated signed distance field over a hash of
//! fixed-size voxel blocks, allocated lazily as surface is observed. SDF
//! values are kept normalized to the truncation band: -1.0 (behind surface)
//! to 1.0 (free/unobserved). Fusion is monotonic accumulation; the only way
//! back to an empty volume is `clear`.

use std::collections::HashMap;

use nalgebra::Vector3;

use crate::error::EngineError;

/// Voxels per block edge.
pub const BLOCK_SIZE: usize = 8;
/// Voxels per block.
pub const BLOCK_VOLUME: usize = BLOCK_SIZE * BLOCK_SIZE * BLOCK_SIZE;

/// Integer block coordinates in the block grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlockCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

/// Integer voxel coordinates in the global voxel grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoxelCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelCoord {
    /// The block this voxel belongs to.
    pub fn block(&self) -> BlockCoord {
        let div = |a: i32| a.div_euclid(BLOCK_SIZE as i32);
        BlockCoord {
            x: div(self.x),
            y: div(self.y),
            z: div(self.z),
        }
    }

    /// Flat index of this voxel inside its block.
    pub fn index_in_block(&self) -> usize {
        let rem = |a: i32| a.rem_euclid(BLOCK_SIZE as i32) as usize;
        (rem(self.z) * BLOCK_SIZE + rem(self.y)) * BLOCK_SIZE + rem(self.x)
    }
}

/// One cell of the signed distance field.
#[derive(Debug, Clone, Copy)]
pub struct Voxel {
    /// Normalized truncated signed distance in [-1, 1].
    pub sdf: f32,
    /// Integration weight; 0 means never observed.
    pub weight: u8,
    /// Accumulated surface color.
    pub color: [u8; 3],
}

impl Default for Voxel {
    fn default() -> Self {
        Self {
            sdf: 1.0,
            weight: 0,
            color: [0; 3],
        }
    }
}

/// A block of `BLOCK_VOLUME` voxels.
pub struct VoxelBlock {
    pub voxels: Vec<Voxel>,
}

impl VoxelBlock {
    fn new() -> Self {
        Self {
            voxels: vec![Voxel::default(); BLOCK_VOLUME],
        }
    }
}

/// Scene geometry parameters.
#[derive(Debug, Clone, Copy)]
pub struct SceneParams {
    /// Edge length of one voxel in meters.
    pub voxel_size_m: f32,
    /// Truncation band of the SDF in meters.
    pub truncation_m: f32,
    /// Weight at which integration saturates.
    pub max_weight: u8,
    /// Capacity of the voxel block pool.
    pub max_blocks: usize,
}

/// The volumetric scene: a bounded pool of lazily allocated voxel blocks.
pub struct Scene {
    params: SceneParams,
    blocks: HashMap<BlockCoord, VoxelBlock>,
}

impl Scene {
    pub fn new(params: SceneParams) -> Self {
        Self {
            params,
            blocks: HashMap::new(),
        }
    }

    pub fn params(&self) -> &SceneParams {
        &self.params
    }

    /// Drop all allocated blocks, returning to the empty initial state.
    pub fn clear(&mut self) {
        self.blocks.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn num_allocated_blocks(&self) -> usize {
        self.blocks.len()
    }

    pub fn block_coords(&self) -> impl Iterator<Item = &BlockCoord> {
        self.blocks.keys()
    }

    /// World-space position of a voxel's center.
    pub fn voxel_center(&self, vc: VoxelCoord) -> Vector3<f64> {
        let s = self.params.voxel_size_m as f64;
        Vector3::new(
            (vc.x as f64 + 0.5) * s,
            (vc.y as f64 + 0.5) * s,
            (vc.z as f64 + 0.5) * s,
        )
    }

    /// Voxel containing a world-space point.
    pub fn world_to_voxel(&self, p: &Vector3<f64>) -> VoxelCoord {
        let s = self.params.voxel_size_m as f64;
        VoxelCoord {
            x: (p.x / s).floor() as i32,
            y: (p.y / s).floor() as i32,
            z: (p.z / s).floor() as i32,
        }
    }

    /// Ensure the block containing `vc` exists.
    ///
    /// Fails with `SceneExhausted` when the block pool is full; the engine
    /// treats that as fatal.
    pub fn allocate_for(&mut self, vc: VoxelCoord) -> Result<(), EngineError> {
        let bc = vc.block();
        if self.blocks.contains_key(&bc) {
            return Ok(());
        }
        if self.blocks.len() >= self.params.max_blocks {
            return Err(EngineError::SceneExhausted {
                capacity: self.params.max_blocks,
            });
        }
        self.blocks.insert(bc, VoxelBlock::new());
        Ok(())
    }

    /// Read a voxel; `None` if its block was never allocated.
    pub fn voxel(&self, vc: VoxelCoord) -> Option<&Voxel> {
        self.blocks
            .get(&vc.block())
            .map(|b| &b.voxels[vc.index_in_block()])
    }

    /// Mutable voxel access; `None` if its block was never allocated.
    pub fn voxel_mut(&mut self, vc: VoxelCoord) -> Option<&mut Voxel> {
        self.blocks
            .get_mut(&vc.block())
            .map(|b| &mut b.voxels[vc.index_in_block()])
    }

    /// Normalized SDF at a world point; unobserved space reads as 1.0 (free).
    pub fn sdf_at(&self, p: &Vector3<f64>) -> f32 {
        self.voxel(self.world_to_voxel(p))
            .filter(|v| v.weight > 0)
            .map(|v| v.sdf)
            .unwrap_or(1.0)
    }

    /// Integration weight at a world point (0 for unobserved space).
    pub fn weight_at(&self, p: &Vector3<f64>) -> u8 {
        self.voxel(self.world_to_voxel(p))
            .map(|v| v.weight)
            .unwrap_or(0)
    }

    /// Voxel color at a world point.
    pub fn color_at(&self, p: &Vector3<f64>) -> [u8; 3] {
        self.voxel(self.world_to_voxel(p))
            .filter(|v| v.weight > 0)
            .map(|v| v.color)
            .unwrap_or([0; 3])
    }

    /// SDF gradient by central differences, one voxel apart. Used as the
    /// surface normal at raycast hits.
    pub fn sdf_gradient(&self, p: &Vector3<f64>) -> Vector3<f64> {
        let h = self.params.voxel_size_m as f64;
        let dx = self.sdf_at(&(p + Vector3::new(h, 0.0, 0.0)))
            - self.sdf_at(&(p - Vector3::new(h, 0.0, 0.0)));
        let dy = self.sdf_at(&(p + Vector3::new(0.0, h, 0.0)))
            - self.sdf_at(&(p - Vector3::new(0.0, h, 0.0)));
        let dz = self.sdf_at(&(p + Vector3::new(0.0, 0.0, h)))
            - self.sdf_at(&(p - Vector3::new(0.0, 0.0, h)));
        Vector3::new(dx as f64, dy as f64, dz as f64)
    }
}
