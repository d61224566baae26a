//! Dense mapping: the volumetric scene, cached raycasts, and the mapper
//! that connects them.
//!
//! The engine owns the `Scene` and both `RenderState`s; the `DenseMapper`
//! operates on borrowed references for the duration of one call.

pub mod render_state;
pub mod scene;
pub mod tsdf;

pub use render_state::RenderState;
pub use scene::{Scene, SceneParams};
pub use tsdf::TsdfMapper;

use crate::camera::Intrinsics;
use crate::error::EngineError;
use crate::geometry::SE3;
use crate::view::View;

/// Integrates views into the scene and predicts surfaces from it.
///
/// `fuse` is monotonic accumulation; there is no way to undo an integrated
/// frame, which is why the engine never fuses with an unresolved pose.
pub trait DenseMapper {
    /// Integrate one view at the given camera-to-world pose.
    fn fuse(&mut self, view: &View, pose: &SE3, scene: &mut Scene) -> Result<(), EngineError>;

    /// Raycast the scene from a pose into `out`.
    fn raycast(&self, scene: &Scene, pose: &SE3, intrinsics: &Intrinsics, out: &mut RenderState);
}
