//! Visualization: rendering requested image types from the scene or a
//! cached raycast. Display and file export live outside this crate; this
//! module only produces pixel buffers.

pub mod renderer;

pub use renderer::{colormap_depth, SceneRenderer};

use image::RgbaImage;

use crate::mapping::{RenderState, Scene};

/// Kind of image requested through `ReconstructionEngine::get_image`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageType {
    /// Raw input color of the current view.
    InputColor,
    /// Colormapped metric depth of the current view.
    InputDepth,
    /// Lambert-shaded raycast of the scene surface.
    ShadedSurface,
    /// Per-voxel accumulated color at the raycast surface.
    ColorFromVolume,
    /// Surface normals mapped to RGB.
    Normals,
    /// Integration weight (confidence) at the raycast surface.
    Confidence,
}

impl ImageType {
    /// Whether this request is served straight from the current view,
    /// without touching any render state.
    pub fn is_input_passthrough(&self) -> bool {
        matches!(self, ImageType::InputColor | ImageType::InputDepth)
    }
}

/// Renders a requested image type from a raycast of the scene.
pub trait VisualisationEngine {
    fn render(&self, scene: &Scene, render_state: &RenderState, ty: ImageType) -> RgbaImage;
}
