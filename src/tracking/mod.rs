//! Camera tracking: the per-frame quality verdict, the persistent tracking
//! state, and the `Tracker` contract consumed by the engine.

pub mod icp;
pub mod state;

pub use icp::ProjectiveIcpTracker;
pub use state::{TrackingState, TrackingVerdict};

use crate::geometry::SE3;
use crate::mapping::RenderState;
use crate::view::View;

/// Pose and quality verdict produced by one tracker invocation.
#[derive(Debug, Clone)]
pub struct TrackOutput {
    pub pose: SE3,
    pub verdict: TrackingVerdict,
}

/// Refines a prior pose estimate against the cached raycast of the scene.
///
/// The tracker never mutates engine state; the engine decides what to do
/// with the returned pose based on the verdict. A `Failed` verdict means the
/// returned pose must not be trusted.
pub trait Tracker {
    fn track(&mut self, view: &View, prior: &SE3, reference: &RenderState) -> TrackOutput;
}
