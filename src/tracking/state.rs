//! Tracking verdicts and the persistent tracking state.

use crate::geometry::SE3;

/// Per-frame quality classification of the pose estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingVerdict {
    /// Pose is reliable; fusion and keyframe insertion may proceed.
    Good,
    /// Pose is usable but low-confidence; fusion still proceeds (continuity
    /// over strict correctness), keyframes are not inserted.
    Poor,
    /// Pose is unreliable; fusion must not run and relocalization kicks in.
    Failed,
}

impl TrackingVerdict {
    /// Whether the pose behind this verdict may be fused into the scene.
    pub fn pose_usable(&self) -> bool {
        !matches!(self, TrackingVerdict::Failed)
    }
}

/// Current best pose estimate plus the verdict of the last processed frame.
///
/// Persists across frames: the pose carries the prior for the next frame's
/// tracker call.
#[derive(Debug, Clone)]
pub struct TrackingState {
    /// Camera-to-world transform.
    pub pose: SE3,
    pub verdict: TrackingVerdict,
}

impl TrackingState {
    pub fn new() -> Self {
        Self {
            pose: SE3::identity(),
            verdict: TrackingVerdict::Good,
        }
    }

    /// Reset to the identity pose, as after `reset_all` or at startup.
    pub fn reset(&mut self) {
        self.pose = SE3::identity();
        self.verdict = TrackingVerdict::Good;
    }
}

impl Default for TrackingState {
    fn default() -> Self {
        Self::new()
    }
}
