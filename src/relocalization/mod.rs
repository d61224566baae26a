//! Appearance-based relocalization: a database of compact frame descriptors
//! with their poses, consulted only when tracking has failed.
//!
//! The descriptor and matching here are deliberately simple and can be
//! upgraded (e.g. to randomized ferns) without touching the engine: the
//! engine only sees the `Relocaliser` contract and the append-only
//! `PoseDatabase`.

pub mod fingerprint;

pub use fingerprint::DepthFingerprintRelocaliser;

use crate::geometry::SE3;
use crate::view::View;

/// Compact appearance descriptor of one frame.
#[derive(Debug, Clone)]
pub struct FrameDescriptor {
    /// Coarse grid of depth values (meters, 0 = missing).
    pub cells: Vec<f32>,
}

/// Append-only store of (descriptor, pose) pairs for frames that tracked
/// with a reliable pose.
pub struct PoseDatabase {
    entries: Vec<(FrameDescriptor, SE3)>,
}

impl PoseDatabase {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn insert(&mut self, descriptor: FrameDescriptor, pose: SE3) {
        self.entries.push((descriptor, pose));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[(FrameDescriptor, SE3)] {
        &self.entries
    }
}

impl Default for PoseDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Retrieves a historical pose candidate for a view after tracking loss.
pub trait Relocaliser {
    /// Compute the compact descriptor used for database entries.
    fn describe(&self, view: &View) -> FrameDescriptor;

    /// Best-matching historical pose, if any entry matches with acceptable
    /// confidence. A miss is not an error; the engine retries next frame.
    fn query(&self, view: &View, db: &PoseDatabase) -> Option<SE3>;
}
