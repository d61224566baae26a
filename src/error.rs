//! Engine error taxonomy.
//!
//! Ordinary tracking loss is *not* an error: it is reported as a
//! [`TrackingVerdict`](crate::tracking::TrackingVerdict) and recovered via
//! relocalization. Only malformed input and fatal resource exhaustion
//! interrupt normal control flow.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Input frame rejected before any engine state was touched.
    #[error("invalid input frame: expected {expected_width}x{expected_height}, got {got_width}x{got_height}")]
    InvalidFrame {
        expected_width: u32,
        expected_height: u32,
        got_width: u32,
        got_height: u32,
    },

    /// The scene's voxel block pool is full. Fatal: the engine does not
    /// evict scene data to recover.
    #[error("scene voxel block pool exhausted ({capacity} blocks)")]
    SceneExhausted { capacity: usize },
}
