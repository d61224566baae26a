//! Real-time dense RGB-D reconstruction.
//!
//! Given a stream of color+depth frames (optionally with inertial samples),
//! the [`system::ReconstructionEngine`] maintains a live camera pose and
//! fuses depth into a persistent TSDF volume, falling back to
//! appearance-based relocalization when tracking is lost.

pub mod camera;
pub mod error;
pub mod geometry;
pub mod mapping;
pub mod meshing;
pub mod relocalization;
pub mod system;
pub mod tracking;
pub mod view;
pub mod viz;
