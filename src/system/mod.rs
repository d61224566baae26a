//! Engine entry point: configuration and the per-frame orchestrator.

pub mod reconstruction;
pub mod settings;

pub use reconstruction::{EngineComponents, EnginePhase, ReconstructionEngine};
pub use settings::Settings;
