//! Engine configuration bundle.

use serde::Deserialize;

/// Tuning parameters for the reconstruction engine and its default
/// collaborators. All fields have working defaults; host applications
/// typically deserialize this from their own config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Voxel edge length in meters.
    pub voxel_size_m: f32,
    /// TSDF truncation band in meters.
    pub truncation_m: f32,
    /// Capacity of the scene's voxel block pool. Exhaustion is fatal.
    pub max_blocks: usize,
    /// Weight at which TSDF integration saturates.
    pub max_integration_weight: u8,
    /// Near limit of the usable depth range in meters.
    pub min_depth_m: f32,
    /// Far limit of the usable depth range in meters.
    pub max_depth_m: f32,
    /// Gauss-Newton iterations of the default ICP tracker.
    pub icp_iterations: usize,
    /// Use the view's IMU orientation as the rotation prior when present.
    pub use_imu_orientation: bool,
    /// Insert a pose-database keyframe every Nth well-tracked frame. Bounds
    /// database growth while keeping it representative of visited regions.
    /// 0 disables keyframe insertion (and with it, relocalization recall).
    pub keyframe_interval: u32,
    /// RMS depth distance (meters) under which a relocalization candidate
    /// is accepted.
    pub reloc_acceptance_dist_m: f64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            voxel_size_m: 0.02,
            truncation_m: 0.08,
            max_blocks: 0x40000,
            max_integration_weight: 100,
            min_depth_m: 0.2,
            max_depth_m: 3.0,
            icp_iterations: 12,
            use_imu_orientation: false,
            keyframe_interval: 10,
            reloc_acceptance_dist_m: 0.25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let s: Settings = serde_json::from_str(r#"{"keyframe_interval": 3}"#).unwrap();
        assert_eq!(s.keyframe_interval, 3);
        assert_eq!(s.max_integration_weight, Settings::default().max_integration_weight);
    }
}
