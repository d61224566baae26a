//! SE(3) rigid-body transform used for all camera poses.
//!
//! Poses are stored as rotation + translation (T_wc: camera-to-world unless
//! stated otherwise). Composition follows the usual convention:
//! `a.compose(&b)` applies `b` first, then `a`.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// Rigid transform in SE(3): rotation followed by translation.
#[derive(Debug, Clone, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// The identity transform.
    pub fn identity() -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation: Vector3::zeros(),
        }
    }

    /// Construct from a rotation and translation.
    pub fn new(rotation: UnitQuaternion<f64>, translation: Vector3<f64>) -> Self {
        Self {
            rotation,
            translation,
        }
    }

    /// Construct a pure translation.
    pub fn from_translation(translation: Vector3<f64>) -> Self {
        Self {
            rotation: UnitQuaternion::identity(),
            translation,
        }
    }

    /// Inverse transform: if `self` maps a → b, the result maps b → a.
    pub fn inverse(&self) -> Self {
        let rot_inv = self.rotation.inverse();
        Self {
            rotation: rot_inv,
            translation: -(rot_inv * self.translation),
        }
    }

    /// Compose two transforms: `self * other` (apply `other` first).
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            rotation: self.rotation * other.rotation,
            translation: self.rotation * other.translation + self.translation,
        }
    }

    /// Transform a 3D point.
    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    /// Rotate a direction vector (no translation applied).
    pub fn transform_direction(&self, d: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * d
    }

    /// Rotation as a 3×3 matrix.
    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }

    /// Apply a small twist update (ω, v) on the left: T ← exp(ξ) · T.
    ///
    /// Used by iterative pose refinement; the rotation update uses the
    /// axis-angle exponential on the rotation component only.
    pub fn left_update(&self, omega: &Vector3<f64>, v: &Vector3<f64>) -> Self {
        let dr = UnitQuaternion::from_scaled_axis(*omega);
        Self {
            rotation: dr * self.rotation,
            translation: dr * self.translation + v,
        }
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::identity()
    }
}
