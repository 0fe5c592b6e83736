use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Spatial transform: position, rotation, scale.
///
/// Composition follows the scene-graph convention: `parent * child` maps the
/// child's local space into the parent's space (scale, then rotate, then
/// translate).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Identity rotation and scale at the given position.
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Compose `self` (the parent) with `child`, producing the child's
    /// transform expressed in the parent's space.
    pub fn mul_transform(&self, child: &Transform) -> Transform {
        Transform {
            position: self.position + self.rotation * (self.scale * child.position),
            rotation: (self.rotation * child.rotation).normalize(),
            scale: self.scale * child.scale,
        }
    }

    /// The transform that undoes `self`, such that
    /// `self.inverse().mul_transform(&self)` is the identity.
    ///
    /// Zero scale components invert to zero instead of infinity.
    pub fn inverse(&self) -> Transform {
        let rotation = self.rotation.inverse();
        let scale = Vec3::new(
            safe_recip(self.scale.x),
            safe_recip(self.scale.y),
            safe_recip(self.scale.z),
        );
        Transform {
            position: -(rotation * (scale * self.position)),
            rotation,
            scale,
        }
    }

    /// Transform a point from local space into the space of `self`.
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * (self.scale * point)
    }

    /// Component-wise approximate equality, used by tests and change detection.
    pub fn abs_diff_eq(&self, other: &Transform, max_abs_diff: f32) -> bool {
        self.position.abs_diff_eq(other.position, max_abs_diff)
            && self.scale.abs_diff_eq(other.scale, max_abs_diff)
            && (self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
                || self.rotation.abs_diff_eq(-other.rotation, max_abs_diff))
    }
}

fn safe_recip(v: f32) -> f32 {
    if v == 0.0 { 0.0 } else { 1.0 / v }
}
