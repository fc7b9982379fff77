//! 3D Transform (position, rotation, scale)
//!
//! A Transform3D is the local or world placement of a spatial node.

use glam::{Mat3, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// A 3D transform with position, rotation, and per-axis scale
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    /// Position in world units
    pub position: Vec3,
    /// Rotation as a unit quaternion
    pub rotation: Quat,
    /// Per-axis scale
    pub scale: Vec3,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform3D {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Create an identity transform
    pub fn identity() -> Self {
        Self::IDENTITY
    }

    /// Create a transform with just a position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    /// Transform a point from local space to world space
    ///
    /// Applies scale, then rotation, then translation.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        self.rotation * (p * self.scale) + self.position
    }

    /// Transform a direction (no translation)
    pub fn transform_direction(&self, d: Vec3) -> Vec3 {
        self.rotation * (d * self.scale)
    }

    /// Compose two transforms: result = self * other
    ///
    /// The composed transform applies `other` first, then `self`.
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            position: self.transform_point(other.position),
            rotation: (self.rotation * other.rotation).normalize(),
            scale: self.scale * other.scale,
        }
    }

    /// Compute the inverse transform
    ///
    /// Exact for uniform scale; per-axis scale is inverted component-wise.
    pub fn inverse(&self) -> Self {
        let inv_scale = Vec3::new(
            safe_recip(self.scale.x),
            safe_recip(self.scale.y),
            safe_recip(self.scale.z),
        );
        let inv_rotation = self.rotation.inverse();
        let inv_position = (inv_rotation * -self.position) * inv_scale;

        Self {
            position: inv_position,
            rotation: inv_rotation,
            scale: inv_scale,
        }
    }

    /// Interpolate toward `target` (position lerp, rotation slerp)
    pub fn blend(&self, target: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(target.position, t),
            rotation: self.rotation.slerp(target.rotation, t),
            scale: self.scale.lerp(target.scale, t),
        }
    }

    /// Homogeneous matrix (scale, then rotation, then translation)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Rotation as a 3x3 matrix
    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_quat(self.rotation)
    }

    /// True if an odd number of scale axes are negative
    pub fn is_negative_scaling(&self) -> bool {
        self.scale.x * self.scale.y * self.scale.z < 0.0
    }

    /// Translate the transform by an offset
    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
    }

    /// Rotate the transform by a quaternion (applied after the current rotation)
    pub fn rotate(&mut self, rotation: Quat) {
        self.rotation = (rotation * self.rotation).normalize();
    }
}

fn safe_recip(v: f32) -> f32 {
    if v.abs() > 1e-10 {
        1.0 / v
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    const EPSILON: f32 = 1e-5;

    fn approx_eq(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < EPSILON
    }

    #[test]
    fn test_identity() {
        let t = Transform3D::identity();
        let p = Vec3::new(1.0, 2.0, 3.0);
        assert!(approx_eq(t.transform_point(p), p));
    }

    #[test]
    fn test_translation() {
        let t = Transform3D::from_position(Vec3::new(10.0, 0.0, 0.0));
        assert!(approx_eq(t.transform_point(Vec3::ONE), Vec3::new(11.0, 1.0, 1.0)));
    }

    #[test]
    fn test_rotation_then_translation() {
        let t = Transform3D::from_position_rotation(Vec3::X, Quat::from_rotation_z(FRAC_PI_2));
        // X rotated 90 degrees about Z becomes Y, then translated by X
        assert!(approx_eq(t.transform_point(Vec3::X), Vec3::new(1.0, 1.0, 0.0)));
    }

    #[test]
    fn test_compose_matches_matrix_product() {
        let parent = Transform3D {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_y(0.4),
            scale: Vec3::splat(2.0),
        };
        let child = Transform3D::from_position_rotation(Vec3::new(0.5, 0.0, -1.0), Quat::from_rotation_x(0.3));

        let composed = parent.compose(&child).to_matrix();
        let product = parent.to_matrix() * child.to_matrix();
        let p = Vec3::new(0.2, -0.7, 1.1);
        assert!(approx_eq(composed.transform_point3(p), product.transform_point3(p)));
    }

    #[test]
    fn test_inverse_round_trip() {
        let t = Transform3D {
            position: Vec3::new(3.0, -1.0, 2.0),
            rotation: Quat::from_rotation_z(1.2),
            scale: Vec3::splat(0.5),
        };
        let p = Vec3::new(1.0, 2.0, 3.0);
        let back = t.inverse().transform_point(t.transform_point(p));
        assert!(approx_eq(back, p));
    }

    #[test]
    fn test_blend_endpoints() {
        let a = Transform3D::identity();
        let b = Transform3D::from_position(Vec3::new(4.0, 0.0, 0.0));
        assert!(approx_eq(a.blend(&b, 0.0).position, Vec3::ZERO));
        assert!(approx_eq(a.blend(&b, 0.5).position, Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_negative_scaling() {
        let mut t = Transform3D::identity();
        assert!(!t.is_negative_scaling());
        t.scale = Vec3::new(-1.0, 1.0, 1.0);
        assert!(t.is_negative_scaling());
    }

    #[test]
    fn test_serialization() {
        let t = Transform3D::from_position(Vec3::new(1.0, 2.0, 3.0));
        let ron_str = ron::to_string(&t).unwrap();
        let back: Transform3D = ron::from_str(&ron_str).unwrap();
        assert_eq!(t, back);
    }
}
