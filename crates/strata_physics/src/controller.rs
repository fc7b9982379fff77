//! Controller handles and descriptions
//!
//! Controllers are owned by a physics environment. Game objects only hold
//! [`ControllerKey`]s and ask the environment for everything else.

use bitflags::bitflags;
use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Key to a controller in a physics environment
    ///
    /// Generational: a key to a removed controller never aliases a newer one.
    pub struct ControllerKey;
}

bitflags! {
    /// Simulation state of a controller
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ControllerFlags: u8 {
        /// Integrated by the solver
        const DYNAMIC = 1 << 0;
        /// Gravity is applied while dynamic
        const GRAVITY = 1 << 1;
        /// Dynamics suspended (kinematic, follows its node)
        const SUSPENDED = 1 << 2;
        /// Suspended as a ghost: no collision response either
        const GHOST = 1 << 3;
        /// Graphic controller registered in the culling tree
        const CULLING_ACTIVE = 1 << 4;
    }
}

/// What a controller is used for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControllerKind {
    /// Rigid body driven by the solver
    Rigid,
    /// Static collider, never moves on its own
    Static,
    /// Bounding volume in the culling tree
    Graphic,
}

/// Backend-agnostic snapshot of a controller
///
/// Used to create controllers and to move them between environments.
#[derive(Clone, Debug, PartialEq)]
pub struct ControllerDesc {
    pub kind: ControllerKind,
    pub position: Vec3,
    pub orientation: Quat,
    pub linear_velocity: Vec3,
    pub mass: f32,
    /// Bounding sphere radius, used for culling
    pub radius: f32,
    pub flags: ControllerFlags,
}

impl ControllerDesc {
    /// A dynamic rigid body affected by gravity
    pub fn rigid(position: Vec3, mass: f32) -> Self {
        Self {
            kind: ControllerKind::Rigid,
            position,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            mass,
            radius: 1.0,
            flags: ControllerFlags::DYNAMIC | ControllerFlags::GRAVITY,
        }
    }

    /// A static collider
    pub fn fixed(position: Vec3) -> Self {
        Self {
            kind: ControllerKind::Static,
            position,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            mass: 0.0,
            radius: 1.0,
            flags: ControllerFlags::empty(),
        }
    }

    /// A culling volume (bounding sphere)
    pub fn graphic(position: Vec3, radius: f32) -> Self {
        Self {
            kind: ControllerKind::Graphic,
            position,
            orientation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            mass: 0.0,
            radius,
            flags: ControllerFlags::empty(),
        }
    }

    /// Builder: set the orientation
    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    /// Builder: set the bounding radius
    pub fn with_radius(mut self, radius: f32) -> Self {
        self.radius = radius;
        self
    }

    /// True if the solver should integrate this controller
    pub fn is_simulated(&self) -> bool {
        self.kind == ControllerKind::Rigid
            && self.flags.contains(ControllerFlags::DYNAMIC)
            && !self.flags.contains(ControllerFlags::SUSPENDED)
    }
}

/// World-space pose written back to a game object's node after a step
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionState {
    pub position: Vec3,
    pub orientation: Quat,
}

/// Kind of constraint between two controllers
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    Point,
    Hinge,
    Fixed,
}

/// Identifier of a constraint inside one environment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConstraintId(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rigid_is_simulated() {
        let desc = ControllerDesc::rigid(Vec3::ZERO, 1.0);
        assert!(desc.is_simulated());
    }

    #[test]
    fn test_suspended_is_not_simulated() {
        let mut desc = ControllerDesc::rigid(Vec3::ZERO, 1.0);
        desc.flags.insert(ControllerFlags::SUSPENDED);
        assert!(!desc.is_simulated());
    }

    #[test]
    fn test_static_and_graphic_never_simulated() {
        assert!(!ControllerDesc::fixed(Vec3::ONE).is_simulated());
        assert!(!ControllerDesc::graphic(Vec3::ONE, 2.0).is_simulated());
    }

    #[test]
    fn test_builders() {
        let desc = ControllerDesc::graphic(Vec3::ZERO, 1.0)
            .with_radius(3.0)
            .with_orientation(Quat::from_rotation_y(1.0));
        assert_eq!(desc.radius, 3.0);
        assert!((desc.orientation.length() - 1.0).abs() < 1e-6);
    }
}
