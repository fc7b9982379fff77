//! The physics environment capability
//!
//! The runtime never integrates bodies itself. Each physics-enabled scene
//! owns one boxed [`PhysicsEnvironment`] and sequences calls into it.

use std::collections::HashMap;

use glam::{Mat4, Vec3, Vec4};

use crate::controller::{ConstraintId, ConstraintKind, ControllerDesc, ControllerKey, MotionState};

/// Frustum handed to [`PhysicsEnvironment::culling_test`]
///
/// Planes are `(normal, d)` with the inside satisfying `dot(n, p) + d >= 0`.
#[derive(Clone, Copy, Debug)]
pub struct CullingQuery<'a> {
    pub planes: &'a [Vec4; 6],
    /// Viewport as `[x, y, width, height]`
    pub viewport: [i32; 4],
    pub matrix: Mat4,
}

/// Physics backend owned by a scene
pub trait PhysicsEnvironment: Send {
    /// Advance the simulation. Returns false if the backend skipped the step.
    fn step_simulation(&mut self, cur_time: f64, timestep: f64, framestep: f64) -> bool;

    fn gravity(&self) -> Vec3;
    fn set_gravity(&mut self, gravity: Vec3);

    fn add_controller(&mut self, desc: ControllerDesc) -> ControllerKey;
    fn remove_controller(&mut self, key: ControllerKey) -> Option<ControllerDesc>;
    fn controller(&self, key: ControllerKey) -> Option<ControllerDesc>;
    fn controller_count(&self) -> usize;

    /// Duplicate a controller for a replicated object.
    fn replicate_controller(&mut self, key: ControllerKey) -> Option<ControllerKey> {
        let desc = self.controller(key)?;
        Some(self.add_controller(desc))
    }

    /// Make a controller kinematic. Ghosts also stop colliding.
    fn suspend_dynamics(&mut self, key: ControllerKey, ghost: bool);
    fn restore_dynamics(&mut self, key: ControllerKey);
    fn is_dynamics_suspended(&self, key: ControllerKey) -> bool;

    fn motion_state(&self, key: ControllerKey) -> Option<MotionState>;
    fn set_motion_state(&mut self, key: ControllerKey, state: MotionState);

    /// Add or remove a graphic controller from the culling tree.
    fn activate_graphic_controller(&mut self, key: ControllerKey, active: bool);

    fn add_constraint(
        &mut self,
        a: ControllerKey,
        b: ControllerKey,
        kind: ConstraintKind,
    ) -> Option<ConstraintId>;
    fn constraint_count(&self) -> usize;

    /// Test the culling tree against a frustum.
    ///
    /// Returns the visible graphic controllers, or `None` if the backend has
    /// no culling tree and the caller should fall back to its own test.
    fn culling_test(&self, query: &CullingQuery<'_>) -> Option<Vec<ControllerKey>>;

    /// Remove every controller, returning the old keys and their state.
    fn take_controllers(&mut self) -> Vec<(ControllerKey, ControllerDesc)>;

    /// Move every controller of `other` into this environment.
    ///
    /// Returns the mapping from `other`'s keys to the new keys. Constraints
    /// of `other` are dropped; callers relink them.
    fn merge_environment(
        &mut self,
        other: &mut dyn PhysicsEnvironment,
    ) -> HashMap<ControllerKey, ControllerKey> {
        other
            .take_controllers()
            .into_iter()
            .map(|(old, desc)| (old, self.add_controller(desc)))
            .collect()
    }
}
