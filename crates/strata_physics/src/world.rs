//! Reference physics environment
//!
//! A small explicit-Euler environment. It integrates gravity and velocity for
//! dynamic controllers, keeps a flat culling list of graphic controllers and
//! records constraints. Scenes converted with physics enabled use it unless a
//! host installs another backend.

use glam::{Vec3, Vec4};
use slotmap::SlotMap;

use crate::controller::{
    ConstraintId, ConstraintKind, ControllerDesc, ControllerFlags, ControllerKey, ControllerKind,
    MotionState,
};
use crate::environment::{CullingQuery, PhysicsEnvironment};

/// Configuration for the reference environment
#[derive(Clone, Debug)]
pub struct PhysicsConfig {
    /// Gravity acceleration in world space
    pub gravity: Vec3,
    /// Whether `culling_test` answers queries (otherwise returns `None`)
    pub culling_tree: bool,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, 0.0, -9.81),
            culling_tree: true,
        }
    }
}

impl PhysicsConfig {
    /// Create a new physics config with the given gravity
    pub fn new(gravity: Vec3) -> Self {
        Self {
            gravity,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug)]
struct Constraint {
    id: ConstraintId,
    a: ControllerKey,
    b: ControllerKey,
    #[allow(dead_code)]
    kind: ConstraintKind,
}

/// The reference physics environment
pub struct PhysicsWorld {
    controllers: SlotMap<ControllerKey, ControllerDesc>,
    constraints: Vec<Constraint>,
    next_constraint: u32,
    steps: u64,
    simulated_time: f64,
    pub config: PhysicsConfig,
}

impl Default for PhysicsWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl PhysicsWorld {
    /// Create a new physics world with default configuration
    pub fn new() -> Self {
        Self::with_config(PhysicsConfig::default())
    }

    /// Create a new physics world with custom configuration
    pub fn with_config(config: PhysicsConfig) -> Self {
        Self {
            controllers: SlotMap::with_key(),
            constraints: Vec::new(),
            next_constraint: 0,
            steps: 0,
            simulated_time: 0.0,
            config,
        }
    }

    /// Number of steps taken so far
    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Total framestep time integrated so far
    pub fn simulated_time(&self) -> f64 {
        self.simulated_time
    }

    /// Set the linear velocity of a controller
    pub fn set_linear_velocity(&mut self, key: ControllerKey, velocity: Vec3) {
        if let Some(ctrl) = self.controllers.get_mut(key) {
            ctrl.linear_velocity = velocity;
        }
    }

    fn sphere_in_planes(planes: &[Vec4; 6], center: Vec3, radius: f32) -> bool {
        planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }
}

impl PhysicsEnvironment for PhysicsWorld {
    fn step_simulation(&mut self, _cur_time: f64, _timestep: f64, framestep: f64) -> bool {
        if framestep <= 0.0 {
            return false;
        }
        let dt = framestep as f32;
        let gravity = self.config.gravity;

        for (_key, ctrl) in &mut self.controllers {
            if !ctrl.is_simulated() {
                continue;
            }
            if ctrl.flags.contains(ControllerFlags::GRAVITY) {
                ctrl.linear_velocity += gravity * dt;
            }
            ctrl.position += ctrl.linear_velocity * dt;
        }

        self.steps += 1;
        self.simulated_time += framestep;
        true
    }

    fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    fn set_gravity(&mut self, gravity: Vec3) {
        self.config.gravity = gravity;
    }

    fn add_controller(&mut self, desc: ControllerDesc) -> ControllerKey {
        self.controllers.insert(desc)
    }

    fn remove_controller(&mut self, key: ControllerKey) -> Option<ControllerDesc> {
        self.constraints.retain(|c| c.a != key && c.b != key);
        self.controllers.remove(key)
    }

    fn controller(&self, key: ControllerKey) -> Option<ControllerDesc> {
        self.controllers.get(key).cloned()
    }

    fn controller_count(&self) -> usize {
        self.controllers.len()
    }

    fn replicate_controller(&mut self, key: ControllerKey) -> Option<ControllerKey> {
        let mut desc = self.controllers.get(key)?.clone();
        // Replicas start at rest and outside the culling tree.
        desc.linear_velocity = Vec3::ZERO;
        desc.flags.remove(ControllerFlags::CULLING_ACTIVE);
        Some(self.controllers.insert(desc))
    }

    fn suspend_dynamics(&mut self, key: ControllerKey, ghost: bool) {
        if let Some(ctrl) = self.controllers.get_mut(key) {
            ctrl.flags.insert(ControllerFlags::SUSPENDED);
            ctrl.flags.set(ControllerFlags::GHOST, ghost);
        }
    }

    fn restore_dynamics(&mut self, key: ControllerKey) {
        if let Some(ctrl) = self.controllers.get_mut(key) {
            ctrl.flags.remove(ControllerFlags::SUSPENDED | ControllerFlags::GHOST);
        }
    }

    fn is_dynamics_suspended(&self, key: ControllerKey) -> bool {
        self.controllers
            .get(key)
            .is_some_and(|c| c.flags.contains(ControllerFlags::SUSPENDED))
    }

    fn motion_state(&self, key: ControllerKey) -> Option<MotionState> {
        self.controllers.get(key).map(|c| MotionState {
            position: c.position,
            orientation: c.orientation,
        })
    }

    fn set_motion_state(&mut self, key: ControllerKey, state: MotionState) {
        if let Some(ctrl) = self.controllers.get_mut(key) {
            ctrl.position = state.position;
            ctrl.orientation = state.orientation;
        }
    }

    fn activate_graphic_controller(&mut self, key: ControllerKey, active: bool) {
        if let Some(ctrl) = self.controllers.get_mut(key) {
            ctrl.flags.set(ControllerFlags::CULLING_ACTIVE, active);
        }
    }

    fn add_constraint(
        &mut self,
        a: ControllerKey,
        b: ControllerKey,
        kind: ConstraintKind,
    ) -> Option<ConstraintId> {
        if !self.controllers.contains_key(a) || !self.controllers.contains_key(b) {
            log::warn!("constraint between unknown controllers ignored");
            return None;
        }
        let id = ConstraintId(self.next_constraint);
        self.next_constraint += 1;
        self.constraints.push(Constraint { id, a, b, kind });
        Some(id)
    }

    fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    fn culling_test(&self, query: &CullingQuery<'_>) -> Option<Vec<ControllerKey>> {
        if !self.config.culling_tree {
            return None;
        }
        let visible = self
            .controllers
            .iter()
            .filter(|(_, c)| {
                c.kind == ControllerKind::Graphic
                    && c.flags.contains(ControllerFlags::CULLING_ACTIVE)
                    && Self::sphere_in_planes(query.planes, c.position, c.radius)
            })
            .map(|(key, _)| key)
            .collect();
        Some(visible)
    }

    fn take_controllers(&mut self) -> Vec<(ControllerKey, ControllerDesc)> {
        self.constraints.clear();
        self.controllers.drain().collect()
    }
}

impl std::fmt::Debug for PhysicsWorld {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsWorld")
            .field("controllers", &self.controllers.len())
            .field("constraints", &self.constraints.len())
            .field("gravity", &self.config.gravity)
            .finish()
    }
}
