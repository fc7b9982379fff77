//! Physics capability for the Strata runtime
//!
//! This crate provides:
//! - [`PhysicsEnvironment`] - the narrow interface scenes use to drive a physics backend
//! - Controller handles and snapshots ([`ControllerKey`], [`ControllerDesc`])
//! - [`PhysicsWorld`] - a small reference environment with gravity integration and
//!   a flat culling list

pub mod controller;
pub mod environment;
pub mod world;

// Re-export commonly used types
pub use controller::{
    ConstraintId, ConstraintKind, ControllerDesc, ControllerFlags, ControllerKey, ControllerKind,
    MotionState,
};
pub use environment::{CullingQuery, PhysicsEnvironment};
pub use world::{PhysicsConfig, PhysicsWorld};
