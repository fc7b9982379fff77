//! Strata - game engine runtime core
//!
//! The engine orchestrator and its systems, on top of the scene graph in
//! [`strata_core`] and the render scheduler in [`strata_render`].

pub mod config;
pub mod engine;
pub mod systems;

pub use config::{AppConfig, ConfigError};
pub use engine::{Engine, EngineFlags, EngineSettings, EngineState};
