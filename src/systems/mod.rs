//! Engine systems
//!
//! The tick and render halves of the engine, kept apart from the engine state
//! for testability.

mod render;
mod simulation;

pub use render::{framerate_line, profile_lines, RenderSystem};
pub use simulation::{SimulationSystem, TickParams};
