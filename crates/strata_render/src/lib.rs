//! Render scheduling for the Strata runtime
//!
//! This crate turns the active scenes into a per-frame plan and walks it:
//!
//! - [`ScheduleBuilder`] - freezes cameras, viewports, frusta and texture passes into a [`RenderSchedule`]
//! - [`ScheduleExecutor`] - sequences offscreen binds, clears, draws, filters and the final composite
//! - [`RenderBackend`] - the canvas/rasterizer calls the executor makes; [`HeadlessBackend`] records them
//!
//! Stereo rendering is described by [`StereoMode`]; each eye owns a pair of
//! ping-pong offscreen targets ([`OffScreenKind`]).

pub mod backend;
pub mod builder;
pub mod executor;
pub mod schedule;
pub mod stereo;

pub use backend::{BackendCall, HeadlessBackend, RenderBackend};
pub use builder::ScheduleBuilder;
pub use executor::{DebugDraw, DebugMode, ScheduleExecutor};
pub use schedule::{
    CameraSchedule, ClearFlags, FrameSchedule, RenderSchedule, SceneSchedule, TextureRenderMode,
    TextureRenderSchedule, TextureTarget,
};
pub use stereo::{OffScreenKind, RenderSettings, StereoEye, StereoMode};
