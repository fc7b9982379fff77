//! Core runtime for the Strata engine
//!
//! This crate provides the simulation side of the engine:
//!
//! - [`FrameScheduler`] - fixed/variable step clock deciding how many logic frames run
//! - [`Scene`] - object arena, scenegraph and per-tick phases
//! - [`GameObject`] - a scene object with transform, kind, properties and controllers
//! - [`SceneRegistry`] - ordered list of active scenes with deferred changes
//! - [`SceneConverter`] - turns scene names into populated scenes
//! - [`SceneTemplate`] - loadable/saveable scene description

pub mod animation;
pub mod camera;
pub mod clock;
pub mod converter;
pub mod error;
pub mod exit;
pub mod framing;
pub mod input;
pub mod library;
pub mod logic;
pub mod managers;
pub mod network;
pub mod node;
pub mod object;
pub mod profiling;
pub mod registry;
pub mod scene;
pub mod template;
pub mod transform;

pub use animation::{ActionLayer, ActionManager, AnimationPool, AnimationTask};
pub use camera::{CameraData, Frustum, DEFAULT_CAMERA_NAME};
pub use clock::{FrameScheduler, FrameTimes, MonotonicClock, TimeSource};
pub use converter::{SceneConverter, SourceSceneId, TemplateConverter};
pub use error::{RegistryError, SceneError};
pub use exit::{ExitCode, ExitInfo};
pub use framing::{FrameSettings, FramingKind, Viewport};
pub use input::{InputDevice, InputEvents, InputStatus};
pub use library::{LibLoadHandle, LibLoadStatus, LibraryLoader};
pub use logic::{DrawCallbacks, SceneLogic};
pub use network::{NetworkMessage, NetworkMessageManager, NetworkMessageScene, SharedMessages};
pub use node::{ParentRelation, SpatialNode};
pub use object::{GameObject, ObjectKind, Property};
pub use profiling::{TimeCategory, TimeCategoryLogger};
pub use registry::{AddPolicy, CameraOverride, PostProcess, SceneRegistry};
pub use scene::{Scene, SceneId, SceneSettings};
pub use template::{ObjectTemplate, SceneLoadError, SceneSaveError, SceneTemplate};
pub use transform::Transform3D;

// Re-export physics types for convenient access through strata_core
pub use strata_physics::{ControllerKey, PhysicsConfig, PhysicsEnvironment, PhysicsWorld};
