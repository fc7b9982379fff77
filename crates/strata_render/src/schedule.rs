//! Render schedule data
//!
//! A [`RenderSchedule`] is a plain description of one frame: which offscreen
//! frames exist, which eyes each renders, and per scene which cameras and
//! texture passes draw, with matrices frozen when the schedule was built.

use bitflags::bitflags;
use glam::{Mat4, Vec3};
use strata_core::camera::Frustum;
use strata_core::framing::Viewport;
use strata_core::object::ObjectKey;

use crate::stereo::{OffScreenKind, StereoEye, StereoMode};

bitflags! {
    /// Buffers cleared by a clear call
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
    }
}

bitflags! {
    /// Options of a texture render pass
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct TextureRenderMode: u8 {
        /// Pick levels of detail from the pass viewpoint
        const UPDATE_LOD = 1 << 0;
        /// Draw the world background before the objects
        const RENDER_WORLD = 1 << 1;
    }
}

/// What a texture pass renders into
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureTarget {
    /// Shadow map of a light object
    Shadow { light: ObjectKey },
    /// Planar reflection of a texture renderer
    Planar { renderer: usize },
    /// One face (0..6) of a cube map renderer
    Cube { renderer: usize, face: u8 },
}

/// One camera drawing one eye of one scene
#[derive(Clone, Debug, PartialEq)]
pub struct CameraSchedule {
    pub camera: ObjectKey,
    pub eye: StereoEye,
    pub stereo_mode: StereoMode,
    /// Area the camera was given before framing
    pub area: Viewport,
    /// Viewport after framing
    pub viewport: Viewport,
    pub view: Mat4,
    pub projection: Mat4,
    pub negative_scale: bool,
    pub perspective: bool,
    pub focal_length: f32,
    /// Culling viewpoint; the override culling camera when one is set
    pub position: Vec3,
    pub frustum: Frustum,
    pub culling: bool,
    pub lod_factor: f32,
    /// Viewport index within the scene
    pub index: u32,
}

/// An offscreen pass rendering a scene into a texture
#[derive(Clone, Debug, PartialEq)]
pub struct TextureRenderSchedule {
    pub target: TextureTarget,
    pub mode: TextureRenderMode,
    pub clear: ClearFlags,
    pub eye: StereoEye,
    pub view: Mat4,
    pub projection: Mat4,
    pub position: Vec3,
    pub frustum: Frustum,
    pub layers: u32,
    pub lod_factor: f32,
    pub index: u32,
}

/// Everything one scene draws in a frame
#[derive(Clone, Debug, PartialEq)]
pub struct SceneSchedule {
    /// Index of the scene in the registry list
    pub scene: usize,
    pub name: String,
    /// Camera schedules per eye index
    pub cameras: [Vec<CameraSchedule>; 2],
    /// Shadow passes first, then reflection passes
    pub textures: Vec<TextureRenderSchedule>,
}

impl SceneSchedule {
    pub fn new(scene: usize, name: impl Into<String>) -> Self {
        Self {
            scene,
            name: name.into(),
            cameras: [Vec::new(), Vec::new()],
            textures: Vec::new(),
        }
    }

    pub fn cameras_for(&self, eye: StereoEye) -> &[CameraSchedule] {
        &self.cameras[eye.index()]
    }
}

/// One offscreen frame and the eyes rendered into it
#[derive(Clone, Debug, PartialEq)]
pub struct FrameSchedule {
    /// Current target; updated by post-filters while rendering
    pub offscreen: OffScreenKind,
    pub eyes: Vec<StereoEye>,
}

/// Complete plan of one rendered frame
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSchedule {
    pub stereo_mode: StereoMode,
    /// Two frames composited by the stereo step
    pub render_per_eye: bool,
    pub frames: Vec<FrameSchedule>,
    pub scenes: Vec<SceneSchedule>,
    /// Color the whole canvas is cleared with
    pub bar_color: [f32; 3],
}

impl RenderSchedule {
    pub fn camera_count(&self) -> usize {
        self.scenes
            .iter()
            .map(|s| s.cameras.iter().map(Vec::len).sum::<usize>())
            .sum()
    }

    pub fn texture_count(&self) -> usize {
        self.scenes.iter().map(|s| s.textures.len()).sum()
    }
}
