//! Stereo modes, eyes, offscreen targets and display areas

use serde::{Deserialize, Serialize};
use strata_core::framing::Viewport;

/// How the two eyes of a stereo setup reach the screen
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StereoMode {
    #[default]
    None,
    QuadBuffer,
    AboveBelow,
    SideBySide,
    Interlaced,
    Anaglyph,
    VInterlace,
}

impl StereoMode {
    pub fn is_stereo(self) -> bool {
        self != StereoMode::None
    }

    /// True when each eye needs its own offscreen frame, composited afterwards
    pub fn renders_per_eye(self) -> bool {
        matches!(self, StereoMode::Interlaced | StereoMode::Anaglyph | StereoMode::VInterlace)
    }

    pub fn eye_count(self) -> usize {
        if self.is_stereo() {
            2
        } else {
            1
        }
    }

    pub fn frame_count(self) -> usize {
        if self.renders_per_eye() {
            2
        } else {
            1
        }
    }
}

/// One eye of the viewer; mono rendering uses the left eye
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StereoEye {
    #[default]
    Left,
    Right,
}

impl StereoEye {
    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            StereoEye::Left
        } else {
            StereoEye::Right
        }
    }

    pub fn index(self) -> usize {
        match self {
            StereoEye::Left => 0,
            StereoEye::Right => 1,
        }
    }

    /// Horizontal camera offset of this eye for a given eye separation
    pub fn offset(self, mode: StereoMode, separation: f32) -> f32 {
        if !mode.is_stereo() {
            return 0.0;
        }
        match self {
            StereoEye::Left => -separation * 0.5,
            StereoEye::Right => separation * 0.5,
        }
    }
}

/// Logical offscreen render target
///
/// Each eye owns two targets used in ping-pong by the scene post-filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OffScreenKind {
    EyeLeft0,
    EyeLeft1,
    EyeRight0,
    EyeRight1,
}

impl OffScreenKind {
    /// First target of a frame rendering `eye`
    pub fn for_eye(eye: StereoEye) -> Self {
        match eye {
            StereoEye::Left => OffScreenKind::EyeLeft0,
            StereoEye::Right => OffScreenKind::EyeRight0,
        }
    }

    /// The other target of the same eye
    pub fn next(self) -> Self {
        match self {
            OffScreenKind::EyeLeft0 => OffScreenKind::EyeLeft1,
            OffScreenKind::EyeLeft1 => OffScreenKind::EyeLeft0,
            OffScreenKind::EyeRight0 => OffScreenKind::EyeRight1,
            OffScreenKind::EyeRight1 => OffScreenKind::EyeRight0,
        }
    }
}

/// Renderer-wide settings read while scheduling
#[derive(Clone, Debug, PartialEq)]
pub struct RenderSettings {
    pub stereo_mode: StereoMode,
    pub eye_separation: f32,
    /// Stereo convergence distance used when a camera does not set its own
    pub focal_length: f32,
    /// Schedule shadow and reflection texture passes
    pub textured: bool,
    /// Color of the framing bars
    pub bar_color: [f32; 3],
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            stereo_mode: StereoMode::None,
            eye_separation: 0.1,
            focal_length: 10.0,
            textured: true,
            bar_color: [0.0, 0.0, 0.0],
        }
    }
}

impl RenderSettings {
    /// Screen area available to `eye` on a `width x height` canvas
    pub fn render_area(&self, width: u32, height: u32, eye: StereoEye) -> Viewport {
        let full = Viewport::full(width, height);
        match self.stereo_mode {
            StereoMode::SideBySide => {
                let half = full.width() / 2;
                match eye {
                    StereoEye::Left => Viewport::new(0, 0, half, full.top),
                    StereoEye::Right => Viewport::new(half, 0, full.right, full.top),
                }
            }
            StereoMode::AboveBelow => {
                let half = full.height() / 2;
                match eye {
                    StereoEye::Left => Viewport::new(0, half, full.right, full.top),
                    StereoEye::Right => Viewport::new(0, 0, full.right, half),
                }
            }
            _ => full,
        }
    }
}
