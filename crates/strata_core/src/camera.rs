//! Camera parameters and view frusta

use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::framing::Viewport;

/// Name of the camera created for scenes that have none
pub const DEFAULT_CAMERA_NAME: &str = "__default__cam__";

/// Lens and rendering parameters of a camera object
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraData {
    /// Vertical field of view in radians
    #[serde(default = "default_fov")]
    pub fov_y: f32,
    #[serde(default = "default_near")]
    pub near: f32,
    #[serde(default = "default_far")]
    pub far: f32,
    #[serde(default = "default_true")]
    pub perspective: bool,
    /// Width of the orthographic view volume
    #[serde(default = "default_ortho_scale")]
    pub ortho_scale: f32,
    /// Lens shift as a fraction of the view size
    #[serde(default)]
    pub shift: [f32; 2],
    /// Explicit viewport; cameras with one render even when not active
    #[serde(default)]
    pub viewport: Option<Viewport>,
    #[serde(default = "default_true")]
    pub frustum_culling: bool,
    #[serde(default = "default_lod_factor")]
    pub lod_factor: f32,
    #[serde(default)]
    pub activity_culling: bool,
    /// Stereo convergence distance
    #[serde(default = "default_focal_length")]
    pub focal_length: f32,
    #[serde(default)]
    pub show_frustum: bool,
}

fn default_fov() -> f32 {
    49.1_f32.to_radians()
}

fn default_near() -> f32 {
    0.1
}

fn default_far() -> f32 {
    100.0
}

fn default_true() -> bool {
    true
}

fn default_ortho_scale() -> f32 {
    7.0
}

fn default_lod_factor() -> f32 {
    1.0
}

fn default_focal_length() -> f32 {
    10.0
}

impl Default for CameraData {
    fn default() -> Self {
        Self {
            fov_y: default_fov(),
            near: default_near(),
            far: default_far(),
            perspective: true,
            ortho_scale: default_ortho_scale(),
            shift: [0.0, 0.0],
            viewport: None,
            frustum_culling: true,
            lod_factor: default_lod_factor(),
            activity_culling: false,
            focal_length: default_focal_length(),
            show_frustum: false,
        }
    }
}

impl CameraData {
    /// True if the camera renders into its own viewport
    pub fn use_viewport(&self) -> bool {
        self.viewport.is_some()
    }

    /// Projection for an aspect ratio
    ///
    /// `eye_offset` is the horizontal stereo eye displacement (0 for mono);
    /// the frustum is skewed so both eyes converge at `focal_length`.
    pub fn projection(&self, aspect: f32, eye_offset: f32) -> Mat4 {
        if self.perspective {
            let half_h = self.near * (self.fov_y * 0.5).tan();
            let half_w = half_h * aspect;
            let shift_x = self.shift[0] * 2.0 * half_w;
            let shift_y = self.shift[1] * 2.0 * half_h;
            let stereo = if self.focal_length > 0.0 {
                -eye_offset * self.near / self.focal_length
            } else {
                0.0
            };
            frustum_matrix(
                -half_w + shift_x + stereo,
                half_w + shift_x + stereo,
                -half_h + shift_y,
                half_h + shift_y,
                self.near,
                self.far,
            )
        } else {
            let half_w = self.ortho_scale * 0.5;
            let half_h = half_w / aspect.max(1e-6);
            Mat4::orthographic_rh_gl(-half_w, half_w, -half_h, half_h, self.near, self.far)
        }
    }
}

/// OpenGL-style off-axis perspective matrix
pub fn frustum_matrix(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let rl = right - left;
    let tb = top - bottom;
    let fnr = far - near;
    Mat4::from_cols(
        Vec4::new(2.0 * near / rl, 0.0, 0.0, 0.0),
        Vec4::new(0.0, 2.0 * near / tb, 0.0, 0.0),
        Vec4::new((right + left) / rl, (top + bottom) / tb, -(far + near) / fnr, -1.0),
        Vec4::new(0.0, 0.0, -2.0 * far * near / fnr, 0.0),
    )
}

/// Six clip planes of a view-projection matrix
///
/// Planes are `(normal, d)`, normalized, pointing inward.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frustum {
    pub planes: [Vec4; 6],
    pub matrix: Mat4,
}

impl Frustum {
    /// Extract planes from `projection * view`
    pub fn from_matrix(matrix: Mat4) -> Self {
        let r0 = matrix.row(0);
        let r1 = matrix.row(1);
        let r2 = matrix.row(2);
        let r3 = matrix.row(3);
        let planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r3 + r2, r3 - r2].map(normalize_plane);
        Self { planes, matrix }
    }

    pub fn contains_point(&self, p: Vec3) -> bool {
        self.contains_sphere(p, 0.0)
    }

    /// True if the sphere intersects or lies inside the frustum
    pub fn contains_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.truncate().dot(center) + plane.w >= -radius)
    }
}

fn normalize_plane(plane: Vec4) -> Vec4 {
    let len = plane.truncate().length();
    if len > 1e-12 {
        plane / len
    } else {
        plane
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera_frustum(data: &CameraData) -> Frustum {
        // Camera at origin looking down -Z
        Frustum::from_matrix(data.projection(1.0, 0.0) * Mat4::IDENTITY)
    }

    #[test]
    fn test_defaults() {
        let data = CameraData::default();
        assert!(data.perspective);
        assert!(data.frustum_culling);
        assert!(!data.use_viewport());
    }

    #[test]
    fn test_frustum_matrix_matches_symmetric_perspective() {
        let data = CameraData::default();
        let ours = data.projection(1.5, 0.0);
        let glam = Mat4::perspective_rh_gl(data.fov_y, 1.5, data.near, data.far);
        assert!(ours.abs_diff_eq(glam, 1e-5));
    }

    #[test]
    fn test_frustum_contains() {
        let frustum = camera_frustum(&CameraData::default());
        assert!(frustum.contains_point(Vec3::new(0.0, 0.0, -5.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 5.0)));
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -500.0)));
        // Behind the camera but large enough to reach the near plane
        assert!(frustum.contains_sphere(Vec3::new(0.0, 0.0, 1.0), 2.0));
    }

    #[test]
    fn test_stereo_offsets_skew_frustum() {
        let data = CameraData::default();
        let left = data.projection(1.0, -0.05);
        let right = data.projection(1.0, 0.05);
        // Column 2 x holds the horizontal skew
        assert!(left.z_axis.x > 0.0);
        assert!(right.z_axis.x < 0.0);
    }

    #[test]
    fn test_orthographic() {
        let data = CameraData {
            perspective: false,
            ortho_scale: 10.0,
            ..CameraData::default()
        };
        let frustum = camera_frustum(&data);
        assert!(frustum.contains_point(Vec3::new(4.9, 0.0, -1.0)));
        assert!(!frustum.contains_point(Vec3::new(5.1, 0.0, -1.0)));
    }
}
