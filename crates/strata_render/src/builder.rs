//! Render schedule construction
//!
//! [`ScheduleBuilder::build`] walks the active scenes once per frame and
//! freezes every camera's matrices, culling frustum and viewport into a
//! [`RenderSchedule`]. Display areas are computed once per eye and shared by
//! all scenes.

use glam::{Mat4, Vec3, Vec4};
use strata_core::camera::Frustum;
use strata_core::framing::Viewport;
use strata_core::managers::TextureRendererKind;
use strata_core::object::{LightKind, ObjectKey};
use strata_core::scene::Scene;
use strata_core::transform::Transform3D;

use crate::schedule::{
    CameraSchedule, ClearFlags, FrameSchedule, RenderSchedule, SceneSchedule, TextureRenderMode,
    TextureRenderSchedule, TextureTarget,
};
use crate::stereo::{OffScreenKind, RenderSettings, StereoEye};

/// Near/far range of cube map faces
const CUBE_CLIP: (f32, f32) = (0.1, 100.0);

/// Builds a [`RenderSchedule`] from scene and camera state
#[derive(Clone, Debug, Default)]
pub struct ScheduleBuilder {
    settings: RenderSettings,
}

impl ScheduleBuilder {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RenderSettings {
        &mut self.settings
    }

    /// Schedule one frame for a `width x height` canvas
    ///
    /// Runs each scene's pre-draw-setup callbacks once per camera schedule.
    pub fn build(&self, scenes: &mut [Scene], width: u32, height: u32) -> RenderSchedule {
        let mode = self.settings.stereo_mode;
        let eye_count = mode.eye_count();

        let frames = (0..mode.frame_count())
            .map(|index| {
                let eye = StereoEye::from_index(index);
                let eyes = if !mode.is_stereo() {
                    vec![StereoEye::Left]
                } else if mode.renders_per_eye() {
                    vec![eye]
                } else {
                    vec![StereoEye::Left, StereoEye::Right]
                };
                FrameSchedule {
                    offscreen: OffScreenKind::for_eye(eye),
                    eyes,
                }
            })
            .collect();

        let areas: Vec<Viewport> = (0..eye_count)
            .map(|eye| self.settings.render_area(width, height, StereoEye::from_index(eye)))
            .collect();

        let mut schedules = Vec::with_capacity(scenes.len());
        for (index, scene) in scenes.iter_mut().enumerate() {
            let mut schedule = SceneSchedule::new(index, scene.name());
            let active = scene.active_camera();
            let override_camera = scene.override_culling_camera();
            let cameras: Vec<ObjectKey> = scene
                .cameras()
                .iter()
                .copied()
                .filter(|key| {
                    Some(*key) == active
                        || scene
                            .object(*key)
                            .and_then(|o| o.camera())
                            .is_some_and(|c| c.use_viewport())
                })
                .collect();

            let mut viewport_index = 0;
            for camera in cameras {
                for (eye, area) in areas.iter().enumerate() {
                    let eye = StereoEye::from_index(eye);
                    if let Some(cs) = self.camera_schedule(scene, camera, override_camera, *area, eye, viewport_index) {
                        schedule.cameras[eye.index()].push(cs);
                        viewport_index += 1;
                        scene.run_pre_draw_setup(Some(camera));
                    }
                }
            }

            if self.settings.textured {
                schedule.textures.extend(shadow_schedules(scene));
                schedule.textures.extend(texture_schedules(scene, &schedule));
            }
            schedules.push(schedule);
        }

        log::trace!(
            "Scheduled {} frames, {} scenes",
            mode.frame_count(),
            schedules.len()
        );
        RenderSchedule {
            stereo_mode: mode,
            render_per_eye: mode.renders_per_eye(),
            frames,
            scenes: schedules,
            bar_color: self.settings.bar_color,
        }
    }

    fn camera_schedule(
        &self,
        scene: &Scene,
        camera: ObjectKey,
        override_camera: Option<ObjectKey>,
        display_area: Viewport,
        eye: StereoEye,
        index: u32,
    ) -> Option<CameraSchedule> {
        let object = scene.object(camera)?;
        let data = object.camera()?;
        let mode = self.settings.stereo_mode;

        let area = data.viewport.unwrap_or(display_area);
        let viewport = scene.settings.frame.compute_viewport(&area);
        let eye_offset = eye.offset(mode, self.settings.eye_separation);
        let world = *object.node().world();
        let view = eye_view(&world, eye_offset);
        let projection = data.projection(viewport.aspect(), eye_offset);
        let focal_length = if data.focal_length > 0.0 {
            data.focal_length
        } else {
            self.settings.focal_length
        };

        // Culling may come from another camera
        let culler = override_camera
            .and_then(|k| scene.object(k))
            .filter(|o| o.camera().is_some())
            .unwrap_or(object);
        let cull_data = culler.camera().unwrap_or(data);
        let cull_view = eye_view(culler.node().world(), eye_offset);
        let cull_projection = cull_data.projection(viewport.aspect(), eye_offset);

        Some(CameraSchedule {
            camera,
            eye,
            stereo_mode: mode,
            area,
            viewport,
            view,
            projection,
            negative_scale: world.is_negative_scaling(),
            perspective: data.perspective,
            focal_length,
            position: culler.node().world_position(),
            frustum: Frustum::from_matrix(cull_projection * cull_view),
            culling: cull_data.frustum_culling,
            lod_factor: cull_data.lod_factor,
            index,
        })
    }
}

/// View matrix of a camera shifted sideways by `eye_offset`
fn eye_view(world: &Transform3D, eye_offset: f32) -> Mat4 {
    let mut eye = Transform3D::from_position_rotation(world.position, world.rotation);
    eye.position += world.rotation * Vec3::new(eye_offset, 0.0, 0.0);
    eye.inverse().to_matrix()
}

/// Shadow map passes of shadow casting sun and spot lights
fn shadow_schedules(scene: &Scene) -> Vec<TextureRenderSchedule> {
    let mut schedules = Vec::new();
    for key in scene.lights() {
        let Some(object) = scene.object(*key) else {
            continue;
        };
        let Some(light) = object.light() else {
            continue;
        };
        if !light.cast_shadows {
            continue;
        }
        let [near, far] = light.shadow_clip;
        let projection = match light.kind {
            LightKind::Sun => {
                let s = light.shadow_frustum_size;
                Mat4::orthographic_rh_gl(-s, s, -s, s, near, far)
            }
            LightKind::Spot => Mat4::perspective_rh_gl(light.spot_size, 1.0, near, far),
            LightKind::Point => continue,
        };
        let view = eye_view(object.node().world(), 0.0);
        schedules.push(TextureRenderSchedule {
            target: TextureTarget::Shadow { light: *key },
            mode: TextureRenderMode::empty(),
            clear: ClearFlags::DEPTH,
            eye: StereoEye::Left,
            view,
            projection,
            position: object.node().world_position(),
            frustum: Frustum::from_matrix(projection * view),
            layers: light.shadow_layers,
            lod_factor: 1.0,
            index: 0,
        });
    }
    schedules
}

/// Planar passes mirror every camera schedule; cube passes render six faces
fn texture_schedules(scene: &Scene, schedule: &SceneSchedule) -> Vec<TextureRenderSchedule> {
    let mode = TextureRenderMode::UPDATE_LOD | TextureRenderMode::RENDER_WORLD;
    let clear = ClearFlags::COLOR | ClearFlags::DEPTH;
    let mut schedules = Vec::new();

    for (index, renderer) in scene.texture_renderers().renderers().iter().enumerate() {
        if !renderer.enabled {
            continue;
        }
        let Some(viewpoint) = scene.object(renderer.viewpoint) else {
            continue;
        };
        let world = viewpoint.node().world();

        match renderer.kind {
            TextureRendererKind::Planar { normal } => {
                let mirror = reflection(world.position, world.rotation * normal);
                for camera in schedule.cameras.iter().flatten() {
                    let view = camera.view * mirror;
                    schedules.push(TextureRenderSchedule {
                        target: TextureTarget::Planar { renderer: index },
                        mode,
                        clear,
                        eye: camera.eye,
                        view,
                        projection: camera.projection,
                        position: mirror.transform_point3(camera.position),
                        frustum: Frustum::from_matrix(camera.projection * view),
                        layers: renderer.layers,
                        lod_factor: camera.lod_factor,
                        index: camera.index,
                    });
                }
            }
            TextureRendererKind::Cube => {
                let projection = Mat4::perspective_rh_gl(std::f32::consts::FRAC_PI_2, 1.0, CUBE_CLIP.0, CUBE_CLIP.1);
                for (face, (dir, up)) in cube_faces().into_iter().enumerate() {
                    let view = Mat4::look_to_rh(world.position, dir, up);
                    schedules.push(TextureRenderSchedule {
                        target: TextureTarget::Cube {
                            renderer: index,
                            face: face as u8,
                        },
                        mode,
                        clear,
                        eye: StereoEye::Left,
                        view,
                        projection,
                        position: world.position,
                        frustum: Frustum::from_matrix(projection * view),
                        layers: renderer.layers,
                        lod_factor: 1.0,
                        index: 0,
                    });
                }
            }
        }
    }
    schedules
}

/// Face directions and up vectors in +X, -X, +Y, -Y, +Z, -Z order
fn cube_faces() -> [(Vec3, Vec3); 6] {
    [
        (Vec3::X, Vec3::NEG_Y),
        (Vec3::NEG_X, Vec3::NEG_Y),
        (Vec3::Y, Vec3::Z),
        (Vec3::NEG_Y, Vec3::NEG_Z),
        (Vec3::Z, Vec3::NEG_Y),
        (Vec3::NEG_Z, Vec3::NEG_Y),
    ]
}

/// Reflection across the plane through `point` with `normal`
fn reflection(point: Vec3, normal: Vec3) -> Mat4 {
    let n = normal.normalize_or_zero();
    let d = -n.dot(point);
    Mat4::from_cols(
        Vec4::new(1.0 - 2.0 * n.x * n.x, -2.0 * n.x * n.y, -2.0 * n.x * n.z, 0.0),
        Vec4::new(-2.0 * n.x * n.y, 1.0 - 2.0 * n.y * n.y, -2.0 * n.y * n.z, 0.0),
        Vec4::new(-2.0 * n.x * n.z, -2.0 * n.y * n.z, 1.0 - 2.0 * n.z * n.z, 0.0),
        Vec4::new(-2.0 * d * n.x, -2.0 * d * n.y, -2.0 * d * n.z, 1.0),
    )
}
