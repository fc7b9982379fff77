//! Render schedule execution
//!
//! [`ScheduleExecutor::render`] consumes a [`RenderSchedule`]: texture passes
//! first, then every frame's scenes and cameras into offscreen targets, then
//! the composite to screen.
//!
//! Within a frame only the first camera pass keeps the color written by the
//! offscreen clear; every later pass clears depth only, so earlier scenes stay
//! visible beneath later ones.

use glam::Mat4;
use serde::{Deserialize, Serialize};
use strata_core::framing::Viewport;
use strata_core::object::{ObjectKey, ALL_LAYERS};
use strata_core::scene::Scene;

use crate::backend::RenderBackend;
use crate::schedule::{CameraSchedule, ClearFlags, RenderSchedule, TextureRenderMode, TextureRenderSchedule};
use crate::stereo::OffScreenKind;

const BOX_COLOR: [f32; 4] = [1.0, 1.0, 0.0, 1.0];
const ARMATURE_COLOR: [f32; 4] = [0.0, 0.6, 1.0, 1.0];
const FRUSTUM_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const SHADOW_COLOR: [f32; 4] = [1.0, 0.3, 0.0, 1.0];

/// Three-state switch of a debug drawing option
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebugMode {
    /// Never draw
    #[default]
    Disable,
    /// Draw for objects that ask for it
    Enable,
    /// Draw for every object
    Force,
}

impl DebugMode {
    fn draws(self, requested: bool) -> bool {
        match self {
            DebugMode::Disable => false,
            DebugMode::Enable => requested,
            DebugMode::Force => true,
        }
    }
}

/// Debug drawing options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DebugDraw {
    pub bounding_box: DebugMode,
    pub armatures: DebugMode,
    pub camera_frustum: DebugMode,
    pub shadow_frustum: DebugMode,
}

/// Walks a render schedule and drives a [`RenderBackend`]
#[derive(Clone, Debug, Default)]
pub struct ScheduleExecutor {
    pub debug: DebugDraw,
    last_pass_count: u32,
}

impl ScheduleExecutor {
    pub fn new(debug: DebugDraw) -> Self {
        Self {
            debug,
            last_pass_count: 0,
        }
    }

    /// Camera passes drawn by the last `render` call
    pub fn last_pass_count(&self) -> u32 {
        self.last_pass_count
    }

    /// Render every pass of `schedule` and composite the result to screen
    ///
    /// Frame offscreen targets in `schedule` are updated to the targets the
    /// post-filters left the image in.
    pub fn render(&mut self, schedule: &mut RenderSchedule, scenes: &mut [Scene], backend: &mut dyn RenderBackend) {
        for scene_schedule in &schedule.scenes {
            let Some(scene) = scenes.get_mut(scene_schedule.scene) else {
                continue;
            };
            for texture in &scene_schedule.textures {
                self.render_texture(scene, texture, backend);
            }
        }

        let full = Viewport::full(backend.width(), backend.height());
        backend.set_viewport(full);
        backend.set_scissor(full);
        let [r, g, b] = schedule.bar_color;
        backend.set_clear_color([r, g, b, 1.0]);

        let RenderSchedule {
            frames,
            scenes: scene_schedules,
            stereo_mode,
            render_per_eye,
            ..
        } = schedule;

        let mut pass = 0;
        for frame in frames.iter_mut() {
            backend.bind_offscreen(frame.offscreen);
            backend.clear(ClearFlags::COLOR | ClearFlags::DEPTH);

            let count = scene_schedules.len();
            for (i, scene_schedule) in scene_schedules.iter().enumerate() {
                let Some(scene) = scenes.get_mut(scene_schedule.scene) else {
                    continue;
                };
                let first = i == 0;
                let last = i + 1 == count;
                for eye in &frame.eyes {
                    for camera in scene_schedule.cameras_for(*eye) {
                        self.render_camera(scene, camera, pass, first, backend);
                        pass += 1;
                    }
                }
                frame.offscreen = self.post_render_scene(scene, frame.offscreen, last, backend);
            }
        }
        self.last_pass_count = pass;

        backend.set_viewport(full);
        if *render_per_eye && frames.len() >= 2 {
            backend.draw_stereo_to_screen(frames[0].offscreen, frames[1].offscreen, *stereo_mode);
        } else if let Some(frame) = frames.first() {
            backend.draw_to_screen(frame.offscreen);
        }
    }

    fn render_texture(&self, scene: &mut Scene, texture: &TextureRenderSchedule, backend: &mut dyn RenderBackend) {
        let viewport = [0, 0, backend.width() as i32, backend.height() as i32];
        let visible = scene.calculate_visible_meshes(&texture.frustum, texture.layers, viewport, true);
        if texture.mode.contains(TextureRenderMode::UPDATE_LOD) {
            scene.update_object_lods(texture.position, texture.lod_factor);
        }

        backend.set_eye(texture.eye);
        backend.set_matrices(texture.projection, texture.view, false);
        backend.bind_texture_target(texture.target);
        backend.clear(texture.clear);
        if texture.mode.contains(TextureRenderMode::RENDER_WORLD) {
            backend.render_background(scene.settings.background);
        }
        backend.draw_batches(&scene.render_buckets(&visible), texture.index);
        backend.unbind_texture_target(texture.target);
    }

    fn render_camera(
        &self,
        scene: &mut Scene,
        camera: &CameraSchedule,
        pass: u32,
        first_scene: bool,
        backend: &mut dyn RenderBackend,
    ) {
        let visible =
            scene.calculate_visible_meshes(&camera.frustum, ALL_LAYERS, camera.viewport.to_array(), camera.culling);
        scene.update_object_lods(camera.position, camera.lod_factor);

        backend.set_viewport(camera.viewport);
        backend.set_scissor(camera.viewport);
        if pass > 0 {
            backend.clear(ClearFlags::DEPTH);
        }
        backend.set_eye(camera.eye);
        backend.set_matrices(camera.projection, camera.view, camera.negative_scale);

        if first_scene {
            backend.render_background(scene.settings.background);
        }

        self.draw_debug(scene, &visible, camera, backend);
        scene.run_pre_draw(Some(camera.camera));
        backend.draw_batches(&scene.render_buckets(&visible), camera.index);
    }

    /// Run the scene's 2D filters and return the offscreen holding the result
    fn post_render_scene(
        &self,
        scene: &mut Scene,
        input: OffScreenKind,
        last_scene: bool,
        backend: &mut dyn RenderBackend,
    ) -> OffScreenKind {
        // A multisampled input is resolved before filtering, so it can be
        // its own target unless nothing renders after this scene.
        let target = if backend.offscreen_samples(input) > 0 {
            if last_scene {
                input.next()
            } else {
                input
            }
        } else {
            input.next()
        };

        let full = Viewport::full(backend.width(), backend.height());
        backend.set_viewport(full);
        backend.set_scissor(full);

        let mut output = input;
        for (pass, filter) in scene.filters().enabled_filters() {
            backend.render_filter(pass, filter, output, target);
            output = target;
        }

        scene.run_post_draw(None);
        output
    }

    fn draw_debug(&self, scene: &Scene, visible: &[ObjectKey], camera: &CameraSchedule, backend: &mut dyn RenderBackend) {
        if self.debug.bounding_box != DebugMode::Disable {
            for key in visible {
                let Some(object) = scene.object(*key) else {
                    continue;
                };
                if self.debug.bounding_box.draws(object.show_bounding_box) {
                    let world = object.node().world().to_matrix();
                    backend.draw_box(object.bounds.min, object.bounds.max, world, BOX_COLOR);
                }
            }
        }

        if self.debug.armatures != DebugMode::Disable {
            for key in scene.objects() {
                let Some(object) = scene.object(*key) else {
                    continue;
                };
                if object.is_armature() && !object.culled && self.debug.armatures.draws(object.show_armature) {
                    let world = object.node().world().to_matrix();
                    backend.draw_box(object.bounds.min, object.bounds.max, world, ARMATURE_COLOR);
                }
            }
        }

        if self.debug.camera_frustum != DebugMode::Disable {
            for key in scene.cameras() {
                if *key == camera.camera {
                    continue;
                }
                let Some(object) = scene.object(*key) else {
                    continue;
                };
                let Some(data) = object.camera() else {
                    continue;
                };
                if self.debug.camera_frustum.draws(data.show_frustum) {
                    let view = object.node().world().inverse().to_matrix();
                    let projection = data.projection(camera.viewport.aspect(), 0.0);
                    backend.draw_frustum(projection * view, FRUSTUM_COLOR);
                }
            }
        }

        if self.debug.shadow_frustum != DebugMode::Disable {
            for key in scene.lights() {
                let Some(object) = scene.object(*key) else {
                    continue;
                };
                let Some(light) = object.light() else {
                    continue;
                };
                if light.cast_shadows && self.debug.shadow_frustum.draws(light.show_shadow_frustum) {
                    let s = light.shadow_frustum_size;
                    let [near, far] = light.shadow_clip;
                    let projection = Mat4::orthographic_rh_gl(-s, s, -s, s, near, far);
                    let view = object.node().world().inverse().to_matrix();
                    backend.draw_frustum(projection * view, SHADOW_COLOR);
                }
            }
        }
    }
}
