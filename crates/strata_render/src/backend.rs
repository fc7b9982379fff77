//! Renderer capability
//!
//! The runtime holds no GPU state. [`RenderBackend`] is the narrow set of
//! canvas and rasterizer calls the executor sequences; [`HeadlessBackend`]
//! implements it without a window by recording every call.

use glam::{Mat4, Vec3};
use strata_core::framing::Viewport;
use strata_core::managers::{DrawBatch, Filter2D};

use crate::schedule::{ClearFlags, TextureTarget};
use crate::stereo::{OffScreenKind, StereoEye, StereoMode};

/// Canvas and rasterizer driven by the schedule executor
pub trait RenderBackend {
    /// Start a frame. Returns false if nothing can be drawn (minimized window)
    fn begin_frame(&mut self) -> bool;
    fn end_frame(&mut self);
    fn swap_buffers(&mut self);

    fn width(&self) -> u32;
    fn height(&self) -> u32;

    fn bind_offscreen(&mut self, kind: OffScreenKind);
    /// Multisample count of an offscreen target, 0 when not multisampled
    fn offscreen_samples(&self, kind: OffScreenKind) -> u32;

    fn set_viewport(&mut self, viewport: Viewport);
    fn set_scissor(&mut self, viewport: Viewport);
    fn set_clear_color(&mut self, color: [f32; 4]);
    fn clear(&mut self, flags: ClearFlags);

    fn set_eye(&mut self, eye: StereoEye);
    fn set_matrices(&mut self, projection: Mat4, view: Mat4, negative_scale: bool);

    fn bind_texture_target(&mut self, target: TextureTarget);
    fn unbind_texture_target(&mut self, target: TextureTarget);

    fn render_background(&mut self, color: [f32; 4]);
    fn draw_batches(&mut self, batches: &[DrawBatch], viewport_index: u32);
    fn render_filter(&mut self, pass: u32, filter: &Filter2D, input: OffScreenKind, output: OffScreenKind);

    fn draw_to_screen(&mut self, source: OffScreenKind);
    fn draw_stereo_to_screen(&mut self, left: OffScreenKind, right: OffScreenKind, mode: StereoMode);

    fn draw_text(&mut self, text: &str, x: i32, y: i32);
    fn draw_frustum(&mut self, matrix: Mat4, color: [f32; 4]);
    fn draw_box(&mut self, min: Vec3, max: Vec3, transform: Mat4, color: [f32; 4]);
}

/// A recorded backend call
#[derive(Clone, Debug, PartialEq)]
pub enum BackendCall {
    BeginFrame,
    EndFrame,
    SwapBuffers,
    BindOffScreen(OffScreenKind),
    SetViewport(Viewport),
    SetScissor(Viewport),
    SetClearColor([f32; 4]),
    Clear(ClearFlags),
    SetEye(StereoEye),
    SetMatrices { negative_scale: bool },
    BindTextureTarget(TextureTarget),
    UnbindTextureTarget(TextureTarget),
    RenderBackground,
    DrawBatches { batches: usize, objects: usize, viewport_index: u32 },
    RenderFilter { pass: u32, input: OffScreenKind, output: OffScreenKind },
    DrawToScreen(OffScreenKind),
    DrawStereoToScreen(OffScreenKind, OffScreenKind, StereoMode),
    DrawText(String),
    DrawFrustum,
    DrawBox,
}

/// Windowless backend recording every call
#[derive(Clone, Debug)]
pub struct HeadlessBackend {
    width: u32,
    height: u32,
    samples: u32,
    calls: Vec<BackendCall>,
    frames: u64,
}

impl HeadlessBackend {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            samples: 0,
            calls: Vec::new(),
            frames: 0,
        }
    }

    /// Builder: report `samples` on the first target of each eye
    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = samples;
        self
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    pub fn calls(&self) -> &[BackendCall] {
        &self.calls
    }

    pub fn take_calls(&mut self) -> Vec<BackendCall> {
        std::mem::take(&mut self.calls)
    }

    /// Number of swapped frames
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Text drawn since the calls were last taken
    pub fn text_lines(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                BackendCall::DrawText(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, call: BackendCall) {
        log::trace!("{:?}", call);
        self.calls.push(call);
    }
}

impl RenderBackend for HeadlessBackend {
    fn begin_frame(&mut self) -> bool {
        self.record(BackendCall::BeginFrame);
        self.width > 0 && self.height > 0
    }

    fn end_frame(&mut self) {
        self.record(BackendCall::EndFrame);
    }

    fn swap_buffers(&mut self) {
        self.frames += 1;
        self.record(BackendCall::SwapBuffers);
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn bind_offscreen(&mut self, kind: OffScreenKind) {
        self.record(BackendCall::BindOffScreen(kind));
    }

    fn offscreen_samples(&self, kind: OffScreenKind) -> u32 {
        match kind {
            OffScreenKind::EyeLeft0 | OffScreenKind::EyeRight0 => self.samples,
            OffScreenKind::EyeLeft1 | OffScreenKind::EyeRight1 => 0,
        }
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(BackendCall::SetViewport(viewport));
    }

    fn set_scissor(&mut self, viewport: Viewport) {
        self.record(BackendCall::SetScissor(viewport));
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.record(BackendCall::SetClearColor(color));
    }

    fn clear(&mut self, flags: ClearFlags) {
        self.record(BackendCall::Clear(flags));
    }

    fn set_eye(&mut self, eye: StereoEye) {
        self.record(BackendCall::SetEye(eye));
    }

    fn set_matrices(&mut self, _projection: Mat4, _view: Mat4, negative_scale: bool) {
        self.record(BackendCall::SetMatrices { negative_scale });
    }

    fn bind_texture_target(&mut self, target: TextureTarget) {
        self.record(BackendCall::BindTextureTarget(target));
    }

    fn unbind_texture_target(&mut self, target: TextureTarget) {
        self.record(BackendCall::UnbindTextureTarget(target));
    }

    fn render_background(&mut self, _color: [f32; 4]) {
        self.record(BackendCall::RenderBackground);
    }

    fn draw_batches(&mut self, batches: &[DrawBatch], viewport_index: u32) {
        let objects = batches.iter().map(|b| b.objects.len()).sum();
        self.record(BackendCall::DrawBatches {
            batches: batches.len(),
            objects,
            viewport_index,
        });
    }

    fn render_filter(&mut self, pass: u32, _filter: &Filter2D, input: OffScreenKind, output: OffScreenKind) {
        self.record(BackendCall::RenderFilter { pass, input, output });
    }

    fn draw_to_screen(&mut self, source: OffScreenKind) {
        self.record(BackendCall::DrawToScreen(source));
    }

    fn draw_stereo_to_screen(&mut self, left: OffScreenKind, right: OffScreenKind, mode: StereoMode) {
        self.record(BackendCall::DrawStereoToScreen(left, right, mode));
    }

    fn draw_text(&mut self, text: &str, _x: i32, _y: i32) {
        self.record(BackendCall::DrawText(text.to_string()));
    }

    fn draw_frustum(&mut self, _matrix: Mat4, _color: [f32; 4]) {
        self.record(BackendCall::DrawFrustum);
    }

    fn draw_box(&mut self, _min: Vec3, _max: Vec3, _transform: Mat4, _color: [f32; 4]) {
        self.record(BackendCall::DrawBox);
    }
}
