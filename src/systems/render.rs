//! Frame rendering system
//!
//! Manages one rendered frame:
//! - Schedule building from the active scenes
//! - Schedule execution on a render backend
//! - The text overlay (framerate, profile, debug properties)

use std::collections::BTreeMap;

use strata_core::scene::Scene;
use strata_render::{DebugDraw, RenderBackend, RenderSettings, ScheduleBuilder, ScheduleExecutor};

/// Left margin of overlay text in pixels
const OVERLAY_MARGIN: i32 = 10;
/// Vertical distance between overlay lines in pixels
const OVERLAY_LINE_HEIGHT: i32 = 14;

/// `"{ms}ms ({fps}fps)"` for an average frame duration in seconds
pub fn framerate_line(total_seconds: f64) -> String {
    let total = total_seconds.max(1e-6);
    format!("{:5.2}ms ({:.1}fps)", total * 1000.0, 1.0 / total)
}

/// One `"{label}: {ms}ms | {percent}%"` line per profile entry
pub fn profile_lines(profile: &BTreeMap<String, (f64, f64)>) -> Vec<String> {
    profile
        .iter()
        .map(|(label, (ms, percent))| format!("{}: {:5.2}ms | {}%", label, ms, *percent as i32))
        .collect()
}

/// Builds and executes render schedules
#[derive(Debug, Default)]
pub struct RenderSystem {
    builder: ScheduleBuilder,
    executor: ScheduleExecutor,
    frames: u64,
}

impl RenderSystem {
    /// Create a render system
    pub fn new(settings: RenderSettings, debug: DebugDraw) -> Self {
        Self {
            builder: ScheduleBuilder::new(settings),
            executor: ScheduleExecutor::new(debug),
            frames: 0,
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        self.builder.settings()
    }

    pub fn settings_mut(&mut self) -> &mut RenderSettings {
        self.builder.settings_mut()
    }

    pub fn debug_draw_mut(&mut self) -> &mut DebugDraw {
        &mut self.executor.debug
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Camera passes of the last frame
    pub fn last_pass_count(&self) -> u32 {
        self.executor.last_pass_count()
    }

    /// Render one frame with `overlay` drawn on top
    ///
    /// Returns false if the backend could not start a frame.
    pub fn render(&mut self, scenes: &mut [Scene], backend: &mut dyn RenderBackend, overlay: &[String]) -> bool {
        if !backend.begin_frame() {
            log::debug!("Backend skipped frame");
            return false;
        }

        let mut schedule = self.builder.build(scenes, backend.width(), backend.height());
        self.executor.render(&mut schedule, scenes, backend);

        let top = backend.height() as i32;
        for (i, line) in overlay.iter().enumerate() {
            let y = top - OVERLAY_LINE_HEIGHT * (i as i32 + 1);
            backend.draw_text(line, OVERLAY_MARGIN, y);
        }

        backend.end_frame();
        backend.swap_buffers();
        self.frames += 1;
        true
    }
}
