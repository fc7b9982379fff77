//! Engine orchestrator
//!
//! The [`Engine`] owns the clock, the scene registry, the converter and the
//! collaborators, and runs the tick state machine:
//!
//! `Uninitialized -> Running -> ExitRequested -> Stopped`
//!
//! One [`Engine::advance`] call runs a batch of ticks decided by the clock.
//! Exit is only ever requested; the host decides when to stop advancing.

use std::collections::BTreeMap;
use std::path::Path;

use bitflags::bitflags;
use glam::{Quat, Vec3};
use strata_core::animation::AnimationPool;
use strata_core::camera::CameraData;
use strata_core::clock::{FrameScheduler, TimeSource, DEFAULT_MAX_LOGIC_FRAMES, DEFAULT_MAX_PHYSICS_FRAMES, DEFAULT_TIC_RATE};
use strata_core::converter::SceneConverter;
use strata_core::error::RegistryError;
use strata_core::exit::{ExitCode, ExitInfo};
use strata_core::input::{InputDevice, InputEvents};
use strata_core::library::LibLoadHandle;
use strata_core::network::{lock_messages, shared_messages, SharedMessages};
use strata_core::profiling::{TimeCategory, TimeCategoryLogger};
use strata_core::registry::{AddPolicy, CameraOverride, PostProcess, SceneRegistry};
use strata_core::scene::{Scene, MAX_DEBUG_PROPERTIES};
use strata_core::transform::Transform3D;
use strata_render::{DebugDraw, RenderBackend, RenderSettings};

use crate::systems::{framerate_line, profile_lines, RenderSystem, SimulationSystem, TickParams};

bitflags! {
    /// Engine behavior switches
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct EngineFlags: u32 {
        const FIXED_FRAMERATE = 1 << 0;
        const USE_EXTERNAL_CLOCK = 1 << 1;
        /// Evaluate poses at the animation framerate only
        const RESTRICT_ANIMATION = 1 << 2;
        const AUTO_ADD_DEBUG_PROPERTIES = 1 << 3;
        const SHOW_PROFILE = 1 << 4;
        const SHOW_FRAMERATE = 1 << 5;
        const SHOW_DEBUG_PROPERTIES = 1 << 6;
        const SHOW_RENDER_QUERIES = 1 << 7;
        const CAMERA_OVERRIDE = 1 << 8;
    }
}

impl Default for EngineFlags {
    fn default() -> Self {
        EngineFlags::FIXED_FRAMERATE | EngineFlags::AUTO_ADD_DEBUG_PROPERTIES
    }
}

/// Lifecycle of the engine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineState {
    #[default]
    Uninitialized,
    Running,
    ExitRequested,
    Stopped,
}

/// Engine construction settings
#[derive(Clone, Debug, PartialEq)]
pub struct EngineSettings {
    pub flags: EngineFlags,
    pub tic_rate: f64,
    pub max_logic_frames: u32,
    pub max_physics_frames: u32,
    pub time_scale: f64,
    pub anim_framerate: f64,
    /// Report that a render is due after each simulated batch
    pub render: bool,
    /// Animation workers; 0 uses rayon's global pool
    pub animation_threads: usize,
    /// Sleep when no tick is due under the fixed framerate
    pub idle_sleep: bool,
    pub render_settings: RenderSettings,
    pub debug_draw: DebugDraw,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            flags: EngineFlags::default(),
            tic_rate: DEFAULT_TIC_RATE,
            max_logic_frames: DEFAULT_MAX_LOGIC_FRAMES,
            max_physics_frames: DEFAULT_MAX_PHYSICS_FRAMES,
            time_scale: 1.0,
            anim_framerate: 25.0,
            render: true,
            animation_threads: 0,
            idle_sleep: true,
            render_settings: RenderSettings::default(),
            debug_draw: DebugDraw::default(),
        }
    }
}

/// The runtime core
pub struct Engine {
    flags: EngineFlags,
    state: EngineState,
    scheduler: FrameScheduler,
    registry: SceneRegistry,
    converter: Box<dyn SceneConverter>,
    input: Box<dyn InputDevice>,
    messages: SharedMessages,
    animation_pool: AnimationPool,
    logger: TimeCategoryLogger,
    profile: BTreeMap<String, (f64, f64)>,
    exit: ExitInfo,
    simulation: SimulationSystem,
    renderer: RenderSystem,
    camera_override: Option<CameraOverride>,
    /// Total simulated time
    frame_time: f64,
    anim_framerate: f64,
    render_enabled: bool,
    idle_sleep: bool,
}

impl Engine {
    /// Create an engine on the wall clock
    pub fn new(settings: EngineSettings, converter: Box<dyn SceneConverter>) -> Self {
        let mut engine = Self {
            flags: settings.flags,
            state: EngineState::Uninitialized,
            scheduler: FrameScheduler::new(),
            registry: SceneRegistry::new(),
            converter,
            input: Box::new(InputEvents::new()),
            messages: shared_messages(),
            animation_pool: AnimationPool::new(settings.animation_threads),
            logger: TimeCategoryLogger::default(),
            profile: BTreeMap::new(),
            exit: ExitInfo::default(),
            simulation: SimulationSystem::new(),
            renderer: RenderSystem::new(settings.render_settings.clone(), settings.debug_draw),
            camera_override: None,
            frame_time: 0.0,
            anim_framerate: settings.anim_framerate,
            render_enabled: settings.render,
            idle_sleep: settings.idle_sleep,
        };
        engine.configure_scheduler(&settings);
        engine
    }

    /// Builder: replace the input device
    pub fn with_input(mut self, input: Box<dyn InputDevice>) -> Self {
        self.input = input;
        self
    }

    /// Builder: drive the clock from another time source
    pub fn with_time_source(mut self, source: Box<dyn TimeSource>) -> Self {
        let previous = std::mem::replace(&mut self.scheduler, FrameScheduler::with_source(source));
        self.scheduler.set_tic_rate(previous.tic_rate());
        self.scheduler.set_max_logic_frames(previous.max_logic_frames());
        self.scheduler.set_max_physics_frames(previous.max_physics_frames());
        self.scheduler.set_time_scale(previous.time_scale());
        self.scheduler.set_fixed_framerate(previous.fixed_framerate());
        self.scheduler.set_use_external_clock(previous.use_external_clock());
        self
    }

    fn configure_scheduler(&mut self, settings: &EngineSettings) {
        self.scheduler.set_tic_rate(settings.tic_rate);
        self.scheduler.set_max_logic_frames(settings.max_logic_frames);
        self.scheduler.set_max_physics_frames(settings.max_physics_frames);
        self.scheduler.set_time_scale(settings.time_scale);
        self.scheduler
            .set_fixed_framerate(self.flags.contains(EngineFlags::FIXED_FRAMERATE));
        self.scheduler
            .set_use_external_clock(self.flags.contains(EngineFlags::USE_EXTERNAL_CLOCK));
    }

    // --- Lifecycle ---

    /// Reset the clock and start running
    pub fn start(&mut self) {
        self.scheduler.reset();
        self.frame_time = 0.0;
        self.state = EngineState::Running;
        log::info!("Engine started");
    }

    /// Run the ticks that are due
    ///
    /// Returns true if a render should follow.
    pub fn advance(&mut self) -> bool {
        if matches!(self.state, EngineState::Uninitialized | EngineState::Stopped) {
            log::warn!("advance called on a {:?} engine", self.state);
            return false;
        }

        self.logger.start_log(TimeCategory::Services);
        let times = self.scheduler.compute_frame_times();

        if times.frames == 0 {
            if let Some(idle) = times.idle {
                log::trace!("Idle for {:.3}ms", idle.as_secs_f64() * 1000.0);
                if self.idle_sleep {
                    std::thread::sleep(idle);
                }
            }
            self.logger.start_log(TimeCategory::Outside);
            return false;
        }

        self.input.release_move_event();

        for _ in 0..times.frames {
            self.frame_time += times.framestep;
            let params = TickParams {
                frame_time: self.frame_time,
                timestep: times.timestep,
                framestep: times.framestep,
                anim_framerate: self.anim_framerate,
                restrict_animation: self.flags.contains(EngineFlags::RESTRICT_ANIMATION),
            };
            self.simulation.tick(
                self.registry.scenes_mut(),
                &params,
                &self.animation_pool,
                &mut self.logger,
            );
            self.end_tick(times.framestep);
        }

        self.logger.start_log(TimeCategory::Outside);
        self.logger.next_measurement();
        self.profile = self.logger.profile();
        self.render_enabled
    }

    /// Clear per-tick state and apply deferred changes
    fn end_tick(&mut self, framestep: f64) {
        self.logger.start_log(TimeCategory::Network);
        lock_messages(&self.messages).clear_messages();

        self.logger.start_log(TimeCategory::Logic);
        self.input.clear_inputs();

        self.converter.process_scheduled_libraries(self.registry.scenes_mut());

        for scene in self.registry.scenes_mut() {
            if scene.is_suspended() {
                scene.set_suspended_delta(scene.suspended_delta() + framestep);
            }
        }

        let post = self.post_process();
        if !self
            .registry
            .apply_scheduled_changes(self.converter.as_mut(), &post)
        {
            self.request_exit(ExitCode::NoScenesLeft, None);
        }
    }

    fn post_process(&self) -> PostProcess {
        PostProcess {
            camera_override: self
                .camera_override
                .clone()
                .filter(|_| self.flags.contains(EngineFlags::CAMERA_OVERRIDE)),
            auto_debug_properties: self.flags.contains(EngineFlags::AUTO_ADD_DEBUG_PROPERTIES),
            network: Some(self.messages.clone()),
        }
    }

    /// Render one frame
    ///
    /// Returns false if the backend skipped the frame.
    pub fn render(&mut self, backend: &mut dyn RenderBackend) -> bool {
        self.logger.start_log(TimeCategory::Rasterizer);
        let overlay = self.overlay_lines();
        let rendered = self
            .renderer
            .render(self.registry.scenes_mut(), backend, &overlay);
        self.logger.start_log(TimeCategory::Outside);
        rendered
    }

    fn overlay_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if self.flags.contains(EngineFlags::SHOW_FRAMERATE) {
            lines.push(framerate_line(self.logger.total_average()));
        }
        if self.flags.contains(EngineFlags::SHOW_PROFILE) {
            lines.extend(profile_lines(&self.profile));
        }
        if self.flags.contains(EngineFlags::SHOW_RENDER_QUERIES) {
            lines.push(format!("Render passes: {}", self.renderer.last_pass_count()));
        }
        if self.flags.contains(EngineFlags::SHOW_DEBUG_PROPERTIES) {
            for scene in self.registry.scenes() {
                lines.extend(scene.debug_property_lines(MAX_DEBUG_PROPERTIES));
            }
        }
        lines
    }

    /// Finish pending loads and destroy every scene, front to back
    pub fn stop(&mut self) {
        if self.state == EngineState::Stopped {
            return;
        }
        self.converter.finalize_async_loads();
        self.registry.destroy_all(self.converter.as_mut());
        self.state = EngineState::Stopped;
        log::info!("Engine stopped");
    }

    /// Record an exit request for the host
    pub fn request_exit(&mut self, code: ExitCode, filename: Option<&str>) {
        self.exit = ExitInfo::new(code, filename.map(str::to_string));
        if code != ExitCode::NoRequest && self.state == EngineState::Running {
            self.state = EngineState::ExitRequested;
        }
        log::info!("Exit requested: {}", code);
    }

    pub fn exit_info(&self) -> &ExitInfo {
        &self.exit
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    // --- Scenes ---

    /// Queue a scene, drawn on top (`overlay`) or behind everything else
    pub fn add_scene(&mut self, name: &str, overlay: bool) -> Result<(), RegistryError> {
        let policy = if overlay {
            AddPolicy::Overlay
        } else {
            AddPolicy::Background
        };
        self.registry.request_add(name, policy)
    }

    pub fn remove_scene(&mut self, name: &str) -> Result<(), RegistryError> {
        self.registry.request_remove(name)
    }

    pub fn replace_scene(&mut self, old: &str, new: &str) -> bool {
        self.registry.request_replace(old, new, self.converter.as_ref())
    }

    pub fn suspend_scene(&mut self, name: &str) -> Result<(), RegistryError> {
        self.registry.suspend_scene(name)
    }

    pub fn resume_scene(&mut self, name: &str) -> Result<(), RegistryError> {
        self.registry.resume_scene(name)
    }

    pub fn scenes(&self) -> &[Scene] {
        self.registry.scenes()
    }

    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.registry.scene(name)
    }

    pub fn scene_mut(&mut self, name: &str) -> Option<&mut Scene> {
        self.registry.scene_mut(name)
    }

    pub fn registry(&self) -> &SceneRegistry {
        &self.registry
    }

    pub fn converter(&self) -> &dyn SceneConverter {
        self.converter.as_ref()
    }

    /// Start loading a library file to merge into `merge_into`
    pub fn lib_load(&mut self, path: &Path, merge_into: &str) -> LibLoadHandle {
        self.converter.lib_load(path, merge_into)
    }

    pub fn messages(&self) -> SharedMessages {
        self.messages.clone()
    }

    // --- Camera override ---

    /// Render `scene` from a camera placed by the host
    ///
    /// Applies to scenes added or replaced afterwards.
    pub fn enable_camera_override(&mut self, scene: &str, position: Vec3, orientation: Quat, camera: CameraData) {
        self.flags.insert(EngineFlags::CAMERA_OVERRIDE);
        self.camera_override = Some(CameraOverride {
            scene: scene.to_string(),
            transform: Transform3D::from_position_rotation(position, orientation),
            camera,
        });
    }

    pub fn disable_camera_override(&mut self) {
        self.flags.remove(EngineFlags::CAMERA_OVERRIDE);
        self.camera_override = None;
    }

    // --- Flags ---

    pub fn set_flag(&mut self, flag: EngineFlags, enabled: bool) {
        self.flags.set(flag, enabled);
        if flag.contains(EngineFlags::FIXED_FRAMERATE) {
            self.scheduler.set_fixed_framerate(enabled);
        }
        if flag.contains(EngineFlags::USE_EXTERNAL_CLOCK) {
            self.scheduler.set_use_external_clock(enabled);
        }
    }

    pub fn flag(&self, flag: EngineFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn flags(&self) -> EngineFlags {
        self.flags
    }

    // --- Time ---

    pub fn tic_rate(&self) -> f64 {
        self.scheduler.tic_rate()
    }

    pub fn set_tic_rate(&mut self, tic_rate: f64) {
        self.scheduler.set_tic_rate(tic_rate);
    }

    pub fn max_logic_frames(&self) -> u32 {
        self.scheduler.max_logic_frames()
    }

    pub fn set_max_logic_frames(&mut self, frames: u32) {
        self.scheduler.set_max_logic_frames(frames);
    }

    pub fn max_physics_frames(&self) -> u32 {
        self.scheduler.max_physics_frames()
    }

    pub fn set_max_physics_frames(&mut self, frames: u32) {
        self.scheduler.set_max_physics_frames(frames);
    }

    pub fn time_scale(&self) -> f64 {
        self.scheduler.time_scale()
    }

    pub fn set_time_scale(&mut self, time_scale: f64) {
        self.scheduler.set_time_scale(time_scale);
    }

    pub fn anim_framerate(&self) -> f64 {
        self.anim_framerate
    }

    pub fn set_anim_framerate(&mut self, framerate: f64) {
        self.anim_framerate = framerate;
    }

    /// Clock time in seconds
    pub fn clock_time(&self) -> f64 {
        self.scheduler.clock_time()
    }

    /// Supply the clock time when the external clock is in use
    pub fn set_clock_time(&mut self, time: f64) {
        self.scheduler.set_clock_time(time);
    }

    /// Total simulated time
    pub fn frame_time(&self) -> f64 {
        self.frame_time
    }

    pub fn real_time(&self) -> f64 {
        self.scheduler.real_time()
    }

    /// Frames per second over the profiling window
    pub fn average_framerate(&self) -> f64 {
        1.0 / self.logger.total_average().max(1e-6)
    }

    /// `category -> (milliseconds, percent)` of the last advance
    pub fn profile(&self) -> BTreeMap<String, (f64, f64)> {
        self.profile.clone()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("state", &self.state)
            .field("flags", &self.flags)
            .field("scenes", &self.registry.names())
            .field("frame_time", &self.frame_time)
            .field("exit", &self.exit)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::converter::TemplateConverter;
    use strata_core::object::ObjectKind;
    use strata_core::template::{ObjectTemplate, SceneTemplate};

    fn engine(scenes: &[&str]) -> Engine {
        let mut converter = TemplateConverter::new();
        for name in scenes {
            converter.register_template(
                SceneTemplate::new(*name).with_object(ObjectTemplate::new("thing", ObjectKind::Empty)),
            );
        }
        let settings = EngineSettings {
            flags: EngineFlags::FIXED_FRAMERATE | EngineFlags::USE_EXTERNAL_CLOCK,
            ..EngineSettings::default()
        };
        Engine::new(settings, Box::new(converter))
    }

    #[test]
    fn test_start_and_state() {
        let mut engine = engine(&["main"]);
        assert_eq!(engine.state(), EngineState::Uninitialized);
        assert!(!engine.advance());
        engine.start();
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.frame_time(), 0.0);
    }

    #[test]
    fn test_no_frames_due() {
        let mut engine = engine(&["main"]);
        engine.start();
        engine.set_clock_time(0.001);
        assert!(!engine.advance());
        assert_eq!(engine.frame_time(), 0.0);
    }

    #[test]
    fn test_advance_runs_ticks() {
        let mut engine = engine(&["main"]);
        engine.start();
        engine.add_scene("main", true).unwrap();
        engine.set_clock_time(3.0 / 60.0 + 1e-9);
        assert!(engine.advance());
        assert!((engine.frame_time() - 3.0 / 60.0).abs() < 1e-9);
        assert_eq!(engine.registry().names(), vec!["main"]);
        assert!(!engine.exit_info().is_requested());
        assert_eq!(engine.profile().len(), 10);
    }

    #[test]
    fn test_exit_request_records_filename() {
        let mut engine = engine(&[]);
        engine.start();
        engine.request_exit(ExitCode::Restart, Some("next.ron"));
        assert_eq!(engine.state(), EngineState::ExitRequested);
        assert_eq!(engine.exit_info().code, ExitCode::Restart);
        assert_eq!(engine.exit_info().filename.as_deref(), Some("next.ron"));
    }

    #[test]
    fn test_set_flag_updates_clock() {
        let mut engine = engine(&[]);
        engine.set_flag(EngineFlags::FIXED_FRAMERATE, false);
        assert!(!engine.flag(EngineFlags::FIXED_FRAMERATE));
        engine.set_flag(EngineFlags::SHOW_PROFILE, true);
        assert!(engine.flag(EngineFlags::SHOW_PROFILE));
    }

    #[test]
    fn test_camera_override_flag() {
        let mut engine = engine(&[]);
        engine.enable_camera_override("main", Vec3::ONE, Quat::IDENTITY, CameraData::default());
        assert!(engine.flag(EngineFlags::CAMERA_OVERRIDE));
        assert!(engine.post_process().camera_override.is_some());
        engine.disable_camera_override();
        assert!(engine.post_process().camera_override.is_none());
    }

    #[test]
    fn test_average_framerate_without_samples() {
        let engine = engine(&[]);
        assert!(engine.average_framerate() > 1.0e5);
    }
}
