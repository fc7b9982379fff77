//! Application configuration
//!
//! Configuration is loaded from multiple sources with the following priority (lowest to highest):
//! 1. `config/default.toml` (version controlled)
//! 2. `config/user.toml` (gitignored, user overrides)
//! 3. Environment variables (`STRATA_SECTION__KEY`)

use figment::{Figment, providers::{Format, Toml, Env}};
use serde::{Serialize, Deserialize};
use std::path::Path;

use strata_core::clock::{DEFAULT_MAX_LOGIC_FRAMES, DEFAULT_MAX_PHYSICS_FRAMES, DEFAULT_TIC_RATE};
use strata_render::{DebugDraw, DebugMode, RenderSettings, StereoMode};

use crate::engine::{EngineFlags, EngineSettings};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Clock and tick configuration
    #[serde(default)]
    pub engine: EngineConfig,
    /// Scene source locations
    #[serde(default)]
    pub scenes: ScenesConfig,
    /// Rendering configuration
    #[serde(default)]
    pub rendering: RenderingConfig,
    /// Debug configuration
    #[serde(default)]
    pub debug: DebugConfig,
    /// Headless host loop
    #[serde(default)]
    pub host: HostConfig,
}

impl AppConfig {
    /// Load configuration from default locations
    ///
    /// Priority (lowest to highest):
    /// 1. `config/default.toml`
    /// 2. `config/user.toml`
    /// 3. Environment variables (`STRATA_*`)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific config directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();
        let default_path = config_dir.join("default.toml");
        let user_path = config_dir.join("user.toml");

        let mut figment = Figment::new();

        if default_path.exists() {
            figment = figment.merge(Toml::file(&default_path));
        }

        if user_path.exists() {
            figment = figment.merge(Toml::file(&user_path));
        }

        // STRATA_ENGINE__TIC_RATE=30 -> engine.tic_rate = 30
        figment = figment.merge(Env::prefixed("STRATA_").split("__"));

        figment.extract().map_err(ConfigError::from)
    }

    /// Engine construction settings for this configuration
    pub fn engine_settings(&self) -> EngineSettings {
        let engine = &self.engine;
        let debug = &self.debug;

        let mut flags = EngineFlags::empty();
        flags.set(EngineFlags::FIXED_FRAMERATE, engine.fixed_framerate);
        flags.set(EngineFlags::USE_EXTERNAL_CLOCK, engine.use_external_clock);
        flags.set(EngineFlags::RESTRICT_ANIMATION, engine.restrict_animation);
        flags.set(EngineFlags::AUTO_ADD_DEBUG_PROPERTIES, debug.auto_add_debug_properties);
        flags.set(EngineFlags::SHOW_PROFILE, debug.show_profile);
        flags.set(EngineFlags::SHOW_FRAMERATE, debug.show_framerate);
        flags.set(EngineFlags::SHOW_DEBUG_PROPERTIES, debug.show_debug_properties);
        flags.set(EngineFlags::SHOW_RENDER_QUERIES, debug.show_render_queries);

        EngineSettings {
            flags,
            tic_rate: engine.tic_rate,
            max_logic_frames: engine.max_logic_frames,
            max_physics_frames: engine.max_physics_frames,
            time_scale: engine.time_scale,
            anim_framerate: engine.anim_framerate,
            render: engine.render,
            animation_threads: engine.animation_threads,
            idle_sleep: engine.idle_sleep,
            render_settings: RenderSettings {
                stereo_mode: self.rendering.stereo_mode,
                eye_separation: self.rendering.eye_separation,
                focal_length: self.rendering.focal_length,
                textured: self.rendering.textured,
                bar_color: self.rendering.bar_color,
            },
            debug_draw: DebugDraw {
                bounding_box: debug.show_bounding_box,
                armatures: debug.show_armatures,
                camera_frustum: debug.show_camera_frustum,
                shadow_frustum: debug.show_shadow_frustum,
            },
        }
    }
}

/// Clock and tick configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ticks per second
    pub tic_rate: f64,
    /// Most logic ticks per advance
    pub max_logic_frames: u32,
    /// Most physics ticks per advance
    pub max_physics_frames: u32,
    /// Tick at `tic_rate` instead of once per advance
    pub fixed_framerate: bool,
    /// Simulation speed multiplier
    pub time_scale: f64,
    /// Clock time is supplied by the host
    pub use_external_clock: bool,
    /// Pose updates per second when restricted
    pub anim_framerate: f64,
    pub restrict_animation: bool,
    /// Render after simulated batches
    pub render: bool,
    /// Animation workers (0 = rayon default)
    pub animation_threads: usize,
    /// Sleep while no tick is due
    pub idle_sleep: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tic_rate: DEFAULT_TIC_RATE,
            max_logic_frames: DEFAULT_MAX_LOGIC_FRAMES,
            max_physics_frames: DEFAULT_MAX_PHYSICS_FRAMES,
            fixed_framerate: true,
            time_scale: 1.0,
            use_external_clock: false,
            anim_framerate: 25.0,
            restrict_animation: false,
            render: true,
            animation_threads: 0,
            idle_sleep: true,
        }
    }
}

/// Scene source locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenesConfig {
    /// Directory holding `<name>.ron` scene files
    pub directory: String,
    /// Scene added when the engine starts
    pub start: String,
}

impl Default for ScenesConfig {
    fn default() -> Self {
        Self {
            directory: "scenes".to_string(),
            start: "main".to_string(),
        }
    }
}

/// Rendering configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderingConfig {
    /// none, quad_buffer, above_below, side_by_side, anaglyph
    pub stereo_mode: StereoMode,
    pub eye_separation: f32,
    pub focal_length: f32,
    /// Schedule shadow and reflection passes
    pub textured: bool,
    /// Canvas width in pixels
    pub width: u32,
    /// Canvas height in pixels
    pub height: u32,
    /// Framing bar color [r, g, b]
    pub bar_color: [f32; 3],
}

impl Default for RenderingConfig {
    fn default() -> Self {
        let render = RenderSettings::default();
        Self {
            stereo_mode: render.stereo_mode,
            eye_separation: render.eye_separation,
            focal_length: render.focal_length,
            textured: render.textured,
            width: 1280,
            height: 720,
            bar_color: render.bar_color,
        }
    }
}

/// Debug configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Log level (error, warn, info, debug, trace)
    pub log_level: String,
    pub show_framerate: bool,
    pub show_profile: bool,
    pub show_debug_properties: bool,
    pub show_render_queries: bool,
    /// Add declared debug properties of new objects
    pub auto_add_debug_properties: bool,
    pub show_bounding_box: DebugMode,
    pub show_armatures: DebugMode,
    pub show_camera_frustum: DebugMode,
    pub show_shadow_frustum: DebugMode,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            show_framerate: false,
            show_profile: false,
            show_debug_properties: false,
            show_render_queries: false,
            auto_add_debug_properties: true,
            show_bounding_box: DebugMode::Disable,
            show_armatures: DebugMode::Disable,
            show_camera_frustum: DebugMode::Disable,
            show_shadow_frustum: DebugMode::Disable,
        }
    }
}

/// Headless host loop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Stop after this many rendered frames (0 = unlimited)
    pub max_frames: u64,
}

/// Configuration error
#[derive(Debug)]
pub struct ConfigError {
    message: String,
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self {
        ConfigError {
            message: e.to_string(),
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.engine.tic_rate, 60.0);
        assert_eq!(config.scenes.start, "main");
        assert_eq!(config.rendering.width, 1280);
        assert!(config.debug.auto_add_debug_properties);
        assert_eq!(config.host.max_frames, 0);
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml = toml::to_string(&config).unwrap();
        assert!(toml.contains("tic_rate"));
        assert!(toml.contains("stereo_mode = \"none\""));
        assert!(toml.contains("show_bounding_box = \"disable\""));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: AppConfig = toml::from_str(
            "[engine]\ntic_rate = 30.0\n\n[rendering]\nstereo_mode = \"side_by_side\"\n",
        )
        .unwrap();
        assert_eq!(config.engine.tic_rate, 30.0);
        assert_eq!(config.engine.max_logic_frames, 5);
        assert_eq!(config.rendering.stereo_mode, StereoMode::SideBySide);
        assert_eq!(config.rendering.height, 720);
    }

    #[test]
    fn test_engine_settings_flags() {
        let mut config = AppConfig::default();
        config.engine.use_external_clock = true;
        config.debug.show_profile = true;
        config.debug.auto_add_debug_properties = false;
        config.debug.show_camera_frustum = DebugMode::Force;

        let settings = config.engine_settings();
        assert!(settings.flags.contains(EngineFlags::FIXED_FRAMERATE | EngineFlags::USE_EXTERNAL_CLOCK));
        assert!(settings.flags.contains(EngineFlags::SHOW_PROFILE));
        assert!(!settings.flags.contains(EngineFlags::AUTO_ADD_DEBUG_PROPERTIES));
        assert!(!settings.flags.contains(EngineFlags::CAMERA_OVERRIDE));
        assert_eq!(settings.debug_draw.camera_frustum, DebugMode::Force);
        assert_eq!(settings.tic_rate, 60.0);
    }
}
