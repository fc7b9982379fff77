//! Tick scheduling
//!
//! [`FrameScheduler`] turns elapsed clock time into a bounded batch of
//! simulation ticks. Two policies exist:
//!
//! - fixed framerate: ticks of `1 / tic_rate` seconds, as many as fit in the
//!   elapsed time
//! - variable framerate: one tick covering the whole elapsed time
//!
//! In both cases the batch is capped by the physics and logic frame limits;
//! a capped batch stretches its timestep so no elapsed time is lost.

use std::time::{Duration, Instant};

/// Default simulation rate in ticks per second
pub const DEFAULT_TIC_RATE: f64 = 60.0;
/// Default cap on logic ticks per batch
pub const DEFAULT_MAX_LOGIC_FRAMES: u32 = 5;
/// Default cap on physics ticks per batch
pub const DEFAULT_MAX_PHYSICS_FRAMES: u32 = 5;

/// Margin left for busy-waiting when idling between fixed ticks
const IDLE_MARGIN: f64 = 1.0e-3;

/// A monotonic source of seconds
pub trait TimeSource: Send {
    /// Seconds since the last reset
    fn now(&self) -> f64;
    /// Restart counting from zero
    fn reset(&mut self);
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    start: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn reset(&mut self) {
        self.start = Instant::now();
    }
}

/// Result of one scheduling call
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTimes {
    /// Number of ticks to run
    pub frames: u32,
    /// Seconds per tick, unscaled
    pub timestep: f64,
    /// Seconds per tick after the time scale
    pub framestep: f64,
    /// Suggested idle sleep when no tick is due under the fixed policy
    pub idle: Option<Duration>,
}

/// Converts elapsed clock time into tick batches
pub struct FrameScheduler {
    tic_rate: f64,
    max_logic_frames: u32,
    max_physics_frames: u32,
    time_scale: f64,
    fixed_framerate: bool,
    use_external_clock: bool,
    clock_time: f64,
    previous_real_time: f64,
    source: Box<dyn TimeSource>,
}

impl Default for FrameScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameScheduler {
    /// Create a scheduler on the monotonic wall clock
    pub fn new() -> Self {
        Self::with_source(Box::new(MonotonicClock::new()))
    }

    /// Create a scheduler on a custom time source
    pub fn with_source(source: Box<dyn TimeSource>) -> Self {
        Self {
            tic_rate: DEFAULT_TIC_RATE,
            max_logic_frames: DEFAULT_MAX_LOGIC_FRAMES,
            max_physics_frames: DEFAULT_MAX_PHYSICS_FRAMES,
            time_scale: 1.0,
            fixed_framerate: true,
            use_external_clock: false,
            clock_time: 0.0,
            previous_real_time: 0.0,
            source,
        }
    }

    /// Restart the clock at zero
    pub fn reset(&mut self) {
        self.source.reset();
        self.clock_time = 0.0;
        self.previous_real_time = 0.0;
    }

    /// Compute the next tick batch
    ///
    /// Advances the last-tick marker only when at least one tick is due.
    pub fn compute_frame_times(&mut self) -> FrameTimes {
        if !self.use_external_clock {
            self.clock_time = self.source.now();
        }

        let dt = self.clock_time - self.previous_real_time;

        let (mut timestep, mut frames) = if self.fixed_framerate {
            (1.0 / self.tic_rate, (dt * self.tic_rate).floor().max(0.0) as u32)
        } else if dt > 0.0 {
            (dt, 1)
        } else {
            (dt, 0)
        };

        if frames > self.max_physics_frames {
            frames = self.max_physics_frames;
            timestep = dt / f64::from(frames);
        }
        if frames > self.max_logic_frames {
            frames = self.max_logic_frames;
            timestep = dt / f64::from(frames);
        }

        let mut idle = None;
        if frames > 0 {
            self.previous_real_time = self.clock_time;
        } else if self.fixed_framerate {
            let sleeptime = timestep - dt - IDLE_MARGIN;
            if sleeptime > 0.0 {
                idle = Some(Duration::from_secs_f64(sleeptime));
            }
        }

        FrameTimes {
            frames,
            timestep,
            framestep: timestep * self.time_scale,
            idle,
        }
    }

    pub fn tic_rate(&self) -> f64 {
        self.tic_rate
    }

    /// Set the tick rate. Non-positive rates are ignored.
    pub fn set_tic_rate(&mut self, tic_rate: f64) {
        if tic_rate > 0.0 {
            self.tic_rate = tic_rate;
        } else {
            log::warn!("ignoring non-positive tic rate {}", tic_rate);
        }
    }

    pub fn max_logic_frames(&self) -> u32 {
        self.max_logic_frames
    }

    pub fn set_max_logic_frames(&mut self, frames: u32) {
        self.max_logic_frames = frames.max(1);
    }

    pub fn max_physics_frames(&self) -> u32 {
        self.max_physics_frames
    }

    pub fn set_max_physics_frames(&mut self, frames: u32) {
        self.max_physics_frames = frames.max(1);
    }

    pub fn time_scale(&self) -> f64 {
        self.time_scale
    }

    pub fn set_time_scale(&mut self, time_scale: f64) {
        self.time_scale = time_scale;
    }

    pub fn fixed_framerate(&self) -> bool {
        self.fixed_framerate
    }

    pub fn set_fixed_framerate(&mut self, fixed: bool) {
        self.fixed_framerate = fixed;
    }

    pub fn use_external_clock(&self) -> bool {
        self.use_external_clock
    }

    pub fn set_use_external_clock(&mut self, external: bool) {
        self.use_external_clock = external;
    }

    /// Current clock time in seconds
    pub fn clock_time(&self) -> f64 {
        self.clock_time
    }

    /// Supply the clock time (only meaningful with the external clock)
    pub fn set_clock_time(&mut self, time: f64) {
        self.clock_time = time;
    }

    /// Seconds on the underlying time source, regardless of the external clock
    pub fn real_time(&self) -> f64 {
        self.source.now()
    }
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("tic_rate", &self.tic_rate)
            .field("max_logic_frames", &self.max_logic_frames)
            .field("max_physics_frames", &self.max_physics_frames)
            .field("time_scale", &self.time_scale)
            .field("fixed_framerate", &self.fixed_framerate)
            .field("use_external_clock", &self.use_external_clock)
            .field("clock_time", &self.clock_time)
            .finish()
    }
}
