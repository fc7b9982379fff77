//! Actions and the animation task group
//!
//! Pose updates are the only work that runs in parallel during a tick. The
//! scene hands a slice of independent [`AnimationTask`]s to an
//! [`AnimationPool`], which fans them out and joins before returning.

use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use crate::object::{Deformer, ObjectKey};

/// One playing action on an object
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionLayer {
    pub name: String,
    pub start_frame: f64,
    pub end_frame: f64,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_looping")]
    pub looping: bool,
    #[serde(skip)]
    pub frame: f64,
}

fn default_speed() -> f64 {
    1.0
}

fn default_looping() -> bool {
    true
}

impl ActionLayer {
    pub fn new(name: impl Into<String>, start_frame: f64, end_frame: f64) -> Self {
        Self {
            name: name.into(),
            start_frame,
            end_frame,
            speed: 1.0,
            looping: true,
            frame: start_frame,
        }
    }

    fn advance(&mut self, frames: f64) {
        let length = self.end_frame - self.start_frame;
        self.frame += frames * self.speed;
        if length <= 0.0 {
            self.frame = self.start_frame;
        } else if self.frame > self.end_frame {
            self.frame = if self.looping {
                self.start_frame + (self.frame - self.start_frame) % length
            } else {
                self.end_frame
            };
        }
    }
}

/// Actions playing on one object
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionManager {
    layers: Vec<ActionLayer>,
    suspended: bool,
    previous_time: f64,
    updates: u64,
}

impl ActionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layer(mut self, layer: ActionLayer) -> Self {
        self.layers.push(layer);
        self
    }

    pub fn play(&mut self, layer: ActionLayer) {
        self.layers.retain(|l| l.name != layer.name);
        self.layers.push(layer);
    }

    pub fn stop(&mut self, name: &str) {
        self.layers.retain(|l| l.name != name);
    }

    pub fn layers(&self) -> &[ActionLayer] {
        &self.layers
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    /// Number of pose evaluations so far
    pub fn update_count(&self) -> u64 {
        self.updates
    }

    /// Time of the last pose evaluation
    pub fn previous_time(&self) -> f64 {
        self.previous_time
    }

    /// Whether a pose update is due at `curtime`
    ///
    /// With `restrict`, updates are spaced by at least `1 / anim_framerate`
    /// seconds, except when time has not advanced at all.
    pub fn needs_update(&self, curtime: f64, restrict: bool, anim_framerate: f64) -> bool {
        if !restrict || anim_framerate <= 0.0 {
            return true;
        }
        let elapsed = curtime - self.previous_time;
        !(elapsed < 1.0 / anim_framerate && curtime != self.previous_time)
    }

    /// Advance every layer to `curtime`
    pub fn update(&mut self, curtime: f64, anim_framerate: f64) {
        let elapsed = (curtime - self.previous_time).max(0.0);
        let frames = elapsed * anim_framerate;
        for layer in &mut self.layers {
            layer.advance(frames);
        }
        self.previous_time = curtime;
        self.updates += 1;
    }

    /// Frame the deformers should be evaluated at
    pub fn pose_frame(&self) -> f64 {
        self.layers.first().map_or(0.0, |l| l.frame)
    }
}

/// Pose work for one animated object
///
/// The task owns everything it writes: the object's action manager and the
/// deformers it drives were moved out of the scene for the duration of the
/// parallel section.
#[derive(Debug)]
pub struct AnimationTask {
    pub object: ObjectKey,
    pub actions: ActionManager,
    pub deformers: Vec<(ObjectKey, Deformer)>,
    pub updated: bool,
}

impl AnimationTask {
    pub fn new(object: ObjectKey, actions: ActionManager) -> Self {
        Self {
            object,
            actions,
            deformers: Vec::new(),
            updated: false,
        }
    }

    /// Evaluate the pose if due and refresh the driven deformers
    pub fn run(&mut self, curtime: f64, restrict: bool, anim_framerate: f64) {
        if !self.actions.needs_update(curtime, restrict, anim_framerate) {
            return;
        }
        self.actions.update(curtime, anim_framerate);
        let pose = self.actions.pose_frame();
        for (_, deformer) in &mut self.deformers {
            deformer.update(pose);
        }
        self.updated = true;
    }
}

/// Bounded worker pool for pose updates
pub struct AnimationPool {
    pool: Option<ThreadPool>,
}

impl AnimationPool {
    /// Build a pool with `threads` workers; 0 uses rayon's global pool
    pub fn new(threads: usize) -> Self {
        if threads == 0 {
            return Self { pool: None };
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("strata-anim-{}", i))
            .build();
        match pool {
            Ok(pool) => Self { pool: Some(pool) },
            Err(e) => {
                log::warn!("Animation pool unavailable, using the global pool: {}", e);
                Self { pool: None }
            }
        }
    }

    /// Number of workers tasks are spread over
    pub fn thread_count(&self) -> usize {
        match &self.pool {
            Some(pool) => pool.current_num_threads(),
            None => rayon::current_num_threads(),
        }
    }

    /// Run every task and wait for all of them
    pub fn run_tasks(&self, tasks: &mut [AnimationTask], curtime: f64, restrict: bool, anim_framerate: f64) {
        let mut work = || {
            tasks
                .par_iter_mut()
                .for_each(|task| task.run(curtime, restrict, anim_framerate));
        };
        match &self.pool {
            Some(pool) => pool.install(work),
            None => work(),
        }
    }
}

impl Default for AnimationPool {
    fn default() -> Self {
        Self::new(0)
    }
}

impl std::fmt::Debug for AnimationPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnimationPool")
            .field("threads", &self.thread_count())
            .finish()
    }
}
