//! Scene simulation system
//!
//! Runs the per-scene phases of one tick in a fixed order:
//! - Activity culling (also for suspended scenes)
//! - Logic begin, scenegraph flush, logic update, logic end, scenegraph flush
//! - Pose updates
//! - Physics step and a final scenegraph flush

use strata_core::animation::AnimationPool;
use strata_core::profiling::{TimeCategory, TimeCategoryLogger};
use strata_core::scene::Scene;

/// Timing of one tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickParams {
    /// Total simulated time after this tick
    pub frame_time: f64,
    /// Unscaled tick duration
    pub timestep: f64,
    /// Tick duration after the time scale
    pub framestep: f64,
    pub anim_framerate: f64,
    pub restrict_animation: bool,
}

/// Drives the scene phases of a tick
#[derive(Debug, Default)]
pub struct SimulationSystem {
    ticks: u64,
}

impl SimulationSystem {
    /// Create a new simulation system
    pub fn new() -> Self {
        Self::default()
    }

    /// Ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Run one tick for every scene in list order
    pub fn tick(
        &mut self,
        scenes: &mut [Scene],
        params: &TickParams,
        pool: &AnimationPool,
        logger: &mut TimeCategoryLogger,
    ) {
        for scene in scenes.iter_mut() {
            Self::tick_scene(scene, params, pool, logger);
        }
        self.ticks += 1;
    }

    fn tick_scene(scene: &mut Scene, params: &TickParams, pool: &AnimationPool, logger: &mut TimeCategoryLogger) {
        logger.start_log(TimeCategory::Logic);
        scene.update_object_activity();

        if scene.is_suspended() {
            logger.start_log(TimeCategory::Services);
            return;
        }

        // 1. Logic begin: timebombs and begin hooks
        scene.logic_begin_frame(params.frame_time, params.framestep);

        // 2. Logic may have moved objects
        logger.start_log(TimeCategory::Scenegraph);
        scene.update_parents();

        // 3. Logic update and end of logic cleanup
        logger.start_log(TimeCategory::Logic);
        scene.logic_update_frame(params.frame_time);
        scene.logic_end_frame();

        logger.start_log(TimeCategory::Scenegraph);
        scene.update_parents();

        // 4. Poses, joined before physics
        logger.start_log(TimeCategory::Animations);
        scene.update_animations(params.frame_time, params.restrict_animation, params.anim_framerate, pool);

        // 5. Physics
        logger.start_log(TimeCategory::Physics);
        scene.proceed_physics(params.frame_time, params.timestep, params.framestep);

        logger.start_log(TimeCategory::Scenegraph);
        scene.update_parents();

        logger.start_log(TimeCategory::Services);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use strata_core::logic::SceneLogic;
    use strata_core::object::ObjectKey;

    struct Counter(Arc<Mutex<u32>>);

    impl SceneLogic for Counter {
        fn begin_frame(&mut self, _scene: &mut Scene, _active: &[ObjectKey], _curtime: f64, _framestep: f64) {
            *self.0.lock().unwrap() += 1;
        }
    }

    fn params() -> TickParams {
        TickParams {
            frame_time: 1.0 / 60.0,
            timestep: 1.0 / 60.0,
            framestep: 1.0 / 60.0,
            anim_framerate: 25.0,
            restrict_animation: false,
        }
    }

    #[test]
    fn test_suspended_scene_skips_logic() {
        let count = Arc::new(Mutex::new(0));
        let mut running = Scene::new("running");
        running.add_logic(Box::new(Counter(count.clone())));
        let mut paused = Scene::new("paused");
        paused.add_logic(Box::new(Counter(count.clone())));
        paused.suspend();

        let mut scenes = vec![running, paused];
        let mut system = SimulationSystem::new();
        let mut logger = TimeCategoryLogger::default();
        let pool = AnimationPool::default();
        system.tick(&mut scenes, &params(), &pool, &mut logger);
        system.tick(&mut scenes, &params(), &pool, &mut logger);

        assert_eq!(*count.lock().unwrap(), 2);
        assert_eq!(system.ticks(), 2);
    }
}
