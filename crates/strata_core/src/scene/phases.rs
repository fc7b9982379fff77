//! Per-tick scene phases
//!
//! The engine calls these in a fixed order every logic frame; see
//! `update_parents` for the scenegraph flushes between them.

use super::Scene;
use crate::object::{ObjectKey, ObjectKind, Property, TEXT_PROPERTY, TIMEBOMB_PROPERTY};

impl Scene {
    /// Active objects whose logic is not suspended by activity culling
    pub fn logic_active_objects(&self) -> Vec<ObjectKey> {
        self.object_list
            .iter()
            .copied()
            .filter(|k| self.objects.get(*k).is_some_and(|o| !o.activity.logic_suspended))
            .collect()
    }

    /// Tick timebombs down, then run the logic begin hooks
    pub fn logic_begin_frame(&mut self, curtime: f64, framestep: f64) {
        for key in self.temp_list.clone() {
            let Some(object) = self.objects.get_mut(key) else {
                continue;
            };
            let Some(remaining) = object.property(TIMEBOMB_PROPERTY).and_then(Property::as_float) else {
                debug_assert!(false, "temporary object without a timebomb");
                log::error!("Temporary object '{}' has no timebomb property", object.name);
                continue;
            };
            let remaining = remaining - framestep;
            object.set_property(TIMEBOMB_PROPERTY, Property::Float(remaining));
            if remaining <= 0.0 {
                self.delayed_remove_object(key);
            }
        }

        let active = self.logic_active_objects();
        self.run_logic(|logic, scene| logic.begin_frame(scene, &active, curtime, framestep));
    }

    /// Run the logic update hooks
    pub fn logic_update_frame(&mut self, curtime: f64) {
        let active = self.logic_active_objects();
        self.run_logic(|logic, scene| logic.update_frame(scene, &active, curtime));
    }

    /// Destroy queued objects, then refresh text objects from their `Text` property
    pub fn logic_end_frame(&mut self) {
        let destroyed = self.destroy_pending_objects();
        if destroyed > 0 {
            log::debug!("Destroyed {} objects in scene '{}'", destroyed, self.name());
        }

        for key in &self.font_list {
            let Some(object) = self.objects.get_mut(*key) else {
                continue;
            };
            let Some(text) = object.property(TEXT_PROPERTY).map(|p| p.to_string()) else {
                continue;
            };
            if let ObjectKind::Text(data) = &mut object.kind {
                data.text = text;
            }
        }
    }

    /// Step physics and copy simulated poses back to their root objects
    ///
    /// Returns false if the scene has no physics or the environment did not step.
    pub fn proceed_physics(&mut self, curtime: f64, timestep: f64, framestep: f64) -> bool {
        let Some(env) = self.physics.as_mut() else {
            return false;
        };
        if !env.step_simulation(curtime, timestep, framestep) {
            return false;
        }

        let mut moved = Vec::new();
        for key in &self.parent_list {
            let Some(object) = self.objects.get_mut(*key) else {
                continue;
            };
            let Some(ctrl) = object.physics_controller else {
                continue;
            };
            if !env.controller(ctrl).is_some_and(|c| c.is_simulated()) {
                continue;
            }
            if let Some(state) = env.motion_state(ctrl) {
                object.node.local.position = state.position;
                object.node.local.rotation = state.orientation;
                moved.push(*key);
            }
        }
        for key in moved {
            self.schedule_update(key);
        }
        true
    }

    /// Run every logic hook with the scene borrowed mutably
    ///
    /// Hooks added while running are kept after the existing ones.
    fn run_logic<F>(&mut self, mut call: F)
    where
        F: FnMut(&mut dyn crate::logic::SceneLogic, &mut Scene),
    {
        if self.logic.is_empty() {
            return;
        }
        let mut hooks = std::mem::take(&mut self.logic);
        for hook in hooks.iter_mut() {
            call(hook.as_mut(), self);
        }
        let added = std::mem::replace(&mut self.logic, hooks);
        self.logic.extend(added);
    }
}
