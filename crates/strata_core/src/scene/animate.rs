//! Pose updates
//!
//! Every eligible animated object becomes one [`AnimationTask`] that owns
//! its action manager and the deformers it drives. The tasks run on the
//! animation pool and are joined before anything else touches the scene.

use super::Scene;
use crate::animation::{AnimationPool, AnimationTask};
use crate::object::ObjectKey;

impl Scene {
    /// Evaluate poses of the animated objects
    ///
    /// Returns the number of objects whose pose was updated.
    pub fn update_animations(&mut self, curtime: f64, restrict: bool, anim_framerate: f64, pool: &AnimationPool) -> usize {
        let mut tasks = Vec::new();
        for key in self.animated_list.clone() {
            let Some(driven) = self.driven_deformers(key) else {
                continue;
            };
            let Some(actions) = self.objects.get_mut(key).and_then(|o| o.actions.take()) else {
                continue;
            };
            let mut task = AnimationTask::new(key, actions);
            for target in driven {
                if let Some(deformer) = self.objects.get_mut(target).and_then(|o| o.deformer.take()) {
                    task.deformers.push((target, deformer));
                }
            }
            tasks.push(task);
        }
        if tasks.is_empty() {
            return 0;
        }

        pool.run_tasks(&mut tasks, curtime, restrict, anim_framerate);

        let mut updated = 0;
        for task in tasks {
            if task.updated {
                updated += 1;
            }
            for (target, deformer) in task.deformers {
                if let Some(object) = self.objects.get_mut(target) {
                    object.deformer = Some(deformer);
                }
            }
            if let Some(object) = self.objects.get_mut(task.object) {
                object.actions = Some(task.actions);
            }
        }
        log::trace!("Updated {} poses in scene '{}'", updated, self.name());
        updated
    }

    /// Objects whose deformers follow `key`'s pose, or None to skip it
    fn driven_deformers(&self, key: ObjectKey) -> Option<Vec<ObjectKey>> {
        let object = self.objects.get(key)?;
        if object.actions.is_none() || object.is_actions_suspended() {
            return None;
        }
        let children = &object.node.children;
        let with_deformer = |k: &&ObjectKey| self.objects.get(**k).is_some_and(|c| c.deformer.is_some());

        if object.is_armature() {
            let mut meshes = children
                .iter()
                .filter_map(|k| self.objects.get(*k))
                .filter(|c| !c.meshes.is_empty())
                .peekable();
            let has_meshes = meshes.peek().is_some();
            let any_visible = meshes.any(|c| !c.culled);
            if !any_visible && (has_meshes || children.is_empty()) {
                return None;
            }
            return Some(children.iter().filter(with_deformer).copied().collect());
        }

        let parent_is_armature = object
            .node
            .parent
            .and_then(|p| self.objects.get(p))
            .is_some_and(|p| p.is_armature());
        let mut driven = Vec::new();
        if object.deformer.is_some() && !parent_is_armature {
            driven.push(key);
        }
        driven.extend(children.iter().filter(with_deformer).copied());
        Some(driven)
    }
}
