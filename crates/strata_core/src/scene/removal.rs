//! Object destruction
//!
//! `remove_object` destroys immediately. Logic must use
//! `delayed_remove_object`, which queues the object until
//! `destroy_pending_objects` runs at the end of the logic phase.

use super::Scene;
use crate::object::ObjectKey;

impl Scene {
    /// Detach `key` from its parent and destroy it with its whole subtree
    ///
    /// Children are destroyed before their parents. Returns false if the
    /// object is not in this scene.
    pub fn remove_object(&mut self, key: ObjectKey) -> bool {
        if !self.objects.contains_key(key) {
            return false;
        }
        self.unlink_child(key);
        let mut doomed = self.descendants(key);
        doomed.reverse();
        doomed.push(key);
        for object in doomed {
            self.new_remove_object(object);
        }
        true
    }

    /// Queue `key` for destruction at the end of logic
    ///
    /// The object's group instances are queued first. Queuing twice has no
    /// further effect.
    pub fn delayed_remove_object(&mut self, key: ObjectKey) {
        let Some(object) = self.objects.get(key) else {
            return;
        };
        for instance in object.instance_objects.clone() {
            self.delayed_remove_object(instance);
        }
        if !self.euthanasia.contains(&key) {
            self.euthanasia.push(key);
        }
    }

    /// Destroy every queued object that still exists
    ///
    /// Returns the number of objects destroyed directly from the queue.
    pub fn destroy_pending_objects(&mut self) -> usize {
        let mut destroyed = 0;
        for key in std::mem::take(&mut self.euthanasia) {
            if self.remove_object(key) {
                destroyed += 1;
            }
        }
        destroyed
    }

    /// Destroy every object, active and inactive
    pub fn destroy_all_objects(&mut self) {
        let roots: Vec<ObjectKey> = self
            .objects
            .iter()
            .filter(|(_, o)| o.node.parent.is_none())
            .map(|(k, _)| k)
            .collect();
        for root in roots {
            self.remove_object(root);
        }
        debug_assert!(self.objects.is_empty(), "objects left after scene teardown");
        self.update_queue.clear();
    }

    /// Purge one object from every list and release what it holds
    fn new_remove_object(&mut self, key: ObjectKey) {
        self.remove_object_debug_properties(key);
        let Some(object) = self.objects.remove(key) else {
            return;
        };

        if let Some(group) = object.dupli_group_object {
            if let Some(group) = self.objects.get_mut(group) {
                group.instance_objects.retain(|k| *k != key);
            }
        }
        for instance in &object.instance_objects {
            if let Some(instance) = self.objects.get_mut(*instance) {
                instance.dupli_group_object = None;
            }
        }
        if let Some(parent) = object.node.parent {
            if let Some(parent) = self.objects.get_mut(parent) {
                parent.node.children.retain(|k| *k != key);
            }
        }

        for list in [
            &mut self.object_list,
            &mut self.inactive_list,
            &mut self.parent_list,
            &mut self.camera_list,
            &mut self.light_list,
            &mut self.font_list,
            &mut self.animated_list,
            &mut self.temp_list,
            &mut self.euthanasia,
            &mut self.update_queue,
        ] {
            list.retain(|k| *k != key);
        }

        if let Some(env) = self.physics.as_mut() {
            for controller in [object.physics_controller, object.graphic_controller].into_iter().flatten() {
                env.remove_controller(controller);
            }
        }
        if self.active_camera == Some(key) {
            self.active_camera = None;
        }
        if self.override_culling_camera == Some(key) {
            self.override_culling_camera = None;
        }
        self.texture_renderers.invalidate_viewpoint(key);
        self.bounding_boxes.remove(key);
        log::trace!("Destroyed '{}' in scene '{}'", object.name, self.name());
    }
}
