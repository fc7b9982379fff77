//! Hierarchy links and world transform propagation

use glam::{Quat, Vec3};

use super::Scene;
use crate::error::SceneError;
use crate::object::ObjectKey;
use crate::transform::Transform3D;

impl Scene {
    /// Attach `child` under `parent`, keeping its world placement
    pub fn set_parent(&mut self, child: ObjectKey, parent: ObjectKey) -> Result<(), SceneError> {
        if !self.objects.contains_key(child) || !self.objects.contains_key(parent) {
            return Err(SceneError::UnknownObject);
        }
        if child == parent || self.is_ancestor(child, parent) {
            log::warn!("Refusing to create a parent cycle in scene '{}'", self.name());
            return Ok(());
        }
        let parent_world = self.objects.get(parent).map(|p| p.node.world).unwrap_or_default();
        self.unlink_child(child);
        if let Some(object) = self.objects.get_mut(child) {
            object.node.local = parent_world.inverse().compose(&object.node.world);
        }
        self.link_child(child, parent);
        self.schedule_update(child);
        Ok(())
    }

    /// Detach `child` from its parent, keeping its world placement
    pub fn remove_parent(&mut self, child: ObjectKey) -> Result<(), SceneError> {
        let object = self.objects.get(child).ok_or(SceneError::UnknownObject)?;
        if object.node.parent.is_none() {
            return Ok(());
        }
        self.unlink_child(child);
        if let Some(object) = self.objects.get_mut(child) {
            object.node.local = object.node.world;
        }
        if self.is_active_object(child) {
            self.parent_list.push(child);
        }
        self.schedule_update(child);
        Ok(())
    }

    /// Record `child` under `parent` without touching transforms
    pub(crate) fn link_child(&mut self, child: ObjectKey, parent: ObjectKey) {
        if let Some(p) = self.objects.get_mut(parent) {
            if !p.node.children.contains(&child) {
                p.node.children.push(child);
            }
        }
        if let Some(c) = self.objects.get_mut(child) {
            c.node.parent = Some(parent);
        }
    }

    /// Remove `child` from its parent's children or from the root list
    pub(crate) fn unlink_child(&mut self, child: ObjectKey) {
        let parent = self.objects.get_mut(child).and_then(|c| c.node.parent.take());
        match parent {
            Some(parent) => {
                if let Some(p) = self.objects.get_mut(parent) {
                    p.node.children.retain(|k| *k != child);
                }
            }
            None => self.parent_list.retain(|k| *k != child),
        }
    }

    /// True if `ancestor` is above `key` in the hierarchy
    pub fn is_ancestor(&self, ancestor: ObjectKey, key: ObjectKey) -> bool {
        let mut current = self.objects.get(key).and_then(|o| o.node.parent);
        while let Some(k) = current {
            if k == ancestor {
                return true;
            }
            current = self.objects.get(k).and_then(|o| o.node.parent);
        }
        false
    }

    /// Topmost ancestor of `key` (itself if it is a root)
    pub fn root_of(&self, key: ObjectKey) -> ObjectKey {
        let mut root = key;
        while let Some(parent) = self.objects.get(root).and_then(|o| o.node.parent) {
            root = parent;
        }
        root
    }

    /// Every object below `key`, parents before children
    pub fn descendants(&self, key: ObjectKey) -> Vec<ObjectKey> {
        let mut out = Vec::new();
        let mut stack: Vec<ObjectKey> = self
            .objects
            .get(key)
            .map(|o| o.node.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(k) = stack.pop() {
            out.push(k);
            if let Some(o) = self.objects.get(k) {
                stack.extend(o.node.children.iter().rev().copied());
            }
        }
        out
    }

    pub fn world_transform(&self, key: ObjectKey) -> Option<Transform3D> {
        self.objects.get(key).map(|o| o.node.world)
    }

    pub fn local_transform(&self, key: ObjectKey) -> Option<Transform3D> {
        self.objects.get(key).map(|o| o.node.local)
    }

    pub fn set_local_transform(&mut self, key: ObjectKey, transform: Transform3D) -> Result<(), SceneError> {
        let object = self.objects.get_mut(key).ok_or(SceneError::UnknownObject)?;
        object.node.local = transform;
        self.schedule_update(key);
        Ok(())
    }

    pub fn set_local_position(&mut self, key: ObjectKey, position: Vec3) -> Result<(), SceneError> {
        let object = self.objects.get_mut(key).ok_or(SceneError::UnknownObject)?;
        object.node.local.position = position;
        self.schedule_update(key);
        Ok(())
    }

    pub fn set_local_orientation(&mut self, key: ObjectKey, orientation: Quat) -> Result<(), SceneError> {
        let object = self.objects.get_mut(key).ok_or(SceneError::UnknownObject)?;
        object.node.local.rotation = orientation;
        self.schedule_update(key);
        Ok(())
    }

    pub fn set_local_scale(&mut self, key: ObjectKey, scale: Vec3) -> Result<(), SceneError> {
        let object = self.objects.get_mut(key).ok_or(SceneError::UnknownObject)?;
        object.node.local.scale = scale;
        self.schedule_update(key);
        Ok(())
    }

    /// Queue the hierarchy containing `key` for the next update
    pub(crate) fn schedule_update(&mut self, key: ObjectKey) {
        let root = self.root_of(key);
        if !self.update_queue.contains(&root) {
            self.update_queue.push(root);
        }
    }

    /// Roots waiting for a world transform update
    pub fn pending_updates(&self) -> &[ObjectKey] {
        &self.update_queue
    }

    /// Recompute world transforms of every queued hierarchy
    ///
    /// Slow-parented nodes that have not caught up are queued again for the
    /// next call.
    pub fn update_parents(&mut self) {
        let pending = std::mem::take(&mut self.update_queue);
        let mut again = Vec::new();
        for root in pending {
            if self.objects.contains_key(root) && self.update_subtree(root) {
                again.push(self.root_of(root));
            }
        }
        debug_assert!(
            self.update_queue.is_empty(),
            "scenegraph update queue not empty after drain"
        );
        again.dedup();
        self.update_queue = again;
    }

    /// Recompute world transforms below and including `key`
    ///
    /// Returns true if a node asked to be updated again.
    pub(crate) fn update_subtree(&mut self, key: ObjectKey) -> bool {
        let parent_world = self
            .objects
            .get(key)
            .and_then(|o| o.node.parent)
            .and_then(|p| self.objects.get(p))
            .map(|p| p.node.world);
        let mut reschedule = false;
        let mut stack = vec![(key, parent_world)];
        while let Some((current, parent_world)) = stack.pop() {
            let Some(object) = self.objects.get_mut(current) else {
                continue;
            };
            reschedule |= object.node.compute_world(parent_world.as_ref());
            let world = object.node.world;
            self.bounding_boxes.update(current, &object.bounds, &world);
            for child in object.node.children.iter().rev() {
                stack.push((*child, Some(world)));
            }
        }
        reschedule
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ParentRelation;
    use crate::object::{GameObject, ObjectKind};

    fn empty(name: &str) -> GameObject {
        GameObject::new(name, ObjectKind::Empty)
    }

    #[test]
    fn test_update_parents_propagates() {
        let mut scene = Scene::new("graph");
        let root = scene.add_object(empty("root"), None);
        let child = scene.add_object(empty("child"), Some(root));
        scene.set_local_position(root, Vec3::new(1.0, 0.0, 0.0)).unwrap();
        scene.set_local_position(child, Vec3::new(0.0, 2.0, 0.0)).unwrap();

        scene.update_parents();
        assert_eq!(scene.world_transform(child).unwrap().position, Vec3::new(1.0, 2.0, 0.0));
        assert!(scene.pending_updates().is_empty());
    }

    #[test]
    fn test_schedule_queues_root_once() {
        let mut scene = Scene::new("graph");
        let root = scene.add_object(empty("root"), None);
        let child = scene.add_object(empty("child"), Some(root));
        scene.update_parents();

        scene.set_local_position(child, Vec3::X).unwrap();
        scene.set_local_position(root, Vec3::Y).unwrap();
        assert_eq!(scene.pending_updates(), &[root]);
    }

    #[test]
    fn test_set_parent_keeps_world_position() {
        let mut scene = Scene::new("graph");
        let a = scene.add_object(empty("a"), None);
        let b = scene.add_object(empty("b"), None);
        scene.set_local_position(a, Vec3::new(5.0, 0.0, 0.0)).unwrap();
        scene.set_local_position(b, Vec3::new(2.0, 0.0, 0.0)).unwrap();
        scene.update_parents();

        scene.set_parent(b, a).unwrap();
        scene.update_parents();
        assert_eq!(scene.root_parents(), &[a]);
        assert!((scene.world_transform(b).unwrap().position - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
        assert!((scene.local_transform(b).unwrap().position - Vec3::new(-3.0, 0.0, 0.0)).length() < 1e-5);

        scene.remove_parent(b).unwrap();
        scene.update_parents();
        assert_eq!(scene.root_parents(), &[a, b]);
        assert!((scene.world_transform(b).unwrap().position - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_set_parent_rejects_cycles() {
        let mut scene = Scene::new("graph");
        let a = scene.add_object(empty("a"), None);
        let b = scene.add_object(empty("b"), Some(a));
        scene.set_parent(a, b).unwrap();
        assert_eq!(scene.object(a).unwrap().parent(), None);
        assert!(scene.is_ancestor(a, b));
    }

    #[test]
    fn test_slow_parent_is_rescheduled() {
        let mut scene = Scene::new("graph");
        let root = scene.add_object(empty("root"), None);
        let mut follower = empty("follower");
        follower.node.relation = ParentRelation::Slow { factor: 3.0 };
        let follower = scene.add_object(follower, Some(root));
        scene.update_parents();

        scene.set_local_position(root, Vec3::new(8.0, 0.0, 0.0)).unwrap();
        scene.update_parents();
        assert_eq!(scene.pending_updates(), &[root]);
        let x = scene.world_transform(follower).unwrap().position.x;
        assert!(x > 0.0 && x < 8.0);
    }

    #[test]
    fn test_descendants_order() {
        let mut scene = Scene::new("graph");
        let a = scene.add_object(empty("a"), None);
        let b = scene.add_object(empty("b"), Some(a));
        let c = scene.add_object(empty("c"), Some(b));
        let d = scene.add_object(empty("d"), Some(a));
        assert_eq!(scene.descendants(a), vec![b, c, d]);
        assert_eq!(scene.root_of(c), a);
    }
}
