//! Merging one scene into another

use std::collections::HashMap;

use strata_physics::ControllerKey;

use super::Scene;
use crate::error::SceneError;
use crate::object::{ConstraintLink, ObjectKey};

impl Scene {
    /// Move everything from `other` into this scene
    ///
    /// Fails without touching either scene when only one of them has a
    /// physics environment. On success `other` is left empty and this
    /// scene's lists read `[own entries..., other's entries...]`.
    pub fn merge(&mut self, other: &mut Scene) -> Result<(), SceneError> {
        if self.physics.is_some() != other.physics.is_some() {
            let err = SceneError::PhysicsMismatch {
                this: self.name().to_string(),
                other: other.name().to_string(),
            };
            log::error!("{}", err);
            return Err(err);
        }

        let remap: HashMap<ObjectKey, ObjectKey> = other
            .objects
            .drain()
            .map(|(old, object)| (old, self.objects.insert(object)))
            .collect();
        let map = |k: &ObjectKey| remap.get(k).copied();

        let controllers: HashMap<ControllerKey, ControllerKey> = match (self.physics.as_mut(), other.physics.as_mut()) {
            (Some(mine), Some(theirs)) => mine.merge_environment(&mut **theirs),
            _ => HashMap::new(),
        };

        for new in remap.values() {
            let Some(object) = self.objects.get_mut(*new) else {
                continue;
            };
            object.node.scene = self.id;
            object.node.parent = object.node.parent.as_ref().and_then(map);
            object.node.children = object.node.children.iter().filter_map(map).collect();
            object.dupli_group_object = object.dupli_group_object.as_ref().and_then(map);
            object.instance_objects = object.instance_objects.iter().filter_map(map).collect();
            if let Some(group) = object.dupli_group.as_mut() {
                group.members = group.members.iter().filter_map(map).collect();
            }
            object.constraints = object
                .constraints
                .iter()
                .filter_map(|link| {
                    map(&link.target).map(|target| ConstraintLink {
                        target,
                        kind: link.kind,
                    })
                })
                .collect();
            object.physics_controller = object.physics_controller.and_then(|c| controllers.get(&c).copied());
            object.graphic_controller = object.graphic_controller.and_then(|c| controllers.get(&c).copied());
        }

        self.buckets.merge(&other.buckets);
        self.bounding_boxes.merge(&mut other.bounding_boxes, &remap);
        self.filters.merge(&mut other.filters);
        self.texture_renderers.merge(&mut other.texture_renderers, &remap);

        let moved_objects: Vec<ObjectKey> = other.object_list.iter().filter_map(map).collect();
        for (mine, theirs) in [
            (&mut self.object_list, &mut other.object_list),
            (&mut self.inactive_list, &mut other.inactive_list),
            (&mut self.parent_list, &mut other.parent_list),
            (&mut self.camera_list, &mut other.camera_list),
            (&mut self.light_list, &mut other.light_list),
            (&mut self.font_list, &mut other.font_list),
            (&mut self.animated_list, &mut other.animated_list),
            (&mut self.temp_list, &mut other.temp_list),
            (&mut self.euthanasia, &mut other.euthanasia),
        ] {
            mine.extend(theirs.drain(..).filter_map(|k| remap.get(&k).copied()));
        }
        for root in other.update_queue.drain(..).filter_map(|k| remap.get(&k).copied()) {
            if !self.update_queue.contains(&root) {
                self.update_queue.push(root);
            }
        }

        for key in &moved_objects {
            let links = self.objects.get(*key).map(|o| o.constraints.clone()).unwrap_or_default();
            self.create_physics_constraints(*key, &links);
        }

        for (key, name) in std::mem::take(&mut other.debug_list) {
            if let Some(new) = remap.get(&key) {
                if self.add_debug_property(*new, &name).is_err() {
                    break;
                }
            }
        }
        if self.settings.auto_debug_properties {
            for key in &moved_objects {
                self.add_object_debug_properties(*key);
            }
        }

        other.active_camera = None;
        other.override_culling_camera = None;

        log::info!(
            "Merged scene '{}' into '{}' ({} objects)",
            other.name(),
            self.name(),
            remap.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{GameObject, ObjectKind};
    use glam::Vec3;
    use strata_physics::{ConstraintKind, ControllerDesc, PhysicsEnvironment, PhysicsWorld};

    fn empty(name: &str) -> GameObject {
        GameObject::new(name, ObjectKind::Empty)
    }

    #[test]
    fn test_merge_rejects_physics_mismatch() {
        let mut with = Scene::new("with").with_physics(Box::new(PhysicsWorld::new()));
        with.add_object(empty("a"), None);
        let mut without = Scene::new("without");
        without.add_object(empty("b"), None);

        assert!(matches!(
            with.merge(&mut without),
            Err(SceneError::PhysicsMismatch { .. })
        ));
        assert!(without.merge(&mut with).is_err());
        assert_eq!(with.object_count(), 1);
        assert_eq!(without.object_count(), 1);
    }

    #[test]
    fn test_merge_appends_in_order() {
        let mut level = Scene::new("level");
        let a = level.add_object(empty("a"), None);
        let mut library = Scene::new("library");
        let b = library.add_object(empty("b"), None);
        library.add_object(empty("c"), Some(b));
        library.add_inactive_object(empty("template"), None);

        level.merge(&mut library).unwrap();

        let names: Vec<&str> = level
            .objects()
            .iter()
            .map(|k| level.object(*k).unwrap().name.as_str())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(level.root_parents()[0], a);
        assert_eq!(level.root_parents().len(), 2);
        assert_eq!(level.inactive_objects().len(), 1);
        assert_eq!(library.arena_len(), 0);
        assert_eq!(library.object_count(), 0);

        let b_new = level.root_parents()[1];
        let c_new = level.object(b_new).unwrap().children()[0];
        assert_eq!(level.object(c_new).unwrap().parent(), Some(b_new));
        assert_eq!(level.object(c_new).unwrap().node().scene_id(), level.id());
    }

    #[test]
    fn test_merge_moves_controllers_and_constraints() {
        let mut level = Scene::new("level").with_physics(Box::new(PhysicsWorld::new()));
        let mut library = Scene::new("library").with_physics(Box::new(PhysicsWorld::new()));

        let env = library.physics_environment_mut().unwrap();
        let c1 = env.add_controller(ControllerDesc::rigid(Vec3::ZERO, 1.0));
        let c2 = env.add_controller(ControllerDesc::rigid(Vec3::X, 1.0));
        let mut door = empty("door");
        door.physics_controller = Some(c1);
        let door = library.add_object(door, None);
        let mut frame = empty("frame");
        frame.physics_controller = Some(c2);
        frame.constraints.push(ConstraintLink {
            target: door,
            kind: ConstraintKind::Hinge,
        });
        library.add_object(frame, None);

        level.merge(&mut library).unwrap();

        let env = level.physics_environment().unwrap();
        assert_eq!(env.controller_count(), 2);
        assert_eq!(env.constraint_count(), 1);
        assert_eq!(library.physics_environment().unwrap().controller_count(), 0);
        for key in level.objects() {
            let ctrl = level.object(*key).unwrap().physics_controller.unwrap();
            assert!(env.controller(ctrl).is_some());
        }
    }

    #[test]
    fn test_merge_carries_debug_entries() {
        let mut level = Scene::new("level");
        let mut library = Scene::new("library");
        let mut score = empty("score");
        score.set_property("points", crate::object::Property::Int(3));
        let score = library.add_object(score, None);
        library.add_debug_property(score, "points").unwrap();

        level.merge(&mut library).unwrap();
        assert_eq!(level.debug_properties().len(), 1);
        assert!(library.debug_properties().is_empty());
    }
}
