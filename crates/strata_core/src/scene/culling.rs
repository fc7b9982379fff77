//! Visibility, level of detail and activity culling

use std::collections::HashSet;

use glam::Vec3;
use strata_physics::{ControllerKey, CullingQuery};

use super::Scene;
use crate::camera::Frustum;
use crate::managers::DrawBatch;
use crate::object::ObjectKey;

impl Scene {
    /// Suspend logic and physics of objects far from every activity camera
    pub fn update_object_activity(&mut self) {
        if !self.settings.activity_culling {
            return;
        }
        let cameras: Vec<Vec3> = self
            .camera_list
            .iter()
            .filter_map(|k| self.objects.get(*k))
            .filter(|o| o.camera().is_some_and(|c| c.activity_culling))
            .map(|o| o.node.world.position)
            .collect();
        if cameras.is_empty() {
            return;
        }

        for key in &self.object_list {
            let parent_has_physics = self
                .objects
                .get(*key)
                .and_then(|o| o.node.parent)
                .and_then(|p| self.objects.get(p))
                .is_some_and(|p| p.physics_controller.is_some());
            let Some(object) = self.objects.get_mut(*key) else {
                continue;
            };
            if object.activity.flags.is_empty() {
                continue;
            }
            let position = object.node.world.position;
            let distance = cameras
                .iter()
                .map(|c| c.distance_squared(position))
                .fold(f32::INFINITY, f32::min);
            let Some(suspend) = object.activity.update(distance) else {
                continue;
            };
            if let (Some(env), Some(ctrl)) = (self.physics.as_mut(), object.physics_controller) {
                // Children of a physics parent stay suspended and follow it
                if suspend {
                    env.suspend_dynamics(ctrl, false);
                } else if !parent_has_physics {
                    env.restore_dynamics(ctrl);
                }
            }
        }
    }

    /// Update every mesh object's `culled` flag and return the visible ones
    ///
    /// Objects outside `layer_mask` or hidden stay culled. The physics
    /// environment's culling tree is used when enabled and available;
    /// otherwise world bounding spheres are tested against the frustum.
    pub fn calculate_visible_meshes(
        &mut self,
        frustum: &Frustum,
        layer_mask: u32,
        viewport: [i32; 4],
        use_culling: bool,
    ) -> Vec<ObjectKey> {
        let tree: Option<HashSet<ControllerKey>> = if use_culling && self.settings.dbvt_culling {
            self.physics
                .as_ref()
                .and_then(|env| {
                    env.culling_test(&CullingQuery {
                        planes: &frustum.planes,
                        viewport,
                        matrix: frustum.matrix,
                    })
                })
                .map(|visible| visible.into_iter().collect())
        } else {
            None
        };

        let mut visible = Vec::new();
        for key in &self.object_list {
            let sphere = self.bounding_boxes.sphere(*key);
            let Some(object) = self.objects.get_mut(*key) else {
                continue;
            };
            if object.meshes.is_empty() {
                continue;
            }
            if !object.visible || object.layer & layer_mask == 0 {
                object.culled = true;
                continue;
            }
            let inside = if !use_culling || !object.use_culling {
                true
            } else if let (Some(tree), Some(ctrl)) = (&tree, object.graphic_controller) {
                tree.contains(&ctrl)
            } else {
                match sphere {
                    Some(s) => frustum.contains_sphere(s.center, s.radius),
                    None => frustum.contains_point(object.node.world.position),
                }
            };
            object.culled = !inside;
            if inside {
                visible.push(*key);
            }
        }
        visible
    }

    /// Pick the level of detail of every visible object
    pub fn update_object_lods(&mut self, camera_position: Vec3, lod_factor: f32) {
        for key in &self.object_list {
            let Some(object) = self.objects.get_mut(*key) else {
                continue;
            };
            if object.culled || object.lod.distances.is_empty() {
                continue;
            }
            let distance = object.node.world.position.distance(camera_position);
            object.lod.update(distance, lod_factor);
        }
    }

    /// Group visible objects into material draw batches
    pub fn render_buckets(&self, visible: &[ObjectKey]) -> Vec<DrawBatch> {
        self.buckets.batches(
            visible
                .iter()
                .filter_map(|k| self.objects.get(*k).map(|o| (*k, o.meshes.as_slice()))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraData;
    use crate::object::{ActivityCulling, ActivityFlags, GameObject, LodLevels, Mesh, ObjectKind};
    use glam::{Mat4, Quat};
    use std::sync::Arc;
    use strata_physics::{ControllerDesc, PhysicsEnvironment, PhysicsWorld};

    fn mesh_object(name: &str, material: &str) -> GameObject {
        GameObject::new(name, ObjectKind::Mesh).with_mesh(Arc::new(Mesh::new(name, vec![material.to_string()])))
    }

    fn looking_down_z() -> Frustum {
        Frustum::from_matrix(CameraData::default().projection(1.0, 0.0) * Mat4::IDENTITY)
    }

    #[test]
    fn test_sphere_culling() {
        let mut scene = Scene::new("cull");
        let front = scene.add_object(mesh_object("front", "a"), None);
        let behind = scene.add_object(mesh_object("behind", "a"), None);
        scene.set_local_position(front, Vec3::new(0.0, 0.0, -10.0)).unwrap();
        scene.set_local_position(behind, Vec3::new(0.0, 0.0, 10.0)).unwrap();
        scene.update_parents();

        let visible = scene.calculate_visible_meshes(&looking_down_z(), u32::MAX, [0, 0, 100, 100], true);
        assert_eq!(visible, vec![front]);
        assert!(scene.object(behind).unwrap().culled);
        assert!(!scene.object(front).unwrap().culled);

        let all = scene.calculate_visible_meshes(&looking_down_z(), u32::MAX, [0, 0, 100, 100], false);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_layer_mask_hides() {
        let mut scene = Scene::new("cull");
        let key = scene.add_object(mesh_object("o", "a").with_layer(2), None);
        scene.set_local_position(key, Vec3::new(0.0, 0.0, -5.0)).unwrap();
        scene.update_parents();
        assert!(scene.calculate_visible_meshes(&looking_down_z(), 1, [0, 0, 1, 1], true).is_empty());
        assert_eq!(scene.calculate_visible_meshes(&looking_down_z(), 2, [0, 0, 1, 1], true), vec![key]);
    }

    #[test]
    fn test_culling_tree_used_when_enabled() {
        let mut scene = Scene::new("cull").with_physics(Box::new(PhysicsWorld::new()));
        scene.settings.dbvt_culling = true;
        let graphic = scene
            .physics_environment_mut()
            .unwrap()
            .add_controller(ControllerDesc::graphic(Vec3::new(0.0, 0.0, 10.0), 1.0));
        scene
            .physics_environment_mut()
            .unwrap()
            .activate_graphic_controller(graphic, true);

        // The node sits in front of the camera but its culling volume does not
        let mut object = mesh_object("o", "a");
        object.graphic_controller = Some(graphic);
        let key = scene.add_object(object, None);
        scene.set_local_position(key, Vec3::new(0.0, 0.0, -5.0)).unwrap();
        scene.update_parents();

        assert!(scene.calculate_visible_meshes(&looking_down_z(), u32::MAX, [0, 0, 1, 1], true).is_empty());
    }

    #[test]
    fn test_lods_follow_distance() {
        let mut scene = Scene::new("cull");
        let mut object = mesh_object("o", "a");
        object.lod = LodLevels {
            distances: vec![5.0, 20.0],
            current: 0,
        };
        object.culled = false;
        let key = scene.add_object(object, None);
        scene.set_local_position(key, Vec3::new(0.0, 0.0, -10.0)).unwrap();
        scene.update_parents();

        scene.update_object_lods(Vec3::ZERO, 1.0);
        assert_eq!(scene.object(key).unwrap().lod.current, 1);
        scene.update_object_lods(Vec3::ZERO, 3.0);
        assert_eq!(scene.object(key).unwrap().lod.current, 2);
    }

    #[test]
    fn test_buckets_group_materials() {
        let mut scene = Scene::new("cull");
        let a = scene.add_object(mesh_object("a", "stone"), None);
        let b = scene.add_object(mesh_object("b", "wood"), None);
        let c = scene.add_object(mesh_object("c", "stone"), None);
        let batches = scene.render_buckets(&[a, b, c]);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].objects, vec![a, c]);
        assert_eq!(batches[1].objects, vec![b]);
    }

    #[test]
    fn test_activity_culling_suspends_far_objects() {
        let mut scene = Scene::new("cull").with_physics(Box::new(PhysicsWorld::new()));
        scene.settings.activity_culling = true;
        let camera = CameraData {
            activity_culling: true,
            ..CameraData::default()
        };
        scene.add_object(GameObject::new("cam", ObjectKind::Camera(camera)), None);
        let ctrl = scene
            .physics_environment_mut()
            .unwrap()
            .add_controller(ControllerDesc::rigid(Vec3::ZERO, 1.0));
        let mut far = GameObject::new("far", ObjectKind::Empty);
        far.activity = ActivityCulling::new(ActivityFlags::LOGIC | ActivityFlags::PHYSICS, 10.0, 20.0);
        far.physics_controller = Some(ctrl);
        let far = scene.add_object(far, None);
        scene
            .set_local_transform(
                far,
                crate::transform::Transform3D::from_position_rotation(Vec3::new(50.0, 0.0, 0.0), Quat::IDENTITY),
            )
            .unwrap();
        scene.update_parents();

        scene.update_object_activity();
        let object = scene.object(far).unwrap();
        assert!(object.activity.logic_suspended);
        assert!(object.activity.physics_suspended);
        assert!(scene.physics_environment().unwrap().is_dynamics_suspended(ctrl));

        scene.set_local_position(far, Vec3::ZERO).unwrap();
        scene.update_parents();
        scene.update_object_activity();
        assert!(!scene.physics_environment().unwrap().is_dynamics_suspended(ctrl));
    }

    #[test]
    fn test_activity_restore_keeps_attached_child_suspended() {
        let mut scene = Scene::new("cull").with_physics(Box::new(PhysicsWorld::new()));
        scene.settings.activity_culling = true;
        let camera = CameraData {
            activity_culling: true,
            ..CameraData::default()
        };
        let cam = scene.add_object(GameObject::new("cam", ObjectKind::Camera(camera)), None);
        let env = scene.physics_environment_mut().unwrap();
        let body = env.add_controller(ControllerDesc::rigid(Vec3::ZERO, 1.0));
        let wheel_body = env.add_controller(ControllerDesc::rigid(Vec3::ZERO, 1.0));

        let flags = ActivityFlags::LOGIC | ActivityFlags::PHYSICS;
        let mut car = GameObject::new("car", ObjectKind::Empty);
        car.physics_controller = Some(body);
        car.activity = ActivityCulling::new(flags, 10.0, 20.0);
        let car = scene.add_inactive_object(car, None);
        let mut wheel = GameObject::new("wheel", ObjectKind::Empty);
        wheel.physics_controller = Some(wheel_body);
        wheel.activity = ActivityCulling::new(flags, 10.0, 20.0);
        scene.add_inactive_object(wheel, Some(car));
        scene.update_parents();

        let replica = scene.add_replica_object(car, None, 0.0).unwrap();
        let wheel_replica = scene.object(replica).unwrap().children()[0];
        let car_ctrl = scene.object(replica).unwrap().physics_controller.unwrap();
        let wheel_ctrl = scene.object(wheel_replica).unwrap().physics_controller.unwrap();
        assert!(scene.physics_environment().unwrap().is_dynamics_suspended(wheel_ctrl));

        scene.set_local_position(cam, Vec3::new(100.0, 0.0, 0.0)).unwrap();
        scene.update_parents();
        scene.update_object_activity();
        assert!(scene.object(wheel_replica).unwrap().activity.physics_suspended);
        assert!(scene.physics_environment().unwrap().is_dynamics_suspended(car_ctrl));

        scene.set_local_position(cam, Vec3::ZERO).unwrap();
        scene.update_parents();
        scene.update_object_activity();
        let env = scene.physics_environment().unwrap();
        assert!(!env.is_dynamics_suspended(car_ctrl));
        assert!(env.is_dynamics_suspended(wheel_ctrl));
    }
}
