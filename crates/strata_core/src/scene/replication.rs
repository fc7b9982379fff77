//! Object replication and group instancing
//!
//! Replication copies a whole subtree in two passes. The first pass copies
//! objects and hierarchy links, collecting `(original, replica)` pairs into
//! the scene's batch. The second pass works on the finished batch: it
//! replicates controllers and relinks constraints, so no reference ever
//! points into a half-built copy.

use std::collections::HashMap;

use strata_physics::MotionState;

use super::Scene;
use crate::error::SceneError;
use crate::object::{ConstraintLink, ObjectKey, Property, TIMEBOMB_PROPERTY};
use crate::transform::Transform3D;

/// Seconds per lifespan unit (lifespans count 50 Hz frames)
pub const TIMEBOMB_SECONDS_PER_UNIT: f64 = 0.02;
/// Deepest nesting of group instances inside group instances
pub const MAX_DUPLI_RECURSION: u32 = 8;

impl Scene {
    /// Replicate `original` and its children into the active object list
    ///
    /// With a `reference`, the copy is placed at the reference's world
    /// position and orientation, takes the scale of the reference's root and
    /// the reference's layer. A positive `lifespan` (in 50 Hz frames) removes
    /// the copy automatically.
    pub fn add_replica_object(
        &mut self,
        original: ObjectKey,
        reference: Option<ObjectKey>,
        lifespan: f64,
    ) -> Result<ObjectKey, SceneError> {
        let name = self
            .objects
            .get(original)
            .map(|o| o.name.clone())
            .ok_or(SceneError::UnknownObject)?;
        if reference.is_some_and(|r| !self.objects.contains_key(r)) {
            return Err(SceneError::UnknownObject);
        }

        self.batch.clear();
        let replica = self
            .add_node_replica_object(original)
            .ok_or(SceneError::NotReplicable(name.clone()))?;
        self.parent_list.push(replica);

        if lifespan > 0.0 {
            if let Some(object) = self.objects.get_mut(replica) {
                object.set_property(TIMEBOMB_PROPERTY, Property::Float(lifespan * TIMEBOMB_SECONDS_PER_UNIT));
            }
            if !self.temp_list.contains(&replica) {
                self.temp_list.push(replica);
            }
        }

        let children = self.child_keys(original);
        for child in children {
            self.replicate_recurse(replica, child);
        }

        if let Some(reference) = reference {
            let root_scale = self
                .objects
                .get(self.root_of(reference))
                .map(|r| r.node.world.scale);
            let placement = self.objects.get(reference).map(|r| (r.node.world, r.layer));
            if let (Some(scale), Some((world, layer)), Some(object)) =
                (root_scale, placement, self.objects.get_mut(replica))
            {
                object.node.local = Transform3D {
                    position: world.position,
                    rotation: world.rotation,
                    scale,
                };
                object.layer = layer;
            }
        }

        self.update_subtree(replica);
        let batch = std::mem::take(&mut self.batch);
        self.finish_replica_batch(&batch);
        self.expand_dupli_groups(&batch, 0);
        if self.settings.auto_debug_properties {
            for &(_, copy) in &batch {
                self.add_object_debug_properties(copy);
            }
        }

        log::debug!(
            "Replicated '{}' ({} objects) in scene '{}'",
            name,
            batch.len(),
            self.name()
        );
        Ok(replica)
    }

    /// Copy one object into the active list and record it in the batch
    ///
    /// Returns `None` when a group pass is running and the object is not a
    /// member of the group.
    fn add_node_replica_object(&mut self, original: ObjectKey) -> Option<ObjectKey> {
        if !self.group_filter.is_empty() && !self.group_filter.contains(&original) {
            return None;
        }
        let replica = self.objects.get(original)?.replica();
        let key = self.objects.insert(replica);
        self.object_list.push(key);
        self.register_categories(key);
        self.batch.push((original, key));
        Some(key)
    }

    fn replicate_recurse(&mut self, parent_replica: ObjectKey, original_child: ObjectKey) {
        let Some(replica) = self.add_node_replica_object(original_child) else {
            return;
        };
        self.link_child(replica, parent_replica);
        for child in self.child_keys(original_child) {
            self.replicate_recurse(replica, child);
        }
    }

    fn child_keys(&self, key: ObjectKey) -> Vec<ObjectKey> {
        self.objects
            .get(key)
            .map(|o| o.node.children.clone())
            .unwrap_or_default()
    }

    /// Replicate controllers and relink constraints of a finished batch
    fn finish_replica_batch(&mut self, batch: &[(ObjectKey, ObjectKey)]) {
        if let Some(env) = self.physics.as_mut() {
            // Batch order is parents first, so a parent's controller exists
            // before its children are looked at.
            for &(original, replica) in batch {
                let Some(source) = self.objects.get(original) else {
                    continue;
                };
                let (physics, graphic) = (source.physics_controller, source.graphic_controller);
                let parent_has_physics = self
                    .objects
                    .get(replica)
                    .and_then(|o| o.node.parent)
                    .and_then(|p| self.objects.get(p))
                    .is_some_and(|p| p.physics_controller.is_some());
                let Some(object) = self.objects.get_mut(replica) else {
                    continue;
                };
                let motion = MotionState {
                    position: object.node.world.position,
                    orientation: object.node.world.rotation,
                };
                if let Some(ctrl) = physics.and_then(|c| env.replicate_controller(c)) {
                    env.set_motion_state(ctrl, motion);
                    // Template controllers are suspended; replicas wake up unless parented to a body
                    if parent_has_physics {
                        env.suspend_dynamics(ctrl, false);
                    } else {
                        env.restore_dynamics(ctrl);
                    }
                    object.physics_controller = Some(ctrl);
                }
                if let Some(ctrl) = graphic.and_then(|c| env.replicate_controller(c)) {
                    env.set_motion_state(ctrl, motion);
                    env.activate_graphic_controller(ctrl, true);
                    object.graphic_controller = Some(ctrl);
                }
            }
        }

        let remap: HashMap<ObjectKey, ObjectKey> = batch.iter().copied().collect();
        for &(_, replica) in batch {
            let links = match self.objects.get_mut(replica) {
                Some(object) => {
                    for link in &mut object.constraints {
                        if let Some(target) = remap.get(&link.target) {
                            link.target = *target;
                        }
                    }
                    object.constraints.clone()
                }
                None => continue,
            };
            self.create_physics_constraints(replica, &links);
        }
    }

    /// Create environment constraints for links whose ends both have physics
    pub(crate) fn create_physics_constraints(&mut self, key: ObjectKey, links: &[ConstraintLink]) {
        let Some(env) = self.physics.as_mut() else {
            return;
        };
        let Some(a) = self.objects.get(key).and_then(|o| o.physics_controller) else {
            return;
        };
        for link in links {
            if let Some(b) = self.objects.get(link.target).and_then(|o| o.physics_controller) {
                env.add_constraint(a, b, link.kind);
            }
        }
    }

    fn expand_dupli_groups(&mut self, batch: &[(ObjectKey, ObjectKey)], level: u32) {
        for &(_, replica) in batch {
            if self.objects.get(replica).is_some_and(|o| o.is_dupli_group()) {
                self.dupli_group_recurse(replica, level);
            }
        }
    }

    /// Instantiate the members of `group_object`'s group
    ///
    /// Member roots are copied with their member children, placed relative
    /// to the group object, and linked back to it through
    /// `dupli_group_object`. Nested groups recurse until
    /// [`MAX_DUPLI_RECURSION`].
    pub fn dupli_group_recurse(&mut self, group_object: ObjectKey, level: u32) {
        if level > MAX_DUPLI_RECURSION {
            log::warn!(
                "Group instancing deeper than {} levels in scene '{}', stopping",
                MAX_DUPLI_RECURSION,
                self.name()
            );
            return;
        }
        let Some((group, group_world)) = self
            .objects
            .get(group_object)
            .and_then(|o| o.dupli_group.clone().map(|g| (g, o.node.world)))
        else {
            return;
        };
        let members: Vec<ObjectKey> = group
            .members
            .iter()
            .copied()
            .filter(|m| *m != group_object && self.objects.contains_key(*m))
            .collect();
        if members.is_empty() {
            return;
        }

        let saved_filter = std::mem::replace(&mut self.group_filter, members.iter().copied().collect());
        let saved_batch = std::mem::take(&mut self.batch);

        for member in members {
            let Some(member_world) = self
                .objects
                .get(member)
                .filter(|m| m.node.parent.is_none())
                .map(|m| m.node.world)
            else {
                continue;
            };
            let Some(replica) = self.add_node_replica_object(member) else {
                continue;
            };
            self.parent_list.push(replica);
            for child in self.child_keys(member) {
                self.replicate_recurse(replica, child);
            }

            let scale = group_world.scale;
            let offset = member_world.position - group.offset;
            if let Some(object) = self.objects.get_mut(replica) {
                object.node.local = Transform3D {
                    position: group_world.position + scale * (group_world.rotation * offset),
                    rotation: group_world.rotation * member_world.rotation,
                    scale,
                };
            }
            self.update_subtree(replica);
        }

        let batch = std::mem::replace(&mut self.batch, saved_batch);
        self.group_filter = saved_filter;

        for &(_, replica) in &batch {
            if let Some(object) = self.objects.get_mut(replica) {
                object.dupli_group_object = Some(group_object);
            }
        }
        if let Some(object) = self.objects.get_mut(group_object) {
            object.instance_objects.extend(batch.iter().map(|(_, r)| *r));
        }

        self.finish_replica_batch(&batch);
        if self.settings.auto_debug_properties {
            for &(_, copy) in &batch {
                self.add_object_debug_properties(copy);
            }
        }
        self.expand_dupli_groups(&batch, level + 1);
    }
}
