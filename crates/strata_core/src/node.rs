//! Spatial nodes
//!
//! Every game object owns exactly one [`SpatialNode`]. Hierarchy links are
//! object keys inside the same scene; the owning scene is referenced by
//! [`SceneId`].

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::object::ObjectKey;
use crate::scene::SceneId;
use crate::transform::Transform3D;

/// How a child derives its world transform from its parent
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum ParentRelation {
    /// Full parent transform
    #[default]
    Normal,
    /// Parent position only
    Vertex,
    /// Lags behind the parent; larger factors follow more slowly
    Slow { factor: f32 },
}

/// Transform and hierarchy state of one object
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SpatialNode {
    pub(crate) local: Transform3D,
    pub(crate) world: Transform3D,
    pub(crate) parent: Option<ObjectKey>,
    pub(crate) children: Vec<ObjectKey>,
    pub relation: ParentRelation,
    pub(crate) scene: SceneId,
    pub(crate) modified: bool,
    initialized: bool,
}

impl SpatialNode {
    pub fn new(local: Transform3D) -> Self {
        Self {
            local,
            world: local,
            modified: true,
            ..Self::default()
        }
    }

    pub fn local(&self) -> &Transform3D {
        &self.local
    }

    pub fn world(&self) -> &Transform3D {
        &self.world
    }

    pub fn world_position(&self) -> Vec3 {
        self.world.position
    }

    pub fn world_orientation(&self) -> Quat {
        self.world.rotation
    }

    pub fn world_scale(&self) -> Vec3 {
        self.world.scale
    }

    pub fn scene_id(&self) -> SceneId {
        self.scene
    }

    pub fn is_modified(&self) -> bool {
        self.modified
    }

    /// Root node seeded with this node's local transform and relation
    pub(crate) fn detached_copy(&self) -> Self {
        Self {
            local: self.local,
            world: self.local,
            parent: None,
            children: Vec::new(),
            relation: self.relation,
            scene: self.scene,
            modified: true,
            initialized: false,
        }
    }

    /// Recompute the world transform from the parent's world transform
    ///
    /// Returns true if the node must be updated again next frame.
    pub(crate) fn compute_world(&mut self, parent_world: Option<&Transform3D>) -> bool {
        let mut reschedule = false;
        self.world = match parent_world {
            None => self.local,
            Some(parent) => match self.relation {
                ParentRelation::Normal => parent.compose(&self.local),
                ParentRelation::Vertex => Transform3D {
                    position: parent.position + self.local.position,
                    ..self.local
                },
                ParentRelation::Slow { factor } => {
                    let target = parent.compose(&self.local);
                    if self.initialized && factor > 0.0 {
                        let blended = self.world.blend(&target, 1.0 / (factor + 1.0));
                        reschedule = (blended.position - target.position).length_squared() > 1e-10
                            || blended.rotation.angle_between(target.rotation) > 1e-5;
                        blended
                    } else {
                        target
                    }
                }
            },
        };
        self.initialized = true;
        self.modified = true;
        reschedule
    }
}
