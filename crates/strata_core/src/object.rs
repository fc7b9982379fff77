//! Game objects
//!
//! A [`GameObject`] lives in one scene's object arena and is addressed by an
//! [`ObjectKey`]. Its kind is a closed [`ObjectKind`] enum; kind-specific data
//! (camera lens, light, text) rides inside the variant.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use strata_physics::{ConstraintKind, ControllerKey};

use crate::animation::ActionManager;
use crate::camera::CameraData;
use crate::node::SpatialNode;

new_key_type! {
    /// Key to a game object in a scene
    pub struct ObjectKey;
}

/// Property holding the remaining lifetime of temporary objects, in seconds
pub const TIMEBOMB_PROPERTY: &str = "::timebomb";
/// Property text objects display
pub const TEXT_PROPERTY: &str = "Text";
/// Layer mask covering every layer
pub const ALL_LAYERS: u32 = u32::MAX;

/// A game property value
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Property {
    Float(f64),
    Int(i64),
    Bool(bool),
    Text(String),
}

impl Property {
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Property::Float(v) => Some(*v),
            Property::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Property::Float(v) => write!(f, "{}", v),
            Property::Int(v) => write!(f, "{}", v),
            Property::Bool(v) => write!(f, "{}", if *v { "TRUE" } else { "FALSE" }),
            Property::Text(v) => f.write_str(v),
        }
    }
}

/// Shared mesh data
///
/// Objects hold meshes through `Arc`; the strong count is the number of users.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mesh {
    pub name: String,
    /// Material names, one draw batch per material
    pub materials: Vec<String>,
}

impl Mesh {
    pub fn new(name: impl Into<String>, materials: Vec<String>) -> Self {
        Self {
            name: name.into(),
            materials,
        }
    }
}

/// How a deformer reshapes its mesh
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeformerKind {
    /// Driven by the parent armature's pose
    Skin,
    /// Shape keys
    Shape,
}

/// Per-object mesh deformation state
#[derive(Clone, Debug, PartialEq)]
pub struct Deformer {
    pub kind: DeformerKind,
    /// Number of times the deformation was evaluated
    pub update_count: u64,
    /// Pose time of the last evaluation
    pub last_update: f64,
}

impl Deformer {
    pub fn new(kind: DeformerKind) -> Self {
        Self {
            kind,
            update_count: 0,
            last_update: 0.0,
        }
    }

    /// Re-evaluate the deformation for the given pose time
    pub fn update(&mut self, pose_time: f64) {
        self.update_count += 1;
        self.last_update = pose_time;
    }
}

/// Light type
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightKind {
    Sun,
    Spot,
    Point,
}

/// Light parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightData {
    pub kind: LightKind,
    pub color: [f32; 3],
    pub energy: f32,
    #[serde(default)]
    pub cast_shadows: bool,
    /// Spot cone angle in radians
    #[serde(default = "default_spot_size")]
    pub spot_size: f32,
    /// Near/far range of the shadow map
    #[serde(default = "default_shadow_clip")]
    pub shadow_clip: [f32; 2],
    /// Half extent of the orthographic sun shadow volume
    #[serde(default = "default_shadow_frustum")]
    pub shadow_frustum_size: f32,
    /// Layers that cast shadows from this light
    #[serde(default = "default_layers")]
    pub shadow_layers: u32,
    #[serde(default)]
    pub show_shadow_frustum: bool,
}

fn default_spot_size() -> f32 {
    std::f32::consts::FRAC_PI_4
}

fn default_shadow_clip() -> [f32; 2] {
    [0.1, 40.0]
}

fn default_shadow_frustum() -> f32 {
    10.0
}

fn default_layers() -> u32 {
    ALL_LAYERS
}

impl Default for LightData {
    fn default() -> Self {
        Self {
            kind: LightKind::Point,
            color: [1.0, 1.0, 1.0],
            energy: 1.0,
            cast_shadows: false,
            spot_size: default_spot_size(),
            shadow_clip: default_shadow_clip(),
            shadow_frustum_size: default_shadow_frustum(),
            shadow_layers: ALL_LAYERS,
            show_shadow_frustum: false,
        }
    }
}

/// Text object state
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TextData {
    pub text: String,
    #[serde(default = "default_text_size")]
    pub size: f32,
}

fn default_text_size() -> f32 {
    1.0
}

/// What an object is
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ObjectKind {
    Empty,
    Mesh,
    Camera(CameraData),
    Light(LightData),
    Text(TextData),
    Armature,
}

impl ObjectKind {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectKind::Empty => "empty",
            ObjectKind::Mesh => "mesh",
            ObjectKind::Camera(_) => "camera",
            ObjectKind::Light(_) => "light",
            ObjectKind::Text(_) => "text",
            ObjectKind::Armature => "armature",
        }
    }
}

/// Group instancing data of a dupli-group object
///
/// Members are keys of template objects in the same scene. They are resolved
/// before any replication starts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DupliGroup {
    pub members: Vec<ObjectKey>,
    /// Group origin subtracted from member positions
    pub offset: Vec3,
}

/// A physics constraint declared on an object
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstraintLink {
    pub target: ObjectKey,
    pub kind: ConstraintKind,
}

/// Local-space axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            min: Vec3::splat(-1.0),
            max: Vec3::splat(1.0),
        }
    }
}

impl Aabb {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Radius of the enclosing sphere around the center
    pub fn radius(&self) -> f32 {
        (self.max - self.min).length() * 0.5
    }
}

/// Level-of-detail thresholds
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LodLevels {
    /// Ascending distances at which the next level starts
    pub distances: Vec<f32>,
    pub current: usize,
}

impl LodLevels {
    /// Pick the level for a camera distance scaled by `factor`
    pub fn update(&mut self, distance: f32, factor: f32) -> usize {
        let scaled = distance * factor;
        self.current = self.distances.iter().take_while(|d| scaled >= **d).count();
        self.current
    }
}

bitflags! {
    /// Which subsystems activity culling may suspend
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ActivityFlags: u8 {
        const LOGIC = 1 << 0;
        const PHYSICS = 1 << 1;
    }
}

/// Distance-based suspension of logic and physics
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActivityCulling {
    pub flags: ActivityFlags,
    pub logic_radius: f32,
    pub physics_radius: f32,
    pub logic_suspended: bool,
    pub physics_suspended: bool,
}

impl ActivityCulling {
    pub fn new(flags: ActivityFlags, logic_radius: f32, physics_radius: f32) -> Self {
        Self {
            flags,
            logic_radius,
            physics_radius,
            logic_suspended: false,
            physics_suspended: false,
        }
    }

    /// Update suspension for the squared distance to the nearest camera
    ///
    /// Returns `Some(suspended)` when the physics state changed.
    pub fn update(&mut self, distance_squared: f32) -> Option<bool> {
        if self.flags.contains(ActivityFlags::LOGIC) {
            self.logic_suspended = distance_squared > self.logic_radius * self.logic_radius;
        }
        if self.flags.contains(ActivityFlags::PHYSICS) {
            let suspend = distance_squared > self.physics_radius * self.physics_radius;
            if suspend != self.physics_suspended {
                self.physics_suspended = suspend;
                return Some(suspend);
            }
        }
        None
    }
}

/// An object in a scene
#[derive(Clone, Debug)]
pub struct GameObject {
    pub name: String,
    pub kind: ObjectKind,
    pub(crate) node: SpatialNode,
    properties: HashMap<String, Property>,
    /// Property names shown in the debug overlay when auto-add is enabled
    pub debug_properties: Vec<String>,
    pub meshes: Vec<Arc<Mesh>>,
    pub deformer: Option<Deformer>,
    pub physics_controller: Option<ControllerKey>,
    pub graphic_controller: Option<ControllerKey>,
    /// Group object this instance was created from (not owned)
    pub dupli_group_object: Option<ObjectKey>,
    /// Instances created from this group object
    pub instance_objects: Vec<ObjectKey>,
    pub dupli_group: Option<DupliGroup>,
    pub constraints: Vec<ConstraintLink>,
    pub layer: u32,
    pub visible: bool,
    pub use_culling: bool,
    pub culled: bool,
    pub bounds: Aabb,
    /// Draw the bounding box when bounding box debugging is enabled
    pub show_bounding_box: bool,
    /// Draw the armature when armature debugging is enabled
    pub show_armature: bool,
    pub lod: LodLevels,
    pub activity: ActivityCulling,
    pub actions: Option<ActionManager>,
}

impl GameObject {
    /// Create an object with no meshes, controllers or properties
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            node: SpatialNode::default(),
            properties: HashMap::new(),
            debug_properties: Vec::new(),
            meshes: Vec::new(),
            deformer: None,
            physics_controller: None,
            graphic_controller: None,
            dupli_group_object: None,
            instance_objects: Vec::new(),
            dupli_group: None,
            constraints: Vec::new(),
            layer: 1,
            visible: true,
            use_culling: true,
            culled: true,
            bounds: Aabb::default(),
            show_bounding_box: false,
            show_armature: false,
            lod: LodLevels::default(),
            activity: ActivityCulling::default(),
            actions: None,
        }
    }

    /// Builder: add a shared mesh
    pub fn with_mesh(mut self, mesh: Arc<Mesh>) -> Self {
        self.meshes.push(mesh);
        self
    }

    /// Builder: set a property
    pub fn with_property(mut self, name: impl Into<String>, value: Property) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Builder: set the layer mask
    pub fn with_layer(mut self, layer: u32) -> Self {
        self.layer = layer;
        self
    }

    pub fn node(&self) -> &SpatialNode {
        &self.node
    }

    pub fn parent(&self) -> Option<ObjectKey> {
        self.node.parent
    }

    pub fn children(&self) -> &[ObjectKey] {
        &self.node.children
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: impl Into<String>, value: Property) {
        self.properties.insert(name.into(), value);
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Property> {
        self.properties.remove(name)
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }

    pub fn camera(&self) -> Option<&CameraData> {
        match &self.kind {
            ObjectKind::Camera(data) => Some(data),
            _ => None,
        }
    }

    pub fn camera_mut(&mut self) -> Option<&mut CameraData> {
        match &mut self.kind {
            ObjectKind::Camera(data) => Some(data),
            _ => None,
        }
    }

    pub fn light(&self) -> Option<&LightData> {
        match &self.kind {
            ObjectKind::Light(data) => Some(data),
            _ => None,
        }
    }

    pub fn is_armature(&self) -> bool {
        matches!(self.kind, ObjectKind::Armature)
    }

    pub fn is_dupli_group(&self) -> bool {
        self.dupli_group.is_some()
    }

    /// Objects whose actions are paused keep their pose
    pub fn is_actions_suspended(&self) -> bool {
        self.actions.as_ref().is_some_and(|a| a.is_suspended())
    }

    /// Copy for replication
    ///
    /// Meshes stay shared. Controllers, hierarchy links and instance links
    /// are not copied; the scene rebinds them.
    pub fn replica(&self) -> Self {
        let mut copy = self.clone();
        copy.node = self.node.detached_copy();
        copy.physics_controller = None;
        copy.graphic_controller = None;
        copy.dupli_group_object = None;
        copy.instance_objects.clear();
        copy.culled = true;
        copy.activity.logic_suspended = false;
        copy.activity.physics_suspended = false;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_display() {
        assert_eq!(Property::Int(4).to_string(), "4");
        assert_eq!(Property::Bool(true).to_string(), "TRUE");
        assert_eq!(Property::Text("hi".into()).to_string(), "hi");
        assert_eq!(Property::Float(0.5).to_string(), "0.5");
    }

    #[test]
    fn test_property_as_float() {
        assert_eq!(Property::Int(2).as_float(), Some(2.0));
        assert_eq!(Property::Bool(true).as_float(), None);
    }

    #[test]
    fn test_replica_shares_meshes() {
        let mesh = Arc::new(Mesh::new("cube", vec!["stone".into()]));
        let mut obj = GameObject::new("box", ObjectKind::Mesh).with_mesh(mesh.clone());
        obj.instance_objects.push(ObjectKey::default());

        let copy = obj.replica();
        assert!(Arc::ptr_eq(&copy.meshes[0], &mesh));
        assert_eq!(Arc::strong_count(&mesh), 3);
        assert!(copy.instance_objects.is_empty());
        assert!(copy.physics_controller.is_none());
    }

    #[test]
    fn test_kind_accessors() {
        let cam = GameObject::new("cam", ObjectKind::Camera(CameraData::default()));
        assert!(cam.camera().is_some());
        assert!(cam.light().is_none());
        assert_eq!(cam.kind.name(), "camera");
        assert!(GameObject::new("rig", ObjectKind::Armature).is_armature());
    }

    #[test]
    fn test_lod_levels() {
        let mut lod = LodLevels {
            distances: vec![10.0, 20.0],
            current: 0,
        };
        assert_eq!(lod.update(5.0, 1.0), 0);
        assert_eq!(lod.update(15.0, 1.0), 1);
        assert_eq!(lod.update(15.0, 2.0), 2);
    }

    #[test]
    fn test_activity_culling_physics_transitions() {
        let mut activity = ActivityCulling::new(ActivityFlags::LOGIC | ActivityFlags::PHYSICS, 5.0, 10.0);

        assert_eq!(activity.update(36.0), None);
        assert!(activity.logic_suspended);
        assert!(!activity.physics_suspended);

        assert_eq!(activity.update(121.0), Some(true));
        assert_eq!(activity.update(144.0), None);
        assert_eq!(activity.update(1.0), Some(false));
        assert!(!activity.logic_suspended);
    }

    #[test]
    fn test_aabb() {
        let aabb = Aabb::new(Vec3::ZERO, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(aabb.center(), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(aabb.radius(), 1.0);
    }

    #[test]
    fn test_deformer_update() {
        let mut deformer = Deformer::new(DeformerKind::Skin);
        deformer.update(1.5);
        assert_eq!(deformer.update_count, 1);
        assert_eq!(deformer.last_update, 1.5);
    }
}
