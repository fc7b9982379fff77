//! Scene templates
//!
//! A [`SceneTemplate`] is the serializable source of a scene: its objects,
//! hierarchy, physics settings and active camera. Templates are loaded from
//! and saved to RON files; the converter instantiates them into runtime
//! [`Scene`](crate::scene::Scene)s.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use strata_physics::ConstraintKind;

use crate::animation::{ActionLayer, ActionManager};
use crate::node::{ParentRelation, SpatialNode};
use crate::object::{
    Aabb, ActivityCulling, ActivityFlags, Deformer, DeformerKind, GameObject, LodLevels, Mesh, ObjectKind, Property,
};
use crate::scene::SceneSettings;
use crate::transform::Transform3D;

/// Physics settings of a scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhysicsTemplate {
    #[serde(default = "default_gravity")]
    pub gravity: Vec3,
    /// Answer visibility queries from the environment's culling tree
    #[serde(default = "default_true")]
    pub culling_tree: bool,
}

fn default_gravity() -> Vec3 {
    Vec3::new(0.0, 0.0, -9.81)
}

fn default_true() -> bool {
    true
}

fn default_layer() -> u32 {
    1
}

impl Default for PhysicsTemplate {
    fn default() -> Self {
        Self {
            gravity: default_gravity(),
            culling_tree: true,
        }
    }
}

/// Physics body of an object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum BodyTemplate {
    Rigid { mass: f32 },
    Static,
}

/// Activity culling radii; a missing radius leaves that subsystem running
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityTemplate {
    #[serde(default)]
    pub logic_radius: Option<f32>,
    #[serde(default)]
    pub physics_radius: Option<f32>,
}

/// Group instancing declared by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GroupTemplate {
    pub members: Vec<String>,
    #[serde(default)]
    pub offset: Vec3,
}

/// Constraint to another object of the same scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintTemplate {
    pub target: String,
    pub kind: ConstraintKind,
}

/// A serializable object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectTemplate {
    pub name: String,
    pub kind: ObjectKind,
    #[serde(default)]
    pub parent: Option<String>,
    /// Transform relative to the parent
    #[serde(default)]
    pub transform: Transform3D,
    #[serde(default)]
    pub relation: ParentRelation,
    /// Inactive objects are replication templates. Children of inactive
    /// objects are inactive too.
    #[serde(default)]
    pub inactive: bool,
    #[serde(default)]
    pub meshes: Vec<Mesh>,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    #[serde(default)]
    pub debug_properties: Vec<String>,
    #[serde(default)]
    pub body: Option<BodyTemplate>,
    #[serde(default = "default_layer")]
    pub layer: u32,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default)]
    pub bounds: Option<Aabb>,
    #[serde(default)]
    pub show_debug: bool,
    #[serde(default)]
    pub lod: Vec<f32>,
    #[serde(default)]
    pub activity: Option<ActivityTemplate>,
    #[serde(default)]
    pub deformer: Option<DeformerKind>,
    #[serde(default)]
    pub actions: Vec<ActionLayer>,
    #[serde(default)]
    pub group: Option<GroupTemplate>,
    #[serde(default)]
    pub constraints: Vec<ConstraintTemplate>,
}

impl ObjectTemplate {
    pub fn new(name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            name: name.into(),
            kind,
            parent: None,
            transform: Transform3D::default(),
            relation: ParentRelation::Normal,
            inactive: false,
            meshes: Vec::new(),
            properties: BTreeMap::new(),
            debug_properties: Vec::new(),
            body: None,
            layer: default_layer(),
            visible: true,
            bounds: None,
            show_debug: false,
            lod: Vec::new(),
            activity: None,
            deformer: None,
            actions: Vec::new(),
            group: None,
            constraints: Vec::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_transform(mut self, transform: Transform3D) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_position(mut self, position: Vec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.inactive = true;
        self
    }

    pub fn with_mesh(mut self, mesh: Mesh) -> Self {
        self.meshes.push(mesh);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: Property) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    pub fn with_body(mut self, body: BodyTemplate) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_group(mut self, members: &[&str], offset: Vec3) -> Self {
        self.group = Some(GroupTemplate {
            members: members.iter().map(|m| m.to_string()).collect(),
            offset,
        });
        self
    }

    pub fn with_constraint(mut self, target: impl Into<String>, kind: ConstraintKind) -> Self {
        self.constraints.push(ConstraintTemplate {
            target: target.into(),
            kind,
        });
        self
    }

    /// Build the runtime object
    ///
    /// Meshes with the same name share one `Arc` through `meshes`.
    /// Controllers, group members and constraints refer to other objects and
    /// are resolved by the converter.
    pub fn to_object(&self, meshes: &mut HashMap<String, Arc<Mesh>>) -> GameObject {
        let mut object = GameObject::new(self.name.clone(), self.kind.clone());
        object.node = SpatialNode::new(self.transform);
        object.node.relation = self.relation;
        for mesh in &self.meshes {
            let shared = meshes
                .entry(mesh.name.clone())
                .or_insert_with(|| Arc::new(mesh.clone()))
                .clone();
            object.meshes.push(shared);
        }
        for (name, value) in &self.properties {
            object.set_property(name.clone(), value.clone());
        }
        object.debug_properties = self.debug_properties.clone();
        object.layer = self.layer;
        object.visible = self.visible;
        if let Some(bounds) = self.bounds {
            object.bounds = bounds;
        }
        object.show_bounding_box = self.show_debug;
        object.show_armature = self.show_debug && object.is_armature();
        object.lod = LodLevels {
            distances: self.lod.clone(),
            current: 0,
        };
        if let Some(activity) = self.activity {
            let mut flags = ActivityFlags::empty();
            flags.set(ActivityFlags::LOGIC, activity.logic_radius.is_some());
            flags.set(ActivityFlags::PHYSICS, activity.physics_radius.is_some());
            object.activity = ActivityCulling::new(
                flags,
                activity.logic_radius.unwrap_or(0.0),
                activity.physics_radius.unwrap_or(0.0),
            );
        }
        object.deformer = self.deformer.map(Deformer::new);
        if !self.actions.is_empty() {
            let layers = self.actions.iter().cloned().map(|mut layer| {
                layer.frame = layer.start_frame;
                layer
            });
            object.actions = Some(layers.fold(ActionManager::new(), ActionManager::with_layer));
        }
        object
    }
}

/// A serializable scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneTemplate {
    pub name: String,
    #[serde(default)]
    pub physics: Option<PhysicsTemplate>,
    #[serde(default)]
    pub objects: Vec<ObjectTemplate>,
    #[serde(default)]
    pub active_camera: Option<String>,
    #[serde(default)]
    pub settings: SceneSettings,
}

impl SceneTemplate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            physics: None,
            objects: Vec::new(),
            active_camera: None,
            settings: SceneSettings::default(),
        }
    }

    /// Load a template from a RON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SceneLoadError> {
        let contents = fs::read_to_string(path)?;
        let template = ron::from_str(&contents)?;
        Ok(template)
    }

    /// Save the template to a RON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SceneSaveError> {
        let pretty = ron::ser::PrettyConfig::new()
            .struct_names(true)
            .enumerate_arrays(false);
        let contents = ron::ser::to_string_pretty(self, pretty)?;
        fs::write(path, contents)?;
        Ok(())
    }

    pub fn with_physics(mut self, physics: PhysicsTemplate) -> Self {
        self.physics = Some(physics);
        self
    }

    pub fn with_object(mut self, object: ObjectTemplate) -> Self {
        self.objects.push(object);
        self
    }

    pub fn with_active_camera(mut self, name: impl Into<String>) -> Self {
        self.active_camera = Some(name.into());
        self
    }

    /// Check names, parents and group members
    pub fn validate(&self) -> Result<(), SceneLoadError> {
        self.instantiation_order().map(|_| ())
    }

    /// Object indices ordered so every parent precedes its children
    pub fn instantiation_order(&self) -> Result<Vec<usize>, SceneLoadError> {
        let mut index = HashMap::new();
        for (i, object) in self.objects.iter().enumerate() {
            if index.insert(object.name.as_str(), i).is_some() {
                return Err(SceneLoadError::DuplicateObject(object.name.clone()));
            }
        }

        for object in &self.objects {
            if let Some(parent) = &object.parent {
                if !index.contains_key(parent.as_str()) {
                    return Err(SceneLoadError::UnknownParent {
                        object: object.name.clone(),
                        parent: parent.clone(),
                    });
                }
            }
            for member in object.group.iter().flat_map(|g| &g.members) {
                if !index.contains_key(member.as_str()) {
                    return Err(SceneLoadError::UnknownGroupMember {
                        object: object.name.clone(),
                        member: member.clone(),
                    });
                }
            }
        }

        let mut depths = Vec::with_capacity(self.objects.len());
        for (i, object) in self.objects.iter().enumerate() {
            let mut depth = 0;
            let mut seen = HashSet::from([i]);
            let mut current = object;
            while let Some(parent) = current.parent.as_deref().and_then(|p| index.get(p)) {
                if !seen.insert(*parent) {
                    return Err(SceneLoadError::ParentCycle(object.name.clone()));
                }
                depth += 1;
                current = &self.objects[*parent];
            }
            depths.push(depth);
        }

        let mut order: Vec<usize> = (0..self.objects.len()).collect();
        order.sort_by_key(|i| depths[*i]);
        Ok(order)
    }
}

/// Error loading a scene template
#[derive(Debug)]
pub enum SceneLoadError {
    /// IO error (file not found, permission denied, etc.)
    Io(io::Error),
    /// Parse error (invalid RON syntax)
    Parse(ron::error::SpannedError),
    /// An object names a parent that does not exist
    UnknownParent { object: String, parent: String },
    /// Two objects share a name
    DuplicateObject(String),
    /// A group lists a member that does not exist
    UnknownGroupMember { object: String, member: String },
    /// An object is its own ancestor
    ParentCycle(String),
}

impl From<io::Error> for SceneLoadError {
    fn from(e: io::Error) -> Self {
        SceneLoadError::Io(e)
    }
}

impl From<ron::error::SpannedError> for SceneLoadError {
    fn from(e: ron::error::SpannedError) -> Self {
        SceneLoadError::Parse(e)
    }
}

impl std::fmt::Display for SceneLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneLoadError::Io(e) => write!(f, "IO error: {}", e),
            SceneLoadError::Parse(e) => write!(f, "Parse error: {}", e),
            SceneLoadError::UnknownParent { object, parent } => {
                write!(f, "Object '{}' has unknown parent '{}'", object, parent)
            }
            SceneLoadError::DuplicateObject(name) => write!(f, "Duplicate object name: '{}'", name),
            SceneLoadError::UnknownGroupMember { object, member } => {
                write!(f, "Group '{}' has unknown member '{}'", object, member)
            }
            SceneLoadError::ParentCycle(name) => write!(f, "Object '{}' is its own ancestor", name),
        }
    }
}

impl std::error::Error for SceneLoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SceneLoadError::Io(e) => Some(e),
            SceneLoadError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

/// Error saving a scene template
#[derive(Debug)]
pub enum SceneSaveError {
    /// IO error (permission denied, disk full, etc.)
    Io(io::Error),
    /// Serialization error
    Serialize(ron::Error),
}

impl From<io::Error> for SceneSaveError {
    fn from(e: io::Error) -> Self {
        SceneSaveError::Io(e)
    }
}

impl From<ron::Error> for SceneSaveError {
    fn from(e: ron::Error) -> Self {
        SceneSaveError::Serialize(e)
    }
}

impl std::fmt::Display for SceneSaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SceneSaveError::Io(e) => write!(f, "IO error: {}", e),
            SceneSaveError::Serialize(e) => write!(f, "Serialize error: {}", e),
        }
    }
}

impl std::error::Error for SceneSaveError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraData;

    fn level() -> SceneTemplate {
        SceneTemplate::new("level")
            .with_physics(PhysicsTemplate::default())
            .with_object(ObjectTemplate::new("cam", ObjectKind::Camera(CameraData::default())))
            .with_object(
                ObjectTemplate::new("wheel", ObjectKind::Mesh)
                    .with_parent("car")
                    .with_mesh(Mesh::new("wheel", vec!["rubber".into()])),
            )
            .with_object(
                ObjectTemplate::new("car", ObjectKind::Mesh)
                    .with_mesh(Mesh::new("body", vec!["paint".into()]))
                    .with_body(BodyTemplate::Rigid { mass: 800.0 }),
            )
            .with_active_camera("cam")
    }

    #[test]
    fn test_parents_come_first() {
        let template = level();
        let order = template.instantiation_order().unwrap();
        let names: Vec<&str> = order.iter().map(|i| template.objects[*i].name.as_str()).collect();
        assert_eq!(names, vec!["cam", "car", "wheel"]);
    }

    #[test]
    fn test_validate_errors() {
        let duplicate = level().with_object(ObjectTemplate::new("cam", ObjectKind::Empty));
        assert!(matches!(duplicate.validate(), Err(SceneLoadError::DuplicateObject(name)) if name == "cam"));

        let orphan = level().with_object(ObjectTemplate::new("ghost", ObjectKind::Empty).with_parent("nobody"));
        assert!(matches!(orphan.validate(), Err(SceneLoadError::UnknownParent { .. })));

        let group = level().with_object(ObjectTemplate::new("g", ObjectKind::Empty).with_group(&["missing"], Vec3::ZERO));
        assert!(matches!(group.validate(), Err(SceneLoadError::UnknownGroupMember { .. })));

        let cycle = SceneTemplate::new("cycle")
            .with_object(ObjectTemplate::new("a", ObjectKind::Empty).with_parent("b"))
            .with_object(ObjectTemplate::new("b", ObjectKind::Empty).with_parent("a"));
        assert!(matches!(cycle.validate(), Err(SceneLoadError::ParentCycle(_))));
    }

    #[test]
    fn test_to_object_shares_meshes() {
        let mesh = Mesh::new("crate", vec!["wood".into()]);
        let a = ObjectTemplate::new("a", ObjectKind::Mesh).with_mesh(mesh.clone());
        let b = ObjectTemplate::new("b", ObjectKind::Mesh)
            .with_mesh(mesh)
            .with_property("health", Property::Int(3));
        let mut cache = HashMap::new();

        let a = a.to_object(&mut cache);
        let b = b.to_object(&mut cache);
        assert!(Arc::ptr_eq(&a.meshes[0], &b.meshes[0]));
        assert_eq!(b.property("health"), Some(&Property::Int(3)));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_to_object_optional_state() {
        let mut template = ObjectTemplate::new("guard", ObjectKind::Armature);
        template.actions.push(ActionLayer::new("patrol", 1.0, 40.0));
        template.activity = Some(ActivityTemplate {
            logic_radius: Some(30.0),
            physics_radius: None,
        });
        template.deformer = Some(DeformerKind::Skin);
        template.transform.position = Vec3::new(1.0, 2.0, 3.0);
        template.show_debug = true;

        let object = template.to_object(&mut HashMap::new());
        assert!(object.show_bounding_box);
        assert!(object.show_armature);
        assert_eq!(object.actions.as_ref().unwrap().layers().len(), 1);
        assert_eq!(object.activity.flags, ActivityFlags::LOGIC);
        assert!(object.deformer.is_some());
        assert_eq!(object.node().local().position, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_parse_scene_file_format() {
        let scene_ron = r#"
SceneTemplate(
    name: "arena",
    physics: Some(PhysicsTemplate(gravity: (0.0, 0.0, -20.0))),
    objects: [
        ObjectTemplate(
            name: "floor",
            kind: Mesh,
            meshes: [Mesh(name: "plane", materials: ["grass"])],
            body: Some(Static),
        ),
        ObjectTemplate(
            name: "lamp",
            kind: Light(LightData(kind: Sun, color: (1.0, 0.9, 0.8), energy: 2.0, cast_shadows: true)),
            parent: Some("floor"),
        ),
        ObjectTemplate(
            name: "score",
            kind: Text(TextData(text: "0")),
            properties: {"Text": Int(0)},
            debug_properties: ["Text"],
        ),
    ],
)
"#;
        let template: SceneTemplate = ron::from_str(scene_ron).unwrap();
        assert_eq!(template.name, "arena");
        assert_eq!(template.physics.as_ref().unwrap().gravity, Vec3::new(0.0, 0.0, -20.0));
        assert!(template.physics.as_ref().unwrap().culling_tree);
        assert_eq!(template.objects.len(), 3);
        assert_eq!(template.objects[0].body, Some(BodyTemplate::Static));
        assert_eq!(template.objects[0].layer, 1);
        assert_eq!(template.objects[1].parent.as_deref(), Some("floor"));
        assert!(matches!(template.objects[1].kind, ObjectKind::Light(_)));
        assert!(template.validate().is_ok());
    }

    #[test]
    fn test_save_and_load() {
        let dir = std::env::temp_dir().join(format!("strata_template_{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("level.ron");

        let template = level();
        template.save(&path).unwrap();
        let loaded = SceneTemplate::load(&path).unwrap();
        assert_eq!(loaded, template);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_file() {
        let err = SceneTemplate::load("/nonexistent/scene.ron").unwrap_err();
        assert!(matches!(err, SceneLoadError::Io(_)));
        assert!(err.to_string().starts_with("IO error"));
    }
}
