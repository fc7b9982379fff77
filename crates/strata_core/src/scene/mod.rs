//! Runtime scenes
//!
//! A [`Scene`] owns its objects in a slot map arena and keeps ordered key
//! lists on top of it: active objects, inactive templates, hierarchy roots,
//! and the camera/light/text/animated/temporary sublists. Every active object
//! is either in the root list or has a parent, never both.
//!
//! The scene graph, replication, removal, merging, per-tick phases, culling
//! and debug properties live in submodules as further `impl Scene` blocks.

mod animate;
mod culling;
mod debug;
mod graph;
mod merge;
mod phases;
mod removal;
mod replication;

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use strata_physics::PhysicsEnvironment;

use crate::framing::FrameSettings;
use crate::logic::{DrawCallbacks, RemoveCallback, SceneLogic};
use crate::managers::{BoundingBoxManager, BucketManager, FilterManager, TextureRendererManager};
use crate::network::NetworkMessageScene;
use crate::object::{GameObject, ObjectKey, ObjectKind, TIMEBOMB_PROPERTY};

pub use debug::MAX_DEBUG_PROPERTIES;
pub use replication::{MAX_DUPLI_RECURSION, TIMEBOMB_SECONDS_PER_UNIT};

static NEXT_SCENE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique scene identity
///
/// Nodes refer to their scene by id; `SceneId::default()` means "no scene".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(pub u64);

impl SceneId {
    fn next() -> Self {
        SceneId(NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Scene-wide options
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Suspend far objects' logic and physics
    pub activity_culling: bool,
    /// Ask the physics environment's culling tree for visibility
    pub dbvt_culling: bool,
    /// Show declared debug properties of new objects
    pub auto_debug_properties: bool,
    pub frame: FrameSettings,
    /// World background color
    pub background: [f32; 4],
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            activity_culling: false,
            dbvt_culling: false,
            auto_debug_properties: false,
            frame: FrameSettings::default(),
            background: [0.05, 0.05, 0.08, 1.0],
        }
    }
}

/// An active scene
pub struct Scene {
    id: SceneId,
    name: String,
    pub(crate) objects: SlotMap<ObjectKey, GameObject>,
    pub(crate) object_list: Vec<ObjectKey>,
    pub(crate) inactive_list: Vec<ObjectKey>,
    pub(crate) parent_list: Vec<ObjectKey>,
    pub(crate) camera_list: Vec<ObjectKey>,
    pub(crate) light_list: Vec<ObjectKey>,
    pub(crate) font_list: Vec<ObjectKey>,
    pub(crate) animated_list: Vec<ObjectKey>,
    /// Objects carrying a timebomb
    pub(crate) temp_list: Vec<ObjectKey>,
    /// Objects queued for destruction at the end of logic
    pub(crate) euthanasia: Vec<ObjectKey>,
    pub(crate) active_camera: Option<ObjectKey>,
    pub(crate) override_culling_camera: Option<ObjectKey>,
    /// Roots whose world transforms must be recomputed
    pub(crate) update_queue: Vec<ObjectKey>,
    pub(crate) buckets: BucketManager,
    pub(crate) bounding_boxes: BoundingBoxManager,
    pub(crate) filters: FilterManager,
    pub(crate) texture_renderers: TextureRendererManager,
    pub(crate) physics: Option<Box<dyn PhysicsEnvironment>>,
    network: Option<NetworkMessageScene>,
    pub(crate) debug_list: Vec<(ObjectKey, String)>,
    pub(crate) logic: Vec<Box<dyn SceneLogic>>,
    draw_callbacks: DrawCallbacks,
    remove_callbacks: Vec<RemoveCallback>,
    pub settings: SceneSettings,
    suspended: bool,
    suspended_delta: f64,
    /// (original, replica) pairs of the replication in progress
    pub(crate) batch: Vec<(ObjectKey, ObjectKey)>,
    /// Members of the group being instantiated; empty outside group passes
    pub(crate) group_filter: HashSet<ObjectKey>,
}

impl Scene {
    /// Create an empty scene without physics
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SceneId::next(),
            name: name.into(),
            objects: SlotMap::with_key(),
            object_list: Vec::new(),
            inactive_list: Vec::new(),
            parent_list: Vec::new(),
            camera_list: Vec::new(),
            light_list: Vec::new(),
            font_list: Vec::new(),
            animated_list: Vec::new(),
            temp_list: Vec::new(),
            euthanasia: Vec::new(),
            active_camera: None,
            override_culling_camera: None,
            update_queue: Vec::new(),
            buckets: BucketManager::new(),
            bounding_boxes: BoundingBoxManager::new(),
            filters: FilterManager::new(),
            texture_renderers: TextureRendererManager::new(),
            physics: None,
            network: None,
            debug_list: Vec::new(),
            logic: Vec::new(),
            draw_callbacks: DrawCallbacks::default(),
            remove_callbacks: Vec::new(),
            settings: SceneSettings::default(),
            suspended: false,
            suspended_delta: 0.0,
            batch: Vec::new(),
            group_filter: HashSet::new(),
        }
    }

    /// Builder: attach a physics environment
    pub fn with_physics(mut self, environment: Box<dyn PhysicsEnvironment>) -> Self {
        self.physics = Some(environment);
        self
    }

    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    // --- Object registration ---

    /// Add an active object, optionally under `parent`
    pub fn add_object(&mut self, object: GameObject, parent: Option<ObjectKey>) -> ObjectKey {
        self.insert_object(object, parent, true)
    }

    /// Add an inactive object (a replication template)
    pub fn add_inactive_object(&mut self, object: GameObject, parent: Option<ObjectKey>) -> ObjectKey {
        self.insert_object(object, parent, false)
    }

    fn insert_object(&mut self, mut object: GameObject, parent: Option<ObjectKey>, active: bool) -> ObjectKey {
        object.node.scene = self.id;
        for mesh in &object.meshes {
            self.buckets.register_mesh(mesh);
        }
        let key = self.objects.insert(object);
        if active {
            self.object_list.push(key);
            self.register_categories(key);
        } else {
            self.inactive_list.push(key);
        }
        match parent.filter(|p| self.objects.contains_key(*p)) {
            Some(parent) => self.link_child(key, parent),
            None if active => self.parent_list.push(key),
            None => {}
        }
        self.schedule_update(key);
        key
    }

    /// Put an active object in the sublists matching its kind
    pub(crate) fn register_categories(&mut self, key: ObjectKey) {
        let Some(object) = self.objects.get(key) else {
            return;
        };
        match object.kind {
            ObjectKind::Camera(_) => self.camera_list.push(key),
            ObjectKind::Light(_) => self.light_list.push(key),
            ObjectKind::Text(_) => self.font_list.push(key),
            ObjectKind::Empty | ObjectKind::Mesh | ObjectKind::Armature => {}
        }
        if object.actions.is_some() {
            self.animated_list.push(key);
        }
        if object.property(TIMEBOMB_PROPERTY).is_some() && !self.temp_list.contains(&key) {
            self.temp_list.push(key);
        }
    }

    // --- Lookup ---

    pub fn object(&self, key: ObjectKey) -> Option<&GameObject> {
        self.objects.get(key)
    }

    pub fn object_mut(&mut self, key: ObjectKey) -> Option<&mut GameObject> {
        self.objects.get_mut(key)
    }

    pub fn contains(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    /// Active objects in scene order
    pub fn objects(&self) -> &[ObjectKey] {
        &self.object_list
    }

    pub fn inactive_objects(&self) -> &[ObjectKey] {
        &self.inactive_list
    }

    pub fn root_parents(&self) -> &[ObjectKey] {
        &self.parent_list
    }

    pub fn cameras(&self) -> &[ObjectKey] {
        &self.camera_list
    }

    pub fn lights(&self) -> &[ObjectKey] {
        &self.light_list
    }

    pub fn fonts(&self) -> &[ObjectKey] {
        &self.font_list
    }

    pub fn animated_objects(&self) -> &[ObjectKey] {
        &self.animated_list
    }

    pub fn temp_objects(&self) -> &[ObjectKey] {
        &self.temp_list
    }

    pub fn pending_removals(&self) -> &[ObjectKey] {
        &self.euthanasia
    }

    pub fn object_count(&self) -> usize {
        self.object_list.len()
    }

    /// Total objects in the arena, active and inactive
    pub fn arena_len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_active_object(&self, key: ObjectKey) -> bool {
        self.objects.contains_key(key) && !self.inactive_list.contains(&key)
    }

    /// First active object with this name
    pub fn find_object(&self, name: &str) -> Option<ObjectKey> {
        self.object_list
            .iter()
            .copied()
            .find(|k| self.objects.get(*k).is_some_and(|o| o.name == name))
    }

    /// First inactive object with this name
    pub fn find_inactive(&self, name: &str) -> Option<ObjectKey> {
        self.inactive_list
            .iter()
            .copied()
            .find(|k| self.objects.get(*k).is_some_and(|o| o.name == name))
    }

    // --- Cameras ---

    pub fn active_camera(&self) -> Option<ObjectKey> {
        self.active_camera
    }

    /// Make a camera object active. Non-camera keys are ignored.
    pub fn set_active_camera(&mut self, key: ObjectKey) {
        if self.objects.get(key).is_some_and(|o| o.camera().is_some()) {
            self.active_camera = Some(key);
        } else {
            log::warn!("Object is not a camera in scene '{}'", self.name);
        }
    }

    pub fn override_culling_camera(&self) -> Option<ObjectKey> {
        self.override_culling_camera
    }

    /// Cull as seen from another camera while rendering from the active one
    pub fn set_override_culling_camera(&mut self, key: Option<ObjectKey>) {
        self.override_culling_camera = key.filter(|k| self.objects.get(*k).is_some_and(|o| o.camera().is_some()));
    }

    // --- Managers and collaborators ---

    pub fn buckets(&self) -> &BucketManager {
        &self.buckets
    }

    pub fn bounding_boxes(&self) -> &BoundingBoxManager {
        &self.bounding_boxes
    }

    pub fn bounding_boxes_mut(&mut self) -> &mut BoundingBoxManager {
        &mut self.bounding_boxes
    }

    pub fn filters(&self) -> &FilterManager {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterManager {
        &mut self.filters
    }

    pub fn texture_renderers(&self) -> &TextureRendererManager {
        &self.texture_renderers
    }

    pub fn texture_renderers_mut(&mut self) -> &mut TextureRendererManager {
        &mut self.texture_renderers
    }

    pub fn has_physics(&self) -> bool {
        self.physics.is_some()
    }

    pub fn physics_environment(&self) -> Option<&dyn PhysicsEnvironment> {
        self.physics.as_deref()
    }

    pub fn physics_environment_mut(&mut self) -> Option<&mut (dyn PhysicsEnvironment + 'static)> {
        self.physics.as_deref_mut()
    }

    pub fn set_physics_environment(&mut self, environment: Option<Box<dyn PhysicsEnvironment>>) {
        self.physics = environment;
    }

    pub fn network(&self) -> Option<&NetworkMessageScene> {
        self.network.as_ref()
    }

    pub fn set_network(&mut self, network: NetworkMessageScene) {
        self.network = Some(network);
    }

    /// Attach per-tick logic
    pub fn add_logic(&mut self, logic: Box<dyn SceneLogic>) {
        self.logic.push(logic);
    }

    pub fn draw_callbacks_mut(&mut self) -> &mut DrawCallbacks {
        &mut self.draw_callbacks
    }

    /// Register a callback run when the scene is destroyed
    pub fn add_remove_callback(&mut self, callback: RemoveCallback) {
        self.remove_callbacks.push(callback);
    }

    /// Run and drop the on-remove callbacks
    pub fn run_remove_callbacks(&mut self) {
        for callback in std::mem::take(&mut self.remove_callbacks) {
            callback(self);
        }
    }

    pub fn run_pre_draw_setup(&mut self, camera: Option<ObjectKey>) {
        self.draw_callbacks.run_pre_draw_setup(camera);
    }

    pub fn run_pre_draw(&mut self, camera: Option<ObjectKey>) {
        self.draw_callbacks.run_pre_draw(camera);
    }

    pub fn run_post_draw(&mut self, camera: Option<ObjectKey>) {
        self.draw_callbacks.run_post_draw(camera);
    }

    // --- Suspension ---

    pub fn suspend(&mut self) {
        if !self.suspended {
            log::info!("Suspending scene '{}'", self.name);
            self.suspended = true;
        }
    }

    pub fn resume(&mut self) {
        if self.suspended {
            log::info!("Resuming scene '{}'", self.name);
            self.suspended = false;
        }
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Time spent suspended
    pub fn suspended_delta(&self) -> f64 {
        self.suspended_delta
    }

    pub fn set_suspended_delta(&mut self, delta: f64) {
        self.suspended_delta = delta;
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("objects", &self.object_list.len())
            .field("inactive", &self.inactive_list.len())
            .field("cameras", &self.camera_list.len())
            .field("physics", &self.physics.is_some())
            .field("suspended", &self.suspended)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraData;
    use crate::object::{LightData, Property, TextData};

    #[test]
    fn test_scene_ids_are_unique() {
        let a = Scene::new("a");
        let b = Scene::new("b");
        assert_ne!(a.id(), b.id());
        assert_ne!(a.id(), SceneId::default());
    }

    #[test]
    fn test_add_object_registers_lists() {
        let mut scene = Scene::new("test");
        let cam = scene.add_object(GameObject::new("cam", ObjectKind::Camera(CameraData::default())), None);
        let lamp = scene.add_object(GameObject::new("lamp", ObjectKind::Light(LightData::default())), None);
        let label = scene.add_object(GameObject::new("label", ObjectKind::Text(TextData::default())), Some(cam));

        assert_eq!(scene.objects(), &[cam, lamp, label]);
        assert_eq!(scene.root_parents(), &[cam, lamp]);
        assert_eq!(scene.cameras(), &[cam]);
        assert_eq!(scene.lights(), &[lamp]);
        assert_eq!(scene.fonts(), &[label]);
        assert_eq!(scene.object(label).unwrap().parent(), Some(cam));
        assert_eq!(scene.object(label).unwrap().node().scene_id(), scene.id());
    }

    #[test]
    fn test_inactive_objects_are_not_roots() {
        let mut scene = Scene::new("test");
        let template = scene.add_inactive_object(GameObject::new("bullet", ObjectKind::Mesh), None);
        assert_eq!(scene.inactive_objects(), &[template]);
        assert!(scene.root_parents().is_empty());
        assert!(!scene.is_active_object(template));
        assert_eq!(scene.find_inactive("bullet"), Some(template));
        assert_eq!(scene.find_object("bullet"), None);
    }

    #[test]
    fn test_timebomb_objects_are_temporary() {
        let mut scene = Scene::new("test");
        let obj = GameObject::new("spark", ObjectKind::Empty).with_property(TIMEBOMB_PROPERTY, Property::Float(1.0));
        let key = scene.add_object(obj, None);
        assert_eq!(scene.temp_objects(), &[key]);
    }

    #[test]
    fn test_active_camera_must_be_camera() {
        let mut scene = Scene::new("test");
        let empty = scene.add_object(GameObject::new("empty", ObjectKind::Empty), None);
        scene.set_active_camera(empty);
        assert_eq!(scene.active_camera(), None);

        let cam = scene.add_object(GameObject::new("cam", ObjectKind::Camera(CameraData::default())), None);
        scene.set_active_camera(cam);
        assert_eq!(scene.active_camera(), Some(cam));
    }

    #[test]
    fn test_suspend_resume() {
        let mut scene = Scene::new("test");
        scene.suspend();
        assert!(scene.is_suspended());
        scene.set_suspended_delta(0.5);
        scene.resume();
        assert!(!scene.is_suspended());
        assert_eq!(scene.suspended_delta(), 0.5);
    }

    #[test]
    fn test_remove_callbacks_run_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let mut scene = Scene::new("test");
        scene.add_remove_callback(Box::new(move |s| {
            assert_eq!(s.name(), "test");
            seen.fetch_add(1, Ordering::SeqCst);
        }));

        scene.run_remove_callbacks();
        scene.run_remove_callbacks();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
