//! Scene registry
//!
//! The registry owns the ordered list of active scenes. Draw order follows
//! list order. Scenes are never added, removed or replaced while the list
//! is being iterated: requests are queued and applied together by
//! [`SceneRegistry::apply_scheduled_changes`] at the end of a tick, in the
//! order replace, remove, add.

use crate::camera::{CameraData, DEFAULT_CAMERA_NAME};
use crate::converter::SceneConverter;
use crate::error::RegistryError;
use crate::network::{NetworkMessageScene, SharedMessages};
use crate::node::SpatialNode;
use crate::object::{GameObject, ObjectKind};
use crate::scene::Scene;
use crate::transform::Transform3D;

/// Where a new scene goes in the draw order
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddPolicy {
    /// Appended, drawn on top
    Overlay,
    /// Inserted first, drawn behind everything
    Background,
}

/// Scene changes waiting for the end of the tick
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SceneChangeQueue {
    replace: Vec<(String, String)>,
    remove: Vec<String>,
    add_overlay: Vec<String>,
    add_background: Vec<String>,
}

impl SceneChangeQueue {
    pub fn replacements(&self) -> &[(String, String)] {
        &self.replace
    }

    pub fn removals(&self) -> &[String] {
        &self.remove
    }

    pub fn overlays(&self) -> &[String] {
        &self.add_overlay
    }

    pub fn backgrounds(&self) -> &[String] {
        &self.add_background
    }

    pub fn is_empty(&self) -> bool {
        self.replace.is_empty() && self.remove.is_empty() && self.add_overlay.is_empty() && self.add_background.is_empty()
    }
}

/// Camera installed in one scene in place of its own
#[derive(Debug, Clone, PartialEq)]
pub struct CameraOverride {
    pub scene: String,
    pub transform: Transform3D,
    pub camera: CameraData,
}

/// Settings applied to every scene the registry creates
#[derive(Debug, Clone, Default)]
pub struct PostProcess {
    pub camera_override: Option<CameraOverride>,
    /// Show declared debug properties of every object
    pub auto_debug_properties: bool,
    /// Message bus handed to each new scene
    pub network: Option<SharedMessages>,
}

impl PostProcess {
    /// Prepare a freshly converted scene
    ///
    /// Installs the default camera when the scene has no active camera or
    /// the camera override names it, then flushes the scenegraph.
    pub fn apply(&self, scene: &mut Scene) {
        if let Some(network) = &self.network {
            scene.set_network(NetworkMessageScene::new(scene.name(), network.clone()));
        }

        let override_here = self.camera_override.as_ref().filter(|o| o.scene == scene.name());
        if scene.active_camera().is_none() || override_here.is_some() {
            let (transform, camera) = match override_here {
                Some(o) => (o.transform, o.camera.clone()),
                None => (Transform3D::identity(), CameraData::default()),
            };
            let mut object = GameObject::new(DEFAULT_CAMERA_NAME, ObjectKind::Camera(camera));
            object.node = SpatialNode::new(transform);
            let key = scene.add_object(object, None);
            scene.set_active_camera(key);
            log::debug!("Installed default camera in scene '{}'", scene.name());
        }

        if self.auto_debug_properties {
            scene.settings.auto_debug_properties = true;
            for key in scene.objects().to_vec() {
                scene.add_object_debug_properties(key);
            }
        }
        scene.update_parents();
    }
}

/// Ordered collection of active scenes
#[derive(Debug, Default)]
pub struct SceneRegistry {
    scenes: Vec<Scene>,
    changes: SceneChangeQueue,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Access ---

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scenes_mut(&mut self) -> &mut [Scene] {
        &mut self.scenes
    }

    pub fn scene(&self, name: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.name() == name)
    }

    pub fn scene_mut(&mut self, name: &str) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.name() == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.scenes.iter().position(|s| s.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.scenes.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    pub fn pending_changes(&self) -> &SceneChangeQueue {
        &self.changes
    }

    /// Insert an already built scene, bypassing the queue
    pub fn insert_scene(&mut self, scene: Scene, policy: AddPolicy) -> Result<(), RegistryError> {
        if self.contains(scene.name()) {
            return Err(RegistryError::AlreadyExists(scene.name().to_string()));
        }
        match policy {
            AddPolicy::Overlay => self.scenes.push(scene),
            AddPolicy::Background => self.scenes.insert(0, scene),
        }
        Ok(())
    }

    // --- Requests ---

    /// Queue a scene to be added at the end of the tick
    pub fn request_add(&mut self, name: &str, policy: AddPolicy) -> Result<(), RegistryError> {
        if self.contains(name) {
            log::warn!("Scene '{}' already exists, not added", name);
            return Err(RegistryError::AlreadyExists(name.to_string()));
        }
        match policy {
            AddPolicy::Overlay => self.changes.add_overlay.push(name.to_string()),
            AddPolicy::Background => self.changes.add_background.push(name.to_string()),
        }
        Ok(())
    }

    /// Queue a scene to be removed at the end of the tick
    pub fn request_remove(&mut self, name: &str) -> Result<(), RegistryError> {
        if !self.contains(name) {
            log::warn!("Scene '{}' does not exist, not removed", name);
            return Err(RegistryError::NotLoaded(name.to_string()));
        }
        self.changes.remove.push(name.to_string());
        Ok(())
    }

    /// Queue `old` to be replaced in place by `new`
    ///
    /// Returns false without queuing when `new` has no source.
    pub fn request_replace(&mut self, old: &str, new: &str, converter: &dyn SceneConverter) -> bool {
        if converter.resolve_scene(new).is_none() {
            log::warn!("Scene '{}' not found, '{}' not replaced", new, old);
            return false;
        }
        self.changes.replace.push((old.to_string(), new.to_string()));
        true
    }

    pub fn suspend_scene(&mut self, name: &str) -> Result<(), RegistryError> {
        let scene = self
            .scene_mut(name)
            .ok_or_else(|| RegistryError::NotLoaded(name.to_string()))?;
        scene.suspend();
        Ok(())
    }

    pub fn resume_scene(&mut self, name: &str) -> Result<(), RegistryError> {
        let scene = self
            .scene_mut(name)
            .ok_or_else(|| RegistryError::NotLoaded(name.to_string()))?;
        scene.resume();
        Ok(())
    }

    // --- Tick boundary ---

    /// Apply queued replacements, then removals, then additions
    ///
    /// Returns whether any scene remains.
    pub fn apply_scheduled_changes(&mut self, converter: &mut dyn SceneConverter, post: &PostProcess) -> bool {
        let changes = std::mem::take(&mut self.changes);

        for (old, new) in changes.replace {
            let Some(index) = self.index_of(&old) else {
                log::warn!("Scene '{}' does not exist, not replaced", old);
                continue;
            };
            let Some(scene) = Self::convert(&new, converter, post) else {
                continue;
            };
            let previous = std::mem::replace(&mut self.scenes[index], scene);
            Self::destroy_scene(previous, converter);
            log::info!("Replaced scene '{}' with '{}'", old, new);
        }

        for name in changes.remove {
            let Some(index) = self.index_of(&name) else {
                log::warn!("Scene '{}' does not exist, not removed", name);
                continue;
            };
            let scene = self.scenes.remove(index);
            Self::destroy_scene(scene, converter);
            log::info!("Removed scene '{}'", name);
        }

        for (names, policy) in [
            (changes.add_overlay, AddPolicy::Overlay),
            (changes.add_background, AddPolicy::Background),
        ] {
            for name in names {
                if self.contains(&name) {
                    log::warn!("Scene '{}' already exists, not added", name);
                    continue;
                }
                if let Some(scene) = Self::convert(&name, converter, post) {
                    match policy {
                        AddPolicy::Overlay => self.scenes.push(scene),
                        AddPolicy::Background => self.scenes.insert(0, scene),
                    }
                    log::info!("Added scene '{}'", name);
                }
            }
        }

        !self.scenes.is_empty()
    }

    /// Destroy every scene, front to back
    pub fn destroy_all(&mut self, converter: &mut dyn SceneConverter) {
        for scene in self.scenes.drain(..) {
            let name = scene.name().to_string();
            Self::destroy_scene(scene, converter);
            log::info!("Destroyed scene '{}'", name);
        }
        self.changes = SceneChangeQueue::default();
    }

    fn convert(name: &str, converter: &mut dyn SceneConverter, post: &PostProcess) -> Option<Scene> {
        let Some(source) = converter.resolve_scene(name) else {
            log::warn!("Scene '{}' not found", name);
            return None;
        };
        let mut scene = Scene::new(name);
        if let Err(e) = converter.convert_scene(source, &mut scene) {
            log::error!("Could not convert scene '{}': {}", name, e);
            return None;
        }
        post.apply(&mut scene);
        Some(scene)
    }

    fn destroy_scene(mut scene: Scene, converter: &mut dyn SceneConverter) {
        scene.run_remove_callbacks();
        converter.remove_scene(&mut scene);
        scene.destroy_all_objects();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::TemplateConverter;
    use crate::template::{ObjectTemplate, SceneTemplate};
    use glam::Vec3;
    use std::sync::{Arc, Mutex};

    fn converter(names: &[&str]) -> TemplateConverter {
        let mut converter = TemplateConverter::new();
        for name in names {
            converter.register_template(
                SceneTemplate::new(*name).with_object(ObjectTemplate::new(format!("{}_floor", name), ObjectKind::Empty)),
            );
        }
        converter
    }

    fn apply(registry: &mut SceneRegistry, converter: &mut TemplateConverter) -> bool {
        registry.apply_scheduled_changes(converter, &PostProcess::default())
    }

    #[test]
    fn test_add_policies_order() {
        let mut conv = converter(&["A", "B", "C"]);
        let mut registry = SceneRegistry::new();
        registry.request_add("A", AddPolicy::Overlay).unwrap();
        registry.request_add("B", AddPolicy::Background).unwrap();
        assert!(registry.is_empty());
        assert!(apply(&mut registry, &mut conv));
        assert_eq!(registry.names(), vec!["B", "A"]);

        registry.request_add("C", AddPolicy::Overlay).unwrap();
        apply(&mut registry, &mut conv);
        assert_eq!(registry.names(), vec!["B", "A", "C"]);
        assert!(registry.pending_changes().is_empty());
    }

    #[test]
    fn test_duplicate_and_unknown_requests() {
        let mut conv = converter(&["A"]);
        let mut registry = SceneRegistry::new();
        registry.request_add("A", AddPolicy::Overlay).unwrap();
        apply(&mut registry, &mut conv);

        assert_eq!(
            registry.request_add("A", AddPolicy::Overlay),
            Err(RegistryError::AlreadyExists("A".into()))
        );
        assert_eq!(registry.request_remove("Z"), Err(RegistryError::NotLoaded("Z".into())));
        assert!(!registry.request_replace("A", "Z", &conv));
        assert!(registry.pending_changes().is_empty());

        // Unresolvable adds are dropped at apply time
        registry.request_add("missing", AddPolicy::Overlay).unwrap();
        apply(&mut registry, &mut conv);
        assert_eq!(registry.names(), vec!["A"]);
    }

    #[test]
    fn test_replace_preserves_position() {
        let mut conv = converter(&["X", "Y", "Z", "Y2"]);
        let mut registry = SceneRegistry::new();
        for name in ["X", "Y", "Z"] {
            registry.request_add(name, AddPolicy::Overlay).unwrap();
        }
        apply(&mut registry, &mut conv);

        assert!(registry.request_replace("Y", "Y2", &conv));
        apply(&mut registry, &mut conv);
        assert_eq!(registry.names(), vec!["X", "Y2", "Z"]);
        assert_eq!(conv.converted_count(), 3);
    }

    #[test]
    fn test_replace_before_remove() {
        let mut conv = converter(&["X", "Y", "Y2"]);
        let mut registry = SceneRegistry::new();
        registry.request_add("X", AddPolicy::Overlay).unwrap();
        registry.request_add("Y", AddPolicy::Overlay).unwrap();
        apply(&mut registry, &mut conv);

        registry.request_remove("Y").unwrap();
        registry.request_replace("Y", "Y2", &conv);
        apply(&mut registry, &mut conv);
        // The replacement took Y's slot, so the removal finds nothing
        assert_eq!(registry.names(), vec!["X", "Y2"]);
    }

    #[test]
    fn test_removing_last_scene_leaves_none() {
        let mut conv = converter(&["A"]);
        let mut registry = SceneRegistry::new();
        registry.request_add("A", AddPolicy::Overlay).unwrap();
        assert!(apply(&mut registry, &mut conv));
        registry.request_remove("A").unwrap();
        assert!(!apply(&mut registry, &mut conv));
        assert_eq!(conv.converted_count(), 0);
    }

    #[test]
    fn test_default_camera_installed_once() {
        let mut conv = converter(&["A"]);
        let mut registry = SceneRegistry::new();
        registry.request_add("A", AddPolicy::Overlay).unwrap();
        apply(&mut registry, &mut conv);

        let scene = registry.scene("A").unwrap();
        assert_eq!(scene.cameras().len(), 1);
        let camera = scene.active_camera().unwrap();
        assert_eq!(scene.object(camera).unwrap().name, DEFAULT_CAMERA_NAME);
        assert_eq!(scene.object(camera).unwrap().node().world_position(), Vec3::ZERO);
    }

    #[test]
    fn test_camera_override() {
        let mut conv = converter(&["A", "B"]);
        let mut registry = SceneRegistry::new();
        registry.request_add("A", AddPolicy::Overlay).unwrap();
        registry.request_add("B", AddPolicy::Overlay).unwrap();
        let post = PostProcess {
            camera_override: Some(CameraOverride {
                scene: "B".into(),
                transform: Transform3D::from_position(Vec3::new(1.0, 2.0, 3.0)),
                camera: CameraData {
                    fov_y: 1.0,
                    ..CameraData::default()
                },
            }),
            auto_debug_properties: true,
            network: Some(crate::network::shared_messages()),
        };
        registry.apply_scheduled_changes(&mut conv, &post);

        let scene = registry.scene("B").unwrap();
        let camera = scene.object(scene.active_camera().unwrap()).unwrap();
        assert_eq!(camera.node().world_position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(camera.camera().unwrap().fov_y, 1.0);
        assert!(scene.settings.auto_debug_properties);
        assert!(scene.network().is_some());

        let other = registry.scene("A").unwrap();
        let camera = other.object(other.active_camera().unwrap()).unwrap();
        assert_eq!(camera.node().world_position(), Vec3::ZERO);
    }

    #[test]
    fn test_suspend_resume() {
        let mut conv = converter(&["A"]);
        let mut registry = SceneRegistry::new();
        registry.request_add("A", AddPolicy::Overlay).unwrap();
        apply(&mut registry, &mut conv);

        registry.suspend_scene("A").unwrap();
        assert!(registry.scene("A").unwrap().is_suspended());
        registry.resume_scene("A").unwrap();
        assert!(!registry.scene("A").unwrap().is_suspended());
        assert!(registry.suspend_scene("nope").is_err());
    }

    #[test]
    fn test_destroy_all_front_to_back() {
        let mut conv = converter(&["A", "B", "C"]);
        let mut registry = SceneRegistry::new();
        for name in ["A", "B", "C"] {
            registry.request_add(name, AddPolicy::Overlay).unwrap();
        }
        apply(&mut registry, &mut conv);

        let order = Arc::new(Mutex::new(Vec::new()));
        for scene in registry.scenes_mut() {
            let order = order.clone();
            scene.add_remove_callback(Box::new(move |s| order.lock().unwrap().push(s.name().to_string())));
        }
        registry.destroy_all(&mut conv);

        assert!(registry.is_empty());
        assert_eq!(*order.lock().unwrap(), vec!["A", "B", "C"]);
        assert_eq!(conv.converted_count(), 0);
    }
}
