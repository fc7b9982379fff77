//! Scene conversion
//!
//! The registry never builds scenes itself. It asks a [`SceneConverter`]
//! to resolve a scene name to a source and to fill an empty [`Scene`] from
//! it. [`TemplateConverter`] is the converter over RON [`SceneTemplate`]s.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use strata_physics::{ControllerDesc, PhysicsConfig, PhysicsWorld};

use crate::library::{LibLoadHandle, LibraryLoader};
use crate::object::{ConstraintLink, DupliGroup, Mesh, ObjectKey};
use crate::scene::{Scene, SceneId};
use crate::template::{BodyTemplate, SceneLoadError, SceneTemplate};

/// Handle to a convertible scene source
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceSceneId(pub usize);

/// Builds runtime scenes from source data
pub trait SceneConverter: Send {
    /// Find the source of the scene called `name`
    fn resolve_scene(&self, name: &str) -> Option<SourceSceneId>;

    /// Fill the empty `scene` from `source`
    fn convert_scene(&mut self, source: SourceSceneId, scene: &mut Scene) -> Result<(), SceneLoadError>;

    /// Forget everything recorded for `scene`; called before its objects are destroyed
    fn remove_scene(&mut self, scene: &mut Scene);

    /// Block until all background library loads have finished
    fn finalize_async_loads(&mut self);

    /// Merge finished library loads into their target scenes
    fn process_scheduled_libraries(&mut self, scenes: &mut [Scene]);

    /// Start loading a library to be merged into the scene `merge_into`
    fn lib_load(&mut self, path: &Path, merge_into: &str) -> LibLoadHandle;
}

/// Converter over scene templates
pub struct TemplateConverter {
    templates: Vec<SceneTemplate>,
    index: HashMap<String, usize>,
    /// Meshes shared between every scene built by this converter
    meshes: HashMap<String, Arc<Mesh>>,
    converted: HashMap<SceneId, SourceSceneId>,
    libraries: LibraryLoader,
    merged_libraries: usize,
}

impl TemplateConverter {
    pub fn new() -> Self {
        Self {
            templates: Vec::new(),
            index: HashMap::new(),
            meshes: HashMap::new(),
            converted: HashMap::new(),
            libraries: LibraryLoader::new(),
            merged_libraries: 0,
        }
    }

    /// Register every `*.ron` template in `dir`
    ///
    /// Files that fail to load are skipped with a warning.
    pub fn from_directory<P: AsRef<Path>>(dir: P) -> Result<Self, SceneLoadError> {
        let mut converter = Self::new();
        let mut paths: Vec<_> = fs::read_dir(dir.as_ref())?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().is_some_and(|ext| ext == "ron"))
            .collect();
        paths.sort();
        for path in paths {
            match SceneTemplate::load(&path) {
                Ok(template) => {
                    converter.register_template(template);
                }
                Err(e) => log::warn!("Skipping scene file {}: {}", path.display(), e),
            }
        }
        log::info!(
            "Loaded {} scene templates from {}",
            converter.templates.len(),
            dir.as_ref().display()
        );
        Ok(converter)
    }

    /// Register a template under its name, replacing any previous one
    pub fn register_template(&mut self, template: SceneTemplate) -> SourceSceneId {
        if let Some(&i) = self.index.get(&template.name) {
            self.templates[i] = template;
            return SourceSceneId(i);
        }
        let i = self.templates.len();
        self.index.insert(template.name.clone(), i);
        self.templates.push(template);
        SourceSceneId(i)
    }

    pub fn template(&self, name: &str) -> Option<&SceneTemplate> {
        self.index.get(name).map(|i| &self.templates[*i])
    }

    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.templates.iter().map(|t| t.name.as_str())
    }

    /// Number of live scenes built by this converter
    pub fn converted_count(&self) -> usize {
        self.converted.len()
    }

    pub fn merged_libraries(&self) -> usize {
        self.merged_libraries
    }

    pub fn pending_libraries(&self) -> usize {
        self.libraries.pending_count()
    }
}

impl Default for TemplateConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneConverter for TemplateConverter {
    fn resolve_scene(&self, name: &str) -> Option<SourceSceneId> {
        self.index.get(name).map(|i| SourceSceneId(*i))
    }

    fn convert_scene(&mut self, source: SourceSceneId, scene: &mut Scene) -> Result<(), SceneLoadError> {
        let Some(template) = self.templates.get(source.0) else {
            return Err(SceneLoadError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no scene source {}", source.0),
            )));
        };
        self.meshes.retain(|_, mesh| Arc::strong_count(mesh) > 1);
        build_scene(template, scene, &mut self.meshes)?;
        self.converted.insert(scene.id(), source);
        log::debug!(
            "Converted scene '{}' ({} objects, {} inactive)",
            scene.name(),
            scene.object_count(),
            scene.inactive_objects().len()
        );
        Ok(())
    }

    fn remove_scene(&mut self, scene: &mut Scene) {
        self.converted.remove(&scene.id());
    }

    fn finalize_async_loads(&mut self) {
        self.libraries.finalize();
    }

    fn process_scheduled_libraries(&mut self, scenes: &mut [Scene]) {
        self.libraries.poll();
        for library in self.libraries.take_ready() {
            let Some(target) = scenes.iter_mut().find(|s| s.name() == library.merge_into) else {
                log::warn!(
                    "Library '{}' loaded for unknown scene '{}'",
                    library.handle.name(),
                    library.merge_into
                );
                continue;
            };
            let mut loaded = Scene::new(library.template.name.clone());
            if let Err(e) = build_scene(&library.template, &mut loaded, &mut self.meshes) {
                log::warn!("Library '{}' could not be converted: {}", library.handle.name(), e);
                continue;
            }
            if target.has_physics() && !loaded.has_physics() {
                loaded.set_physics_environment(Some(Box::new(PhysicsWorld::new())));
            }
            if target.merge(&mut loaded).is_ok() {
                self.merged_libraries += 1;
                log::info!("Merged library '{}' into scene '{}'", library.handle.name(), target.name());
            }
        }
    }

    fn lib_load(&mut self, path: &Path, merge_into: &str) -> LibLoadHandle {
        self.libraries.load(path, merge_into)
    }
}

/// Instantiate `template` into `scene`
///
/// Objects are inserted parents first. Controllers, groups and constraints
/// are resolved once every object exists; active group objects are then
/// expanded and the active camera chosen.
pub(crate) fn build_scene(
    template: &SceneTemplate,
    scene: &mut Scene,
    meshes: &mut HashMap<String, Arc<Mesh>>,
) -> Result<(), SceneLoadError> {
    let order = template.instantiation_order()?;
    scene.settings = template.settings.clone();
    if let Some(physics) = &template.physics {
        let config = PhysicsConfig {
            gravity: physics.gravity,
            culling_tree: physics.culling_tree,
        };
        scene.set_physics_environment(Some(Box::new(PhysicsWorld::with_config(config))));
    }

    let mut keys: HashMap<&str, ObjectKey> = HashMap::new();
    for i in order {
        let source = &template.objects[i];
        let object = source.to_object(meshes);
        let parent = source.parent.as_deref().and_then(|p| keys.get(p)).copied();
        let inactive = source.inactive || parent.is_some_and(|p| !scene.is_active_object(p));
        let key = if inactive {
            scene.add_inactive_object(object, parent)
        } else {
            scene.add_object(object, parent)
        };
        keys.insert(source.name.as_str(), key);
    }
    scene.update_parents();

    for source in &template.objects {
        let Some(&key) = keys.get(source.name.as_str()) else {
            continue;
        };
        let Some(object) = scene.object_mut(key) else {
            continue;
        };
        if let Some(group) = &source.group {
            object.dupli_group = Some(DupliGroup {
                members: group.members.iter().filter_map(|m| keys.get(m.as_str()).copied()).collect(),
                offset: group.offset,
            });
        }
        for constraint in &source.constraints {
            match keys.get(constraint.target.as_str()) {
                Some(target) => object.constraints.push(ConstraintLink {
                    target: *target,
                    kind: constraint.kind,
                }),
                None => log::warn!(
                    "Constraint of '{}' targets unknown object '{}'",
                    source.name,
                    constraint.target
                ),
            }
        }
        add_controllers(scene, key, source.body);
    }

    let active: Vec<ObjectKey> = scene.objects().to_vec();
    for key in &active {
        let links = scene.object(*key).map(|o| o.constraints.clone()).unwrap_or_default();
        if !links.is_empty() {
            scene.create_physics_constraints(*key, &links);
        }
    }
    for key in active {
        if scene.object(key).is_some_and(|o| o.is_dupli_group()) {
            scene.dupli_group_recurse(key, 0);
        }
    }

    let camera = match &template.active_camera {
        Some(name) => {
            let found = scene.find_object(name);
            if found.is_none() {
                log::warn!("Active camera '{}' not found in scene '{}'", name, scene.name());
            }
            found
        }
        None => None,
    };
    if let Some(camera) = camera.or_else(|| scene.cameras().first().copied()) {
        scene.set_active_camera(camera);
    }
    scene.update_parents();
    Ok(())
}

/// Create the physics and culling controllers of one converted object
fn add_controllers(scene: &mut Scene, key: ObjectKey, body: Option<BodyTemplate>) {
    let active = scene.is_active_object(key);
    let parent_has_physics = scene
        .object(key)
        .and_then(|o| o.parent())
        .and_then(|p| scene.object(p))
        .is_some_and(|p| p.physics_controller.is_some());
    let Some(object) = scene.object(key) else {
        return;
    };
    let world = *object.node().world();
    let radius = object.bounds.radius() * world.scale.abs().max_element();
    let center = world.transform_point(object.bounds.center());
    let has_meshes = !object.meshes.is_empty();

    let Some(env) = scene.physics_environment_mut() else {
        return;
    };
    let physics = body.map(|body| {
        let desc = match body {
            BodyTemplate::Rigid { mass } => ControllerDesc::rigid(world.position, mass),
            BodyTemplate::Static => ControllerDesc::fixed(world.position),
        };
        let ctrl = env.add_controller(desc.with_orientation(world.rotation).with_radius(radius));
        if !active {
            env.suspend_dynamics(ctrl, true);
        } else if parent_has_physics {
            env.suspend_dynamics(ctrl, false);
        }
        ctrl
    });
    let graphic = has_meshes.then(|| {
        let ctrl = env.add_controller(ControllerDesc::graphic(center, radius));
        env.activate_graphic_controller(ctrl, active);
        ctrl
    });

    if let Some(object) = scene.object_mut(key) {
        object.physics_controller = physics;
        object.graphic_controller = graphic;
    }
}
