//! Per-scene render-side managers
//!
//! These hold derived render data keyed by [`ObjectKey`]. Merging two scenes
//! merges their managers through a key remap.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use glam::Vec3;

use crate::object::{Aabb, Mesh, ObjectKey};
use crate::transform::Transform3D;

/// Objects drawn with one material
#[derive(Clone, Debug, PartialEq)]
pub struct DrawBatch {
    pub material: String,
    pub objects: Vec<ObjectKey>,
}

/// Groups mesh objects into material buckets
///
/// Bucket order is the order materials were first seen.
#[derive(Clone, Debug, Default)]
pub struct BucketManager {
    materials: Vec<String>,
}

impl BucketManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a bucket exists for each material of `mesh`
    pub fn register_mesh(&mut self, mesh: &Mesh) {
        for material in &mesh.materials {
            if !self.materials.contains(material) {
                self.materials.push(material.clone());
            }
        }
    }

    pub fn materials(&self) -> &[String] {
        &self.materials
    }

    /// Batch the given objects' meshes by material
    pub fn batches<'a, I>(&self, objects: I) -> Vec<DrawBatch>
    where
        I: IntoIterator<Item = (ObjectKey, &'a [Arc<Mesh>])>,
    {
        let mut buckets: Vec<Vec<ObjectKey>> = vec![Vec::new(); self.materials.len()];
        let mut extra: Vec<DrawBatch> = Vec::new();
        for (key, meshes) in objects {
            for material in meshes.iter().flat_map(|m| m.materials.iter()) {
                match self.materials.iter().position(|m| m == material) {
                    Some(index) => buckets[index].push(key),
                    None => match extra.iter_mut().find(|b| &b.material == material) {
                        Some(batch) => batch.objects.push(key),
                        None => extra.push(DrawBatch {
                            material: material.clone(),
                            objects: vec![key],
                        }),
                    },
                }
            }
        }
        self.materials
            .iter()
            .zip(buckets)
            .filter(|(_, objects)| !objects.is_empty())
            .map(|(material, objects)| DrawBatch {
                material: material.clone(),
                objects,
            })
            .chain(extra)
            .collect()
    }

    pub fn merge(&mut self, other: &BucketManager) {
        for material in &other.materials {
            if !self.materials.contains(material) {
                self.materials.push(material.clone());
            }
        }
    }
}

/// World-space bounding sphere
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

/// World bounds of objects, refreshed when their nodes move
#[derive(Clone, Debug, Default)]
pub struct BoundingBoxManager {
    spheres: HashMap<ObjectKey, BoundingSphere>,
    modified: Vec<ObjectKey>,
}

impl BoundingBoxManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the world sphere of `key` from its local box and world transform
    pub fn update(&mut self, key: ObjectKey, bounds: &Aabb, world: &Transform3D) {
        let center = world.transform_point(bounds.center());
        let radius = bounds.radius() * world.scale.abs().max_element();
        self.spheres.insert(key, BoundingSphere { center, radius });
        self.modified.push(key);
    }

    pub fn sphere(&self, key: ObjectKey) -> Option<BoundingSphere> {
        self.spheres.get(&key).copied()
    }

    pub fn remove(&mut self, key: ObjectKey) {
        self.spheres.remove(&key);
        self.modified.retain(|k| *k != key);
    }

    /// Objects whose bounds changed since the last [`clear_modified`](Self::clear_modified)
    pub fn modified(&self) -> &[ObjectKey] {
        &self.modified
    }

    pub fn clear_modified(&mut self) {
        self.modified.clear();
    }

    pub fn len(&self) -> usize {
        self.spheres.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spheres.is_empty()
    }

    pub fn merge(&mut self, other: &mut BoundingBoxManager, remap: &HashMap<ObjectKey, ObjectKey>) {
        for (old, sphere) in other.spheres.drain() {
            if let Some(new) = remap.get(&old) {
                self.spheres.insert(*new, sphere);
                self.modified.push(*new);
            }
        }
        other.modified.clear();
    }
}

/// A full-screen 2D filter pass
#[derive(Clone, Debug, PartialEq)]
pub struct Filter2D {
    pub name: String,
    pub enabled: bool,
}

impl Filter2D {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
        }
    }
}

/// Ordered 2D filter passes of a scene
#[derive(Clone, Debug, Default)]
pub struct FilterManager {
    filters: BTreeMap<u32, Filter2D>,
}

impl FilterManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a filter at `pass`, replacing any previous one
    pub fn add_filter(&mut self, pass: u32, filter: Filter2D) {
        self.filters.insert(pass, filter);
    }

    pub fn remove_filter(&mut self, pass: u32) -> Option<Filter2D> {
        self.filters.remove(&pass)
    }

    pub fn filter_mut(&mut self, pass: u32) -> Option<&mut Filter2D> {
        self.filters.get_mut(&pass)
    }

    /// Enabled filters in pass order
    pub fn enabled_filters(&self) -> Vec<(u32, &Filter2D)> {
        self.filters
            .iter()
            .filter(|(_, f)| f.enabled)
            .map(|(pass, f)| (*pass, f))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Take passes of `other` that this scene does not use
    pub fn merge(&mut self, other: &mut FilterManager) {
        for (pass, filter) in std::mem::take(&mut other.filters) {
            self.filters.entry(pass).or_insert(filter);
        }
    }
}

/// Kind of texture renderer
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TextureRendererKind {
    /// Mirror across a plane through the viewpoint
    Planar { normal: Vec3 },
    /// Six faces around the viewpoint
    Cube,
}

/// A render-to-texture source placed at an object
#[derive(Clone, Debug, PartialEq)]
pub struct TextureRenderer {
    pub name: String,
    pub kind: TextureRendererKind,
    pub viewpoint: ObjectKey,
    pub layers: u32,
    pub enabled: bool,
}

/// Reflection and probe renderers of a scene
#[derive(Clone, Debug, Default)]
pub struct TextureRendererManager {
    renderers: Vec<TextureRenderer>,
}

impl TextureRendererManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_renderer(&mut self, renderer: TextureRenderer) {
        self.renderers.push(renderer);
    }

    pub fn renderers(&self) -> &[TextureRenderer] {
        &self.renderers
    }

    /// Drop renderers that used a destroyed object as viewpoint
    pub fn invalidate_viewpoint(&mut self, key: ObjectKey) {
        self.renderers.retain(|r| r.viewpoint != key);
    }

    pub fn merge(&mut self, other: &mut TextureRendererManager, remap: &HashMap<ObjectKey, ObjectKey>) {
        for mut renderer in other.renderers.drain(..) {
            if let Some(new) = remap.get(&renderer.viewpoint) {
                renderer.viewpoint = *new;
                self.renderers.push(renderer);
            }
        }
    }
}
