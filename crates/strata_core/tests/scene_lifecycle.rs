//! Integration tests for scene lifecycle
//!
//! These tests drive scenes through the public API only:
//! 1. Conversion from templates
//! 2. Parenting and world transform propagation
//! 3. Replication of inactive subtrees and their removal
//! 4. Merging scenes and registry tick boundaries

use std::sync::Arc;

use glam::Vec3;
use strata_core::{
    AddPolicy, GameObject, ObjectKind, ObjectTemplate, PostProcess, Property, Scene, SceneConverter,
    SceneRegistry, SceneTemplate, TemplateConverter,
};
use strata_core::object::Mesh;

fn arena() -> SceneTemplate {
    SceneTemplate::new("arena")
        .with_object(ObjectTemplate::new("base", ObjectKind::Empty).with_position(Vec3::new(1.0, 0.0, 0.0)))
        .with_object(
            ObjectTemplate::new("tower", ObjectKind::Mesh)
                .with_parent("base")
                .with_position(Vec3::new(0.0, 2.0, 0.0))
                .with_mesh(Mesh::new("tower", vec!["stone".to_string()])),
        )
        .with_object(
            ObjectTemplate::new("bolt", ObjectKind::Mesh)
                .with_mesh(Mesh::new("bolt", vec!["glow".to_string()]))
                .with_property("damage", Property::Int(3))
                .inactive(),
        )
}

// ==================== Conversion Tests ====================

#[test]
fn test_converted_scene_has_world_transforms() {
    let mut converter = TemplateConverter::new();
    converter.register_template(arena());
    let source = converter.resolve_scene("arena").expect("arena should resolve");

    let mut scene = Scene::new("arena");
    converter.convert_scene(source, &mut scene).unwrap();
    scene.update_parents();

    let tower = scene.find_object("tower").expect("tower should be active");
    let world = scene.world_transform(tower).unwrap();
    assert!((world.position - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5);

    assert!(scene.find_object("bolt").is_none());
    assert!(scene.find_inactive("bolt").is_some());
}

// ==================== Scenegraph Tests ====================

#[test]
fn test_moving_parent_moves_children() {
    let mut scene = Scene::new("graph");
    let parent = scene.add_object(GameObject::new("parent", ObjectKind::Empty), None);
    let child = scene.add_object(GameObject::new("child", ObjectKind::Empty), Some(parent));
    scene.set_local_position(child, Vec3::new(0.0, 0.0, 1.0)).unwrap();
    scene.update_parents();

    scene.set_local_position(parent, Vec3::new(5.0, 0.0, 0.0)).unwrap();
    scene.update_parents();

    let world = scene.world_transform(child).unwrap();
    assert!((world.position - Vec3::new(5.0, 0.0, 1.0)).length() < 1e-5);
    assert_eq!(scene.descendants(parent), vec![child]);
}

#[test]
fn test_reparent_keeps_world_placement() {
    let mut scene = Scene::new("graph");
    let a = scene.add_object(GameObject::new("a", ObjectKind::Empty), None);
    let b = scene.add_object(GameObject::new("b", ObjectKind::Empty), None);
    scene.set_local_position(a, Vec3::new(3.0, 0.0, 0.0)).unwrap();
    scene.set_local_position(b, Vec3::new(0.0, 4.0, 0.0)).unwrap();
    scene.update_parents();

    scene.set_parent(b, a).unwrap();
    scene.update_parents();

    let world = scene.world_transform(b).unwrap();
    assert!((world.position - Vec3::new(0.0, 4.0, 0.0)).length() < 1e-5);
    assert_eq!(scene.root_of(b), a);
}

// ==================== Replication Tests ====================

#[test]
fn test_replica_shares_mesh_and_copies_properties() {
    let mesh = Arc::new(Mesh::new("bolt", vec!["glow".to_string()]));
    let mut scene = Scene::new("replicas");
    let original = scene.add_inactive_object(
        GameObject::new("bolt", ObjectKind::Mesh)
            .with_mesh(mesh.clone())
            .with_property("damage", Property::Int(3)),
        None,
    );
    let users = Arc::strong_count(&mesh);

    let replica = scene.add_replica_object(original, None, 0.0).unwrap();

    assert!(Arc::strong_count(&mesh) > users);
    let copy = scene.object(replica).unwrap();
    assert_eq!(copy.name, "bolt");
    assert_eq!(copy.property("damage"), Some(&Property::Int(3)));
    assert!(scene.objects().contains(&replica));
    assert!(scene.temp_objects().is_empty());
}

#[test]
fn test_replica_subtree_removed_together() {
    let mut scene = Scene::new("replicas");
    let ship = scene.add_inactive_object(GameObject::new("ship", ObjectKind::Empty), None);
    scene.add_inactive_object(GameObject::new("turret", ObjectKind::Empty), Some(ship));

    let replica = scene.add_replica_object(ship, None, 0.0).unwrap();
    let children = scene.descendants(replica);
    assert_eq!(children.len(), 1);
    assert_eq!(scene.object(children[0]).unwrap().name, "turret");

    assert!(scene.remove_object(replica));
    assert!(!scene.contains(replica));
    assert!(!scene.contains(children[0]));
    assert!(scene.contains(ship));
}

#[test]
fn test_replica_placed_at_reference() {
    let mut scene = Scene::new("replicas");
    let bolt = scene.add_inactive_object(GameObject::new("bolt", ObjectKind::Empty), None);
    let gun = scene.add_object(GameObject::new("gun", ObjectKind::Empty).with_layer(4), None);
    scene.set_local_position(gun, Vec3::new(2.0, 3.0, 4.0)).unwrap();
    scene.update_parents();

    let replica = scene.add_replica_object(bolt, Some(gun), 10.0).unwrap();

    let world = scene.world_transform(replica).unwrap();
    assert!((world.position - Vec3::new(2.0, 3.0, 4.0)).length() < 1e-5);
    assert_eq!(scene.object(replica).unwrap().layer, 4);
    assert_eq!(scene.temp_objects(), &[replica]);
}

// ==================== Merge Tests ====================

#[test]
fn test_merge_moves_all_objects() {
    let mut scene = Scene::new("level");
    scene.add_object(GameObject::new("floor", ObjectKind::Mesh), None);
    let mut library = Scene::new("library");
    let lamp = library.add_object(GameObject::new("lamp", ObjectKind::Empty), None);
    library.add_object(GameObject::new("shade", ObjectKind::Empty), Some(lamp));

    scene.merge(&mut library).unwrap();

    assert_eq!(scene.object_count(), 3);
    assert!(scene.find_object("lamp").is_some());
    assert!(library.objects().is_empty());

    let lamp = scene.find_object("lamp").unwrap();
    let shade = scene.find_object("shade").unwrap();
    assert_eq!(scene.object(shade).unwrap().parent(), Some(lamp));
}

// ==================== Registry Tests ====================

#[test]
fn test_registry_tick_boundary() {
    let mut converter = TemplateConverter::new();
    converter.register_template(arena());
    converter.register_template(SceneTemplate::new("menu"));

    let mut registry = SceneRegistry::new();
    let post = PostProcess::default();
    registry.request_add("arena", AddPolicy::Overlay).unwrap();
    registry.request_add("menu", AddPolicy::Background).unwrap();
    assert!(registry.is_empty());

    assert!(registry.apply_scheduled_changes(&mut converter, &post));
    assert_eq!(registry.names(), vec!["menu", "arena"]);

    registry.request_remove("menu").unwrap();
    registry.request_remove("arena").unwrap();
    assert!(!registry.apply_scheduled_changes(&mut converter, &post));
    assert!(registry.is_empty());
}
