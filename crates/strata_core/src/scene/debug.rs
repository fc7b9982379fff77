//! Debug property list

use super::Scene;
use crate::error::SceneError;
use crate::object::ObjectKey;

/// Capacity of a scene's debug property list
pub const MAX_DEBUG_PROPERTIES: usize = 100;

impl Scene {
    /// Show `name` of `key` in the debug overlay
    pub fn add_debug_property(&mut self, key: ObjectKey, name: &str) -> Result<(), SceneError> {
        if !self.objects.contains_key(key) {
            return Err(SceneError::UnknownObject);
        }
        if self.property_in_debug_list(key, name) {
            return Ok(());
        }
        if self.debug_list.len() >= MAX_DEBUG_PROPERTIES {
            log::warn!(
                "Debug property list of scene '{}' is full ({} entries), '{}' not added",
                self.name(),
                MAX_DEBUG_PROPERTIES,
                name
            );
            return Err(SceneError::DebugListFull);
        }
        self.debug_list.push((key, name.to_string()));
        Ok(())
    }

    pub fn remove_debug_property(&mut self, key: ObjectKey, name: &str) {
        self.debug_list.retain(|(k, n)| !(*k == key && n == name));
    }

    pub fn remove_object_debug_properties(&mut self, key: ObjectKey) {
        self.debug_list.retain(|(k, _)| *k != key);
    }

    pub fn remove_all_debug_properties(&mut self) {
        self.debug_list.clear();
    }

    pub fn property_in_debug_list(&self, key: ObjectKey, name: &str) -> bool {
        self.debug_list.iter().any(|(k, n)| *k == key && n == name)
    }

    pub fn object_in_debug_list(&self, key: ObjectKey) -> bool {
        self.debug_list.iter().any(|(k, _)| *k == key)
    }

    /// Add every debug property the object declares
    pub fn add_object_debug_properties(&mut self, key: ObjectKey) {
        let Some(names) = self.objects.get(key).map(|o| o.debug_properties.clone()) else {
            return;
        };
        for name in names {
            if self.add_debug_property(key, &name).is_err() {
                break;
            }
        }
    }

    pub fn debug_properties(&self) -> &[(ObjectKey, String)] {
        &self.debug_list
    }

    /// Overlay lines `object: 'property' = value`, skipping missing properties
    pub fn debug_property_lines(&self, limit: usize) -> Vec<String> {
        self.debug_list
            .iter()
            .filter_map(|(key, name)| {
                let object = self.objects.get(*key)?;
                let value = object.property(name)?;
                Some(format!("{}: '{}' = {}", object.name, name, value))
            })
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::{GameObject, ObjectKind, Property};

    #[test]
    fn test_debug_list_capacity() {
        let mut scene = Scene::new("debug");
        let key = scene.add_object(GameObject::new("o", ObjectKind::Empty), None);
        for i in 0..MAX_DEBUG_PROPERTIES {
            scene.add_debug_property(key, &format!("p{}", i)).unwrap();
        }
        assert_eq!(scene.add_debug_property(key, "overflow"), Err(SceneError::DebugListFull));
        assert_eq!(scene.debug_properties().len(), MAX_DEBUG_PROPERTIES);
        // Re-adding an existing entry is not an error
        assert!(scene.add_debug_property(key, "p0").is_ok());
    }

    #[test]
    fn test_debug_lines() {
        let mut scene = Scene::new("debug");
        let player = GameObject::new("player", ObjectKind::Empty)
            .with_property("health", Property::Int(90))
            .with_property("name", Property::Text("bob".into()));
        let key = scene.add_object(player, None);
        scene.add_debug_property(key, "health").unwrap();
        scene.add_debug_property(key, "missing").unwrap();
        scene.add_debug_property(key, "name").unwrap();

        assert_eq!(
            scene.debug_property_lines(10),
            vec!["player: 'health' = 90".to_string(), "player: 'name' = bob".to_string()]
        );
        assert_eq!(scene.debug_property_lines(1).len(), 1);
    }

    #[test]
    fn test_remove_entries() {
        let mut scene = Scene::new("debug");
        let a = scene.add_object(GameObject::new("a", ObjectKind::Empty), None);
        let b = scene.add_object(GameObject::new("b", ObjectKind::Empty), None);
        scene.add_debug_property(a, "x").unwrap();
        scene.add_debug_property(a, "y").unwrap();
        scene.add_debug_property(b, "x").unwrap();

        scene.remove_debug_property(a, "x");
        assert!(!scene.property_in_debug_list(a, "x"));
        assert!(scene.property_in_debug_list(b, "x"));

        scene.remove_object_debug_properties(a);
        assert!(!scene.object_in_debug_list(a));

        scene.remove_all_debug_properties();
        assert!(scene.debug_properties().is_empty());
    }

    #[test]
    fn test_declared_properties() {
        let mut scene = Scene::new("debug");
        let mut object = GameObject::new("o", ObjectKind::Empty);
        object.debug_properties = vec!["speed".into(), "ammo".into()];
        let key = scene.add_object(object, None);
        scene.add_object_debug_properties(key);
        assert_eq!(scene.debug_properties().len(), 2);
    }
}
