//! Logic hooks and scene callbacks
//!
//! Game logic is an external collaborator. A scene calls its [`SceneLogic`]
//! hooks at fixed points of every tick and its drawing callbacks at fixed
//! points of every render.

use crate::object::ObjectKey;
use crate::scene::Scene;

/// Per-tick game logic attached to a scene
///
/// `active` lists the objects whose logic is not suspended by activity
/// culling, in scene order. Hooks may replicate, remove or move objects
/// through `scene`; removals should use
/// [`Scene::delayed_remove_object`] so the current tick never observes a
/// half-destroyed object.
pub trait SceneLogic: Send {
    /// Sensors: called after timebombs tick down
    fn begin_frame(&mut self, _scene: &mut Scene, _active: &[ObjectKey], _curtime: f64, _framestep: f64) {}

    /// Controllers and actuators: called after the first scenegraph update
    fn update_frame(&mut self, _scene: &mut Scene, _active: &[ObjectKey], _curtime: f64) {}
}

/// A drawing callback, called with the active camera
pub type DrawCallback = Box<dyn FnMut(Option<ObjectKey>) + Send>;

/// Called once when the scene is destroyed
pub type RemoveCallback = Box<dyn FnOnce(&Scene) + Send>;

/// Drawing hooks of a scene
#[derive(Default)]
pub struct DrawCallbacks {
    pre_draw_setup: Vec<DrawCallback>,
    pre_draw: Vec<DrawCallback>,
    post_draw: Vec<DrawCallback>,
}

impl DrawCallbacks {
    /// Called for every camera schedule, before matrices are frozen
    pub fn add_pre_draw_setup(&mut self, callback: DrawCallback) {
        self.pre_draw_setup.push(callback);
    }

    /// Called before a camera's buckets are drawn
    pub fn add_pre_draw(&mut self, callback: DrawCallback) {
        self.pre_draw.push(callback);
    }

    /// Called after the scene's post filters
    pub fn add_post_draw(&mut self, callback: DrawCallback) {
        self.post_draw.push(callback);
    }

    pub fn run_pre_draw_setup(&mut self, camera: Option<ObjectKey>) {
        for callback in &mut self.pre_draw_setup {
            callback(camera);
        }
    }

    pub fn run_pre_draw(&mut self, camera: Option<ObjectKey>) {
        for callback in &mut self.pre_draw {
            callback(camera);
        }
    }

    pub fn run_post_draw(&mut self, camera: Option<ObjectKey>) {
        for callback in &mut self.post_draw {
            callback(camera);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pre_draw_setup.is_empty() && self.pre_draw.is_empty() && self.post_draw.is_empty()
    }
}

impl std::fmt::Debug for DrawCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawCallbacks")
            .field("pre_draw_setup", &self.pre_draw_setup.len())
            .field("pre_draw", &self.pre_draw.len())
            .field("post_draw", &self.post_draw.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_callbacks_run_in_registration_order() {
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut callbacks = DrawCallbacks::default();
        for i in 0..3 {
            let order = order.clone();
            callbacks.add_pre_draw(Box::new(move |_| order.lock().unwrap().push(i)));
        }
        callbacks.run_pre_draw(None);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_callbacks_receive_camera() {
        let hits = Arc::new(AtomicUsize::new(0));
        let seen = hits.clone();
        let mut callbacks = DrawCallbacks::default();
        callbacks.add_post_draw(Box::new(move |camera| {
            if camera.is_some() {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));

        callbacks.run_post_draw(Some(ObjectKey::default()));
        callbacks.run_post_draw(None);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!callbacks.is_empty());
    }
}
