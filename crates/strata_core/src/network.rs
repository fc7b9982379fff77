//! In-process network messages
//!
//! Messages sent during a tick are readable by every scene until the engine
//! clears them at the end of that tick.

use std::sync::{Arc, Mutex, MutexGuard};

/// A message between objects or scenes
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkMessage {
    /// Receiver name; empty broadcasts
    pub to: String,
    pub from: String,
    pub subject: String,
    pub body: String,
}

/// Message store shared by all scenes
#[derive(Debug, Default)]
pub struct NetworkMessageManager {
    messages: Vec<NetworkMessage>,
}

impl NetworkMessageManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send_message(&mut self, message: NetworkMessage) {
        self.messages.push(message);
    }

    /// Messages for `to` (or broadcast), optionally filtered by subject
    pub fn messages(&self, to: Option<&str>, subject: Option<&str>) -> Vec<NetworkMessage> {
        self.messages
            .iter()
            .filter(|m| match to {
                Some(to) => m.to.is_empty() || m.to == to,
                None => true,
            })
            .filter(|m| subject.map_or(true, |s| m.subject == s))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear_messages(&mut self) {
        self.messages.clear();
    }
}

/// Handle to the shared message store
pub type SharedMessages = Arc<Mutex<NetworkMessageManager>>;

/// Create an empty shared store
pub fn shared_messages() -> SharedMessages {
    Arc::new(Mutex::new(NetworkMessageManager::new()))
}

/// Lock the store, recovering from a poisoned lock
pub fn lock_messages(messages: &SharedMessages) -> MutexGuard<'_, NetworkMessageManager> {
    messages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A scene's view of the shared message store
#[derive(Clone, Debug)]
pub struct NetworkMessageScene {
    scene_name: String,
    manager: SharedMessages,
}

impl NetworkMessageScene {
    pub fn new(scene_name: impl Into<String>, manager: SharedMessages) -> Self {
        Self {
            scene_name: scene_name.into(),
            manager,
        }
    }

    pub fn send(&self, to: &str, subject: &str, body: &str) {
        lock_messages(&self.manager).send_message(NetworkMessage {
            to: to.to_string(),
            from: self.scene_name.clone(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
    }

    /// Messages addressed to `receiver` or broadcast
    pub fn receive(&self, receiver: &str, subject: Option<&str>) -> Vec<NetworkMessage> {
        lock_messages(&self.manager).messages(Some(receiver), subject)
    }

    pub fn manager(&self) -> &SharedMessages {
        &self.manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_broadcast_and_direct() {
        let shared = shared_messages();
        let scene = NetworkMessageScene::new("level", shared.clone());
        scene.send("", "ping", "all");
        scene.send("player", "ping", "you");
        scene.send("enemy", "attack", "");

        assert_eq!(scene.receive("player", None).len(), 2);
        assert_eq!(scene.receive("enemy", Some("attack")).len(), 1);
        assert_eq!(lock_messages(&shared).len(), 3);
    }

    #[test]
    fn test_clear() {
        let shared = shared_messages();
        let scene = NetworkMessageScene::new("level", shared.clone());
        scene.send("", "tick", "");
        lock_messages(&shared).clear_messages();
        assert!(lock_messages(&shared).is_empty());
        assert!(scene.receive("anyone", None).is_empty());
    }

    #[test]
    fn test_sender_is_scene() {
        let shared = shared_messages();
        NetworkMessageScene::new("hud", shared.clone()).send("x", "s", "b");
        assert_eq!(lock_messages(&shared).messages(None, None)[0].from, "hud");
    }
}
