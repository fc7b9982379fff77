//! Scene and registry errors

use std::fmt;

/// Error from a scene graph operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SceneError {
    /// The object key is not (or no longer) in this scene
    UnknownObject,
    /// Exactly one of the two scenes has a physics environment
    PhysicsMismatch { this: String, other: String },
    /// The object cannot be replicated (filtered out of a group pass)
    NotReplicable(String),
    /// The debug property list is at capacity
    DebugListFull,
}

impl fmt::Display for SceneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SceneError::UnknownObject => write!(f, "Object is not in this scene"),
            SceneError::PhysicsMismatch { this, other } => write!(
                f,
                "Cannot merge scene '{}' into '{}': physics environments differ",
                other, this
            ),
            SceneError::NotReplicable(name) => write!(f, "Object '{}' cannot be replicated", name),
            SceneError::DebugListFull => write!(f, "Debug property list is full"),
        }
    }
}

impl std::error::Error for SceneError {}

/// Error from a scene registry request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No source data for this scene name
    UnknownScene(String),
    /// A scene with this name is already active
    AlreadyExists(String),
    /// No active scene has this name
    NotLoaded(String),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnknownScene(name) => write!(f, "Unknown scene: {}", name),
            RegistryError::AlreadyExists(name) => write!(f, "Scene already exists: {}", name),
            RegistryError::NotLoaded(name) => write!(f, "Scene not loaded: {}", name),
        }
    }
}

impl std::error::Error for RegistryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = SceneError::PhysicsMismatch {
            this: "level".into(),
            other: "hud".into(),
        };
        assert_eq!(
            err.to_string(),
            "Cannot merge scene 'hud' into 'level': physics environments differ"
        );
        assert_eq!(RegistryError::NotLoaded("x".into()).to_string(), "Scene not loaded: x");
    }
}
