/// Scene registry — process-wide mapping from scene id to validated,
/// immutable definition. Read-mostly; writes swap whole `Arc`s so a
/// concurrent lookup never sees a partial definition.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::schema::scene::{SceneDefinition, ValidationError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("scene '{0}' is already registered")]
    Duplicate(String),
    #[error("scene '{0}' is not registered")]
    NotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// Registry of playable scenes. Populated at content-load time;
/// hot-reload is an explicit unregister + register pair.
#[derive(Default)]
pub struct SceneRegistry {
    scenes: RwLock<FxHashMap<String, Arc<SceneDefinition>>>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and insert a definition. Re-registering an existing
    /// id is refused; unregister first.
    pub fn register(&self, definition: SceneDefinition) -> Result<(), RegistryError> {
        definition.validate()?;
        let mut scenes = self.scenes.write();
        if scenes.contains_key(&definition.id) {
            return Err(RegistryError::Duplicate(definition.id));
        }
        info!(scene = %definition.id, nodes = definition.nodes.len(), "scene registered");
        scenes.insert(definition.id.clone(), Arc::new(definition));
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<SceneDefinition>, RegistryError> {
        self.scenes
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))
    }

    /// Remove a definition. Idempotent: returns whether anything was
    /// removed, so hot-reload sweeps can unregister unconditionally.
    pub fn unregister(&self, id: &str) -> bool {
        let removed = self.scenes.write().remove(id).is_some();
        if removed {
            info!(scene = %id, "scene unregistered");
        }
        removed
    }

    /// All registered scenes carrying the given tag.
    pub fn by_tag(&self, tag: &str) -> Vec<Arc<SceneDefinition>> {
        self.scenes
            .read()
            .values()
            .filter(|def| def.has_tag(tag))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scenes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.read().is_empty()
    }

    /// Drop everything. For tests and full content reloads.
    pub fn clear(&self) {
        self.scenes.write().clear();
    }
}
