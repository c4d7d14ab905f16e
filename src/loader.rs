//! Reconstructs entities from save records.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::codec::StateCodec;
use crate::document::SaveRecord;
use crate::error::{PersistError, PersistResult};
use crate::world::{EntityBuilder, EntityId, SceneWorld, Transform};

/// Something that can produce fresh instances of one asset.
#[derive(Clone)]
pub struct PrefabHandle {
    asset_id: String,
    factory: Arc<dyn Fn() -> EntityBuilder + Send + Sync>,
}

impl PrefabHandle {
    pub fn new<F>(asset_id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> EntityBuilder + Send + Sync + 'static,
    {
        Self {
            asset_id: asset_id.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// A fresh, persistent instance with the prefab's default components.
    pub fn instantiate(&self) -> EntityBuilder {
        (self.factory)().persistent()
    }
}

impl fmt::Debug for PrefabHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrefabHandle")
            .field("asset_id", &self.asset_id)
            .finish_non_exhaustive()
    }
}

/// Maps asset identifiers to prefabs. Storage layout is the implementor's concern.
pub trait AssetResolver {
    fn resolve(&self, id: &str) -> Option<PrefabHandle>;
}

/// In-memory resolver keyed by exact asset path.
#[derive(Clone, Debug, Default)]
pub struct PrefabLibrary {
    prefabs: HashMap<String, PrefabHandle>,
}

impl PrefabLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, path: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn() -> EntityBuilder + Send + Sync + 'static,
    {
        let path = path.into();
        self.prefabs
            .insert(path.clone(), PrefabHandle::new(path, factory));
        self
    }

    pub fn with<F>(mut self, path: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> EntityBuilder + Send + Sync + 'static,
    {
        self.register(path, factory);
        self
    }

    pub fn len(&self) -> usize {
        self.prefabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty()
    }
}

impl AssetResolver for PrefabLibrary {
    fn resolve(&self, id: &str) -> Option<PrefabHandle> {
        self.prefabs.get(id).cloned()
    }
}

/// One restored entity and the payload entries that could not be applied to it.
#[derive(Debug)]
pub struct RestoredEntity {
    pub id: EntityId,
    pub warnings: Vec<PersistError>,
}

/// Restores records one at a time. A failed record never affects another.
#[derive(Clone, Copy)]
pub struct SnapshotLoader<'a> {
    codec: &'a StateCodec,
    resolver: &'a dyn AssetResolver,
    probe_prefixes: &'a [String],
}

impl fmt::Debug for SnapshotLoader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotLoader")
            .field("codec", self.codec)
            .field("probe_prefixes", &self.probe_prefixes)
            .finish_non_exhaustive()
    }
}

impl<'a> SnapshotLoader<'a> {
    pub fn new(
        codec: &'a StateCodec,
        resolver: &'a dyn AssetResolver,
        probe_prefixes: &'a [String],
    ) -> Self {
        Self {
            codec,
            resolver,
            probe_prefixes,
        }
    }

    /// Identifiers tried for `asset_id`, in probe order, without duplicates.
    /// The bare id always comes first.
    pub fn candidates(&self, asset_id: &str) -> Vec<String> {
        let mut candidates = vec![asset_id.to_string()];
        for prefix in self.probe_prefixes {
            let candidate = format!("{prefix}{asset_id}");
            if !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        }
        candidates
    }

    pub fn resolve(&self, asset_id: &str) -> Option<PrefabHandle> {
        self.candidates(asset_id).iter().find_map(|candidate| {
            let handle = self.resolver.resolve(candidate);
            if handle.is_some() {
                debug!(asset_id, candidate = %candidate, "asset resolved");
            }
            handle
        })
    }

    /// Instantiates one record. With `placement` set, the entity goes there
    /// instead of the record's own transform.
    pub fn load_record(
        &self,
        world: &mut SceneWorld,
        record: &SaveRecord,
        placement: Option<Transform>,
    ) -> PersistResult<RestoredEntity> {
        let handle = self.resolve(&record.prefab_id).ok_or_else(|| {
            warn!(asset_id = %record.prefab_id, "no prefab for record");
            PersistError::not_found("asset", record.prefab_id.as_str())
        })?;

        let placement = placement.unwrap_or(Transform {
            position: record.position.into(),
            rotation: record.rotation.into(),
            scale: record.scale.into(),
        });
        let name = if record.object_name.is_empty() {
            handle.asset_id().to_string()
        } else {
            record.object_name.clone()
        };
        let id = world.spawn(handle.instantiate().named(name).with_transform(placement));

        let warnings = match world.get_mut(id) {
            Some(entity) => self
                .codec
                .decode_and_restore(&record.custom_data, entity, &placement),
            None => Vec::new(),
        };
        Ok(RestoredEntity { id, warnings })
    }
}

#[cfg(test)]
#[path = "tests/loader_tests.rs"]
mod tests;
