//! Collects live entities into save records.

use tracing::{debug, trace};

use crate::codec::StateCodec;
use crate::document::{now_save_time, SaveRecord, SnapshotDocument};
use crate::world::{Entity, SceneWorld};

/// Walks a scene and folds each entity's persistable components into one record.
///
/// Reads only; nothing in the scene is touched.
#[derive(Clone, Copy, Debug)]
pub struct SceneWriter<'a> {
    codec: &'a StateCodec,
}

impl<'a> SceneWriter<'a> {
    pub fn new(codec: &'a StateCodec) -> Self {
        Self { codec }
    }

    /// Builds the record for one entity, or `None` when it has nothing to save.
    ///
    /// Inactive entities, components with a blank type key, and entities with
    /// no asset to re-instantiate from are skipped. The first saveable
    /// component fixes the record's identity; every further one is merged into
    /// its payload map.
    pub fn record_for(&self, entity: &Entity) -> Option<SaveRecord> {
        if !entity.active {
            trace!(entity = %entity.name, "skipping inactive entity");
            return None;
        }

        let mut record: Option<SaveRecord> = None;
        for component in entity.components() {
            let type_key = component.type_key();
            if type_key.trim().is_empty() {
                debug!(entity = %entity.name, "skipping component with blank type key");
                continue;
            }
            let payload = component.capture_payload();
            if let Some(existing) = record.as_mut() {
                existing.custom_data = self.codec.merge(&existing.custom_data, type_key, &*payload);
                continue;
            }

            let asset_id = component
                .asset_id()
                .filter(|id| !id.trim().is_empty())
                .unwrap_or(entity.asset_id.as_str());
            if asset_id.trim().is_empty() {
                debug!(entity = %entity.name, "skipping entity without an asset id");
                return None;
            }
            let mut first = SaveRecord::new(asset_id);
            first.object_name = entity.name.clone();
            first.position = entity.transform.position.into();
            first.rotation = entity.transform.rotation.into();
            first.scale = entity.transform.scale.into();
            first.custom_data = self.codec.merge("", type_key, &*payload);
            record = Some(first);
        }
        record
    }

    /// Records for every saveable entity, in discovery order.
    pub fn collect(&self, world: &SceneWorld) -> Vec<SaveRecord> {
        world.iter().filter_map(|entity| self.record_for(entity)).collect()
    }

    pub fn write_document(&self, world: &SceneWorld) -> SnapshotDocument {
        let objects = self.collect(world);
        debug!(objects = objects.len(), "scene collected");
        SnapshotDocument::new(now_save_time(), objects)
    }
}

#[cfg(test)]
#[path = "tests/writer_tests.rs"]
mod tests;
