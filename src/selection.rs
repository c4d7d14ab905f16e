//! Selection snapshots: a labelled subset of the scene stored relative to its
//! centroid, so it can be dropped back in at any anchor.

use std::time::SystemTime;

use chrono::Local;
use glam::Vec3;
use tracing::{debug, info, warn};

use crate::codec::StateCodec;
use crate::document::{now_save_time, DocumentHeader, SelectionSnapshotDocument};
use crate::error::{PersistError, PersistResult};
use crate::loader::SnapshotLoader;
use crate::slots::format_system_time;
use crate::store::{FileStore, StoredFile};
use crate::world::{EntityId, SceneWorld, Transform};
use crate::writer::SceneWriter;

pub const SELECTION_FILE_PREFIX: &str = "SelectedObjects_";
pub const SELECTION_FILE_SUFFIX: &str = ".json";
pub const SELECTION_STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectionDescriptor {
    pub file_name: String,
    pub label: String,
    pub saved_at: String,
    pub modified: SystemTime,
    pub object_count: usize,
    pub header_ok: bool,
}

/// Result of placing a selection back into the scene.
#[derive(Debug, Default)]
pub struct SelectionLoad {
    pub loaded: Vec<EntityId>,
    pub failures: Vec<(usize, PersistError)>,
    /// Payload entries dropped while restoring, by record index.
    pub warnings: Vec<(usize, PersistError)>,
}

/// Selection files under one sub-directory of the save root.
#[derive(Clone, Debug)]
pub struct SelectionStore {
    store: FileStore,
    dir: String,
}

impl SelectionStore {
    pub fn new(store: FileStore, dir: impl Into<String>) -> Self {
        Self {
            store,
            dir: dir.into(),
        }
    }

    fn relative(&self, file_name: &str) -> String {
        if self.dir.is_empty() {
            file_name.to_string()
        } else {
            format!("{}/{}", self.dir.trim_end_matches('/'), file_name)
        }
    }

    /// Builds the document for `ids` without touching the disk.
    ///
    /// The centroid is the mean position of the ids found in `world`; unknown
    /// ids are ignored. Fails with [`PersistError::EmptySelection`] when nothing
    /// saveable remains.
    pub fn capture(
        &self,
        codec: &StateCodec,
        world: &SceneWorld,
        ids: &[EntityId],
        label: &str,
    ) -> PersistResult<SelectionSnapshotDocument> {
        let entities: Vec<_> = ids.iter().filter_map(|id| world.get(*id)).collect();
        if entities.is_empty() {
            return Err(PersistError::EmptySelection);
        }
        let sum = entities
            .iter()
            .fold(Vec3::ZERO, |acc, entity| acc + entity.transform.position);
        let center = sum / entities.len() as f32;

        let writer = SceneWriter::new(codec);
        let objects: Vec<_> = entities
            .iter()
            .filter_map(|entity| writer.record_for(entity))
            .map(|mut record| {
                record.position = (Vec3::from(record.position) - center).into();
                record
            })
            .collect();
        if objects.is_empty() {
            return Err(PersistError::EmptySelection);
        }

        Ok(SelectionSnapshotDocument {
            save_name: label.to_string(),
            save_time: now_save_time(),
            center_position: center.into(),
            object_count: objects.len(),
            objects,
        })
    }

    /// Writes a captured selection under a fresh timestamped name and returns it.
    pub fn save(&self, document: &SelectionSnapshotDocument) -> PersistResult<String> {
        let file_name = self.unused_file_name();
        let relative = self.relative(&file_name);
        let json = serde_json::to_string_pretty(document)
            .map_err(|err| PersistError::parse(relative.as_str(), err))?;
        if !self.store.save_to_file(&relative, &json) {
            return Err(PersistError::io(relative));
        }
        info!(file = %file_name, label = %document.save_name, objects = document.object_count, "selection saved");
        Ok(file_name)
    }

    fn unused_file_name(&self) -> String {
        let stamp = Local::now().format(SELECTION_STAMP_FORMAT);
        let base = format!("{SELECTION_FILE_PREFIX}{stamp}");
        let mut file_name = format!("{base}{SELECTION_FILE_SUFFIX}");
        let mut n = 1;
        while self.store.exists(&self.relative(&file_name)) {
            file_name = format!("{base}_{n}{SELECTION_FILE_SUFFIX}");
            n += 1;
        }
        file_name
    }

    /// Selections newest first.
    pub fn list(&self) -> Vec<SelectionDescriptor> {
        let mut files =
            self.store
                .list(&self.dir, SELECTION_FILE_PREFIX, SELECTION_FILE_SUFFIX);
        files.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.relative.cmp(&a.relative))
        });
        files.iter().map(|file| self.describe(file)).collect()
    }

    fn describe(&self, file: &StoredFile) -> SelectionDescriptor {
        let file_name = file
            .relative
            .rsplit('/')
            .next()
            .unwrap_or(file.relative.as_str())
            .to_string();
        let header = self
            .store
            .load_from_file(&file.relative)
            .and_then(|text| serde_json::from_str::<DocumentHeader>(&text).ok());
        match header {
            Some(header) => SelectionDescriptor {
                file_name,
                label: header.save_name.unwrap_or_default(),
                saved_at: header.save_time,
                modified: file.modified,
                object_count: header.object_count,
                header_ok: true,
            },
            None => {
                warn!(file = %file.relative, "selection header unreadable; using file metadata");
                SelectionDescriptor {
                    file_name,
                    label: String::new(),
                    saved_at: format_system_time(file.modified),
                    modified: file.modified,
                    object_count: 0,
                    header_ok: false,
                }
            }
        }
    }

    /// File name of the most recently modified selection.
    pub fn latest(&self) -> Option<String> {
        self.list().into_iter().next().map(|d| d.file_name)
    }

    /// Reads a selection by its bare file name.
    ///
    /// # Errors
    /// [`PersistError::NotFound`] for names outside the selection namespace
    /// (path separators, `..`, or the wrong prefix and suffix) and for missing
    /// files; [`PersistError::Parse`] for unreadable documents.
    pub fn read(&self, file_name: &str) -> PersistResult<SelectionSnapshotDocument> {
        if !is_selection_file_name(file_name) {
            warn!(file_name, "rejected selection name outside the selection directory");
            return Err(PersistError::not_found("selection", file_name));
        }
        let relative = self.relative(file_name);
        if !self.store.exists(&relative) {
            return Err(PersistError::not_found("selection", file_name));
        }
        let text = self
            .store
            .load_from_file(&relative)
            .ok_or_else(|| PersistError::io(relative.as_str()))?;
        serde_json::from_str(&text).map_err(|err| PersistError::parse(relative, err))
    }

    /// Instantiates every record at `anchor + relative position`. The scene is
    /// not purged first.
    pub fn place(
        &self,
        loader: &SnapshotLoader<'_>,
        world: &mut SceneWorld,
        document: &SelectionSnapshotDocument,
        anchor: Vec3,
    ) -> SelectionLoad {
        let mut outcome = SelectionLoad::default();
        for (index, record) in document.objects.iter().enumerate() {
            let placement = Transform {
                position: anchor + Vec3::from(record.position),
                rotation: record.rotation.into(),
                scale: record.scale.into(),
            };
            match loader.load_record(world, record, Some(placement)) {
                Ok(restored) => {
                    outcome.loaded.push(restored.id);
                    outcome
                        .warnings
                        .extend(restored.warnings.into_iter().map(|err| (index, err)));
                }
                Err(err) => {
                    warn!(index, asset_id = %record.prefab_id, error = %err, "selection record skipped");
                    outcome.failures.push((index, err));
                }
            }
        }
        debug!(
            label = %document.save_name,
            loaded = outcome.loaded.len(),
            failed = outcome.failures.len(),
            "selection placed"
        );
        outcome
    }
}

fn is_selection_file_name(file_name: &str) -> bool {
    !file_name.contains(['/', '\\'])
        && !file_name.contains("..")
        && file_name.len() > SELECTION_FILE_PREFIX.len() + SELECTION_FILE_SUFFIX.len()
        && file_name.starts_with(SELECTION_FILE_PREFIX)
        && file_name.ends_with(SELECTION_FILE_SUFFIX)
}

#[cfg(test)]
#[path = "tests/selection_tests.rs"]
mod tests;
