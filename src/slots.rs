//! Named save slots: name/file mapping, enumeration, and deletion.

use std::collections::HashMap;
use std::time::SystemTime;

use chrono::{DateTime, Local};
use tracing::{debug, info, warn};

use crate::document::{DocumentHeader, SnapshotDocument, SAVE_TIME_FORMAT};
use crate::error::{PersistError, PersistResult};
use crate::store::{FileStore, StoredFile};

/// Characters that are not allowed in slot file names on any supported platform.
const INVALID_FILE_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Listing entry for one slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotDescriptor {
    pub name: String,
    pub file_name: String,
    /// `saveTime` from the document, or the file's modification time when the
    /// header could not be read.
    pub saved_at: String,
    pub modified: SystemTime,
    pub object_count: usize,
    pub size_bytes: u64,
    /// False when the header failed to parse and the fallbacks above were used.
    pub header_ok: bool,
}

#[derive(Debug)]
pub struct SlotRegistry {
    store: FileStore,
    suffix: String,
    default_slot: String,
    cache: HashMap<String, SlotDescriptor>,
}

impl SlotRegistry {
    pub fn new(store: FileStore, suffix: impl Into<String>, default_slot: impl Into<String>) -> Self {
        Self {
            store,
            suffix: suffix.into(),
            default_slot: default_slot.into(),
            cache: HashMap::new(),
        }
    }

    pub fn store(&self) -> &FileStore {
        &self.store
    }

    pub fn default_slot(&self) -> &str {
        &self.default_slot
    }

    /// Strips characters file systems reject. A name with nothing left maps to
    /// the default slot.
    pub fn sanitize(&self, slot: &str) -> String {
        let cleaned: String = slot
            .chars()
            .filter(|c| !INVALID_FILE_CHARS.contains(c) && !c.is_control())
            .collect();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            self.default_slot.clone()
        } else {
            cleaned.to_string()
        }
    }

    pub fn name_to_file(&self, slot: &str) -> String {
        format!("{}{}", self.sanitize(slot), self.suffix)
    }

    pub fn file_to_name(&self, file_name: &str) -> Option<String> {
        file_name
            .strip_suffix(self.suffix.as_str())
            .map(str::to_string)
    }

    pub fn exists(&self, slot: &str) -> bool {
        self.store.exists(&self.name_to_file(slot))
    }

    /// Writes `document` to the slot's file and returns the file name.
    pub fn write_document(&mut self, slot: &str, document: &SnapshotDocument) -> PersistResult<String> {
        let file_name = self.name_to_file(slot);
        let json = serde_json::to_string_pretty(document)
            .map_err(|err| PersistError::parse(file_name.as_str(), err))?;
        if !self.store.save_to_file(&file_name, &json) {
            return Err(PersistError::io(file_name));
        }
        self.cache.remove(&file_name);
        info!(slot, file = %file_name, objects = document.object_count, "slot written");
        Ok(file_name)
    }

    /// Reads and parses a slot document, falling back to its backup when the
    /// primary copy is damaged.
    pub fn read_document(&self, slot: &str) -> PersistResult<SnapshotDocument> {
        let file_name = self.name_to_file(slot);
        if !self.store.exists(&file_name) {
            return Err(PersistError::not_found("slot", slot));
        }
        let text = self
            .store
            .load_from_file(&file_name)
            .ok_or_else(|| PersistError::io(file_name.as_str()))?;
        match serde_json::from_str::<SnapshotDocument>(&text) {
            Ok(document) => Ok(document),
            Err(primary) => {
                warn!(file = %file_name, error = %primary, "slot document is damaged; trying backup");
                let recovered = self
                    .store
                    .load_backup(&file_name)
                    .and_then(|backup| serde_json::from_str::<SnapshotDocument>(&backup).ok());
                match recovered {
                    Some(document) => {
                        info!(file = %file_name, "slot recovered from backup");
                        Ok(document)
                    }
                    None => Err(PersistError::parse(file_name, primary)),
                }
            }
        }
    }

    pub fn create_empty(&mut self, slot: &str, save_time: &str) -> PersistResult<String> {
        self.write_document(slot, &SnapshotDocument::new(save_time, Vec::new()))
    }

    /// Removes a slot. Returns false when it did not exist.
    pub fn delete(&mut self, slot: &str) -> bool {
        let file_name = self.name_to_file(slot);
        self.cache.remove(&file_name);
        let removed = self.store.delete(&file_name);
        if removed {
            info!(slot, file = %file_name, "slot deleted");
        } else {
            debug!(slot, file = %file_name, "nothing to delete");
        }
        removed
    }

    /// Every slot under the root, newest first. Headers are only re-read for
    /// files that changed since the previous listing.
    pub fn list_slots(&mut self) -> Vec<SlotDescriptor> {
        let files = self.store.list("", "", &self.suffix);
        let mut live = HashMap::with_capacity(files.len());
        for file in files {
            let descriptor = match self.cache.remove(&file.relative) {
                Some(cached) if cached.modified == file.modified && cached.size_bytes == file.size_bytes => cached,
                _ => self.describe(&file),
            };
            live.insert(file.relative, descriptor);
        }
        self.cache = live;

        let mut slots: Vec<_> = self.cache.values().cloned().collect();
        slots.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));
        slots
    }

    fn describe(&self, file: &StoredFile) -> SlotDescriptor {
        let name = self
            .file_to_name(&file.relative)
            .unwrap_or_else(|| file.relative.clone());
        let header = self
            .store
            .load_from_file(&file.relative)
            .and_then(|text| match serde_json::from_str::<DocumentHeader>(&text) {
                Ok(header) => Some(header),
                Err(err) => {
                    warn!(file = %file.relative, error = %err, "slot header unreadable; using file metadata");
                    None
                }
            });
        match header {
            Some(header) => SlotDescriptor {
                name,
                file_name: file.relative.clone(),
                saved_at: header.save_time,
                modified: file.modified,
                object_count: header.object_count,
                size_bytes: file.size_bytes,
                header_ok: true,
            },
            None => SlotDescriptor {
                name,
                file_name: file.relative.clone(),
                saved_at: format_system_time(file.modified),
                modified: file.modified,
                object_count: 0,
                size_bytes: file.size_bytes,
                header_ok: false,
            },
        }
    }
}

pub(crate) fn format_system_time(time: SystemTime) -> String {
    DateTime::<Local>::from(time)
        .format(SAVE_TIME_FORMAT)
        .to_string()
}

#[cfg(test)]
#[path = "tests/slots_tests.rs"]
mod tests;
