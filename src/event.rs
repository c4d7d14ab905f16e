use serde::Serialize;

use crate::error::PersistError;

/// Notifications queued by the service for the host to drain.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PersistEvent {
    Saved {
        slot: String,
        objects: usize,
    },
    LoadStarted {
        slot: String,
        total: usize,
    },
    Progress(LoadProgress),
    /// One record could not be restored; the load carries on.
    RecordFailed {
        index: usize,
        prefab_id: String,
        error: PersistError,
    },
    /// A restored record lost one payload entry.
    PayloadDropped {
        index: usize,
        error: PersistError,
    },
    LoadCompleted {
        slot: String,
        total: usize,
        failed: usize,
    },
    LoadStopped {
        slot: String,
        completed: usize,
        total: usize,
    },
    SelectionSaved {
        file_name: String,
        label: String,
        objects: usize,
    },
    SelectionLoaded {
        file_name: String,
        loaded: usize,
        failed: usize,
    },
    /// A whole operation failed and left the scene untouched.
    Error {
        error: PersistError,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct LoadProgress {
    pub fraction: f32,
    pub completed: usize,
    pub total: usize,
}

impl LoadProgress {
    pub fn new(completed: usize, total: usize) -> Self {
        let fraction = if total == 0 {
            1.0
        } else {
            completed as f32 / total as f32
        };
        Self {
            fraction,
            completed,
            total,
        }
    }
}

impl PersistEvent {
    pub fn to_json_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "null".to_string())
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::RecordFailed { .. } | Self::PayloadDropped { .. } | Self::Error { .. }
        )
    }
}
