mod codec;
mod config;
mod document;
mod error;
mod event;
mod history;
mod loader;
mod scheduler;
mod selection;
mod service;
mod slots;
mod store;
mod world;
mod writer;

pub use codec::{ComponentState, DecodedPayloads, Payload, Persistable, Saveable, StateCodec};
pub use config::{AssetSettings, ConfigError, LoadingSettings, PersistConfig, StorageSettings};
pub use document::{
    now_save_time, selection_json_schema, snapshot_json_schema, DocumentHeader,
    EncodedPayloadMap, QuatData, SaveRecord, SelectionSnapshotDocument, SnapshotDocument,
    Vec3Data, SAVE_TIME_FORMAT,
};
pub use error::{PersistError, PersistResult};
pub use event::{LoadProgress, PersistEvent};
pub use history::{CommandHistory, MAX_UNDO_ENTRIES};
pub use loader::{AssetResolver, PrefabHandle, PrefabLibrary, RestoredEntity, SnapshotLoader};
pub use scheduler::{IdleReason, Pacing, ProgressiveScheduler, SchedulerState, StepResult};
pub use selection::{
    SelectionDescriptor, SelectionLoad, SelectionStore, SELECTION_FILE_PREFIX,
    SELECTION_FILE_SUFFIX, SELECTION_STAMP_FORMAT,
};
pub use service::PersistenceService;
pub use slots::{SlotDescriptor, SlotRegistry};
pub use store::{FileStore, StoredFile};
pub use world::{Entity, EntityBuilder, EntityId, SceneEdit, SceneWorld, Transform};
pub use writer::SceneWriter;

#[cfg(test)]
#[path = "tests/fixtures.rs"]
pub(crate) mod test_fixtures;
