//! The persistence service: one explicitly constructed instance owns the codec,
//! the stores and the scheduler, and the host drives it from its frame loop.

use std::collections::VecDeque;

use glam::Vec3;
use tracing::{info, instrument, warn};

use crate::codec::StateCodec;
use crate::config::{ConfigError, PersistConfig};
use crate::document::{now_save_time, SelectionSnapshotDocument, SnapshotDocument};
use crate::error::{PersistError, PersistResult};
use crate::event::PersistEvent;
use crate::loader::{AssetResolver, SnapshotLoader};
use crate::scheduler::{Pacing, ProgressiveScheduler, StepResult};
use crate::selection::{SelectionDescriptor, SelectionLoad, SelectionStore};
use crate::slots::{SlotDescriptor, SlotRegistry};
use crate::store::FileStore;
use crate::world::{EntityId, SceneWorld};
use crate::writer::SceneWriter;

#[derive(Debug)]
pub struct PersistenceService<R: AssetResolver> {
    config: PersistConfig,
    codec: StateCodec,
    resolver: R,
    slots: SlotRegistry,
    selections: SelectionStore,
    scheduler: ProgressiveScheduler,
    events: VecDeque<PersistEvent>,
    current_slot: Option<String>,
}

impl<R: AssetResolver> PersistenceService<R> {
    /// Validates `config` and opens the stores under its save root.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when the loading settings cannot make progress.
    pub fn new(config: PersistConfig, codec: StateCodec, resolver: R) -> Result<Self, ConfigError> {
        config.validate()?;
        let root = config.storage.resolve_root();
        let store = FileStore::new(&root).with_backups(config.storage.keep_backups);
        let slots = SlotRegistry::new(
            store.clone(),
            config.storage.slot_suffix.as_str(),
            config.storage.default_slot.as_str(),
        );
        let selections = SelectionStore::new(store, config.storage.selection_dir.as_str());
        info!(root = %root.display(), codec = ?codec, "persistence service ready");
        Ok(Self {
            config,
            codec,
            resolver,
            slots,
            selections,
            scheduler: ProgressiveScheduler::new(),
            events: VecDeque::new(),
            current_slot: None,
        })
    }

    pub fn config(&self) -> &PersistConfig {
        &self.config
    }

    pub fn codec(&self) -> &StateCodec {
        &self.codec
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Slot last saved to or loaded from.
    pub fn current_slot(&self) -> Option<&str> {
        self.current_slot.as_deref()
    }

    fn target_slot(&self, slot: Option<&str>) -> String {
        let name = slot
            .or(self.current_slot.as_deref())
            .unwrap_or(self.slots.default_slot());
        self.slots.sanitize(name)
    }

    fn report<T>(&mut self, result: PersistResult<T>) -> PersistResult<T> {
        if let Err(error) = &result {
            self.events.push_back(PersistEvent::Error {
                error: error.clone(),
            });
        }
        result
    }

    fn pull_scheduler_events(&mut self) {
        self.events.extend(self.scheduler.drain_events());
    }

    // Slots -------------------------------------------------------------------

    /// Writes the scene to `slot`, or to the current slot when `None`.
    #[instrument(skip(self, world))]
    pub fn save(&mut self, world: &SceneWorld, slot: Option<&str>) -> PersistResult<String> {
        let slot = self.target_slot(slot);
        let document = SceneWriter::new(&self.codec).write_document(world);
        let objects = document.object_count;
        let written = self.slots.write_document(&slot, &document);
        let file_name = self.report(written)?;
        self.current_slot = Some(slot.clone());
        self.events.push_back(PersistEvent::Saved { slot, objects });
        Ok(file_name)
    }

    /// Loads `slot` (or the current slot) into `world`.
    ///
    /// With progressive loading the records arrive over the following
    /// [`tick`](Self::tick) calls; otherwise they are all restored before this
    /// returns.
    ///
    /// # Errors
    /// Fails without touching the scene when a load is already running or the
    /// document cannot be read.
    #[instrument(skip(self, world))]
    pub fn load(&mut self, world: &mut SceneWorld, slot: Option<&str>) -> PersistResult<Pacing> {
        if self.scheduler.is_loading() {
            warn!(active = ?self.scheduler.slot(), "load rejected; another load is in progress");
            return self.report(Err(PersistError::ConcurrencyRejected));
        }
        let slot = self.target_slot(slot);
        let read = self.slots.read_document(&slot);
        let document = self.report(read)?;

        let settings = self.config.loading;
        let started = self.scheduler.start(world, &slot, document, &settings);
        let pacing = self.report(started)?;
        self.current_slot = Some(slot);

        if !settings.progressive {
            let loader = SnapshotLoader::new(
                &self.codec,
                &self.resolver,
                &self.config.assets.probe_prefixes,
            );
            self.scheduler.run_to_end(world, &loader);
        }
        self.pull_scheduler_events();
        Ok(pacing)
    }

    /// Advances a progressive load by one host cycle.
    pub fn tick(&mut self, world: &mut SceneWorld, dt: f32) -> StepResult {
        let loader = SnapshotLoader::new(
            &self.codec,
            &self.resolver,
            &self.config.assets.probe_prefixes,
        );
        let step = self.scheduler.tick(world, &loader, dt);
        self.pull_scheduler_events();
        step
    }

    pub fn stop_load(&mut self) -> bool {
        self.scheduler.stop()
    }

    pub fn is_loading(&self) -> bool {
        self.scheduler.is_loading()
    }

    pub fn scheduler(&self) -> &ProgressiveScheduler {
        &self.scheduler
    }

    #[instrument(skip(self))]
    pub fn create_empty_slot(&mut self, name: &str) -> PersistResult<String> {
        let created = self.slots.create_empty(name, &now_save_time());
        self.report(created)
    }

    #[instrument(skip(self))]
    pub fn delete_slot(&mut self, name: &str) -> bool {
        let sanitized = self.slots.sanitize(name);
        let removed = self.slots.delete(name);
        if removed && self.current_slot.as_deref() == Some(sanitized.as_str()) {
            self.current_slot = None;
        }
        removed
    }

    /// Reads a slot document without loading it.
    pub fn read_slot(&self, name: &str) -> PersistResult<SnapshotDocument> {
        self.slots.read_document(name)
    }

    pub fn slot_exists(&self, name: &str) -> bool {
        self.slots.exists(name)
    }

    pub fn list_slots(&mut self) -> Vec<SlotDescriptor> {
        self.slots.list_slots()
    }

    // Selections --------------------------------------------------------------

    /// Captures `ids` relative to their centroid and writes them to a new
    /// selection file. Nothing is written for an empty selection.
    #[instrument(skip(self, world))]
    pub fn save_selection(
        &mut self,
        world: &SceneWorld,
        ids: &[EntityId],
        label: &str,
    ) -> PersistResult<String> {
        let captured = self.selections.capture(&self.codec, world, ids, label);
        let document = self.report(captured)?;
        let saved = self.selections.save(&document);
        let file_name = self.report(saved)?;
        self.events.push_back(PersistEvent::SelectionSaved {
            file_name: file_name.clone(),
            label: document.save_name,
            objects: document.object_count,
        });
        Ok(file_name)
    }

    pub fn list_selections(&self) -> Vec<SelectionDescriptor> {
        self.selections.list()
    }

    pub fn read_selection(&self, file_name: &str) -> PersistResult<SelectionSnapshotDocument> {
        self.selections.read(file_name)
    }

    /// Places the named selection so its centroid lands on `anchor`.
    #[instrument(skip(self, world))]
    pub fn load_selection_by_name(
        &mut self,
        world: &mut SceneWorld,
        file_name: &str,
        anchor: Vec3,
    ) -> PersistResult<SelectionLoad> {
        let read = self.selections.read(file_name);
        let document = self.report(read)?;
        Ok(self.place_selection(world, file_name, &document, anchor))
    }

    /// Places the most recently written selection at `anchor`.
    #[instrument(skip(self, world))]
    pub fn load_latest_selection(
        &mut self,
        world: &mut SceneWorld,
        anchor: Vec3,
    ) -> PersistResult<SelectionLoad> {
        let latest = self
            .selections
            .latest()
            .ok_or_else(|| PersistError::not_found("selection", "latest"));
        let file_name = self.report(latest)?;
        self.load_selection_by_name(world, &file_name, anchor)
    }

    fn place_selection(
        &mut self,
        world: &mut SceneWorld,
        file_name: &str,
        document: &SelectionSnapshotDocument,
        anchor: Vec3,
    ) -> SelectionLoad {
        let loader = SnapshotLoader::new(
            &self.codec,
            &self.resolver,
            &self.config.assets.probe_prefixes,
        );
        let outcome = self.selections.place(&loader, world, document, anchor);
        for (index, error) in &outcome.warnings {
            self.events.push_back(PersistEvent::PayloadDropped {
                index: *index,
                error: error.clone(),
            });
        }
        for (index, error) in &outcome.failures {
            self.events.push_back(PersistEvent::RecordFailed {
                index: *index,
                prefab_id: document.objects[*index].prefab_id.clone(),
                error: error.clone(),
            });
        }
        self.events.push_back(PersistEvent::SelectionLoaded {
            file_name: file_name.to_string(),
            loaded: outcome.loaded.len(),
            failed: outcome.failures.len(),
        });
        outcome
    }

    // Events and lifecycle ----------------------------------------------------

    /// Takes every event queued since the previous call, oldest first.
    pub fn drain_events(&mut self) -> Vec<PersistEvent> {
        self.pull_scheduler_events();
        self.events.drain(..).collect()
    }

    /// Ends an in-flight load and drops undelivered events.
    #[instrument(skip(self))]
    pub fn shutdown(mut self) {
        if self.scheduler.cancel() {
            info!("in-flight load cancelled at shutdown");
        }
        let dropped = self.scheduler.drain_events().count() + self.events.len();
        info!(dropped, "persistence service shut down");
    }
}

#[cfg(test)]
#[path = "tests/service_tests.rs"]
mod tests;
