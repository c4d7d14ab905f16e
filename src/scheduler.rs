//! Progressive snapshot loading.
//!
//! A load is spread over host cycles: the host calls [`ProgressiveScheduler::tick`]
//! once per frame and each call restores a bounded batch of records, resuming
//! exactly where the previous call stopped.
//!
//! # Contracts
//! - **Invariant**: At most one load is in flight; a second `start` is rejected.
//! - **Invariant**: Under frame-based pacing every cycle restores at least one
//!   record while records remain. A failed record still counts as processed.
//! - **Postcondition**: A load that runs to the end has processed every record
//!   exactly once. `stop` keeps whatever was already restored.

use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::config::LoadingSettings;
use crate::document::{SaveRecord, SnapshotDocument};
use crate::error::{PersistError, PersistResult};
use crate::event::{LoadProgress, PersistEvent};
use crate::loader::SnapshotLoader;
use crate::world::SceneWorld;

/// How a load spreads its records over cycles.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Pacing {
    /// Completed count tracks `elapsed / target_duration_secs`.
    TimeBased { target_duration_secs: f32 },
    /// The same number of records every cycle.
    FrameBased { per_cycle: usize },
}

impl Pacing {
    /// Time-based when the records fit in the estimated cycle count, otherwise
    /// frame-based with `ceil(records / cycles)` clamped to the per-cycle bounds.
    pub fn choose(records: usize, settings: &LoadingSettings) -> Self {
        let estimated = settings.estimated_cycles();
        if records <= estimated {
            return Self::TimeBased {
                target_duration_secs: settings.target_duration_secs,
            };
        }
        let min = settings.min_per_cycle.max(1);
        let max = settings.max_per_cycle.max(min);
        Self::FrameBased {
            per_cycle: records.div_ceil(estimated).clamp(min, max),
        }
    }

    /// Records to process this cycle, given how many are done and the time spent so far.
    fn quota(&self, total: usize, completed: usize, elapsed_secs: f32) -> usize {
        let remaining = total.saturating_sub(completed);
        match *self {
            Self::TimeBased {
                target_duration_secs,
            } => {
                if !(target_duration_secs > 0.0) {
                    return remaining;
                }
                let progress = (elapsed_secs / target_duration_secs).clamp(0.0, 1.0);
                let target = ((total as f32) * progress).ceil() as usize;
                target.min(total).saturating_sub(completed)
            }
            Self::FrameBased { per_cycle } => per_cycle.max(1).min(remaining),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdleReason {
    Fresh,
    Completed,
    Stopped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle(IdleReason),
    Loading,
}

/// What one call to [`ProgressiveScheduler::tick`] did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepResult {
    /// No load in flight.
    Idle,
    Advanced {
        processed: usize,
        completed: usize,
        total: usize,
    },
    Completed {
        total: usize,
        failed: usize,
    },
    Stopped {
        completed: usize,
        total: usize,
    },
}

#[derive(Debug)]
struct LoadJob {
    slot: String,
    records: Vec<SaveRecord>,
    pacing: Pacing,
    completed: usize,
    failed: usize,
    elapsed_secs: f32,
}

impl LoadJob {
    fn total(&self) -> usize {
        self.records.len()
    }

    fn progress(&self) -> LoadProgress {
        LoadProgress::new(self.completed, self.total())
    }
}

#[derive(Debug)]
pub struct ProgressiveScheduler {
    state: SchedulerState,
    job: Option<LoadJob>,
    stop_requested: bool,
    events: VecDeque<PersistEvent>,
}

impl Default for ProgressiveScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressiveScheduler {
    pub fn new() -> Self {
        Self {
            state: SchedulerState::Idle(IdleReason::Fresh),
            job: None,
            stop_requested: false,
            events: VecDeque::new(),
        }
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == SchedulerState::Loading
    }

    /// Slot of the load in flight.
    pub fn slot(&self) -> Option<&str> {
        self.job.as_ref().map(|job| job.slot.as_str())
    }

    pub fn pacing(&self) -> Option<Pacing> {
        self.job.as_ref().map(|job| job.pacing)
    }

    pub fn progress(&self) -> Option<LoadProgress> {
        self.job.as_ref().map(LoadJob::progress)
    }

    /// Begins loading `document` into `world`.
    ///
    /// Persistent entities from earlier loads are purged first, together with
    /// the edit history. A document without records completes on the spot.
    pub fn start(
        &mut self,
        world: &mut SceneWorld,
        slot: &str,
        document: SnapshotDocument,
        settings: &LoadingSettings,
    ) -> PersistResult<Pacing> {
        if self.is_loading() {
            warn!(slot, active = ?self.slot(), "load rejected; another load is in progress");
            return Err(PersistError::ConcurrencyRejected);
        }

        let purged = world.purge_persistent();
        let total = document.objects.len();
        let pacing = Pacing::choose(total, settings);
        info!(slot, total, purged, ?pacing, "progressive load started");

        self.stop_requested = false;
        self.events.push_back(PersistEvent::LoadStarted {
            slot: slot.to_string(),
            total,
        });
        if total == 0 {
            self.events.push_back(PersistEvent::LoadCompleted {
                slot: slot.to_string(),
                total: 0,
                failed: 0,
            });
            self.state = SchedulerState::Idle(IdleReason::Completed);
            return Ok(pacing);
        }

        self.job = Some(LoadJob {
            slot: slot.to_string(),
            records: document.objects,
            pacing,
            completed: 0,
            failed: 0,
            elapsed_secs: 0.0,
        });
        self.state = SchedulerState::Loading;
        Ok(pacing)
    }

    /// Asks the load to end at the next cycle boundary. Returns false when
    /// nothing is loading.
    pub fn stop(&mut self) -> bool {
        if !self.is_loading() {
            return false;
        }
        debug!(slot = ?self.slot(), "stop requested");
        self.stop_requested = true;
        true
    }

    /// Ends the load immediately, without waiting for the next cycle.
    pub fn cancel(&mut self) -> bool {
        let Some(job) = self.job.take() else {
            return false;
        };
        self.finish_stopped(job);
        true
    }

    /// Runs one cycle: restores this cycle's quota of records.
    pub fn tick(&mut self, world: &mut SceneWorld, loader: &SnapshotLoader<'_>, dt: f32) -> StepResult {
        let Some(mut job) = self.job.take() else {
            return StepResult::Idle;
        };
        if self.stop_requested {
            return self.finish_stopped(job);
        }

        if dt.is_finite() && dt > 0.0 {
            job.elapsed_secs += dt;
        }
        let quota = job
            .pacing
            .quota(job.total(), job.completed, job.elapsed_secs);
        self.process(job, world, loader, quota)
    }

    /// Restores everything that is left in one call.
    pub fn run_to_end(&mut self, world: &mut SceneWorld, loader: &SnapshotLoader<'_>) -> StepResult {
        let Some(job) = self.job.take() else {
            return StepResult::Idle;
        };
        let remaining = job.total() - job.completed;
        self.process(job, world, loader, remaining)
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = PersistEvent> + '_ {
        self.events.drain(..)
    }

    fn process(
        &mut self,
        mut job: LoadJob,
        world: &mut SceneWorld,
        loader: &SnapshotLoader<'_>,
        quota: usize,
    ) -> StepResult {
        let end = (job.completed + quota).min(job.total());
        let start = job.completed;
        for index in start..end {
            let record = &job.records[index];
            match loader.load_record(world, record, None) {
                Ok(restored) => {
                    for error in restored.warnings {
                        self.events
                            .push_back(PersistEvent::PayloadDropped { index, error });
                    }
                }
                Err(error) => {
                    warn!(slot = %job.slot, index, asset_id = %record.prefab_id, %error, "record skipped");
                    job.failed += 1;
                    self.events.push_back(PersistEvent::RecordFailed {
                        index,
                        prefab_id: record.prefab_id.clone(),
                        error,
                    });
                }
            }
            job.completed += 1;
        }

        let processed = end - start;
        if processed > 0 {
            self.events.push_back(PersistEvent::Progress(job.progress()));
        }

        if job.completed < job.total() {
            let result = StepResult::Advanced {
                processed,
                completed: job.completed,
                total: job.total(),
            };
            self.job = Some(job);
            return result;
        }

        info!(slot = %job.slot, total = job.total(), failed = job.failed, "progressive load completed");
        self.events.push_back(PersistEvent::LoadCompleted {
            slot: job.slot.clone(),
            total: job.total(),
            failed: job.failed,
        });
        self.state = SchedulerState::Idle(IdleReason::Completed);
        StepResult::Completed {
            total: job.total(),
            failed: job.failed,
        }
    }

    fn finish_stopped(&mut self, job: LoadJob) -> StepResult {
        info!(slot = %job.slot, completed = job.completed, total = job.total(), "progressive load stopped");
        self.stop_requested = false;
        self.state = SchedulerState::Idle(IdleReason::Stopped);
        self.events.push_back(PersistEvent::LoadStopped {
            slot: job.slot.clone(),
            completed: job.completed,
            total: job.total(),
        });
        StepResult::Stopped {
            completed: job.completed,
            total: job.total(),
        }
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
