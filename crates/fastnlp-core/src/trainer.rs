//! A minimal synchronous training loop.
//!
//! The loop owns no model. It calls a step closure per batch and an evaluate
//! closure at the configured cadence, and fires every callback hook around
//! them. A failing or panicking closure routes through `on_exception`
//! instead of `on_train_end`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::callbacks::{Callback, CallbackManager, LossValue, TrainerView};
use crate::error::{CoreResult, TrainError};
use crate::monitor::MetricResults;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrainerStatus {
    Idle,
    Preparing,
    Running,
    Finished,
    Failed(String),
}

/// Loop-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainerSettings {
    #[serde(default = "default_n_epochs")]
    pub n_epochs: usize,

    /// Positive: evaluate every `n` batches. Negative: every `|n|` epochs.
    /// Zero: never.
    #[serde(default = "default_evaluate_every")]
    pub evaluate_every: i64,

    /// Run one evaluation before training and report it through
    /// `on_sanity_check_end`.
    #[serde(default)]
    pub sanity_check: bool,

    #[serde(default)]
    pub monitor: Option<String>,

    #[serde(default = "default_larger_better")]
    pub larger_better: bool,
}

fn default_n_epochs() -> usize {
    1
}

fn default_evaluate_every() -> i64 {
    -1
}

fn default_larger_better() -> bool {
    true
}

impl Default for TrainerSettings {
    fn default() -> Self {
        Self {
            n_epochs: default_n_epochs(),
            evaluate_every: default_evaluate_every(),
            sanity_check: false,
            monitor: None,
            larger_better: default_larger_better(),
        }
    }
}

/// Counters of a running loop, as seen by callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopState {
    cur_epoch_idx: usize,
    n_epochs: usize,
    batch_idx_in_epoch: usize,
    num_batches_per_epoch: usize,
    global_forward_batches: usize,
    local_rank: usize,
    monitor: Option<String>,
    larger_better: bool,
}

impl TrainerView for LoopState {
    fn cur_epoch_idx(&self) -> usize {
        self.cur_epoch_idx
    }

    fn n_epochs(&self) -> usize {
        self.n_epochs
    }

    fn batch_idx_in_epoch(&self) -> usize {
        self.batch_idx_in_epoch
    }

    fn num_batches_per_epoch(&self) -> usize {
        self.num_batches_per_epoch
    }

    fn global_forward_batches(&self) -> usize {
        self.global_forward_batches
    }

    fn total_batches(&self) -> usize {
        self.n_epochs * self.num_batches_per_epoch
    }

    fn local_rank(&self) -> usize {
        self.local_rank
    }

    fn monitor(&self) -> Option<&str> {
        self.monitor.as_deref()
    }

    fn larger_better(&self) -> bool {
        self.larger_better
    }
}

pub struct TrainingLoop {
    settings: TrainerSettings,
    state: LoopState,
    callbacks: CallbackManager,
    status: TrainerStatus,
}

impl TrainingLoop {
    pub fn new(settings: TrainerSettings, num_batches_per_epoch: usize) -> Self {
        let state = LoopState {
            cur_epoch_idx: 0,
            n_epochs: settings.n_epochs,
            batch_idx_in_epoch: 0,
            num_batches_per_epoch,
            global_forward_batches: 0,
            local_rank: 0,
            monitor: settings.monitor.clone(),
            larger_better: settings.larger_better,
        };
        Self { settings, state, callbacks: CallbackManager::new(), status: TrainerStatus::Idle }
    }

    pub fn with_local_rank(mut self, local_rank: usize) -> Self {
        self.state.local_rank = local_rank;
        self
    }

    /// Continues a run that already went through `global_forward_batches`
    /// batches.
    pub fn resume_from(mut self, global_forward_batches: usize) -> Self {
        let per_epoch = self.state.num_batches_per_epoch;
        self.state.global_forward_batches = global_forward_batches;
        if per_epoch > 0 {
            self.state.cur_epoch_idx = global_forward_batches / per_epoch;
            self.state.batch_idx_in_epoch = global_forward_batches % per_epoch;
        }
        self
    }

    pub fn add_callback<C: Callback + 'static>(&mut self, callback: C) {
        self.callbacks.add(callback);
    }

    pub fn add_boxed_callback(&mut self, callback: Box<dyn Callback>) {
        self.callbacks.add_boxed(callback);
    }

    pub fn callbacks(&self) -> &CallbackManager {
        &self.callbacks
    }

    pub fn status(&self) -> &TrainerStatus {
        &self.status
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    /// Runs every remaining epoch.
    pub fn run<S, E>(&mut self, mut step: S, mut evaluate: E) -> CoreResult<()>
    where
        S: FnMut(&LoopState) -> Result<LossValue, TrainError>,
        E: FnMut(&LoopState) -> Result<MetricResults, TrainError>,
    {
        self.status = TrainerStatus::Preparing;
        if let Err(err) = self.callbacks.on_after_trainer_initialized(&self.state) {
            self.status = TrainerStatus::Failed(err.to_string());
            return Err(err.into());
        }

        let mut guard = UnwindGuard { trainer: self };
        let trainer = &mut *guard.trainer;
        match trainer.drive(&mut step, &mut evaluate) {
            Ok(()) => {
                trainer.callbacks.on_train_end(&trainer.state);
                trainer.status = TrainerStatus::Finished;
                Ok(())
            }
            Err(err) => {
                trainer.fail(&err);
                Err(err.into())
            }
        }
    }

    fn fail(&mut self, err: &TrainError) {
        warn!(error = %err, "Training failed");
        self.callbacks.on_exception(&self.state, err);
        self.status = TrainerStatus::Failed(err.to_string());
    }

    fn drive<S, E>(&mut self, step: &mut S, evaluate: &mut E) -> Result<(), TrainError>
    where
        S: FnMut(&LoopState) -> Result<LossValue, TrainError>,
        E: FnMut(&LoopState) -> Result<MetricResults, TrainError>,
    {
        if self.settings.sanity_check {
            let results = evaluate(&self.state)?;
            self.callbacks.on_sanity_check_end(&self.state, &results);
        }

        self.status = TrainerStatus::Running;
        self.callbacks.on_train_begin(&self.state);

        while self.state.cur_epoch_idx < self.state.n_epochs {
            debug!(epoch = self.state.cur_epoch_idx, "Starting epoch");
            self.callbacks.on_train_epoch_begin(&self.state);

            while self.state.batch_idx_in_epoch < self.state.num_batches_per_epoch {
                let loss = step(&self.state)?;
                self.callbacks.on_before_backward(&self.state, &loss);
                self.state.batch_idx_in_epoch += 1;
                self.state.global_forward_batches += 1;
                self.callbacks.on_train_batch_end(&self.state);

                if self.evaluate_after_batch() {
                    let results = evaluate(&self.state)?;
                    self.callbacks.on_validate_end(&self.state, &results);
                }
            }

            self.state.cur_epoch_idx += 1;
            self.callbacks.on_train_epoch_end(&self.state);
            if self.evaluate_after_epoch() {
                let results = evaluate(&self.state)?;
                self.callbacks.on_validate_end(&self.state, &results);
            }
            self.state.batch_idx_in_epoch = 0;
        }
        Ok(())
    }

    fn evaluate_after_batch(&self) -> bool {
        let every = self.settings.evaluate_every;
        every > 0 && self.state.global_forward_batches % every.unsigned_abs() as usize == 0
    }

    fn evaluate_after_epoch(&self) -> bool {
        let every = self.settings.evaluate_every;
        every < 0 && self.state.cur_epoch_idx % every.unsigned_abs() as usize == 0
    }
}

/// Routes a panic in a step or evaluation through `on_exception`.
struct UnwindGuard<'a> {
    trainer: &'a mut TrainingLoop,
}

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            let err = TrainError::Panicked { batches: self.trainer.state.global_forward_batches };
            self.trainer.fail(&err);
        }
    }
}
