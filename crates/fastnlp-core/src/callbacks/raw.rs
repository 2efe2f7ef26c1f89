use std::error::Error;

use tracing::info;

use super::traits::{Callback, LossValue, Reduction, TrainerView};
use super::{eval_title, format_results, round_loss, ProgressSettings};
use crate::monitor::{MetricResults, MonitorError, MonitorState};

const NUM_SIGNS: usize = 10;

/// Progress as plain log lines, for terminals without live redraw.
pub struct RawTextCallback {
    enabled: bool,
    loss: f64,
    batches_since_report: usize,
    print_every: usize,
    loss_round_ndigit: u32,
    format_json: bool,
    monitor: MonitorState,
}

impl RawTextCallback {
    pub fn new(settings: &ProgressSettings) -> Self {
        Self {
            enabled: true,
            loss: 0.0,
            batches_since_report: 0,
            print_every: settings.print_every.max(1),
            loss_round_ndigit: settings.loss_round_ndigit,
            format_json: settings.format_json,
            monitor: MonitorState::new(settings.monitor.clone(), settings.larger_better, false),
        }
    }

    pub fn monitor(&self) -> &MonitorState {
        &self.monitor
    }

    pub fn is_rendering(&self) -> bool {
        self.enabled
    }

    fn reset(&mut self) {
        self.loss = 0.0;
        self.batches_since_report = 0;
    }
}

impl Callback for RawTextCallback {
    fn name(&self) -> &'static str {
        "RawTextCallback"
    }

    fn on_after_trainer_initialized(&mut self, trainer: &dyn TrainerView) -> Result<(), MonitorError> {
        self.enabled = self.enabled && trainer.local_rank() == 0;
        self.monitor.adopt_trainer_monitor(trainer, self.name())
    }

    fn on_sanity_check_end(&mut self, _trainer: &dyn TrainerView, results: &MetricResults) {
        if !results.is_empty() && self.monitor.has_monitor() {
            self.monitor.get_monitor_value(results);
        }
    }

    fn on_train_epoch_begin(&mut self, trainer: &dyn TrainerView) {
        if self.enabled {
            let stars = "*".repeat(NUM_SIGNS);
            info!("{stars}Epoch:{} starts{stars}", trainer.cur_epoch_idx());
        }
    }

    fn on_before_backward(&mut self, trainer: &dyn TrainerView, loss: &LossValue) {
        self.loss += trainer.tensor_to_numeric(loss, Reduction::Sum);
        self.batches_since_report += 1;
    }

    #[allow(clippy::cast_precision_loss)]
    fn on_train_batch_end(&mut self, trainer: &dyn TrainerView) {
        if trainer.global_forward_batches() % self.print_every != 0 {
            return;
        }

        let loss = self.loss / self.batches_since_report.max(1) as f64;
        self.reset();

        if self.enabled {
            let finished = if trainer.total_batches() == 0 {
                0.0
            } else {
                trainer.global_forward_batches() as f64 / trainer.total_batches() as f64 * 100.0
            };
            info!(
                "Epoch:{}/{}, Batch:{}, loss:{}, finished {}%.",
                trainer.cur_epoch_idx(),
                trainer.n_epochs(),
                trainer.batch_idx_in_epoch(),
                round_loss(loss, self.loss_round_ndigit),
                round_loss(finished, 2)
            );
        }
    }

    fn on_validate_end(&mut self, trainer: &dyn TrainerView, results: &MetricResults) {
        if results.is_empty() {
            return;
        }

        let mut signs = "-";
        if self.monitor.has_monitor() {
            let value = self.monitor.get_monitor_value(results);
            if self.monitor.is_better(value, true) && self.monitor.has_finite_best() {
                signs = "+";
            }
        }

        if self.enabled {
            let signs = signs.repeat(NUM_SIGNS);
            info!("{signs}{}{signs}", eval_title(trainer));
            info!("{}", format_results(results, self.format_json));
        }
    }

    fn on_train_end(&mut self, _trainer: &dyn TrainerView) {
        self.reset();
    }

    fn on_exception(&mut self, _trainer: &dyn TrainerView, _error: &(dyn Error + 'static)) {
        self.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct View {
        rank: usize,
    }

    impl TrainerView for View {
        fn cur_epoch_idx(&self) -> usize {
            0
        }
        fn n_epochs(&self) -> usize {
            1
        }
        fn batch_idx_in_epoch(&self) -> usize {
            1
        }
        fn num_batches_per_epoch(&self) -> usize {
            1
        }
        fn global_forward_batches(&self) -> usize {
            1
        }
        fn total_batches(&self) -> usize {
            1
        }
        fn local_rank(&self) -> usize {
            self.rank
        }
    }

    #[test]
    fn test_rank_gating() {
        let mut cb = RawTextCallback::new(&ProgressSettings::default());
        cb.on_after_trainer_initialized(&View { rank: 2 }).unwrap();
        assert!(!cb.is_rendering());
        cb.on_after_trainer_initialized(&View { rank: 0 }).unwrap();
        assert!(!cb.is_rendering());
    }

    #[test]
    fn test_monitor_tracks_best() {
        let settings = ProgressSettings { monitor: Some("loss".to_string()), larger_better: false, ..Default::default() };
        let mut cb = RawTextCallback::new(&settings);
        let view = View { rank: 0 };
        for value in [0.5, 0.3, 0.8] {
            let results: MetricResults = [("loss#dev".to_string(), value)].into_iter().collect();
            cb.on_validate_end(&view, &results);
        }
        assert!((cb.monitor().best_value() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_accumulator_cleared_on_exception() {
        let mut cb = RawTextCallback::new(&ProgressSettings::default());
        let view = View { rank: 0 };
        cb.on_before_backward(&view, &LossValue::Tensor(vec![1.0, 2.0]));
        assert!((cb.loss - 3.0).abs() < f64::EPSILON);
        cb.on_exception(&view, &std::io::Error::other("boom"));
        assert_eq!(cb.loss, 0.0);
        assert_eq!(cb.batches_since_report, 0);
    }
}
