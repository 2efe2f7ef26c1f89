use std::collections::BTreeMap;
use std::error::Error;

use tracing::debug;

use super::renderer::{ProgressConsole, ProgressTask, RuleStyle, TaskUpdate};
use super::traits::{Callback, LossValue, Reduction, TrainerView};
use super::{eval_title, format_results, round_loss, ProgressSettings};
use crate::monitor::{MetricResults, MonitorError, MonitorState};

const EPOCH: &str = "epoch";
const BATCH: &str = "batch";

/// Live epoch and batch bars, with a highlighted rule whenever the monitored
/// metric improves.
pub struct RichCallback {
    console: ProgressConsole,
    tasks: BTreeMap<&'static str, Box<dyn ProgressTask>>,
    loss: f64,
    batches_since_report: usize,
    epoch_bar_update_advance: f64,
    print_every: usize,
    loss_round_ndigit: u32,
    format_json: bool,
    monitor: MonitorState,
}

impl RichCallback {
    pub fn new(settings: &ProgressSettings, console: ProgressConsole) -> Self {
        Self {
            console,
            tasks: BTreeMap::new(),
            loss: 0.0,
            batches_since_report: 0,
            epoch_bar_update_advance: 0.0,
            print_every: settings.print_every.max(1),
            loss_round_ndigit: settings.loss_round_ndigit,
            format_json: settings.format_json,
            monitor: MonitorState::new(settings.monitor.clone(), settings.larger_better, false),
        }
    }

    pub fn monitor(&self) -> &MonitorState {
        &self.monitor
    }

    /// Names of the bars currently held.
    pub fn live_tasks(&self) -> Vec<&'static str> {
        self.tasks.keys().copied().collect()
    }

    /// Loss summed since the last report, with the number of batches in it.
    pub fn pending_loss(&self) -> (f64, usize) {
        (self.loss, self.batches_since_report)
    }

    pub fn is_rendering(&self) -> bool {
        self.console.is_enabled()
    }

    fn update(&mut self, task: &'static str, update: TaskUpdate) {
        if let Some(handle) = self.tasks.get_mut(task) {
            handle.update(update);
        }
    }

    fn clear_tasks(&mut self) {
        self.tasks.clear();
        self.console.stop();
        self.loss = 0.0;
        self.batches_since_report = 0;
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 { 0.0 } else { numerator as f64 / denominator as f64 }
}

impl Callback for RichCallback {
    fn name(&self) -> &'static str {
        "RichCallback"
    }

    fn on_after_trainer_initialized(&mut self, trainer: &dyn TrainerView) -> Result<(), MonitorError> {
        self.console.resolve_rank(trainer.local_rank());
        self.monitor.adopt_trainer_monitor(trainer, self.name())
    }

    fn on_sanity_check_end(&mut self, _trainer: &dyn TrainerView, results: &MetricResults) {
        if !results.is_empty() && self.monitor.has_monitor() {
            self.monitor.get_monitor_value(results);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn on_train_begin(&mut self, trainer: &dyn TrainerView) {
        let completed = ratio(trainer.global_forward_batches(), trainer.num_batches_per_epoch());
        let task = self.console.add_task("Epoch:0", trainer.n_epochs() as f64, completed);
        self.tasks.insert(EPOCH, task);
    }

    #[allow(clippy::cast_precision_loss)]
    fn on_train_epoch_begin(&mut self, trainer: &dyn TrainerView) {
        self.epoch_bar_update_advance = ratio(self.print_every, trainer.num_batches_per_epoch());
        let completed = trainer.batch_idx_in_epoch() as f64;
        if let Some(batch) = self.tasks.get_mut(BATCH) {
            batch.reset(completed);
        } else {
            let task = self.console.add_task("Batch:0", trainer.num_batches_per_epoch() as f64, completed);
            self.tasks.insert(BATCH, task);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn on_train_epoch_end(&mut self, trainer: &dyn TrainerView) {
        self.update(
            EPOCH,
            TaskUpdate {
                description: Some(format!("Epoch:{}", trainer.cur_epoch_idx())),
                completed: Some(trainer.cur_epoch_idx() as f64),
                ..Default::default()
            },
        );
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
        self.loss = 0.0;
        self.batches_since_report = 0;

        self.update(
            BATCH,
            TaskUpdate {
                description: Some(format!("Batch:{}", trainer.batch_idx_in_epoch())),
                advance: Some(self.print_every as f64),
                post_desc: Some(format!("Loss:{}", round_loss(loss, self.loss_round_ndigit))),
                ..Default::default()
            },
        );
        self.update(
            EPOCH,
            TaskUpdate {
                description: Some(format!("Epoch:{}", trainer.cur_epoch_idx())),
                advance: Some(self.epoch_bar_update_advance),
                ..Default::default()
            },
        );
    }

    fn on_validate_end(&mut self, trainer: &dyn TrainerView, results: &MetricResults) {
        if results.is_empty() {
            return;
        }

        let mut style = RuleStyle::Neutral;
        if self.monitor.has_monitor() {
            let value = self.monitor.get_monitor_value(results);
            if self.monitor.is_better(value, true) && self.monitor.has_finite_best() {
                style = RuleStyle::Improved;
            }
        }

        self.console.print_rule(&eval_title(trainer), style);
        self.console.print_text(&format_results(results, self.format_json));
    }

    fn on_train_end(&mut self, _trainer: &dyn TrainerView) {
        self.clear_tasks();
    }

    fn on_exception(&mut self, _trainer: &dyn TrainerView, error: &(dyn Error + 'static)) {
        debug!(error = %error, "Releasing progress bars after failure");
        self.clear_tasks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::renderer::{RecordingRenderer, RenderEvent};
    use std::sync::Arc;

    #[derive(Default)]
    struct View {
        epoch: usize,
        n_epochs: usize,
        batch: usize,
        per_epoch: usize,
        global: usize,
        rank: usize,
        monitor: Option<&'static str>,
    }

    impl TrainerView for View {
        fn cur_epoch_idx(&self) -> usize {
            self.epoch
        }
        fn n_epochs(&self) -> usize {
            self.n_epochs
        }
        fn batch_idx_in_epoch(&self) -> usize {
            self.batch
        }
        fn num_batches_per_epoch(&self) -> usize {
            self.per_epoch
        }
        fn global_forward_batches(&self) -> usize {
            self.global
        }
        fn total_batches(&self) -> usize {
            self.n_epochs * self.per_epoch
        }
        fn local_rank(&self) -> usize {
            self.rank
        }
        fn monitor(&self) -> Option<&str> {
            self.monitor
        }
    }

    fn callback(settings: ProgressSettings) -> (RichCallback, RecordingRenderer) {
        let renderer = RecordingRenderer::new();
        let console = ProgressConsole::new(Arc::new(renderer.clone()));
        (RichCallback::new(&settings, console), renderer)
    }

    fn results(pairs: &[(&str, f64)]) -> MetricResults {
        pairs.iter().map(|(k, v)| ((*k).to_string(), *v)).collect()
    }

    #[test]
    fn test_reports_mean_loss_every_print_every() {
        let (mut cb, renderer) = callback(ProgressSettings { print_every: 2, ..Default::default() });
        let mut view = View { n_epochs: 1, per_epoch: 4, ..Default::default() };
        cb.on_train_begin(&view);
        cb.on_train_epoch_begin(&view);

        for (i, loss) in [1.0, 3.0, 5.0, 7.0].iter().enumerate() {
            cb.on_before_backward(&view, &LossValue::Scalar(*loss));
            view.batch = i + 1;
            view.global = i + 1;
            cb.on_train_batch_end(&view);
        }

        let posts: Vec<String> = renderer
            .events()
            .into_iter()
            .filter_map(|event| match event {
                RenderEvent::TaskUpdated { update, .. } => update.post_desc,
                _ => None,
            })
            .collect();
        assert_eq!(posts, vec!["Loss:2", "Loss:6"]);
    }

    #[test]
    fn test_resume_starts_epoch_bar_at_completed_fraction() {
        let (mut cb, renderer) = callback(ProgressSettings::default());
        let view = View { n_epochs: 3, per_epoch: 4, global: 6, batch: 2, epoch: 1, ..Default::default() };
        cb.on_train_begin(&view);
        cb.on_train_epoch_begin(&view);

        let added: Vec<(String, f64)> = renderer
            .events()
            .into_iter()
            .filter_map(|event| match event {
                RenderEvent::TaskAdded { description, completed, .. } => Some((description, completed)),
                _ => None,
            })
            .collect();
        assert_eq!(added, vec![("Epoch:0".to_string(), 1.5), ("Batch:0".to_string(), 2.0)]);
    }

    #[test]
    fn test_second_epoch_resets_batch_bar() {
        let (mut cb, renderer) = callback(ProgressSettings::default());
        let mut view = View { n_epochs: 2, per_epoch: 2, ..Default::default() };
        cb.on_train_begin(&view);
        cb.on_train_epoch_begin(&view);
        view.epoch = 1;
        cb.on_train_epoch_end(&view);
        cb.on_train_epoch_begin(&view);

        assert_eq!(renderer.live_tasks(), 2);
        assert!(renderer.events().iter().any(|e| matches!(e, RenderEvent::TaskReset { completed, .. } if *completed == 0.0)));
    }

    #[test]
    fn test_improvement_highlights_rule() {
        let settings = ProgressSettings { monitor: Some("acc".to_string()), ..Default::default() };
        let (mut cb, renderer) = callback(settings);
        let view = View { n_epochs: 1, per_epoch: 1, ..Default::default() };

        cb.on_validate_end(&view, &results(&[("acc#dev", 0.5)]));
        cb.on_validate_end(&view, &results(&[("acc#dev", 0.3)]));
        cb.on_validate_end(&view, &results(&[("acc#dev", 0.8)]));

        let styles: Vec<RuleStyle> = renderer.rules().into_iter().map(|(_, style)| style).collect();
        assert_eq!(styles, vec![RuleStyle::Improved, RuleStyle::Neutral, RuleStyle::Improved]);
        assert!((cb.monitor().best_value() - 0.8).abs() < f64::EPSILON);
        assert_eq!(renderer.texts().len(), 3);
    }

    #[test]
    fn test_empty_results_render_nothing() {
        let (mut cb, renderer) = callback(ProgressSettings::default());
        cb.on_validate_end(&View::default(), &MetricResults::new());
        assert!(renderer.events().is_empty());
    }

    #[test]
    fn test_no_monitor_uses_neutral_rule() {
        let (mut cb, renderer) = callback(ProgressSettings::default());
        cb.on_validate_end(&View::default(), &results(&[("acc", 0.9)]));
        assert_eq!(renderer.rules()[0].1, RuleStyle::Neutral);
        assert!(renderer.rules()[0].0.contains("Eval. results on Epoch:0, Batch:0"));
    }

    #[test]
    fn test_adopts_trainer_monitor() {
        let (mut cb, _renderer) = callback(ProgressSettings::default());
        let view = View { monitor: Some("f1"), ..Default::default() };
        cb.on_after_trainer_initialized(&view).unwrap();
        assert_eq!(cb.monitor().monitor(), Some("f1"));
    }

    #[test]
    fn test_exception_releases_every_task() {
        let (mut cb, renderer) = callback(ProgressSettings::default());
        let view = View { n_epochs: 2, per_epoch: 3, ..Default::default() };
        cb.on_train_begin(&view);
        cb.on_train_epoch_begin(&view);
        cb.on_before_backward(&view, &LossValue::Scalar(1.0));
        assert_eq!(renderer.live_tasks(), 2);
        assert_eq!(cb.pending_loss(), (1.0, 1));

        let err = std::io::Error::other("boom");
        cb.on_exception(&view, &err);

        assert_eq!(renderer.live_tasks(), 0);
        assert!(cb.live_tasks().is_empty());
        assert_eq!(cb.pending_loss(), (0.0, 0));
        assert_eq!(renderer.events().last(), Some(&RenderEvent::Stopped));
    }

    #[test]
    fn test_non_zero_rank_renders_nothing_but_accumulates() {
        let settings = ProgressSettings { monitor: Some("acc".to_string()), ..Default::default() };
        let (mut cb, renderer) = callback(settings);
        let mut view = View { n_epochs: 1, per_epoch: 2, rank: 1, ..Default::default() };

        cb.on_after_trainer_initialized(&view).unwrap();
        assert!(!cb.is_rendering());
        cb.on_train_begin(&view);
        cb.on_train_epoch_begin(&view);
        cb.on_before_backward(&view, &LossValue::Scalar(2.0));
        view.global = 1;
        view.batch = 1;
        cb.on_train_batch_end(&view);
        cb.on_validate_end(&view, &results(&[("acc", 0.4)]));

        assert!(renderer.events().is_empty());
        assert!((cb.monitor().best_value() - 0.4).abs() < f64::EPSILON);
    }
}
