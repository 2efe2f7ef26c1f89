//! Callback manager for dispatching events to multiple callbacks

use std::error::Error;

use super::traits::{Callback, LossValue, TrainerView};
use crate::monitor::{MetricResults, MonitorError};

/// Dispatches every lifecycle event to each registered callback, in
/// registration order.
pub struct CallbackManager {
    callbacks: Vec<Box<dyn Callback>>,
}

impl CallbackManager {
    pub fn new() -> Self {
        Self { callbacks: Vec::new() }
    }

    pub fn add<C: Callback + 'static>(&mut self, callback: C) {
        self.callbacks.push(Box::new(callback));
    }

    pub fn add_boxed(&mut self, callback: Box<dyn Callback>) {
        self.callbacks.push(callback);
    }

    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.callbacks.iter().map(|cb| cb.name()).collect()
    }

    /// Stops at the first callback that fails to initialize.
    pub fn on_after_trainer_initialized(&mut self, trainer: &dyn TrainerView) -> Result<(), MonitorError> {
        for cb in &mut self.callbacks {
            cb.on_after_trainer_initialized(trainer)?;
        }
        Ok(())
    }

    pub fn on_sanity_check_end(&mut self, trainer: &dyn TrainerView, results: &MetricResults) {
        for cb in &mut self.callbacks {
            cb.on_sanity_check_end(trainer, results);
        }
    }

    pub fn on_train_begin(&mut self, trainer: &dyn TrainerView) {
        for cb in &mut self.callbacks {
            cb.on_train_begin(trainer);
        }
    }

    pub fn on_train_end(&mut self, trainer: &dyn TrainerView) {
        for cb in &mut self.callbacks {
            cb.on_train_end(trainer);
        }
    }

    pub fn on_train_epoch_begin(&mut self, trainer: &dyn TrainerView) {
        for cb in &mut self.callbacks {
            cb.on_train_epoch_begin(trainer);
        }
    }

    pub fn on_train_epoch_end(&mut self, trainer: &dyn TrainerView) {
        for cb in &mut self.callbacks {
            cb.on_train_epoch_end(trainer);
        }
    }

    pub fn on_before_backward(&mut self, trainer: &dyn TrainerView, loss: &LossValue) {
        for cb in &mut self.callbacks {
            cb.on_before_backward(trainer, loss);
        }
    }

    pub fn on_train_batch_end(&mut self, trainer: &dyn TrainerView) {
        for cb in &mut self.callbacks {
            cb.on_train_batch_end(trainer);
        }
    }

    pub fn on_validate_end(&mut self, trainer: &dyn TrainerView, results: &MetricResults) {
        for cb in &mut self.callbacks {
            cb.on_validate_end(trainer, results);
        }
    }

    pub fn on_exception(&mut self, trainer: &dyn TrainerView, error: &(dyn Error + 'static)) {
        for cb in &mut self.callbacks {
            cb.on_exception(trainer, error);
        }
    }
}

impl Default for CallbackManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct View;

    impl TrainerView for View {
        fn cur_epoch_idx(&self) -> usize {
            0
        }
        fn n_epochs(&self) -> usize {
            1
        }
        fn batch_idx_in_epoch(&self) -> usize {
            0
        }
        fn num_batches_per_epoch(&self) -> usize {
            2
        }
        fn global_forward_batches(&self) -> usize {
            0
        }
        fn total_batches(&self) -> usize {
            2
        }
        fn local_rank(&self) -> usize {
            0
        }
    }

    struct Recorder {
        tag: &'static str,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Callback for Recorder {
        fn name(&self) -> &'static str {
            self.tag
        }

        fn on_train_begin(&mut self, _trainer: &dyn TrainerView) {
            self.log.lock().unwrap().push(format!("{}:begin", self.tag));
        }

        fn on_before_backward(&mut self, _trainer: &dyn TrainerView, loss: &LossValue) {
            self.log.lock().unwrap().push(format!("{}:loss={:?}", self.tag, loss));
        }
    }

    struct NeedsMonitor;

    impl Callback for NeedsMonitor {
        fn on_after_trainer_initialized(&mut self, _trainer: &dyn TrainerView) -> Result<(), MonitorError> {
            Err(MonitorError::Required { callback: "NeedsMonitor".to_string() })
        }
    }

    #[test]
    fn test_dispatch_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut manager = CallbackManager::new();
        manager.add(Recorder { tag: "a", log: Arc::clone(&log) });
        manager.add(Recorder { tag: "b", log: Arc::clone(&log) });

        assert_eq!(manager.len(), 2);
        assert_eq!(manager.names(), vec!["a", "b"]);

        manager.on_train_begin(&View);
        manager.on_before_backward(&View, &LossValue::Scalar(1.5));

        let log = log.lock().unwrap();
        assert_eq!(*log, vec!["a:begin", "b:begin", "a:loss=Scalar(1.5)", "b:loss=Scalar(1.5)"]);
    }

    #[test]
    fn test_initialization_error_propagates() {
        let mut manager = CallbackManager::default();
        assert!(manager.is_empty());
        manager.add(NeedsMonitor);
        let err = manager.on_after_trainer_initialized(&View).unwrap_err();
        assert!(matches!(err, MonitorError::Required { .. }));
    }
}
