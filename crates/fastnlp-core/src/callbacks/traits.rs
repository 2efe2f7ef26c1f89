//! Core traits and types for the callback system
//!
//! - `TrainerView` - read access to the loop a callback observes
//! - `LossValue` - the loss a training step produced
//! - `Callback` - the trait all callbacks implement

use std::error::Error;

use crate::monitor::{MetricResults, MonitorError};

/// How a multi-element loss is reduced to one number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    Mean,
}

/// Loss produced by one training step.
#[derive(Debug, Clone, PartialEq)]
pub enum LossValue {
    Scalar(f64),
    /// Per-element losses, e.g. one per example or per device.
    Tensor(Vec<f64>),
}

impl LossValue {
    #[allow(clippy::cast_precision_loss)]
    pub fn reduce(&self, reduction: Reduction) -> f64 {
        match self {
            Self::Scalar(value) => *value,
            Self::Tensor(values) if values.is_empty() => 0.0,
            Self::Tensor(values) => {
                let sum: f64 = values.iter().sum();
                match reduction {
                    Reduction::Sum => sum,
                    Reduction::Mean => sum / values.len() as f64,
                }
            }
        }
    }
}

impl From<f64> for LossValue {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<f64>> for LossValue {
    fn from(values: Vec<f64>) -> Self {
        Self::Tensor(values)
    }
}

/// What a callback may read from the running loop.
///
/// `cur_epoch_idx` counts finished epochs: it is the index of the running
/// epoch until `on_train_epoch_end`, where it already includes that epoch.
/// `batch_idx_in_epoch` and `global_forward_batches` are bumped before
/// `on_train_batch_end`.
pub trait TrainerView {
    fn cur_epoch_idx(&self) -> usize;

    fn n_epochs(&self) -> usize;

    fn batch_idx_in_epoch(&self) -> usize;

    fn num_batches_per_epoch(&self) -> usize;

    fn global_forward_batches(&self) -> usize;

    fn total_batches(&self) -> usize;

    fn local_rank(&self) -> usize;

    /// The trainer-wide monitor, used by callbacks without their own.
    fn monitor(&self) -> Option<&str> {
        None
    }

    fn larger_better(&self) -> bool {
        true
    }

    fn tensor_to_numeric(&self, value: &LossValue, reduction: Reduction) -> f64 {
        value.reduce(reduction)
    }
}

/// Trait for training callbacks
///
/// Every hook has a no-op default, so a callback only implements the events
/// it cares about.
pub trait Callback: Send {
    fn name(&self) -> &'static str {
        "Callback"
    }

    /// Called once the trainer is built, before the sanity check.
    fn on_after_trainer_initialized(&mut self, _trainer: &dyn TrainerView) -> Result<(), MonitorError> {
        Ok(())
    }

    fn on_sanity_check_end(&mut self, _trainer: &dyn TrainerView, _results: &MetricResults) {}

    fn on_train_begin(&mut self, _trainer: &dyn TrainerView) {}

    fn on_train_end(&mut self, _trainer: &dyn TrainerView) {}

    fn on_train_epoch_begin(&mut self, _trainer: &dyn TrainerView) {}

    fn on_train_epoch_end(&mut self, _trainer: &dyn TrainerView) {}

    fn on_before_backward(&mut self, _trainer: &dyn TrainerView, _loss: &LossValue) {}

    fn on_train_batch_end(&mut self, _trainer: &dyn TrainerView) {}

    fn on_validate_end(&mut self, _trainer: &dyn TrainerView, _results: &MetricResults) {}

    /// Called instead of `on_train_end` when training fails.
    fn on_exception(&mut self, _trainer: &dyn TrainerView, _error: &(dyn Error + 'static)) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_reduction() {
        let loss = LossValue::from(vec![1.0, 2.0, 3.0]);
        assert!((loss.reduce(Reduction::Sum) - 6.0).abs() < f64::EPSILON);
        assert!((loss.reduce(Reduction::Mean) - 2.0).abs() < f64::EPSILON);
        assert!((LossValue::from(0.25).reduce(Reduction::Mean) - 0.25).abs() < f64::EPSILON);
        assert_eq!(LossValue::Tensor(Vec::new()).reduce(Reduction::Mean), 0.0);
    }

    #[test]
    fn test_default_callback_impl() {
        struct MinimalCallback;
        impl Callback for MinimalCallback {}

        struct Fixed;
        impl TrainerView for Fixed {
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
                1
            }
            fn global_forward_batches(&self) -> usize {
                0
            }
            fn total_batches(&self) -> usize {
                1
            }
            fn local_rank(&self) -> usize {
                0
            }
        }

        let mut cb = MinimalCallback;
        assert_eq!(cb.name(), "Callback");
        assert!(cb.on_after_trainer_initialized(&Fixed).is_ok());
        cb.on_train_begin(&Fixed);
        cb.on_train_end(&Fixed);
        assert!(Fixed.monitor().is_none());
        assert!(Fixed.larger_better());
    }
}
