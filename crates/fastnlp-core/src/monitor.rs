//! Tracking of a monitored evaluation metric.
//!
//! Callbacks that care whether the latest evaluation improved on the best one
//! so far embed a [`MonitorState`].

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::warn;

use crate::callbacks::TrainerView;

/// Evaluation results keyed by metric name.
pub type MetricResults = BTreeMap<String, f64>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    #[error("monitor `{name}` not found in results {candidates:?}")]
    NotFound { name: String, candidates: Vec<String> },

    #[error("monitor `{name}` matches several results {matches:?}")]
    Ambiguous { name: String, matches: Vec<String> },

    #[error("`{callback}` requires a monitor, but neither the callback nor the trainer sets one")]
    Required { callback: String },
}

/// Finds the result key a monitor name refers to.
///
/// An exact key wins. Otherwise the name must be a case-insensitive substring
/// of exactly one key, so `"acc"` resolves to `"acc#acc#dev"`.
pub fn resolve_monitor<'a, I>(requested: &str, candidates: I) -> Result<String, MonitorError>
where
    I: IntoIterator<Item = &'a String>,
{
    let candidates: Vec<&String> = candidates.into_iter().collect();
    if candidates.iter().any(|key| key.as_str() == requested) {
        return Ok(requested.to_string());
    }

    let needle = requested.to_lowercase();
    let matches: Vec<String> = candidates
        .iter()
        .filter(|key| key.to_lowercase().contains(&needle))
        .map(|key| (*key).clone())
        .collect();

    match matches.len() {
        1 => Ok(matches.into_iter().next().unwrap_or_default()),
        0 => Err(MonitorError::NotFound {
            name: requested.to_string(),
            candidates: candidates.into_iter().cloned().collect(),
        }),
        _ => Err(MonitorError::Ambiguous { name: requested.to_string(), matches }),
    }
}

/// Monitor name, comparison direction and best value seen so far.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorState {
    monitor: Option<String>,
    resolved: Option<String>,
    larger_better: bool,
    best_value: f64,
    must_have: bool,
}

impl MonitorState {
    pub fn new(monitor: Option<String>, larger_better: bool, must_have: bool) -> Self {
        Self {
            monitor,
            resolved: None,
            larger_better,
            best_value: worst_value(larger_better),
            must_have,
        }
    }

    pub fn set_monitor(&mut self, monitor: Option<String>, larger_better: bool) {
        self.monitor = monitor;
        self.resolved = None;
        self.larger_better = larger_better;
        self.best_value = worst_value(larger_better);
    }

    /// Falls back to the trainer's monitor when none was given.
    pub fn adopt_trainer_monitor(&mut self, trainer: &dyn TrainerView, callback: &str) -> Result<(), MonitorError> {
        if self.monitor.is_none() {
            if let Some(monitor) = trainer.monitor() {
                self.set_monitor(Some(monitor.to_string()), trainer.larger_better());
            }
        }

        if self.must_have && self.monitor.is_none() {
            return Err(MonitorError::Required { callback: callback.to_string() });
        }
        Ok(())
    }

    pub fn monitor(&self) -> Option<&str> {
        self.monitor.as_deref()
    }

    pub fn has_monitor(&self) -> bool {
        self.monitor.is_some()
    }

    /// The result key the monitor was resolved to, if any.
    pub fn resolved_key(&self) -> Option<&str> {
        self.resolved.as_deref()
    }

    pub fn larger_better(&self) -> bool {
        self.larger_better
    }

    pub fn best_value(&self) -> f64 {
        self.best_value
    }

    /// Reads the monitored metric out of `results`.
    ///
    /// Returns `None` and leaves the state untouched when there is no monitor
    /// or it cannot be resolved.
    pub fn get_monitor_value(&mut self, results: &MetricResults) -> Option<f64> {
        let monitor = self.monitor.as_deref()?;

        if let Some(key) = &self.resolved {
            if let Some(value) = results.get(key) {
                return Some(*value);
            }
        }

        match resolve_monitor(monitor, results.keys()) {
            Ok(key) => {
                let value = results.get(&key).copied();
                if key != monitor {
                    tracing::debug!(monitor = %monitor, key = %key, "Resolved monitor to result key");
                }
                self.resolved = Some(key);
                value
            }
            Err(err) => {
                warn!("{err}");
                None
            }
        }
    }

    /// Whether `value` beats the best value so far. Ties are not improvements.
    pub fn is_better(&mut self, value: Option<f64>, keep_if_better: bool) -> bool {
        let Some(value) = value else {
            return false;
        };

        let better = if self.larger_better { value > self.best_value } else { value < self.best_value };
        if better && keep_if_better {
            self.best_value = value;
        }
        better
    }

    /// Whether the best value has moved off its initial infinity.
    pub fn has_finite_best(&self) -> bool {
        self.best_value.is_finite()
    }
}

fn worst_value(larger_better: bool) -> f64 {
    if larger_better { f64::NEG_INFINITY } else { f64::INFINITY }
}
