//! Simulate command implementation.

use anyhow::anyhow;
use colored::Colorize;
use fastnlp_core::{
    choose_progress_callback, FastNlpConfig, LossValue, MetricResults, ProgressBarKind, TrainError, TrainerView,
    TrainingLoop,
};
use std::path::Path;
use tracing::debug;

use super::load_config;

/// Command-line options of `simulate`. `None` keeps the configured value.
#[derive(Debug, Default)]
pub struct SimulateOptions {
    pub epochs: Option<usize>,
    pub batches: usize,
    pub print_every: Option<usize>,
    pub progress: Option<String>,
    pub monitor: Option<String>,
    pub evaluate_every: Option<i64>,
    pub rank: usize,
    pub fail_at: Option<usize>,
}

impl SimulateOptions {
    fn apply(&self, config: &mut FastNlpConfig) -> anyhow::Result<()> {
        if let Some(epochs) = self.epochs {
            config.trainer.n_epochs = epochs;
        }
        if let Some(every) = self.evaluate_every {
            config.trainer.evaluate_every = every;
        }
        if let Some(print_every) = self.print_every {
            config.progress.print_every = print_every;
        }
        if let Some(progress) = &self.progress {
            config.progress.progress_bar = progress.parse::<ProgressBarKind>().map_err(|e| anyhow!(e))?;
        }
        if self.monitor.is_some() {
            config.progress.monitor.clone_from(&self.monitor);
        }
        config.validate()?;
        Ok(())
    }
}

/// Synthetic loss of the `n`-th batch, counting from 1.
#[allow(clippy::cast_precision_loss)]
fn synthetic_loss(n: usize) -> f64 {
    1.0 / n as f64
}

/// Synthetic accuracy after `n` batches.
#[allow(clippy::cast_precision_loss)]
fn synthetic_accuracy(n: usize) -> f64 {
    1.0 - 0.5 / (n as f64 + 1.0)
}

/// Execute the simulate command.
pub fn execute(config: Option<&Path>, options: SimulateOptions) -> anyhow::Result<()> {
    let mut config = load_config(config)?;
    options.apply(&mut config)?;
    debug!(?config, "Simulating training loop");

    let mut trainer = TrainingLoop::new(config.trainer.clone(), options.batches).with_local_rank(options.rank);
    if let Some(callback) = choose_progress_callback(config.progress.progress_bar, &config.progress) {
        trainer.add_boxed_callback(callback);
    }

    let fail_at = options.fail_at;
    trainer.run(
        |state| {
            let n = state.global_forward_batches() + 1;
            if fail_at == Some(n) {
                return Err(TrainError::Step { batch: n, message: "simulated failure".to_string() });
            }
            Ok(LossValue::Scalar(synthetic_loss(n)))
        },
        |state| {
            let accuracy = synthetic_accuracy(state.global_forward_batches());
            Ok(MetricResults::from([("acc#acc".to_string(), accuracy)]))
        },
    )?;

    let state = trainer.state();
    println!(
        "{}",
        format!(
            "✓ Finished {} batches over {} epochs",
            state.global_forward_batches(),
            state.n_epochs()
        )
        .green()
        .bold()
    );
    Ok(())
}
