//! Training-loop callbacks and progress display.
//!
//! - [`Callback`] - lifecycle hooks, all defaulting to no-ops
//! - [`CallbackManager`] - fans events out to registered callbacks
//! - [`RichCallback`] - live progress bars
//! - [`RawTextCallback`] - progress as log lines

mod manager;
mod raw;
mod renderer;
mod rich;
mod traits;

pub use manager::CallbackManager;
pub use raw::RawTextCallback;
pub use renderer::{
    format_rule, IndicatifRenderer, ProgressConsole, ProgressRenderer, ProgressTask, RecordingRenderer, RenderEvent,
    RuleStyle, TaskUpdate,
};
pub use rich::RichCallback;
pub use traits::{Callback, LossValue, Reduction, TrainerView};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::IsTerminal;
use std::str::FromStr;
use tracing::debug;

use crate::monitor::MetricResults;

/// Which progress display to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressBarKind {
    /// Live bars on an interactive terminal, log lines otherwise.
    #[default]
    Auto,
    Rich,
    Raw,
    None,
}

impl FromStr for ProgressBarKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "rich" => Ok(Self::Rich),
            "raw" => Ok(Self::Raw),
            "none" => Ok(Self::None),
            other => Err(format!("unknown progress bar `{other}` (expected auto, rich, raw or none)")),
        }
    }
}

impl fmt::Display for ProgressBarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::Rich => "rich",
            Self::Raw => "raw",
            Self::None => "none",
        })
    }
}

/// Options shared by the progress callbacks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSettings {
    #[serde(default)]
    pub progress_bar: ProgressBarKind,

    /// Batches between two progress reports.
    #[serde(default = "default_print_every")]
    pub print_every: usize,

    /// Decimal places kept when displaying the loss.
    #[serde(default = "default_loss_round_ndigit")]
    pub loss_round_ndigit: u32,

    /// Metric whose improvement gets highlighted. Falls back to the
    /// trainer's monitor.
    #[serde(default)]
    pub monitor: Option<String>,

    #[serde(default = "default_true")]
    pub larger_better: bool,

    /// Pretty-print evaluation results as JSON.
    #[serde(default = "default_true")]
    pub format_json: bool,
}

fn default_print_every() -> usize {
    1
}

fn default_loss_round_ndigit() -> u32 {
    6
}

fn default_true() -> bool {
    true
}

impl Default for ProgressSettings {
    fn default() -> Self {
        Self {
            progress_bar: ProgressBarKind::default(),
            print_every: default_print_every(),
            loss_round_ndigit: default_loss_round_ndigit(),
            monitor: None,
            larger_better: true,
            format_json: true,
        }
    }
}

/// Builds the progress callback for `kind`, or nothing for
/// [`ProgressBarKind::None`].
pub fn choose_progress_callback(kind: ProgressBarKind, settings: &ProgressSettings) -> Option<Box<dyn Callback>> {
    let kind = match kind {
        ProgressBarKind::Auto if std::io::stdin().is_terminal() => ProgressBarKind::Rich,
        ProgressBarKind::Auto => ProgressBarKind::Raw,
        other => other,
    };
    debug!(kind = %kind, "Selected progress callback");

    match kind {
        ProgressBarKind::Rich => Some(Box::new(RichCallback::new(settings, ProgressConsole::indicatif()))),
        ProgressBarKind::Raw => Some(Box::new(RawTextCallback::new(settings))),
        ProgressBarKind::Auto | ProgressBarKind::None => None,
    }
}

/// Rounds `value` to `ndigits` decimal places.
#[allow(clippy::cast_possible_wrap)]
pub(crate) fn round_loss(value: f64, ndigits: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let factor = 10_f64.powi(ndigits.min(15) as i32);
    (value * factor).round() / factor
}

pub(crate) fn eval_title(trainer: &dyn TrainerView) -> String {
    format!("Eval. results on Epoch:{}, Batch:{}", trainer.cur_epoch_idx(), trainer.batch_idx_in_epoch())
}

pub(crate) fn format_results(results: &MetricResults, format_json: bool) -> String {
    if format_json {
        serde_json::to_string_pretty(results).unwrap_or_else(|_| format!("{results:?}"))
    } else {
        format!("{results:?}")
    }
}
