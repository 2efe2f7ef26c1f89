//! Terminal rendering of progress bars.
//!
//! [`ProgressRenderer`] hands out [`ProgressTask`] handles; dropping a handle
//! removes its bar. [`ProgressConsole`] is what callbacks hold: it gates a
//! shared renderer on the process rank.

use std::sync::{Arc, Mutex, PoisonError};

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::debug;

/// Bars track fractional progress in thousandths.
const SCALE: f64 = 1000.0;

const RULE_WIDTH: usize = 80;

/// Look of a horizontal rule printed above evaluation results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleStyle {
    /// The monitored metric improved.
    Improved,
    Neutral,
}

impl RuleStyle {
    pub fn characters(&self) -> &'static str {
        match self {
            Self::Improved => "+",
            Self::Neutral => "-",
        }
    }
}

/// Changes applied to a task. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskUpdate {
    pub description: Option<String>,
    pub advance: Option<f64>,
    pub completed: Option<f64>,
    /// Text shown after the bar, e.g. the latest loss.
    pub post_desc: Option<String>,
}

/// A live progress bar. Dropping it releases the bar.
pub trait ProgressTask: Send {
    fn update(&mut self, update: TaskUpdate);

    /// Restarts the bar at `completed`.
    fn reset(&mut self, completed: f64);
}

pub trait ProgressRenderer: Send + Sync {
    fn add_task(&self, description: &str, total: f64, completed: f64) -> Box<dyn ProgressTask>;

    fn print_rule(&self, title: &str, style: RuleStyle);

    fn print_text(&self, text: &str);

    /// Stops live rendering. Tasks added afterwards start it again.
    fn stop(&self);
}

/// Builds a rule such as `----- title -----`.
pub fn format_rule(title: &str, style: RuleStyle) -> String {
    let chars = style.characters();
    let side = RULE_WIDTH.saturating_sub(title.chars().count() + 2) / 2;
    format!("{} {} {}", chars.repeat(side), title, chars.repeat(side))
}

/// Renders bars with `indicatif`.
#[derive(Debug, Clone, Default)]
pub struct IndicatifRenderer {
    multi: MultiProgress,
}

impl IndicatifRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn println(&self, line: &str) {
        if self.multi.is_hidden() {
            println!("{line}");
        } else if self.multi.println(line).is_err() {
            println!("{line}");
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn to_ticks(value: f64) -> u64 {
    (value.max(0.0) * SCALE).round() as u64
}

impl ProgressRenderer for IndicatifRenderer {
    fn add_task(&self, description: &str, total: f64, completed: f64) -> Box<dyn ProgressTask> {
        let bar = self.multi.add(ProgressBar::new(to_ticks(total)));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg:12} [{wide_bar:.cyan/blue}] {percent:>3}% {elapsed_precise} {prefix}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message(description.to_string());
        bar.set_position(to_ticks(completed));
        Box::new(IndicatifTask { bar })
    }

    fn print_rule(&self, title: &str, style: RuleStyle) {
        let line = format_rule(title, style);
        match style {
            RuleStyle::Improved => self.println(&line.green().bold().to_string()),
            RuleStyle::Neutral => self.println(&line),
        }
    }

    fn print_text(&self, text: &str) {
        for line in text.lines() {
            self.println(line);
        }
    }

    fn stop(&self) {
        if let Err(err) = self.multi.clear() {
            debug!(error = %err, "Failed to clear progress bars");
        }
    }
}

struct IndicatifTask {
    bar: ProgressBar,
}

impl ProgressTask for IndicatifTask {
    fn update(&mut self, update: TaskUpdate) {
        if let Some(description) = update.description {
            self.bar.set_message(description);
        }
        if let Some(post_desc) = update.post_desc {
            self.bar.set_prefix(post_desc);
        }
        if let Some(completed) = update.completed {
            self.bar.set_position(to_ticks(completed));
        }
        if let Some(advance) = update.advance {
            self.bar.inc(to_ticks(advance));
        }
    }

    fn reset(&mut self, completed: f64) {
        self.bar.reset();
        self.bar.set_position(to_ticks(completed));
    }
}

impl Drop for IndicatifTask {
    fn drop(&mut self) {
        self.bar.finish_and_clear();
    }
}

struct NoopTask;

impl ProgressTask for NoopTask {
    fn update(&mut self, _update: TaskUpdate) {}

    fn reset(&mut self, _completed: f64) {}
}

/// A renderer shared between callbacks, silenced on every rank but 0.
#[derive(Clone)]
pub struct ProgressConsole {
    renderer: Arc<dyn ProgressRenderer>,
    enabled: bool,
}

impl ProgressConsole {
    pub fn new(renderer: Arc<dyn ProgressRenderer>) -> Self {
        Self { renderer, enabled: true }
    }

    /// A console that never renders.
    pub fn disabled(renderer: Arc<dyn ProgressRenderer>) -> Self {
        Self { renderer, enabled: false }
    }

    pub fn indicatif() -> Self {
        Self::new(Arc::new(IndicatifRenderer::new()))
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Only rank 0 renders. A disabled console stays disabled.
    pub fn resolve_rank(&mut self, local_rank: usize) {
        if self.enabled {
            self.enabled = local_rank == 0;
        }
    }

    pub fn add_task(&self, description: &str, total: f64, completed: f64) -> Box<dyn ProgressTask> {
        if self.enabled {
            self.renderer.add_task(description, total, completed)
        } else {
            Box::new(NoopTask)
        }
    }

    pub fn print_rule(&self, title: &str, style: RuleStyle) {
        if self.enabled {
            self.renderer.print_rule(title, style);
        }
    }

    pub fn print_text(&self, text: &str) {
        if self.enabled {
            self.renderer.print_text(text);
        }
    }

    pub fn stop(&self) {
        if self.enabled {
            self.renderer.stop();
        }
    }
}

impl std::fmt::Debug for ProgressConsole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressConsole").field("enabled", &self.enabled).finish_non_exhaustive()
    }
}

/// Something a [`RecordingRenderer`] saw.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    TaskAdded { description: String, total: f64, completed: f64 },
    TaskUpdated { description: String, update: TaskUpdate },
    TaskReset { description: String, completed: f64 },
    TaskReleased { description: String },
    Rule { title: String, style: RuleStyle },
    Text(String),
    Stopped,
}

#[derive(Debug, Default)]
struct Recording {
    events: Vec<RenderEvent>,
    live_tasks: usize,
}

/// Renders nothing and records every call, for headless runs and tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    recording: Arc<Mutex<Recording>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Recording) -> R) -> R {
        let mut recording = self.recording.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut recording)
    }

    pub fn events(&self) -> Vec<RenderEvent> {
        self.with(|r| r.events.clone())
    }

    /// Tasks handed out and not yet dropped.
    pub fn live_tasks(&self) -> usize {
        self.with(|r| r.live_tasks)
    }

    pub fn rules(&self) -> Vec<(String, RuleStyle)> {
        self.with(|r| {
            r.events
                .iter()
                .filter_map(|event| match event {
                    RenderEvent::Rule { title, style } => Some((title.clone(), *style)),
                    _ => None,
                })
                .collect()
        })
    }

    pub fn texts(&self) -> Vec<String> {
        self.with(|r| {
            r.events
                .iter()
                .filter_map(|event| match event {
                    RenderEvent::Text(text) => Some(text.clone()),
                    _ => None,
                })
                .collect()
        })
    }
}

impl ProgressRenderer for RecordingRenderer {
    fn add_task(&self, description: &str, total: f64, completed: f64) -> Box<dyn ProgressTask> {
        self.with(|r| {
            r.live_tasks += 1;
            r.events.push(RenderEvent::TaskAdded { description: description.to_string(), total, completed });
        });
        Box::new(RecordingTask { description: description.to_string(), recording: Arc::clone(&self.recording) })
    }

    fn print_rule(&self, title: &str, style: RuleStyle) {
        self.with(|r| r.events.push(RenderEvent::Rule { title: title.to_string(), style }));
    }

    fn print_text(&self, text: &str) {
        self.with(|r| r.events.push(RenderEvent::Text(text.to_string())));
    }

    fn stop(&self) {
        self.with(|r| r.events.push(RenderEvent::Stopped));
    }
}

struct RecordingTask {
    description: String,
    recording: Arc<Mutex<Recording>>,
}

impl RecordingTask {
    fn push(&self, event: RenderEvent) {
        self.recording.lock().unwrap_or_else(PoisonError::into_inner).events.push(event);
    }
}

impl ProgressTask for RecordingTask {
    fn update(&mut self, update: TaskUpdate) {
        if let Some(description) = &update.description {
            self.description.clone_from(description);
        }
        self.push(RenderEvent::TaskUpdated { description: self.description.clone(), update });
    }

    fn reset(&mut self, completed: f64) {
        self.push(RenderEvent::TaskReset { description: self.description.clone(), completed });
    }
}

impl Drop for RecordingTask {
    fn drop(&mut self) {
        let mut recording = self.recording.lock().unwrap_or_else(PoisonError::into_inner);
        recording.live_tasks = recording.live_tasks.saturating_sub(1);
        recording.events.push(RenderEvent::TaskReleased { description: self.description.clone() });
    }
}
