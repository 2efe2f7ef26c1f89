use thiserror::Error;

use crate::collators::CollateError;
use crate::config::ConfigError;
use crate::monitor::MonitorError;
use crate::padders::PadderError;

pub type CoreResult<T> = std::result::Result<T, CoreError>;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Padder(#[from] PadderError),

    #[error(transparent)]
    Collate(#[from] CollateError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Train(#[from] TrainError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Failure raised by a training step or an evaluation round.
#[derive(Debug, Error)]
pub enum TrainError {
    #[error("training step {batch} failed: {message}")]
    Step { batch: usize, message: String },

    #[error("evaluation failed: {0}")]
    Evaluate(String),

    /// A step or evaluation panicked; the loop was unwound.
    #[error("training panicked after {batches} batches")]
    Panicked { batches: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
