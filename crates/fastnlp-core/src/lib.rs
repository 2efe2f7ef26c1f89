//! fastNLP core
//!
//! Training-loop plumbing for NLP experiments:
//! - Padding ragged fields into rectangular arrays (`padders`)
//! - Assembling batches, with or without dataset indices (`collators`, `dataloader`)
//! - Observing a running loop through callbacks (`callbacks`, `monitor`)
//! - Forwarding options to backends that accept only some of them (`params`)
//! - Driving a loop and loading its configuration (`trainer`, `config`)

pub mod callbacks;
pub mod collators;
pub mod config;
pub mod dataloader;
pub mod error;
pub mod monitor;
pub mod padders;
pub mod params;
pub mod trainer;

pub use callbacks::{
    choose_progress_callback, Callback, CallbackManager, LossValue, ProgressBarKind, ProgressConsole,
    ProgressSettings, RawTextCallback, Reduction, RichCallback, TrainerView,
};
pub use collators::{indexed_collate, Collate, CollateError, FnCollate, IndexedCollate, PadCollator};
pub use config::{ConfigError, FastNlpConfig};
pub use dataloader::{DataLoaderOptions, IndexedDataLoader};
pub use error::{CoreError, CoreResult, TrainError};
pub use monitor::{resolve_monitor, MetricResults, MonitorError, MonitorState};
pub use padders::{
    ArrayPadder, DType, ElementType, FieldKind, FieldValue, NumberPadder, Pad, PaddedArray, Padder, PadderError,
    Scalar, SequencePadder,
};
pub use params::{match_params, CallerParams, MatchedParams, ParamManifest};
pub use trainer::{LoopState, TrainerSettings, TrainerStatus, TrainingLoop};
