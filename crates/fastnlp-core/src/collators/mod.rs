//! Batch assembly.
//!
//! A collator turns a `Vec` of examples into one batch. [`IndexedCollate`]
//! wraps any collator so that it also reports which dataset positions ended up
//! in the batch, and [`PadCollator`] pads every numeric field of dictionary
//! examples with the padder matching its values.

mod indexed;
mod pad_collator;

pub use indexed::{indexed_collate, IndexedCollate, IntoIndexed};
pub use pad_collator::{Collated, CollatedBatch, Example, PadCollator, PadSettings};

use thiserror::Error;

use crate::padders::PadderError;

/// Something that assembles a batch out of examples.
pub trait Collate<T> {
    type Output;

    fn collate(&self, batch: Vec<T>) -> Self::Output;
}

/// Adapts a closure to [`Collate`].
#[derive(Debug, Clone, Copy)]
pub struct FnCollate<F>(F);

impl<F> FnCollate<F> {
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<T, O, F> Collate<T> for FnCollate<F>
where
    F: Fn(Vec<T>) -> O,
{
    type Output = O;

    fn collate(&self, batch: Vec<T>) -> O {
        (self.0)(batch)
    }
}

/// Errors raised while assembling a batch.
#[derive(Debug, Error)]
pub enum CollateError {
    #[error("failed to pad field `{field}`: {source}")]
    Pad {
        field: String,
        #[source]
        source: PadderError,
    },

    #[error("invalid padding settings for field `{field}`: {source}")]
    InvalidSettings {
        field: String,
        #[source]
        source: PadderError,
    },

    #[error("example {index} has no field `{field}`")]
    MissingField { field: String, index: usize },
}
