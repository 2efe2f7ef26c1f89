//! Padders turn the values one field takes across a batch into a single
//! rectangular container.
//!
//! Three strategies exist:
//! - [`NumberPadder`] for plain numbers, one per example
//! - [`SequencePadder`] for ragged, possibly nested lists
//! - [`ArrayPadder`] for fixed-rank arrays of different extents
//!
//! [`Padder`] is the closed union the collator stores per field.

mod array;
mod dtype;
mod error;
mod number;
mod padded;
mod sequence;
mod value;

pub use array::ArrayPadder;
pub use dtype::{DType, ElementType};
pub use error::PadderError;
pub use number::NumberPadder;
pub use padded::{Element, PaddedArray};
pub use sequence::SequencePadder;
pub use value::{infer_dtype, FieldValue, Scalar};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Common behaviour of every padder.
pub trait Pad {
    fn pad(&self, batch: &[FieldValue]) -> Result<PaddedArray, PadderError>;

    fn pad_value(&self) -> Scalar;

    /// The fixed output dtype, or `None` when it is inferred per batch.
    fn dtype(&self) -> Option<DType>;
}

/// Which padding strategy a field uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Number,
    Sequence,
    Array,
}

impl FieldKind {
    /// Picks a strategy from a sample value. Text has no padder.
    pub fn detect(sample: &FieldValue) -> Option<Self> {
        match sample {
            FieldValue::Scalar(_) => Some(Self::Number),
            FieldValue::List(_) => Some(Self::Sequence),
            FieldValue::Array(_) => Some(Self::Array),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Number => "number",
            Self::Sequence => "sequence",
            Self::Array => "array",
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "number" => Ok(Self::Number),
            "sequence" | "seq" => Ok(Self::Sequence),
            "array" => Ok(Self::Array),
            other => Err(format!("unknown padder kind `{other}` (expected number, sequence or array)")),
        }
    }
}

/// A padder of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Padder {
    Number(NumberPadder),
    Sequence(SequencePadder),
    Array(ArrayPadder),
}

impl Padder {
    pub fn new(
        kind: FieldKind,
        pad_value: Scalar,
        element_dtype: Option<ElementType>,
        dtype: Option<ElementType>,
    ) -> Result<Self, PadderError> {
        Ok(match kind {
            FieldKind::Number => Self::Number(NumberPadder::new(pad_value, element_dtype, dtype)?),
            FieldKind::Sequence => Self::Sequence(SequencePadder::new(pad_value, element_dtype, dtype)?),
            FieldKind::Array => Self::Array(ArrayPadder::new(pad_value, element_dtype, dtype)?),
        })
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            Self::Number(_) => FieldKind::Number,
            Self::Sequence(_) => FieldKind::Sequence,
            Self::Array(_) => FieldKind::Array,
        }
    }

    fn inner(&self) -> &dyn Pad {
        match self {
            Self::Number(p) => p,
            Self::Sequence(p) => p,
            Self::Array(p) => p,
        }
    }
}

impl Pad for Padder {
    fn pad(&self, batch: &[FieldValue]) -> Result<PaddedArray, PadderError> {
        self.inner().pad(batch)
    }

    fn pad_value(&self) -> Scalar {
        self.inner().pad_value()
    }

    fn dtype(&self) -> Option<DType> {
        self.inner().dtype()
    }
}
