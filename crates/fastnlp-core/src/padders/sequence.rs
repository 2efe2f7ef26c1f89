use ndarray::{ArrayD, IxDyn};

use super::dtype::{resolve_dtype, DType, ElementType};
use super::error::PadderError;
use super::padded::{run_kernel, Element, PadKernel, PaddedArray};
use super::value::{infer_dtype, FieldValue, Scalar};
use super::Pad;

/// Pads ragged, possibly nested sequences.
///
/// `[[1], [1, 2]]` becomes `[[1, 0], [1, 2]]`. Deeper nesting is padded
/// independently at every depth, so `[[[1, 2]], [[3], [4, 5, 6]]]` becomes a
/// `[2, 2, 3]` array.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencePadder {
    pad_value: Scalar,
    element_dtype: Option<ElementType>,
    dtype: Option<DType>,
}

impl SequencePadder {
    pub const NAME: &'static str = "SequencePadder";

    pub fn new(
        pad_value: Scalar,
        element_dtype: Option<ElementType>,
        dtype: Option<ElementType>,
    ) -> Result<Self, PadderError> {
        let dtype = resolve_dtype(element_dtype.as_ref(), dtype.as_ref(), Self::NAME)?;
        Ok(Self { pad_value, element_dtype, dtype })
    }

    pub fn element_dtype(&self) -> Option<&ElementType> {
        self.element_dtype.as_ref()
    }

    pub fn pad_batch(
        batch: &[FieldValue],
        pad_value: Scalar,
        dtype: Option<DType>,
    ) -> Result<PaddedArray, PadderError> {
        let shape = ragged_shape(batch)?;
        let dtype = dtype.unwrap_or_else(|| infer_dtype(batch));
        run_kernel(dtype, &SequenceKernel { batch, shape, pad_value })
    }
}

impl Pad for SequencePadder {
    fn pad(&self, batch: &[FieldValue]) -> Result<PaddedArray, PadderError> {
        Self::pad_batch(batch, self.pad_value, self.dtype)
    }

    fn pad_value(&self) -> Scalar {
        self.pad_value
    }

    fn dtype(&self) -> Option<DType> {
        self.dtype
    }
}

/// Depth-wise maximum extent of a batch of nested lists, batch axis first.
pub(crate) fn ragged_shape(batch: &[FieldValue]) -> Result<Vec<usize>, PadderError> {
    let mut walk = ShapeWalk { shape: vec![batch.len()], opened_by: vec![0], leaf_depth: None };
    for (index, value) in batch.iter().enumerate() {
        walk.visit(value, 1, index)?;
    }

    // A list sitting where every other example has numbers.
    if let Some(depth) = walk.leaf_depth {
        if walk.shape.len() > depth {
            return Err(PadderError::InconsistentDepth {
                index: walk.opened_by[depth],
                expected: depth - 1,
                found: walk.shape.len() - 1,
            });
        }
    }
    Ok(walk.shape)
}

struct ShapeWalk {
    shape: Vec<usize>,
    /// Example that first reached each depth.
    opened_by: Vec<usize>,
    leaf_depth: Option<usize>,
}

impl ShapeWalk {
    fn visit(&mut self, value: &FieldValue, depth: usize, index: usize) -> Result<(), PadderError> {
        match value {
            FieldValue::List(items) => {
                if self.shape.len() == depth {
                    self.shape.push(0);
                    self.opened_by.push(index);
                }
                self.shape[depth] = self.shape[depth].max(items.len());
                for item in items {
                    self.visit(item, depth + 1, index)?;
                }
                Ok(())
            }
            FieldValue::Scalar(_) => match self.leaf_depth {
                None => {
                    self.leaf_depth = Some(depth);
                    Ok(())
                }
                Some(expected) if expected == depth => Ok(()),
                Some(expected) => {
                    Err(PadderError::InconsistentDepth { index, expected: expected - 1, found: depth - 1 })
                }
            },
            FieldValue::Text(_) | FieldValue::Array(_) => Err(PadderError::UnexpectedValue {
                padder: SequencePadder::NAME,
                expected: "nested lists of numbers",
                index,
            }),
        }
    }
}

struct SequenceKernel<'a> {
    batch: &'a [FieldValue],
    shape: Vec<usize>,
    pad_value: Scalar,
}

impl PadKernel for SequenceKernel<'_> {
    fn run<T: Element>(&self) -> Result<ArrayD<T>, PadderError> {
        let mut out = ArrayD::from_elem(IxDyn(&self.shape), T::from_scalar(self.pad_value));
        let mut index = Vec::with_capacity(self.shape.len());
        for (i, value) in self.batch.iter().enumerate() {
            index.clear();
            index.push(i);
            write_nested(&mut out, value, &mut index);
        }
        Ok(out)
    }
}

fn write_nested<T: Element>(out: &mut ArrayD<T>, value: &FieldValue, index: &mut Vec<usize>) {
    match value {
        FieldValue::List(items) => {
            for (j, item) in items.iter().enumerate() {
                index.push(j);
                write_nested(out, item, index);
                index.pop();
            }
        }
        FieldValue::Scalar(s) => out[index.as_slice()] = T::from_scalar(*s),
        // rejected by `ragged_shape`
        FieldValue::Text(_) | FieldValue::Array(_) => {}
    }
}
