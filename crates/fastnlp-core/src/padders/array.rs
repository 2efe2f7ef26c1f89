use ndarray::{ArrayD, Axis, IxDyn, Slice};

use super::dtype::{resolve_dtype, DType, ElementType};
use super::error::PadderError;
use super::padded::{run_kernel, Element, PadKernel, PaddedArray};
use super::value::{infer_dtype, FieldValue, Scalar};
use super::Pad;

/// Pads fixed-rank arrays whose extents differ, e.g. arrays of shape `(2,)`
/// and `(1,)` become one `(2, 2)` array.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayPadder {
    pad_value: Scalar,
    element_dtype: Option<ElementType>,
    dtype: Option<DType>,
}

impl ArrayPadder {
    pub const NAME: &'static str = "ArrayPadder";

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
        let arrays = batch
            .iter()
            .enumerate()
            .map(|(index, value)| match value {
                FieldValue::Array(array) => Ok(array),
                _ => Err(PadderError::UnexpectedValue { padder: Self::NAME, expected: "an array", index }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut shape = vec![arrays.len()];
        if let Some(first) = arrays.first() {
            let rank = first.ndim();
            shape.extend_from_slice(first.shape());
            for (index, array) in arrays.iter().enumerate().skip(1) {
                if array.ndim() != rank {
                    return Err(PadderError::RankMismatch { index, expected: rank, found: array.ndim() });
                }
                for (max, extent) in shape[1..].iter_mut().zip(array.shape()) {
                    *max = (*max).max(*extent);
                }
            }
        }

        let dtype = dtype.unwrap_or_else(|| infer_dtype(batch));
        run_kernel(dtype, &ArrayKernel { arrays: &arrays, shape, pad_value })
    }
}

impl Pad for ArrayPadder {
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

struct ArrayKernel<'a> {
    arrays: &'a [&'a ArrayD<Scalar>],
    shape: Vec<usize>,
    pad_value: Scalar,
}

impl PadKernel for ArrayKernel<'_> {
    fn run<T: Element>(&self) -> Result<ArrayD<T>, PadderError> {
        let mut out = ArrayD::from_elem(IxDyn(&self.shape), T::from_scalar(self.pad_value));
        for (i, array) in self.arrays.iter().enumerate() {
            let extents = array.shape();
            let mut row = out.index_axis_mut(Axis(0), i);
            let mut region = row.slice_each_axis_mut(|axis| Slice::from(0..extents[axis.axis.index()]));
            region.assign(&array.mapv(T::from_scalar));
        }
        Ok(out)
    }
}
