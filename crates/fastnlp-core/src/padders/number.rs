use ndarray::{Array1, ArrayD};

use super::dtype::{resolve_dtype, DType, ElementType};
use super::error::PadderError;
use super::padded::{run_kernel, Element, PadKernel, PaddedArray};
use super::value::{infer_dtype, FieldValue, Scalar};
use super::Pad;

/// Turns a field of plain numbers, e.g. `[1, 2, 3]`, into a 1-D array.
///
/// Nothing needs padding, so `pad_value` is kept only for uniformity with
/// the other padders.
#[derive(Debug, Clone, PartialEq)]
pub struct NumberPadder {
    pad_value: Scalar,
    element_dtype: Option<ElementType>,
    dtype: Option<DType>,
}

impl NumberPadder {
    pub const NAME: &'static str = "NumberPadder";

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
        _pad_value: Scalar,
        dtype: Option<DType>,
    ) -> Result<PaddedArray, PadderError> {
        let values = batch
            .iter()
            .enumerate()
            .map(|(index, value)| match value {
                FieldValue::Scalar(s) => Ok(*s),
                _ => Err(PadderError::UnexpectedValue { padder: Self::NAME, expected: "a number", index }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let dtype = dtype.unwrap_or_else(|| infer_dtype(batch));
        run_kernel(dtype, &NumberKernel { values: &values })
    }
}

impl Pad for NumberPadder {
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

struct NumberKernel<'a> {
    values: &'a [Scalar],
}

impl PadKernel for NumberKernel<'_> {
    fn run<T: Element>(&self) -> Result<ArrayD<T>, PadderError> {
        Ok(Array1::from_iter(self.values.iter().map(|v| T::from_scalar(*v))).into_dyn())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_numbers() {
        let padder = NumberPadder::new(Scalar::Int(0), Some(ElementType::parse("int")), None).unwrap();
        let padded = padder.pad(&[1.into(), 2.into(), 3.into()]).unwrap();
        assert_eq!(padded.shape(), &[3]);
        assert_eq!(padded.get::<i64>().unwrap().as_slice().unwrap(), &[1_i64, 2, 3]);
    }

    #[test]
    fn test_pad_numbers_with_requested_dtype() {
        let padder = NumberPadder::new(Scalar::Int(0), None, Some(ElementType::parse("float32"))).unwrap();
        let padded = padder.pad(&[1.into(), 2.into()]).unwrap();
        assert_eq!(padded.dtype(), DType::Float32);
        assert_eq!(padded.get::<f32>().unwrap().as_slice().unwrap(), &[1.0_f32, 2.0]);
    }

    #[test]
    fn test_rejects_string_element_dtype() {
        let err = NumberPadder::new(Scalar::Int(0), Some(ElementType::parse("string")), None).unwrap_err();
        assert!(matches!(err, PadderError::EleDtypeUnsupported { padder: "NumberPadder", .. }));
    }

    #[test]
    fn test_rejects_string_dtype() {
        let err = NumberPadder::new(Scalar::Int(0), Some(ElementType::parse("int")), Some(ElementType::parse("string")))
            .unwrap_err();
        assert!(matches!(err, PadderError::DtypeUnsupported { .. }));
    }

    #[test]
    fn test_rejects_nested_values() {
        let padder = NumberPadder::new(Scalar::Int(0), None, None).unwrap();
        let err = padder.pad(&[1.into(), FieldValue::from(vec![2, 3])]).unwrap_err();
        assert!(matches!(err, PadderError::UnexpectedValue { index: 1, .. }));
    }
}
