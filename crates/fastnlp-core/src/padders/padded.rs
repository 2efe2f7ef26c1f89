//! The uniform container produced by every padder.

use ndarray::{ArrayD, ArrayViewD};
use serde_json::Value;
use std::fmt;

use super::dtype::DType;
use super::error::PadderError;
use super::value::Scalar;

/// A numeric element type a padded container can hold.
pub trait Element: Copy + fmt::Debug + PartialEq + Into<Value> + 'static {
    const DTYPE: DType;

    fn from_scalar(value: Scalar) -> Self;

    fn extract(array: &PaddedArray) -> Option<&ArrayD<Self>>;

    fn wrap(array: ArrayD<Self>) -> PaddedArray;
}

/// A padded batch: axis 0 is the batch, trailing axes the per-example extent.
#[derive(Debug, Clone, PartialEq)]
pub enum PaddedArray {
    Bool(ArrayD<bool>),
    Int8(ArrayD<i8>),
    Int16(ArrayD<i16>),
    Int32(ArrayD<i32>),
    Int64(ArrayD<i64>),
    UInt8(ArrayD<u8>),
    UInt16(ArrayD<u16>),
    UInt32(ArrayD<u32>),
    UInt64(ArrayD<u64>),
    Float32(ArrayD<f32>),
    Float64(ArrayD<f64>),
}

macro_rules! dispatch {
    ($value:expr, $array:ident => $body:expr) => {
        match $value {
            PaddedArray::Bool($array) => $body,
            PaddedArray::Int8($array) => $body,
            PaddedArray::Int16($array) => $body,
            PaddedArray::Int32($array) => $body,
            PaddedArray::Int64($array) => $body,
            PaddedArray::UInt8($array) => $body,
            PaddedArray::UInt16($array) => $body,
            PaddedArray::UInt32($array) => $body,
            PaddedArray::UInt64($array) => $body,
            PaddedArray::Float32($array) => $body,
            PaddedArray::Float64($array) => $body,
        }
    };
}

impl PaddedArray {
    pub fn dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::Int8(_) => DType::Int8,
            Self::Int16(_) => DType::Int16,
            Self::Int32(_) => DType::Int32,
            Self::Int64(_) => DType::Int64,
            Self::UInt8(_) => DType::UInt8,
            Self::UInt16(_) => DType::UInt16,
            Self::UInt32(_) => DType::UInt32,
            Self::UInt64(_) => DType::UInt64,
            Self::Float32(_) => DType::Float32,
            Self::Float64(_) => DType::Float64,
        }
    }

    pub fn shape(&self) -> &[usize] {
        dispatch!(self, array => array.shape())
    }

    /// Borrows the underlying array if it holds `T`.
    pub fn get<T: Element>(&self) -> Option<&ArrayD<T>> {
        T::extract(self)
    }

    /// Nested JSON lists, one level per axis.
    pub fn to_json(&self) -> Value {
        dispatch!(self, array => view_to_json(array.view()))
    }
}

fn view_to_json<T: Element>(view: ArrayViewD<'_, T>) -> Value {
    if view.ndim() == 0 {
        return view.iter().next().copied().map_or(Value::Null, Into::into);
    }
    Value::Array(view.outer_iter().map(view_to_json).collect())
}

macro_rules! numeric_element {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl Element for $t {
                const DTYPE: DType = DType::$variant;

                #[allow(clippy::cast_possible_wrap, clippy::cast_precision_loss, clippy::cast_lossless)]
                fn from_scalar(value: Scalar) -> Self {
                    match value {
                        Scalar::Bool(b) => u8::from(b) as $t,
                        Scalar::Int(i) => i as $t,
                        Scalar::Float(f) => f as $t,
                    }
                }

                fn extract(array: &PaddedArray) -> Option<&ArrayD<Self>> {
                    match array {
                        PaddedArray::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn wrap(array: ArrayD<Self>) -> PaddedArray {
                    PaddedArray::$variant(array)
                }
            }
        )*
    };
}

numeric_element!(
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn from_scalar(value: Scalar) -> Self {
        match value {
            Scalar::Bool(b) => b,
            Scalar::Int(i) => i != 0,
            Scalar::Float(f) => f != 0.0,
        }
    }

    fn extract(array: &PaddedArray) -> Option<&ArrayD<Self>> {
        match array {
            PaddedArray::Bool(inner) => Some(inner),
            _ => None,
        }
    }

    fn wrap(array: ArrayD<Self>) -> PaddedArray {
        PaddedArray::Bool(array)
    }
}

/// A padding routine that is generic over the output element type.
pub(crate) trait PadKernel {
    fn run<T: Element>(&self) -> Result<ArrayD<T>, PadderError>;
}

/// Runs `kernel` with the element type selected by `dtype`.
pub(crate) fn run_kernel<K: PadKernel>(dtype: DType, kernel: &K) -> Result<PaddedArray, PadderError> {
    Ok(match dtype {
        DType::Bool => bool::wrap(kernel.run::<bool>()?),
        DType::Int8 => i8::wrap(kernel.run::<i8>()?),
        DType::Int16 => i16::wrap(kernel.run::<i16>()?),
        DType::Int32 => i32::wrap(kernel.run::<i32>()?),
        DType::Int64 => i64::wrap(kernel.run::<i64>()?),
        DType::UInt8 => u8::wrap(kernel.run::<u8>()?),
        DType::UInt16 => u16::wrap(kernel.run::<u16>()?),
        DType::UInt32 => u32::wrap(kernel.run::<u32>()?),
        DType::UInt64 => u64::wrap(kernel.run::<u64>()?),
        DType::Float32 => f32::wrap(kernel.run::<f32>()?),
        DType::Float64 => f64::wrap(kernel.run::<f64>()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, IxDyn};

    #[test]
    fn test_from_scalar_casts() {
        assert_eq!(i32::from_scalar(Scalar::Float(2.9)), 2);
        assert_eq!(f32::from_scalar(Scalar::Int(3)), 3.0);
        assert_eq!(u8::from_scalar(Scalar::Bool(true)), 1);
        assert!(bool::from_scalar(Scalar::Int(5)));
        assert!(!bool::from_scalar(Scalar::Float(0.0)));
    }

    #[test]
    fn test_get_matches_dtype() {
        let padded = PaddedArray::Int64(arr2(&[[1_i64, 0], [1, 2]]).into_dyn());
        assert_eq!(padded.dtype(), DType::Int64);
        assert_eq!(padded.shape(), &[2, 2]);
        assert!(padded.get::<i64>().is_some());
        assert!(padded.get::<f64>().is_none());
    }

    #[test]
    fn test_to_json_nested_lists() {
        let padded = PaddedArray::Float32(ArrayD::from_elem(IxDyn(&[2, 1]), 0.5_f32));
        assert_eq!(padded.to_json(), serde_json::json!([[0.5], [0.5]]));
    }
}
