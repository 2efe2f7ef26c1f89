//! Per-example field values.

use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::dtype::DType;

/// A single number stored in a field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl Scalar {
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> f64 {
        match self {
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Int(i) => *i as f64,
            Self::Float(f) => *f,
        }
    }

    /// The dtype a lone value of this kind would get.
    pub fn natural_dtype(&self) -> DType {
        match self {
            Self::Bool(_) => DType::Bool,
            Self::Int(_) => DType::Int64,
            Self::Float(_) => DType::Float64,
        }
    }
}

impl Default for Scalar {
    fn default() -> Self {
        Self::Int(0)
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f32> for Scalar {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Scalar {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<Scalar> for Value {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Bool(b) => Self::Bool(b),
            Scalar::Int(i) => Self::from(i),
            Scalar::Float(f) => Self::from(f),
        }
    }
}

/// The value one example holds for one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Scalar(Scalar),
    Text(String),
    /// A (possibly ragged, possibly nested) sequence.
    List(Vec<FieldValue>),
    /// A fixed-shape array.
    Array(ArrayD<Scalar>),
}

impl FieldValue {
    /// Converts a JSON value. Numbers, booleans and arrays map onto their
    /// counterparts; anything else is carried as text.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Bool(b) => Self::Scalar(Scalar::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Self::Scalar(Scalar::Int(i)),
                None => Self::Scalar(Scalar::Float(n.as_f64().unwrap_or(f64::NAN))),
            },
            Value::String(s) => Self::Text(s.clone()),
            Value::Array(items) => Self::List(items.iter().map(Self::from_json).collect()),
            Value::Null | Value::Object(_) => Self::Text(value.to_string()),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Scalar(s) => (*s).into(),
            Self::Text(t) => Value::String(t.clone()),
            Self::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Array(array) => array_to_json(array),
        }
    }

    /// Converts a rectangular nested list into an array.
    ///
    /// Returns `None` for ragged lists or lists holding non-numeric values.
    pub fn into_array(self) -> Option<ArrayD<Scalar>> {
        match self {
            Self::Array(array) => Some(array),
            Self::Scalar(s) => Some(ArrayD::from_elem(IxDyn(&[]), s)),
            Self::Text(_) => None,
            Self::List(_) => {
                let mut shape = Vec::new();
                let mut cursor = &self;
                while let Self::List(items) = cursor {
                    shape.push(items.len());
                    match items.first() {
                        Some(first) => cursor = first,
                        None => break,
                    }
                }

                let mut flat = Vec::new();
                if !flatten_rectangular(&self, &shape, 0, &mut flat) {
                    return None;
                }
                ArrayD::from_shape_vec(IxDyn(&shape), flat).ok()
            }
        }
    }

    pub(crate) fn for_each_scalar(&self, f: &mut impl FnMut(&Scalar)) {
        match self {
            Self::Scalar(s) => f(s),
            Self::Text(_) => {}
            Self::List(items) => items.iter().for_each(|item| item.for_each_scalar(f)),
            Self::Array(array) => array.iter().for_each(|s| f(s)),
        }
    }
}

fn flatten_rectangular(value: &FieldValue, shape: &[usize], depth: usize, out: &mut Vec<Scalar>) -> bool {
    match value {
        FieldValue::Scalar(s) if depth == shape.len() => {
            out.push(*s);
            true
        }
        FieldValue::List(items) if depth < shape.len() && items.len() == shape[depth] => {
            items.iter().all(|item| flatten_rectangular(item, shape, depth + 1, out))
        }
        _ => false,
    }
}

fn array_to_json(array: &ArrayD<Scalar>) -> Value {
    fn walk(view: ndarray::ArrayViewD<'_, Scalar>) -> Value {
        if view.ndim() == 0 {
            return view.iter().next().copied().map_or(Value::Null, Value::from);
        }
        Value::Array(view.outer_iter().map(walk).collect())
    }
    walk(array.view())
}

impl From<Scalar> for FieldValue {
    fn from(value: Scalar) -> Self {
        Self::Scalar(value)
    }
}

macro_rules! scalar_field_value {
    ($($t:ty),*) => {
        $(
            impl From<$t> for FieldValue {
                fn from(value: $t) -> Self {
                    Self::Scalar(Scalar::from(value))
                }
            }
        )*
    };
}

scalar_field_value!(bool, i32, i64, f32, f64);

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<ArrayD<Scalar>> for FieldValue {
    fn from(array: ArrayD<Scalar>) -> Self {
        Self::Array(array)
    }
}

/// Picks an output dtype from the values of a batch.
///
/// Any float makes the batch `float64`; a batch of only booleans stays
/// `bool`; everything else is `int64`. An empty batch is `float64`.
pub fn infer_dtype(batch: &[FieldValue]) -> DType {
    let mut seen_any = false;
    let mut all_bool = true;
    let mut any_float = false;
    for value in batch {
        value.for_each_scalar(&mut |s| {
            seen_any = true;
            match s {
                Scalar::Bool(_) => {}
                Scalar::Int(_) => all_bool = false,
                Scalar::Float(_) => {
                    all_bool = false;
                    any_float = true;
                }
            }
        });
    }

    if !seen_any || any_float {
        DType::Float64
    } else if all_bool {
        DType::Bool
    } else {
        DType::Int64
    }
}
