//! Type tags used to configure padders.
//!
//! A padder is declared with an optional element type (what the examples of a
//! field hold) and an optional output type (what the padded container should
//! hold). Both are [`ElementType`] tags so that non-numeric declarations can be
//! rejected with an error that names the offending argument.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use super::error::PadderError;

/// Numeric element type of a padded container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
}

impl DType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Declared type of a field's elements, or of a requested output.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// A plain number or a fixed-width numeric type.
    Number(DType),
    /// Text values.
    Text,
    /// Anything else, kept by name for error reporting.
    Object(String),
}

impl ElementType {
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number(_))
    }

    pub fn as_dtype(&self) -> Option<DType> {
        match self {
            Self::Number(dtype) => Some(*dtype),
            Self::Text | Self::Object(_) => None,
        }
    }

    /// Parses a type name. Unknown names become [`ElementType::Object`].
    pub fn parse(name: &str) -> Self {
        let dtype = match name.trim().to_lowercase().as_str() {
            "bool" | "boolean" => DType::Bool,
            "int8" | "i8" => DType::Int8,
            "int16" | "i16" | "short" => DType::Int16,
            "int32" | "i32" => DType::Int32,
            "int" | "int64" | "i64" | "long" => DType::Int64,
            "uint8" | "u8" => DType::UInt8,
            "uint16" | "u16" => DType::UInt16,
            "uint32" | "u32" => DType::UInt32,
            "uint64" | "u64" => DType::UInt64,
            "float32" | "f32" => DType::Float32,
            "float" | "float64" | "f64" | "double" => DType::Float64,
            "str" | "string" | "text" => return Self::Text,
            _ => return Self::Object(name.to_string()),
        };
        Self::Number(dtype)
    }
}

impl From<DType> for ElementType {
    fn from(dtype: DType) -> Self {
        Self::Number(dtype)
    }
}

impl From<&str> for ElementType {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl FromStr for ElementType {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(dtype) => dtype.fmt(f),
            Self::Text => f.write_str("str"),
            Self::Object(name) => f.write_str(name),
        }
    }
}

/// Resolves the output dtype of a padder.
///
/// The requested `dtype` wins over the declared `element_dtype`. `Ok(None)`
/// means neither was given and the dtype is inferred from each batch.
pub(crate) fn resolve_dtype(
    element_dtype: Option<&ElementType>,
    dtype: Option<&ElementType>,
    padder: &'static str,
) -> Result<Option<DType>, PadderError> {
    if let Some(element) = element_dtype {
        if !element.is_numeric() {
            return Err(PadderError::EleDtypeUnsupported { padder, dtype: element.to_string() });
        }
    }

    match dtype {
        None => Ok(element_dtype.and_then(ElementType::as_dtype)),
        Some(requested) => requested
            .as_dtype()
            .map(Some)
            .ok_or_else(|| PadderError::DtypeUnsupported { padder, dtype: requested.to_string() }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(ElementType::parse("int"), ElementType::Number(DType::Int64));
        assert_eq!(ElementType::parse("Float"), ElementType::Number(DType::Float64));
        assert_eq!(ElementType::parse("u8"), ElementType::Number(DType::UInt8));
        assert_eq!(ElementType::parse("string"), ElementType::Text);
        assert_eq!(ElementType::parse("dict"), ElementType::Object("dict".to_string()));
    }

    #[test]
    fn test_resolve_prefers_requested_dtype() {
        let ele = ElementType::Number(DType::Int64);
        let requested = ElementType::Number(DType::Float32);
        let resolved = resolve_dtype(Some(&ele), Some(&requested), "NumberPadder").unwrap();
        assert_eq!(resolved, Some(DType::Float32));
    }

    #[test]
    fn test_resolve_falls_back_to_element_dtype() {
        let ele = ElementType::Number(DType::Int32);
        assert_eq!(resolve_dtype(Some(&ele), None, "NumberPadder").unwrap(), Some(DType::Int32));
        assert_eq!(resolve_dtype(None, None, "NumberPadder").unwrap(), None);
    }

    #[test]
    fn test_resolve_distinguishes_bad_arguments() {
        let text = ElementType::Text;
        let int = ElementType::Number(DType::Int64);

        let err = resolve_dtype(Some(&text), None, "SequencePadder").unwrap_err();
        assert!(matches!(err, PadderError::EleDtypeUnsupported { .. }));

        let err = resolve_dtype(Some(&int), Some(&text), "SequencePadder").unwrap_err();
        assert!(matches!(err, PadderError::DtypeUnsupported { .. }));
    }

    #[test]
    fn test_dtype_serde_names() {
        let json = serde_json::to_string(&DType::UInt16).unwrap();
        assert_eq!(json, "\"uint16\"");
        let parsed: DType = serde_json::from_str("\"float32\"").unwrap();
        assert_eq!(parsed, DType::Float32);
    }
}
