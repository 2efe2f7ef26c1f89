use thiserror::Error;

/// Padder configuration and shape errors.
#[derive(Debug, Error)]
pub enum PadderError {
    /// The declared element type of the field is not numeric.
    #[error("`{padder}` only supports padding numbers, but the field element dtype is `{dtype}`")]
    EleDtypeUnsupported { padder: &'static str, dtype: String },

    /// The requested output type is not numeric.
    #[error("the dtype of `{padder}` only supports numbers, but got `{dtype}`")]
    DtypeUnsupported { padder: &'static str, dtype: String },

    #[error("`{padder}` expected {expected} at batch position {index}")]
    UnexpectedValue { padder: &'static str, expected: &'static str, index: usize },

    #[error("example {index} nests values {found} levels deep, expected {expected}")]
    InconsistentDepth { index: usize, expected: usize, found: usize },

    #[error("example {index} has rank {found}, expected rank {expected}")]
    RankMismatch { index: usize, expected: usize, found: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_errors_name_the_padder() {
        let err = PadderError::EleDtypeUnsupported { padder: "ArrayPadder", dtype: "str".to_string() };
        let msg = err.to_string();
        assert!(msg.contains("ArrayPadder"));
        assert!(msg.contains("element dtype"));

        let err = PadderError::DtypeUnsupported { padder: "ArrayPadder", dtype: "str".to_string() };
        assert!(err.to_string().starts_with("the dtype of `ArrayPadder`"));
    }
}
