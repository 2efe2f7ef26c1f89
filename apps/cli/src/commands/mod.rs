//! Command implementations for the fastNLP CLI.

pub mod collate;
pub mod pad;
pub mod simulate;

use anyhow::{bail, Context};
use fastnlp_core::{FastNlpConfig, Scalar};
use std::path::Path;

/// Parses a padding value given on the command line.
pub fn parse_scalar(text: &str) -> anyhow::Result<Scalar> {
    let text = text.trim();
    if let Ok(value) = text.parse::<i64>() {
        return Ok(Scalar::Int(value));
    }
    if let Ok(value) = text.parse::<f64>() {
        return Ok(Scalar::Float(value));
    }
    match text.to_lowercase().as_str() {
        "true" => Ok(Scalar::Bool(true)),
        "false" => Ok(Scalar::Bool(false)),
        _ => bail!("Invalid pad value `{}`: expected a number or a boolean", text),
    }
}

/// Loads the configuration file if one was given, defaults otherwise.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<FastNlpConfig> {
    match path {
        Some(path) => FastNlpConfig::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(FastNlpConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar() {
        assert_eq!(parse_scalar("0").unwrap(), Scalar::Int(0));
        assert_eq!(parse_scalar("-100").unwrap(), Scalar::Int(-100));
        assert_eq!(parse_scalar("0.5").unwrap(), Scalar::Float(0.5));
        assert_eq!(parse_scalar("True").unwrap(), Scalar::Bool(true));
        assert!(parse_scalar("pad").is_err());
    }

    #[test]
    fn test_load_config_defaults_without_path() {
        assert_eq!(load_config(None).unwrap(), FastNlpConfig::default());
    }
}
