//! Collate command implementation.

use anyhow::{bail, Context};
use fastnlp_core::collators::{Example, PadCollator};
use fastnlp_core::padders::FieldValue;
use fastnlp_core::{DataLoaderOptions, IndexedDataLoader};
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::info;

use super::{load_config, parse_scalar};

/// Loader options given on the command line, layered over the config file.
#[derive(Debug, Default)]
pub struct LoaderOverrides {
    pub batch_size: Option<usize>,
    pub shuffle: bool,
    pub seed: Option<u64>,
    pub drop_last: bool,
}

impl LoaderOverrides {
    fn apply(&self, options: &mut DataLoaderOptions) {
        if let Some(batch_size) = self.batch_size {
            options.batch_size = batch_size;
        }
        if self.seed.is_some() {
            options.seed = self.seed;
        }
        options.shuffle |= self.shuffle;
        options.drop_last |= self.drop_last;
    }
}

/// Execute the collate command.
pub fn execute(
    input: &Path,
    config: Option<&Path>,
    overrides: LoaderOverrides,
    pad_value: &str,
    ignored: &[String],
) -> anyhow::Result<()> {
    let mut options = load_config(config)?.dataloader;
    overrides.apply(&mut options);
    if options.batch_size == 0 {
        bail!("Batch size must be at least 1");
    }

    let content =
        std::fs::read_to_string(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let dataset = parse_examples(&content)?;

    let mut collator = PadCollator::new(parse_scalar(pad_value)?);
    for field in ignored {
        collator.set_ignore(field.as_str());
    }

    let loader = IndexedDataLoader::new(&dataset[..], collator, &options);
    let total = loader.num_batches();
    for (indices, batch) in loader {
        let batch = batch?;
        let fields: Map<String, Value> = batch.iter().map(|(name, value)| (name.clone(), value.to_json())).collect();
        println!("{}", json!({ "indices": indices, "batch": fields }));
    }

    info!("Collated {} examples into {} batches", dataset.len(), total);
    Ok(())
}

/// One example per non-blank line, each a JSON object.
fn parse_examples(content: &str) -> anyhow::Result<Vec<Example>> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| -> anyhow::Result<Example> {
            let value: Value =
                serde_json::from_str(line).with_context(|| format!("Line {} is not valid JSON", number + 1))?;
            let Value::Object(fields) = value else {
                bail!("Line {} is not a JSON object", number + 1);
            };
            Ok(fields.iter().map(|(name, value)| (name.clone(), FieldValue::from_json(value))).collect())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_examples_skips_blank_lines() {
        let examples = parse_examples("{\"x\": [1, 2]}\n\n{\"x\": [3]}\n").unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[1]["x"], FieldValue::from(vec![3]));
    }

    #[test]
    fn test_parse_examples_reports_line() {
        let err = parse_examples("{\"x\": 1}\n[1, 2]\n").unwrap_err();
        assert!(err.to_string().contains("Line 2"));
    }

    #[test]
    fn test_overrides_layer_over_config() {
        let mut options = DataLoaderOptions { batch_size: 8, seed: Some(1), ..Default::default() };
        LoaderOverrides { batch_size: Some(2), shuffle: true, ..Default::default() }.apply(&mut options);
        assert_eq!(options.batch_size, 2);
        assert!(options.shuffle);
        assert_eq!(options.seed, Some(1));
    }
}
