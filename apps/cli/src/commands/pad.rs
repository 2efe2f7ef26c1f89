//! Pad command implementation.

use anyhow::{anyhow, bail, Context};
use fastnlp_core::padders::{ElementType, FieldKind, FieldValue, Pad, Padder};
use serde_json::{json, Value};
use std::path::PathBuf;
use tracing::debug;

use super::parse_scalar;

/// Execute the pad command.
///
/// Pads the batch and prints `{"dtype", "shape", "data"}` as one JSON line.
pub fn execute(
    batch: Option<String>,
    input: Option<PathBuf>,
    kind: Option<String>,
    pad_value: &str,
    ele_dtype: Option<String>,
    dtype: Option<String>,
) -> anyhow::Result<()> {
    let text = match (batch, input) {
        (Some(batch), _) => batch,
        (None, Some(path)) => {
            std::fs::read_to_string(&path).with_context(|| format!("Failed to read {}", path.display()))?
        }
        (None, None) => bail!("No batch given: pass it as an argument or with --input"),
    };

    let output = pad_json(&text, kind.as_deref(), pad_value, ele_dtype.as_deref(), dtype.as_deref())?;
    println!("{}", output);
    Ok(())
}

fn pad_json(
    text: &str,
    kind: Option<&str>,
    pad_value: &str,
    ele_dtype: Option<&str>,
    dtype: Option<&str>,
) -> anyhow::Result<Value> {
    let parsed: Value = serde_json::from_str(text).context("Batch is not valid JSON")?;
    let Value::Array(items) = parsed else {
        bail!("Batch must be a JSON array with one entry per example");
    };
    let mut batch: Vec<FieldValue> = items.iter().map(FieldValue::from_json).collect();

    let kind = match kind {
        Some(kind) => kind.parse::<FieldKind>().map_err(|e| anyhow!(e))?,
        None => batch
            .first()
            .and_then(FieldKind::detect)
            .ok_or_else(|| anyhow!("Cannot pick a padder for this batch; pass --kind"))?,
    };
    debug!(kind = %kind, examples = batch.len(), "Padding batch");

    if kind == FieldKind::Array {
        batch = batch
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                value
                    .into_array()
                    .map(FieldValue::Array)
                    .ok_or_else(|| anyhow!("Example {} is not a rectangular numeric array", index))
            })
            .collect::<anyhow::Result<_>>()?;
    }

    let padder = Padder::new(
        kind,
        parse_scalar(pad_value)?,
        ele_dtype.map(ElementType::parse),
        dtype.map(ElementType::parse),
    )?;
    let padded = padder.pad(&batch)?;

    Ok(json!({
        "dtype": padded.dtype().as_str(),
        "shape": padded.shape(),
        "data": padded.to_json(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_sequence_kind() {
        let output = pad_json("[[1, 2], [3]]", None, "-1", None, None).unwrap();
        assert_eq!(output["data"], json!([[1, 2], [3, -1]]));
        assert_eq!(output["shape"], json!([2, 2]));
        assert_eq!(output["dtype"], "int64");
    }

    #[test]
    fn test_array_kind_converts_nested_lists() {
        let output = pad_json("[[[1, 2]], [[3], [4]]]", Some("array"), "0", None, Some("float32")).unwrap();
        assert!(output["data"].is_array());
        assert_eq!(output["shape"], json!([2, 2, 2]));
        assert_eq!(output["dtype"], "float32");
    }

    #[test]
    fn test_rejects_text_batches() {
        assert!(pad_json(r#"["a", "b"]"#, None, "0", None, None).is_err());
        assert!(pad_json("[1, 2]", None, "0", None, Some("str")).is_err());
        assert!(pad_json("{\"a\": 1}", None, "0", None, None).is_err());
    }
}
