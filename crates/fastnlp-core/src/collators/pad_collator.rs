use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use serde_json::Value;
use tracing::debug;

use super::{Collate, CollateError};
use crate::padders::{ElementType, FieldKind, FieldValue, Pad, PaddedArray, Padder, Scalar};

/// One example: field name to value.
pub type Example = BTreeMap<String, FieldValue>;

/// One collated batch: field name to the field's batched values.
pub type CollatedBatch = BTreeMap<String, Collated>;

/// A field after collation.
#[derive(Debug, Clone, PartialEq)]
pub enum Collated {
    Padded(PaddedArray),
    /// Values of a field without a padder, in batch order.
    Raw(Vec<FieldValue>),
}

impl Collated {
    pub fn as_padded(&self) -> Option<&PaddedArray> {
        match self {
            Self::Padded(array) => Some(array),
            Self::Raw(_) => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Self::Padded(array) => array.to_json(),
            Self::Raw(values) => Value::Array(values.iter().map(FieldValue::to_json).collect()),
        }
    }
}

/// Per-field padding overrides.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PadSettings {
    /// Forces a strategy instead of detecting it from the first batch.
    pub kind: Option<FieldKind>,
    pub pad_value: Option<Scalar>,
    pub element_dtype: Option<ElementType>,
    pub dtype: Option<ElementType>,
}

#[derive(Debug)]
enum FieldPlan {
    Pad(Padder),
    Raw,
}

/// Pads every numeric field of dictionary examples.
///
/// The padder of each field is chosen once, from the first batch the
/// collator sees; a field present in any of its examples must be present
/// in all of them. Text fields, and fields whose values hold text anywhere,
/// are passed through unpadded.
#[derive(Debug)]
pub struct PadCollator {
    pad_value: Scalar,
    settings: BTreeMap<String, PadSettings>,
    ignored: BTreeSet<String>,
    plan: OnceLock<BTreeMap<String, FieldPlan>>,
}

impl Default for PadCollator {
    fn default() -> Self {
        Self::new(Scalar::Int(0))
    }
}

impl PadCollator {
    pub fn new(pad_value: Scalar) -> Self {
        Self {
            pad_value,
            settings: BTreeMap::new(),
            ignored: BTreeSet::new(),
            plan: OnceLock::new(),
        }
    }

    pub fn pad_value(&self) -> Scalar {
        self.pad_value
    }

    /// Overrides how `field` is padded.
    ///
    /// The dtypes are validated right away, so a non-numeric `dtype` fails
    /// here rather than on the first batch.
    pub fn set_pad(&mut self, field: impl Into<String>, settings: PadSettings) -> Result<&mut Self, CollateError> {
        let field = field.into();
        let kind = settings.kind.unwrap_or(FieldKind::Sequence);
        Padder::new(
            kind,
            settings.pad_value.unwrap_or(self.pad_value),
            settings.element_dtype.clone(),
            settings.dtype.clone(),
        )
        .map_err(|source| CollateError::InvalidSettings { field: field.clone(), source })?;

        self.ignored.remove(&field);
        self.settings.insert(field, settings);
        self.plan = OnceLock::new();
        Ok(self)
    }

    /// Drops `field` from every batch.
    pub fn set_ignore(&mut self, field: impl Into<String>) -> &mut Self {
        let field = field.into();
        self.settings.remove(&field);
        self.ignored.insert(field);
        self.plan = OnceLock::new();
        self
    }

    /// The strategy chosen for `field`, once the first batch has been seen.
    /// `None` for unknown, ignored and unpadded fields.
    pub fn field_kind(&self, field: &str) -> Option<FieldKind> {
        match self.plan.get()?.get(field)? {
            FieldPlan::Pad(padder) => Some(padder.kind()),
            FieldPlan::Raw => None,
        }
    }

    fn build_plan(&self, batch: &[Example]) -> Result<BTreeMap<String, FieldPlan>, CollateError> {
        let mut samples: BTreeMap<&String, &FieldValue> = BTreeMap::new();
        for example in batch {
            for (field, value) in example {
                samples.entry(field).or_insert(value);
            }
        }

        let mut plan = BTreeMap::new();
        for (field, sample) in samples {
            if self.ignored.contains(field) {
                continue;
            }

            let settings = self.settings.get(field);
            let kind = settings.and_then(|s| s.kind).or_else(|| detect_kind(sample));
            let Some(kind) = kind else {
                debug!(field = %field, "No padder for field, passing values through");
                plan.insert(field.clone(), FieldPlan::Raw);
                continue;
            };

            let padder = match settings {
                Some(s) => Padder::new(
                    kind,
                    s.pad_value.unwrap_or(self.pad_value),
                    s.element_dtype.clone(),
                    s.dtype.clone(),
                ),
                None => Padder::new(kind, self.pad_value, None, None),
            }
            .map_err(|source| CollateError::InvalidSettings { field: field.clone(), source })?;

            debug!(field = %field, kind = %kind, "Selected padder");
            plan.insert(field.clone(), FieldPlan::Pad(padder));
        }
        Ok(plan)
    }
}

/// Fixed-shape arrays get the array padder, numbers the number padder, and
/// lists of numbers the sequence padder. Anything holding text has none.
fn detect_kind(sample: &FieldValue) -> Option<FieldKind> {
    if holds_text(sample) {
        return None;
    }
    FieldKind::detect(sample)
}

fn holds_text(value: &FieldValue) -> bool {
    match value {
        FieldValue::Text(_) => true,
        FieldValue::List(items) => items.iter().any(holds_text),
        FieldValue::Scalar(_) | FieldValue::Array(_) => false,
    }
}

impl Collate<Example> for PadCollator {
    type Output = Result<CollatedBatch, CollateError>;

    fn collate(&self, mut batch: Vec<Example>) -> Self::Output {
        let plan = match self.plan.get() {
            Some(plan) => plan,
            None => {
                let built = self.build_plan(&batch)?;
                self.plan.get_or_init(|| built)
            }
        };

        let mut out = BTreeMap::new();
        for (field, field_plan) in plan {
            let values = batch
                .iter_mut()
                .enumerate()
                .map(|(index, example)| {
                    example.remove(field).ok_or_else(|| CollateError::MissingField { field: field.clone(), index })
                })
                .collect::<Result<Vec<_>, _>>()?;

            let collated = match field_plan {
                FieldPlan::Pad(padder) => Collated::Padded(
                    padder
                        .pad(&values)
                        .map_err(|source| CollateError::Pad { field: field.clone(), source })?,
                ),
                FieldPlan::Raw => Collated::Raw(values),
            };
            out.insert(field.clone(), collated);
        }
        Ok(out)
    }
}
