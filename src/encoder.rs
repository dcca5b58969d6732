//! Turns a validated record into the ordered numeric vector the model reads.

use crate::error::{ChurnError, Result};
use crate::schema::{FeatureSchema, FieldSpec, FieldValue, ValidatedInput};

/// Model input: one value per schema field, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector(Vec<f32>);

impl FeatureVector {
    pub fn from_values(values: Vec<f32>) -> Self {
        Self(values)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Summary used by the `LOG_PRED` debug signal.
    pub fn stats(&self) -> VectorStats {
        let v = &self.0;
        let nonzero = v.iter().filter(|x| **x != 0.0).count();
        let mean = if v.is_empty() {
            0.0
        } else {
            v.iter().sum::<f32>() / (v.len() as f32)
        };
        let std = if v.len() < 2 {
            0.0
        } else {
            (v.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / (v.len() as f32)).sqrt()
        };
        VectorStats { nonzero, mean, std }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorStats {
    pub nonzero: usize,
    pub mean: f32,
    pub std: f32,
}

/// Encode `input` in the schema's fixed order: floats, then integers, then
/// each categorical as the zero-based index of its option.
///
/// Categoricals are ordinal-encoded, not one-hot; the models this serves
/// were fit on that layout.
pub fn encode(input: &ValidatedInput, schema: &FeatureSchema) -> Result<FeatureVector> {
    let mut v = Vec::with_capacity(schema.width());
    for field in schema.describe() {
        let name = field.name();
        let value = input
            .get(name)
            .ok_or_else(|| ChurnError::encoding_field(name, "no validated value"))?;

        let x = match (field, value) {
            (FieldSpec::Float { .. }, FieldValue::Float(f)) => *f as f32,
            (FieldSpec::Integer { .. }, FieldValue::Integer(i)) => *i as f32,
            (FieldSpec::Categorical { .. }, FieldValue::Category(c)) => {
                let idx = field.category_index(c).ok_or_else(|| {
                    ChurnError::encoding_field(name, format!("{:?} is not a declared option", c))
                })?;
                idx as f32
            }
            (_, other) => {
                return Err(ChurnError::encoding_field(
                    name,
                    format!("{} field holds mismatched value {:?}", field.kind(), other),
                ))
            }
        };
        v.push(x);
    }
    Ok(FeatureVector(v))
}

/// Startup self-check: the vector the schema produces must match what the
/// loaded artifact declares, both in width and, when names are declared,
/// in order.
pub fn check_layout(
    schema: &FeatureSchema,
    artifact: &str,
    width: Option<usize>,
    feature_names: Option<&[String]>,
) -> Result<()> {
    if let Some(w) = width {
        if w != schema.width() {
            return Err(ChurnError::encoding(format!(
                "{} expects {} features, schema emits {}",
                artifact,
                w,
                schema.width()
            )));
        }
    }
    if let Some(names) = feature_names {
        let ours = schema.field_names();
        if names.len() != ours.len() {
            return Err(ChurnError::encoding(format!(
                "{} declares {} feature names, schema emits {}",
                artifact,
                names.len(),
                ours.len()
            )));
        }
        if let Some((i, (theirs, mine))) = names
            .iter()
            .zip(ours.iter())
            .enumerate()
            .find(|(_, (a, b))| a.as_str() != **b)
        {
            return Err(ChurnError::encoding(format!(
                "{} feature {} is '{}', schema has '{}'",
                artifact, i, theirs, mine
            )));
        }
    }
    Ok(())
}
