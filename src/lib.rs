//! Churn prediction for telecom customers.
//!
//! A record of raw form values is validated against a fixed feature schema,
//! encoded into the vector layout the classifier was trained on, optionally
//! standardized, scored, and shaped into a [`PredictionResult`].
//!
//! All state is built once at startup ([`ChurnPipeline`]) and only read
//! afterwards.

pub mod config;
pub mod encoder;
pub mod error;
pub mod format;
pub mod model;
pub mod pipeline;
pub mod scaler;
pub mod schema;

pub use config::ServiceConfig;
pub use encoder::{encode, FeatureVector};
pub use error::{ChurnError, Result};
pub use format::PredictionResult;
pub use model::{ChurnLabel, ChurnPredictor, Classifier, RandomForest};
pub use pipeline::ChurnPipeline;
pub use scaler::FeatureScaler;
pub use schema::{FeatureSchema, FieldSpec, FieldValue, RawInput, ValidatedInput};

/// Convert one JSON object (field -> string, number or bool) into a
/// [`RawInput`]. Nulls are treated as absent fields.
pub fn raw_input_from_json(value: &serde_json::Value) -> Result<RawInput> {
    use serde_json::Value;

    let obj = value.as_object().ok_or_else(|| ChurnError::Parse {
        field: "record".to_string(),
        value: value.to_string(),
        expected: "JSON object",
    })?;
    let mut raw = RawInput::with_capacity(obj.len());
    for (k, v) in obj {
        let s = match v {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(ChurnError::Parse {
                    field: k.clone(),
                    value: v.to_string(),
                    expected: "scalar",
                })
            }
        };
        raw.insert(k.clone(), s);
    }
    Ok(raw)
}
