//! Input schema: the recognized customer attributes, their domains and defaults.
//!
//! Field order is part of the contract with the trained model. Fields are
//! grouped floats, then integers, then categoricals, and within a group they
//! keep their declared order. The encoder walks the schema in exactly this
//! order.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::{fs, path::Path};

use crate::error::{ChurnError, Result};

/// Untyped field values as collected from a form: name -> string.
pub type RawInput = HashMap<String, String>;

/// Group a field belongs to. The derived ordering is the group order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FieldKind {
    Float,
    Integer,
    Categorical,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Float => write!(f, "float"),
            FieldKind::Integer => write!(f, "integer"),
            FieldKind::Categorical => write!(f, "categorical"),
        }
    }
}

/// One input attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldSpec {
    /// Inclusive `[min, max]` range.
    Float {
        name: String,
        min: f64,
        max: f64,
        default: f64,
    },
    /// Inclusive `[min, max]` range.
    Integer {
        name: String,
        min: i64,
        max: i64,
        default: i64,
    },
    /// Option order determines the encoded index.
    Categorical { name: String, options: Vec<String> },
}

impl FieldSpec {
    pub fn float(name: &str, min: f64, max: f64, default: f64) -> Self {
        FieldSpec::Float {
            name: name.to_string(),
            min,
            max,
            default,
        }
    }

    pub fn integer(name: &str, min: i64, max: i64, default: i64) -> Self {
        FieldSpec::Integer {
            name: name.to_string(),
            min,
            max,
            default,
        }
    }

    pub fn categorical(name: &str, options: &[&str]) -> Self {
        FieldSpec::Categorical {
            name: name.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            FieldSpec::Float { name, .. }
            | FieldSpec::Integer { name, .. }
            | FieldSpec::Categorical { name, .. } => name,
        }
    }

    pub fn kind(&self) -> FieldKind {
        match self {
            FieldSpec::Float { .. } => FieldKind::Float,
            FieldSpec::Integer { .. } => FieldKind::Integer,
            FieldSpec::Categorical { .. } => FieldKind::Categorical,
        }
    }

    /// Value used when the field is absent. Categoricals fall back to their
    /// first declared option.
    pub fn default_value(&self) -> Option<FieldValue> {
        match self {
            FieldSpec::Float { default, .. } => Some(FieldValue::Float(*default)),
            FieldSpec::Integer { default, .. } => Some(FieldValue::Integer(*default)),
            FieldSpec::Categorical { options, .. } => {
                options.first().map(|o| FieldValue::Category(o.clone()))
            }
        }
    }

    /// Zero-based position of `value` in the declared option list.
    pub fn category_index(&self, value: &str) -> Option<usize> {
        match self {
            FieldSpec::Categorical { options, .. } => options.iter().position(|o| o == value),
            _ => None,
        }
    }

    /// Parse and range-check one raw value.
    pub fn parse(&self, raw: &str) -> Result<FieldValue> {
        match self {
            FieldSpec::Float { name, min, max, .. } => {
                let v: f64 = raw.trim().parse().map_err(|_| parse_error(name, raw, "float"))?;
                if !v.is_finite() {
                    return Err(parse_error(name, raw, "finite float"));
                }
                if v < *min || v > *max {
                    return Err(ChurnError::Validation {
                        field: name.clone(),
                        reason: format!("value {} outside [{}, {}]", v, min, max),
                    });
                }
                Ok(FieldValue::Float(v))
            }
            FieldSpec::Integer { name, min, max, .. } => {
                let v: i64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| parse_error(name, raw, "integer"))?;
                if v < *min || v > *max {
                    return Err(ChurnError::Validation {
                        field: name.clone(),
                        reason: format!("value {} outside [{}, {}]", v, min, max),
                    });
                }
                Ok(FieldValue::Integer(v))
            }
            FieldSpec::Categorical { name, options } => {
                if options.iter().any(|o| o == raw) {
                    Ok(FieldValue::Category(raw.to_string()))
                } else {
                    Err(ChurnError::Validation {
                        field: name.clone(),
                        reason: format!("{:?} is not one of {:?}", raw, options),
                    })
                }
            }
        }
    }

    fn check(&self) -> Result<()> {
        let bad = |reason: String| -> Result<()> {
            Err(ChurnError::Config(format!("field '{}': {}", self.name(), reason)))
        };
        if self.name().is_empty() {
            return Err(ChurnError::Config("field with empty name".to_string()));
        }
        match self {
            FieldSpec::Float { min, max, default, .. } => {
                if !(min.is_finite() && max.is_finite() && default.is_finite()) {
                    return bad("bounds and default must be finite".to_string());
                }
                if min > max {
                    return bad(format!("min {} > max {}", min, max));
                }
                if default < min || default > max {
                    return bad(format!("default {} outside [{}, {}]", default, min, max));
                }
            }
            FieldSpec::Integer { min, max, default, .. } => {
                if min > max {
                    return bad(format!("min {} > max {}", min, max));
                }
                if default < min || default > max {
                    return bad(format!("default {} outside [{}, {}]", default, min, max));
                }
            }
            FieldSpec::Categorical { options, .. } => {
                if options.is_empty() {
                    return bad("no options declared".to_string());
                }
                let mut seen = HashSet::new();
                for o in options {
                    if !seen.insert(o.as_str()) {
                        return bad(format!("duplicate option {:?}", o));
                    }
                }
            }
        }
        Ok(())
    }
}

fn parse_error(field: &str, raw: &str, expected: &'static str) -> ChurnError {
    ChurnError::Parse {
        field: field.to_string(),
        value: raw.to_string(),
        expected,
    }
}

/// A typed, validated field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Category(String),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Float(v) => write!(f, "{}", v),
            FieldValue::Integer(v) => write!(f, "{}", v),
            FieldValue::Category(v) => write!(f, "{}", v),
        }
    }
}

/// Output of [`FeatureSchema::validate_and_default`]: every schema field
/// present, typed and in domain. Only the schema can build one.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedInput {
    values: BTreeMap<String, FieldValue>,
}

impl ValidatedInput {
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The completed record rendered back to strings.
    pub fn to_raw(&self) -> RawInput {
        self.values
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }
}

/// Ordered, immutable catalog of input fields.
#[derive(Debug, Clone)]
pub struct FeatureSchema {
    fields: Vec<FieldSpec>,
}

impl FeatureSchema {
    /// Build a schema from fields declared in group order
    /// (floats, integers, categoricals).
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        let mut names = HashSet::new();
        let mut last_kind = FieldKind::Float;
        for field in &fields {
            field.check()?;
            if !names.insert(field.name()) {
                return Err(ChurnError::Config(format!(
                    "duplicate field name '{}'",
                    field.name()
                )));
            }
            if field.kind() < last_kind {
                return Err(ChurnError::Config(format!(
                    "{} field '{}' declared after {} fields; declare floats, then integers, then categoricals",
                    field.kind(),
                    field.name(),
                    last_kind
                )));
            }
            last_kind = field.kind();
        }
        if fields.is_empty() {
            return Err(ChurnError::Config("schema declares no fields".to_string()));
        }
        Ok(Self { fields })
    }

    /// The telecom customer schema the churn models are trained on.
    pub fn telco() -> Self {
        Self {
            fields: telco_fields(),
        }
    }

    /// Load a schema from a JSON list of tagged field objects.
    pub fn load(path: &Path) -> Result<Self> {
        let txt = fs::read_to_string(path).map_err(|e| {
            ChurnError::Config(format!("failed to read schema {}: {}", path.display(), e))
        })?;
        let fields: Vec<FieldSpec> = serde_json::from_str(&txt).map_err(|e| {
            ChurnError::Config(format!("failed to parse schema {}: {}", path.display(), e))
        })?;
        Self::new(fields)
    }

    /// All fields in encoding order.
    pub fn describe(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn floats(&self) -> impl Iterator<Item = &FieldSpec> {
        self.of_kind(FieldKind::Float)
    }

    pub fn ints(&self) -> impl Iterator<Item = &FieldSpec> {
        self.of_kind(FieldKind::Integer)
    }

    pub fn categoricals(&self) -> impl Iterator<Item = &FieldSpec> {
        self.of_kind(FieldKind::Categorical)
    }

    fn of_kind(&self, kind: FieldKind) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(move |f| f.kind() == kind)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name() == name)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name()).collect()
    }

    /// Number of features the encoder emits.
    pub fn width(&self) -> usize {
        self.fields.len()
    }

    /// Parse every present field, fill absent ones with their default.
    ///
    /// Fields are checked in schema order, so the reported error is the
    /// first offending field in that order. Keys the schema does not know
    /// are ignored.
    pub fn validate_and_default(&self, raw: &RawInput) -> Result<ValidatedInput> {
        let mut values = BTreeMap::new();
        for field in &self.fields {
            let value = match raw.get(field.name()) {
                Some(s) => field.parse(s)?,
                None => field.default_value().ok_or_else(|| ChurnError::Validation {
                    field: field.name().to_string(),
                    reason: "missing and no default declared".to_string(),
                })?,
            };
            values.insert(field.name().to_string(), value);
        }

        for key in raw.keys() {
            if !values.contains_key(key) {
                tracing::debug!("ignoring unknown field '{}'", key);
            }
        }

        Ok(ValidatedInput { values })
    }
}

impl Default for FeatureSchema {
    fn default() -> Self {
        Self::telco()
    }
}

const INTERNET_ADDON: [&str; 3] = ["No", "Yes", "No internet service"];

fn telco_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::float("MonthlyCharges", 0.0, 1000.0, 100.0),
        FieldSpec::float("TotalCharges", 0.0, 50000.0, 1000.0),
        FieldSpec::integer("SeniorCitizen", 0, 1, 0),
        FieldSpec::integer("tenure", 0, 100, 2),
        FieldSpec::categorical("gender", &["Female", "Male"]),
        FieldSpec::categorical("Partner", &["Yes", "No"]),
        FieldSpec::categorical("Dependents", &["No", "Yes"]),
        FieldSpec::categorical("PhoneService", &["No", "Yes"]),
        FieldSpec::categorical("MultipleLines", &["No phone service", "No", "Yes"]),
        FieldSpec::categorical("InternetService", &["DSL", "Fiber optic", "No"]),
        FieldSpec::categorical("OnlineSecurity", &INTERNET_ADDON),
        // OnlineBackup lists "Yes" first; the model was fit on this order.
        FieldSpec::categorical("OnlineBackup", &["Yes", "No", "No internet service"]),
        FieldSpec::categorical("DeviceProtection", &INTERNET_ADDON),
        FieldSpec::categorical("TechSupport", &INTERNET_ADDON),
        FieldSpec::categorical("StreamingTV", &INTERNET_ADDON),
        FieldSpec::categorical("StreamingMovies", &INTERNET_ADDON),
        FieldSpec::categorical("Contract", &["Month-to-month", "One year", "Two year"]),
        FieldSpec::categorical("PaperlessBilling", &["Yes", "No"]),
        FieldSpec::categorical(
            "PaymentMethod",
            &[
                "Electronic check",
                "Mailed check",
                "Bank transfer (automatic)",
                "Credit card (automatic)",
            ],
        ),
    ]
}
