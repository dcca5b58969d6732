//! Classifier loading and scoring.

pub mod forest;
#[cfg(feature = "torch")]
pub mod torch;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::encoder::FeatureVector;
use crate::error::{ChurnError, Result};

pub use forest::RandomForest;

/// Largest accepted deviation of `p_no_churn + p_churn` from 1.
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Hard decision of the classifier. Discriminants are the class indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChurnLabel {
    #[serde(rename = "No Churn")]
    NoChurn = 0,
    #[serde(rename = "Churn")]
    Churn = 1,
}

impl ChurnLabel {
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(ChurnLabel::NoChurn),
            1 => Some(ChurnLabel::Churn),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Class with the higher probability; ties go to `NoChurn`.
    pub fn argmax(proba: [f64; 2]) -> Self {
        if proba[1] > proba[0] {
            ChurnLabel::Churn
        } else {
            ChurnLabel::NoChurn
        }
    }
}

impl fmt::Display for ChurnLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChurnLabel::NoChurn => write!(f, "No Churn"),
            ChurnLabel::Churn => write!(f, "Churn"),
        }
    }
}

/// A trained two-class model. Implementations must be deterministic and
/// must not mutate themselves while scoring.
pub trait Classifier: Send + Sync {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Input width the model was fit on, when the artifact declares it.
    fn input_width(&self) -> Option<usize>;

    /// Feature names in fit order, when the artifact declares them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// `[p_no_churn, p_churn]` for one row.
    fn predict_proba(&self, x: &[f32]) -> Result<[f64; 2]>;

    fn predict(&self, x: &[f32]) -> Result<ChurnLabel> {
        self.predict_proba(x).map(ChurnLabel::argmax)
    }
}

/// Read-only handle on the loaded classifier.
#[derive(Clone)]
pub struct ChurnPredictor {
    model: Arc<dyn Classifier>,
}

impl fmt::Debug for ChurnPredictor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChurnPredictor")
            .field("model", &self.model.describe())
            .finish()
    }
}

impl ChurnPredictor {
    pub fn new(model: Arc<dyn Classifier>) -> Self {
        Self { model }
    }

    /// Load a model artifact, choosing the format from the file extension:
    /// `.json` for an exported random forest, `.pt`/`.ts` for TorchScript.
    ///
    /// `in_dim` is the width the schema emits; TorchScript models are probed
    /// with it. Every failure is reported as `ModelUnavailable`.
    pub fn load(path: &Path, in_dim: usize) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let model: Arc<dyn Classifier> = match ext.as_deref() {
            Some("json") => Arc::new(RandomForest::load(path)?),
            Some("pt") | Some("ts") => load_torchscript(path, in_dim)?,
            _ => {
                return Err(ChurnError::model_unavailable(
                    path.display().to_string(),
                    "unrecognized model format (expected .json, .pt or .ts)",
                ))
            }
        };
        Ok(Self::new(model))
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.model.as_ref()
    }

    pub fn input_width(&self) -> Option<usize> {
        self.model.input_width()
    }

    /// Score one encoded row.
    pub fn score(&self, v: &FeatureVector) -> Result<(ChurnLabel, [f64; 2])> {
        if let Some(w) = self.model.input_width() {
            if v.len() != w {
                return Err(ChurnError::encoding(format!(
                    "feature length mismatch: got {}, expected {}",
                    v.len(),
                    w
                )));
            }
        }

        let proba = self.model.predict_proba(v.as_slice())?;
        check_probabilities(proba)?;
        let label = self.model.predict(v.as_slice())?;
        Ok((label, proba))
    }
}

fn check_probabilities(p: [f64; 2]) -> Result<()> {
    if p.iter().any(|x| !x.is_finite() || *x < 0.0 || *x > 1.0) {
        return Err(ChurnError::Inference(format!(
            "probabilities out of range: {:?}",
            p
        )));
    }
    let sum = p[0] + p[1];
    if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
        return Err(ChurnError::Inference(format!(
            "probabilities sum to {}, expected 1",
            sum
        )));
    }
    Ok(())
}

#[cfg(feature = "torch")]
fn load_torchscript(path: &Path, in_dim: usize) -> Result<Arc<dyn Classifier>> {
    Ok(Arc::new(torch::TorchClassifier::load(path, in_dim)?))
}

#[cfg(not(feature = "torch"))]
fn load_torchscript(path: &Path, _in_dim: usize) -> Result<Arc<dyn Classifier>> {
    Err(ChurnError::model_unavailable(
        path.display().to_string(),
        "TorchScript models need the `torch` feature",
    ))
}
