//! Optional standardization stage between the encoder and the classifier.

use anyhow::Context;
use serde::Deserialize;
use std::{fs, path::Path};

use crate::encoder::FeatureVector;
use crate::error::{ChurnError, Result};

/// Fitted per-feature centering and scaling, `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FeatureScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
}

impl FeatureScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        let scaler = Self {
            mean,
            scale,
            feature_names: None,
        };
        scaler.check()?;
        Ok(scaler)
    }

    /// Load fitted parameters from JSON: `{"mean": [..], "scale": [..]}`
    /// with an optional `feature_names` list.
    pub fn load(path: &Path) -> Result<Self> {
        let scaler = Self::read(path)
            .map_err(|e| ChurnError::model_unavailable(path.display().to_string(), format!("{:#}", e)))?;
        scaler
            .check()
            .map_err(|e| ChurnError::model_unavailable(path.display().to_string(), e))?;
        Ok(scaler)
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read scaler at {}", path.display()))?;
        serde_json::from_str(&txt).with_context(|| "failed to parse scaler json")
    }

    fn check(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(ChurnError::Config(format!(
                "scaler has {} means but {} scales",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().chain(self.scale.iter()).any(|x| !x.is_finite()) {
            return Err(ChurnError::Config(
                "scaler parameters must be finite".to_string(),
            ));
        }
        if let Some(names) = &self.feature_names {
            if names.len() != self.mean.len() {
                return Err(ChurnError::Config(format!(
                    "scaler has {} parameters but {} feature names",
                    self.mean.len(),
                    names.len()
                )));
            }
        }
        Ok(())
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// A zero scale (constant feature during fitting) leaves the centered
    /// value unscaled.
    pub fn transform(&self, v: &FeatureVector) -> Result<FeatureVector> {
        if v.len() != self.width() {
            return Err(ChurnError::encoding(format!(
                "scaler fitted on {} features, got {}",
                self.width(),
                v.len()
            )));
        }
        let out = v
            .as_slice()
            .iter()
            .zip(self.mean.iter().zip(self.scale.iter()))
            .map(|(&x, (&m, &s))| {
                let s = if s == 0.0 { 1.0 } else { s };
                ((x as f64 - m) / s) as f32
            })
            .collect();
        Ok(FeatureVector::from_values(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_transform_centers_and_scales() {
        let scaler = FeatureScaler::new(vec![10.0, 0.0, 5.0], vec![2.0, 1.0, 0.0]).unwrap();
        let out = scaler
            .transform(&FeatureVector::from_values(vec![14.0, 3.0, 7.0]))
            .unwrap();
        assert_eq!(out.as_slice(), &[2.0, 3.0, 2.0]);
    }

    #[test]
    fn test_width_mismatch_is_encoding_error() {
        let scaler = FeatureScaler::new(vec![0.0; 3], vec![1.0; 3]).unwrap();
        let err = scaler
            .transform(&FeatureVector::from_values(vec![1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(err, ChurnError::Encoding { .. }));
    }

    #[test]
    fn test_rejects_inconsistent_parameters() {
        assert!(FeatureScaler::new(vec![0.0; 3], vec![1.0; 2]).is_err());
        assert!(FeatureScaler::new(vec![f64::NAN], vec![1.0]).is_err());
    }

    #[test]
    fn test_load_failures_are_model_unavailable() {
        let err = FeatureScaler::load(Path::new("/nonexistent/scaler.json")).unwrap_err();
        assert!(matches!(err, ChurnError::ModelUnavailable { .. }));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"mean": [0.0, 1.0], "scale": [1.0]}}"#).unwrap();
        let err = FeatureScaler::load(file.path()).unwrap_err();
        assert!(matches!(err, ChurnError::ModelUnavailable { .. }));
    }

    #[test]
    fn test_load_with_feature_names() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"mean": [0.0, 1.0], "scale": [1.0, 2.0], "feature_names": ["a", "b"]}}"#
        )
        .unwrap();
        let scaler = FeatureScaler::load(file.path()).unwrap();
        assert_eq!(scaler.width(), 2);
        assert_eq!(
            scaler.feature_names(),
            Some(&["a".to_string(), "b".to_string()][..])
        );
    }
}
