use std::path::PathBuf;

use crate::error::{ChurnError, Result};

/// Startup configuration read from the environment.
///
/// - `MODEL_PATH`: classifier artifact (required)
/// - `SCALER_PATH`: fitted scaler JSON (optional)
/// - `SCHEMA_PATH`: schema JSON replacing the built-in telecom schema (optional)
/// - `LOG_PRED`: `1` logs per-request feature vector statistics
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub model_path: PathBuf,
    pub scaler_path: Option<PathBuf>,
    pub schema_path: Option<PathBuf>,
    pub log_predictions: bool,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let path = |key: &str| {
            lookup(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .map(PathBuf::from)
        };

        let model_path = path("MODEL_PATH")
            .ok_or_else(|| ChurnError::Config("MODEL_PATH not set".to_string()))?;

        Ok(Self {
            model_path,
            scaler_path: path("SCALER_PATH"),
            schema_path: path("SCHEMA_PATH"),
            log_predictions: lookup("LOG_PRED").as_deref() == Some("1"),
        })
    }
}
