use thiserror::Error;

/// Errors raised while validating, encoding or scoring a customer record.
///
/// `Parse`, `Validation` and `Encoding` are request-scoped: they describe
/// one bad record and the caller should reject that record only.
/// `ModelUnavailable` and `Config` are raised while assembling the
/// pipeline and mean the process must not serve predictions.
#[derive(Debug, Error)]
pub enum ChurnError {
    #[error("field '{field}': cannot parse {value:?} as {expected}")]
    Parse {
        field: String,
        value: String,
        expected: &'static str,
    },

    #[error("field '{field}': {reason}")]
    Validation { field: String, reason: String },

    #[error("encoding failed: {reason}")]
    Encoding {
        field: Option<String>,
        reason: String,
    },

    #[error("model unavailable ({path}): {reason}")]
    ModelUnavailable { path: String, reason: String },

    #[error("classifier error: {0}")]
    Inference(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl ChurnError {
    pub(crate) fn encoding(reason: impl Into<String>) -> Self {
        ChurnError::Encoding {
            field: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn encoding_field(field: &str, reason: impl Into<String>) -> Self {
        ChurnError::Encoding {
            field: Some(field.to_string()),
            reason: reason.into(),
        }
    }

    pub(crate) fn model_unavailable(path: impl Into<String>, reason: impl ToString) -> Self {
        ChurnError::ModelUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Name of the input field this error is about, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            ChurnError::Parse { field, .. } | ChurnError::Validation { field, .. } => Some(field),
            ChurnError::Encoding { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// True for errors caused by the submitted record rather than by the
    /// loaded model or configuration.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            ChurnError::Parse { .. } | ChurnError::Validation { .. } | ChurnError::Encoding { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ChurnError>;
