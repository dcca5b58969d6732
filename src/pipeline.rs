//! Validate -> encode -> scale -> score -> format, over read-only state
//! assembled once at startup.

use std::sync::Arc;

use crate::config::ServiceConfig;
use crate::encoder::{self, FeatureVector};
use crate::error::Result;
use crate::format::{self, PredictionResult};
use crate::model::ChurnPredictor;
use crate::scaler::FeatureScaler;
use crate::schema::{FeatureSchema, RawInput};

/// Everything a prediction needs. Cloning shares the loaded artifacts, so
/// each worker can hold its own handle.
#[derive(Debug, Clone)]
pub struct ChurnPipeline {
    schema: Arc<FeatureSchema>,
    scaler: Option<Arc<FeatureScaler>>,
    predictor: ChurnPredictor,
    log_predictions: bool,
}

impl ChurnPipeline {
    /// Assemble a pipeline, checking that the schema's vector layout matches
    /// the scaler and the classifier.
    pub fn new(
        schema: FeatureSchema,
        scaler: Option<FeatureScaler>,
        predictor: ChurnPredictor,
    ) -> Result<Self> {
        if let Some(s) = &scaler {
            encoder::check_layout(&schema, "scaler", Some(s.width()), s.feature_names())?;
        }
        encoder::check_layout(
            &schema,
            "model",
            predictor.input_width(),
            predictor.classifier().feature_names(),
        )?;

        Ok(Self {
            schema: Arc::new(schema),
            scaler: scaler.map(Arc::new),
            predictor,
            log_predictions: false,
        })
    }

    /// Load schema, scaler and model named by `cfg`.
    pub fn from_config(cfg: &ServiceConfig) -> Result<Self> {
        let schema = match &cfg.schema_path {
            Some(p) => FeatureSchema::load(p)?,
            None => FeatureSchema::telco(),
        };
        let scaler = cfg
            .scaler_path
            .as_deref()
            .map(FeatureScaler::load)
            .transpose()?;
        if scaler.is_none() {
            tracing::info!("no scaler configured; features go to the model unscaled");
        }
        let predictor = ChurnPredictor::load(&cfg.model_path, schema.width())?;
        tracing::info!(
            "loaded {} from {}",
            predictor.classifier().describe(),
            cfg.model_path.display()
        );

        Ok(Self::new(schema, scaler, predictor)?.with_log_predictions(cfg.log_predictions))
    }

    pub fn with_log_predictions(mut self, enabled: bool) -> Self {
        self.log_predictions = enabled;
        self
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn has_scaler(&self) -> bool {
        self.scaler.is_some()
    }

    /// Run one record through the whole pipeline.
    pub fn predict(&self, raw: &RawInput) -> Result<PredictionResult> {
        let input = self.schema.validate_and_default(raw)?;
        let vec = encoder::encode(&input, &self.schema)?;
        if self.log_predictions {
            self.log_vector(&vec);
        }

        let vec = match &self.scaler {
            Some(s) => s.transform(&vec)?,
            None => vec,
        };

        let (label, proba) = self.predictor.score(&vec)?;
        tracing::debug!(%label, p_churn = proba[1], "scored");
        Ok(format::format(label, proba))
    }

    /// Score the all-defaults record once so load problems show up before
    /// the first real request.
    pub fn warmup(&self) -> Result<PredictionResult> {
        self.predict(&RawInput::new())
    }

    fn log_vector(&self, vec: &FeatureVector) {
        let stats = vec.stats();
        let sample: Vec<String> = self
            .schema
            .field_names()
            .iter()
            .zip(vec.as_slice())
            .take(6)
            .map(|(name, x)| format!("{}={:.3}", name, x))
            .collect();
        tracing::info!(
            "encoded in_dim={} nonzero={} mean={:.3} std={:.3} sample=[{}]",
            vec.len(),
            stats.nonzero,
            stats.mean,
            stats.std,
            sample.join(", ")
        );
    }
}
