use anyhow::Context;
use churn_predictor::{raw_input_from_json, ChurnError, ChurnPipeline, FeatureSchema, ServiceConfig};
use serde_json::json;
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

// One JSON record per stdin line in, one JSON result per stdout line out.
fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    if std::env::args().skip(1).any(|a| a == "--schema") {
        return print_schema();
    }

    let cfg = ServiceConfig::from_env()?;
    let pipeline = match ChurnPipeline::from_config(&cfg) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!("refusing to serve predictions: {}", e);
            return Err(e.into());
        }
    };

    let fields = pipeline.schema().field_names();
    tracing::info!("schema width {}: {:?}", fields.len(), fields);

    let warm = pipeline.warmup().context("warmup prediction failed")?;
    tracing::info!(
        "warmup ok: {} ({:.1}% churn)",
        warm.predicted_label,
        warm.churn_percent
    );

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (lineno, line) in stdin.lock().lines().enumerate() {
        let line = line.context("failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }
        let reply = match score_line(&pipeline, &line) {
            Ok(result) => {
                tracing::info!(line = lineno + 1, "{}", result.headline());
                serde_json::to_value(&result)?
            }
            Err(e) => {
                tracing::warn!(line = lineno + 1, "rejected: {}", e);
                json!({ "error": e.to_string(), "field": e.field() })
            }
        };
        writeln!(out, "{}", reply)?;
        out.flush()?;
    }
    Ok(())
}

fn score_line(
    pipeline: &ChurnPipeline,
    line: &str,
) -> Result<churn_predictor::PredictionResult, ChurnError> {
    let value: serde_json::Value = serde_json::from_str(line).map_err(|e| ChurnError::Parse {
        field: "record".to_string(),
        value: e.to_string(),
        expected: "JSON object",
    })?;
    let raw = raw_input_from_json(&value)?;
    pipeline.predict(&raw)
}

fn print_schema() -> anyhow::Result<()> {
    let schema = match std::env::var("SCHEMA_PATH").ok().filter(|s| !s.trim().is_empty()) {
        Some(p) => FeatureSchema::load(Path::new(p.trim()))?,
        None => FeatureSchema::telco(),
    };
    println!("{}", serde_json::to_string_pretty(schema.describe())?);
    Ok(())
}
