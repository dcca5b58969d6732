use anyhow::{bail, Context};
use std::path::Path;
use tch::{kind::Kind, CModule, Device, IndexOp, Tensor};

use super::Classifier;
use crate::error::{ChurnError, Result};

/// TorchScript module mapping a `[1, in_dim]` row to `[1, 2]` logits
/// ordered `[no_churn, churn]`.
pub struct TorchClassifier {
    model: CModule,
    device: Device,
    in_dim: usize,
    path: String,
}

impl TorchClassifier {
    pub fn load(model_path: &Path, in_dim: usize) -> Result<Self> {
        Self::open(model_path, in_dim).map_err(|e| {
            ChurnError::model_unavailable(model_path.display().to_string(), format!("{:#}", e))
        })
    }

    fn open(model_path: &Path, in_dim: usize) -> anyhow::Result<Self> {
        let device = Device::Cpu;
        let model = CModule::load_on_device(model_path, device)
            .with_context(|| format!("failed to load TorchScript {}", model_path.display()))?;

        // Probe output shape with a dummy forward; expect [B=1, 2]
        let dummy = Tensor::zeros([1, in_dim as i64], (Kind::Float, device));
        let t = model
            .forward_ts(&[dummy])
            .with_context(|| format!("probe forward with in_dim={} failed", in_dim))?;
        let sz = t.size();
        if sz != [1, 2] {
            bail!("unexpected model output size: {:?}, expected [1, 2]", sz);
        }

        Ok(Self {
            model,
            device,
            in_dim,
            path: model_path.display().to_string(),
        })
    }
}

impl Classifier for TorchClassifier {
    fn describe(&self) -> String {
        format!("TorchScript {} (in_dim={})", self.path, self.in_dim)
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.in_dim)
    }

    fn predict_proba(&self, x: &[f32]) -> Result<[f64; 2]> {
        if x.len() != self.in_dim {
            return Err(ChurnError::encoding(format!(
                "feature length mismatch: got {}, expected {}",
                x.len(),
                self.in_dim
            )));
        }

        let input = Tensor::from_slice(x)
            .reshape([1, self.in_dim as i64])
            .to_device(self.device);

        let logits = tch::no_grad(|| self.model.forward_ts(&[input]))
            .map_err(|e| ChurnError::Inference(e.to_string()))?;
        let probs = logits.softmax(-1, Kind::Double);

        let p_no = probs.i((0, 0)).double_value(&[]);
        let p_yes = probs.i((0, 1)).double_value(&[]);
        Ok([p_no, p_yes])
    }
}
