//! Random forest classifier read from a JSON export of scikit-learn trees.
//!
//! Each tree is stored in the flat layout of scikit-learn's `tree_`
//! attribute: parallel arrays indexed by node id, with `-1` children marking
//! a leaf. A sample goes left when `x[feature] <= threshold`. Leaf class
//! counts are normalized per tree and the forest averages the per-tree
//! distributions.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::{fs, path::Path};

use super::Classifier;
use crate::error::{ChurnError, Result};

const LEAF: i64 = -1;

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecisionTree {
    children_left: Vec<i64>,
    children_right: Vec<i64>,
    feature: Vec<i64>,
    threshold: Vec<f64>,
    /// Per-node class weights `[no_churn, churn]`.
    value: Vec<[f64; 2]>,
}

impl DecisionTree {
    pub fn new(
        children_left: Vec<i64>,
        children_right: Vec<i64>,
        feature: Vec<i64>,
        threshold: Vec<f64>,
        value: Vec<[f64; 2]>,
    ) -> Self {
        Self {
            children_left,
            children_right,
            feature,
            threshold,
            value,
        }
    }

    /// Single split on `feature`: left leaf when `x <= threshold`.
    pub fn stump(feature: usize, threshold: f64, left: [f64; 2], right: [f64; 2]) -> Self {
        Self::new(
            vec![1, LEAF, LEAF],
            vec![2, LEAF, LEAF],
            vec![feature as i64, -2, -2],
            vec![threshold, -2.0, -2.0],
            vec![[left[0] + right[0], left[1] + right[1]], left, right],
        )
    }

    pub fn num_nodes(&self) -> usize {
        self.children_left.len()
    }

    fn is_leaf(&self, node: usize) -> bool {
        self.children_left[node] == LEAF
    }

    fn check(&self, n_features: usize) -> anyhow::Result<()> {
        let n = self.children_left.len();
        if n == 0 {
            bail!("tree has no nodes");
        }
        if self.children_right.len() != n
            || self.feature.len() != n
            || self.threshold.len() != n
            || self.value.len() != n
        {
            bail!("tree arrays have different lengths");
        }

        for node in 0..n {
            let (l, r) = (self.children_left[node], self.children_right[node]);
            if l == LEAF || r == LEAF {
                if l != r {
                    bail!("node {} has exactly one child", node);
                }
                let v = self.value[node];
                if v.iter().any(|x| !x.is_finite() || *x < 0.0) || v[0] + v[1] <= 0.0 {
                    bail!("leaf {} has invalid class weights {:?}", node, v);
                }
                continue;
            }
            // Children always point forward, so traversal terminates.
            for child in [l, r] {
                if child <= node as i64 || child >= n as i64 {
                    bail!("node {} has out-of-order child {}", node, child);
                }
            }
            let f = self.feature[node];
            if f < 0 || f as usize >= n_features {
                bail!("node {} splits on feature {} (model has {})", node, f, n_features);
            }
            if self.threshold[node].is_nan() {
                bail!("node {} has NaN threshold", node);
            }
        }
        Ok(())
    }

    /// Normalized class distribution of the leaf `x` falls into.
    fn predict_proba(&self, x: &[f32]) -> [f64; 2] {
        let mut node = 0usize;
        while !self.is_leaf(node) {
            let f = self.feature[node] as usize;
            node = if (x[f] as f64) <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        let v = self.value[node];
        let total = v[0] + v[1];
        [v[0] / total, v[1] / total]
    }
}

#[derive(Deserialize)]
struct ForestJson {
    n_features: usize,
    #[serde(default)]
    feature_names: Option<Vec<String>>,
    trees: Vec<DecisionTree>,
}

/// Ensemble of decision trees averaging their class distributions.
#[derive(Debug, Clone)]
pub struct RandomForest {
    n_features: usize,
    feature_names: Option<Vec<String>>,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(n_features: usize, trees: Vec<DecisionTree>) -> Result<Self> {
        Self::build(n_features, None, trees).map_err(|e| ChurnError::Config(format!("{:#}", e)))
    }

    pub fn with_feature_names(mut self, names: Vec<String>) -> Result<Self> {
        if names.len() != self.n_features {
            return Err(ChurnError::Config(format!(
                "{} feature names for {} features",
                names.len(),
                self.n_features
            )));
        }
        self.feature_names = Some(names);
        Ok(self)
    }

    fn build(
        n_features: usize,
        feature_names: Option<Vec<String>>,
        trees: Vec<DecisionTree>,
    ) -> anyhow::Result<Self> {
        if n_features == 0 {
            bail!("forest declares zero features");
        }
        if trees.is_empty() {
            bail!("forest has no trees");
        }
        if let Some(names) = &feature_names {
            if names.len() != n_features {
                bail!("{} feature names for {} features", names.len(), n_features);
            }
        }
        for (i, tree) in trees.iter().enumerate() {
            tree.check(n_features).with_context(|| format!("tree {}", i))?;
        }
        Ok(Self {
            n_features,
            feature_names,
            trees,
        })
    }

    /// Load and validate a forest export. Any failure is `ModelUnavailable`.
    pub fn load(path: &Path) -> Result<Self> {
        Self::read(path).map_err(|e| {
            ChurnError::model_unavailable(path.display().to_string(), format!("{:#}", e))
        })
    }

    fn read(path: &Path) -> anyhow::Result<Self> {
        let txt = fs::read_to_string(path)
            .with_context(|| format!("failed to read model at {}", path.display()))?;
        let raw: ForestJson =
            serde_json::from_str(&txt).with_context(|| "failed to parse forest json")?;
        Self::build(raw.n_features, raw.feature_names, raw.trees)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn describe(&self) -> String {
        format!(
            "random forest ({} trees, {} features)",
            self.trees.len(),
            self.n_features
        )
    }

    fn input_width(&self) -> Option<usize> {
        Some(self.n_features)
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict_proba(&self, x: &[f32]) -> Result<[f64; 2]> {
        if x.len() != self.n_features {
            return Err(ChurnError::encoding(format!(
                "feature length mismatch: got {}, expected {}",
                x.len(),
                self.n_features
            )));
        }
        if x.iter().any(|v| v.is_nan()) {
            return Err(ChurnError::Inference("NaN in feature vector".to_string()));
        }

        let mut acc = [0.0f64; 2];
        for tree in &self.trees {
            let p = tree.predict_proba(x);
            acc[0] += p[0];
            acc[1] += p[1];
        }
        let n = self.trees.len() as f64;
        Ok([acc[0] / n, acc[1] / n])
    }
}
