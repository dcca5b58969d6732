//! Shapes scores into the result handed to the presentation layer.

use serde::Serialize;

use crate::model::ChurnLabel;

/// One scored customer. Percentages keep full precision; rounding happens
/// only in the display helpers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub predicted_label: ChurnLabel,
    pub churn_percent: f64,
    pub no_churn_percent: f64,
    /// `[p_no_churn, p_churn]` as returned by the classifier.
    pub probability: [f64; 2],
}

impl PredictionResult {
    pub fn churn_probability(&self) -> f64 {
        self.probability[ChurnLabel::Churn.index()]
    }

    pub fn no_churn_probability(&self) -> f64 {
        self.probability[ChurnLabel::NoChurn.index()]
    }

    /// Headline shown to the user, e.g.
    /// `Percentage of this customer leaving is: 30%`.
    pub fn headline(&self) -> String {
        format!(
            "Percentage of this customer leaving is: {:.0}%",
            self.churn_percent
        )
    }
}

/// Convert a label and `[p_no_churn, p_churn]` to a [`PredictionResult`].
pub fn format(label: ChurnLabel, probability: [f64; 2]) -> PredictionResult {
    PredictionResult {
        predicted_label: label,
        churn_percent: probability[1] * 100.0,
        no_churn_percent: probability[0] * 100.0,
        probability,
    }
}
