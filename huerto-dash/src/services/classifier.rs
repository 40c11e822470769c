//! Day/night classifier inference
//!
//! Training happens offline. The exported artifact is a JSON document:
//!
//! ```json
//! {
//!   "feature_names": ["Temperatura", "Humedad", "Conductibilidad"],
//!   "imputer_means": [18.2, 41.0, 310.5],
//!   "scaler": { "mean": [18.2, 41.0, 310.5], "scale": [4.1, 9.7, 88.0] },
//!   "head": { "kind": "logistic", "coefficients": [1.2, -0.4, 0.01], "intercept": -0.3 }
//! }
//! ```
//!
//! or, for a forest head,
//! `{ "kind": "random_forest", "trees": [ { "nodes": [ ... ] } ] }` where each
//! node is either `{ "feature", "threshold", "left", "right" }` or a leaf
//! `{ "value": [night_weight, day_weight] }`. Node 0 is the root and a split
//! sends `x[feature] <= threshold` left.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::models::{DayState, FeatureRow, FEATURE_COLUMNS};

/// Predicts a day/night label from soil readings
pub trait DayNightClassifier: Send + Sync {
    /// Short description for diagnostics
    fn describe(&self) -> String;

    /// One label per row, in input order
    fn predict(&self, rows: &[FeatureRow]) -> Vec<DayState>;
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to read model artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse model artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Model expects features {found:?}, dataset provides {expected:?}")]
    FeatureMismatch {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("Invalid model artifact: {0}")]
    Invalid(String),
}

/// Column-wise standardization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: [f64; 2],
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Class probabilities `[night, day]` of the leaf `row` lands in
    fn leaf_probabilities(&self, row: &FeatureRow) -> [f64; 2] {
        let mut index = 0;
        // Validation guarantees indices are in bounds and the walk terminates
        for _ in 0..=self.nodes.len() {
            match &self.nodes[index] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if row[*feature] <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { value } => {
                    let total = value[0] + value[1];
                    return [value[0] / total, value[1] / total];
                }
            }
        }
        [1.0, 0.0]
    }

    fn validate(&self, tree: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::Invalid(format!("tree {} has no nodes", tree)));
        }
        for (i, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Leaf { value } = node {
                if value.iter().any(|v| *v < 0.0 || !v.is_finite()) || value[0] + value[1] <= 0.0 {
                    return Err(ModelError::Invalid(format!(
                        "tree {} leaf {} has value {:?}",
                        tree, i, value
                    )));
                }
            }
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= FEATURE_COLUMNS.len() {
                    return Err(ModelError::Invalid(format!(
                        "tree {} node {} splits on feature {}",
                        tree, i, feature
                    )));
                }
                // Children must point forward so every walk reaches a leaf
                if *left <= i || *right <= i || *left >= self.nodes.len() || *right >= self.nodes.len() {
                    return Err(ModelError::Invalid(format!(
                        "tree {} node {} has children {}/{}",
                        tree, i, left, right
                    )));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelHead {
    Logistic { coefficients: Vec<f64>, intercept: f64 },
    RandomForest { trees: Vec<DecisionTree> },
}

/// A trained model as exported by the offline training job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub imputer_means: Option<Vec<f64>>,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
    pub head: ModelHead,
}

impl ModelArtifact {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let text = std::fs::read_to_string(path)?;
        let artifact = Self::from_json(&text)?;
        info!(path = %path.display(), model = %artifact.describe(), "Loaded classifier artifact");
        Ok(artifact)
    }

    /// Load when the file exists; `Ok(None)` otherwise
    pub fn load_optional(path: &Path) -> Result<Option<Self>, ModelError> {
        if !path.exists() {
            return Ok(None);
        }
        Self::load(path).map(Some)
    }

    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let artifact: ModelArtifact = serde_json::from_str(text)?;
        artifact.validate()?;
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_COLUMNS) {
            return Err(ModelError::FeatureMismatch {
                expected: FEATURE_COLUMNS.iter().map(|s| s.to_string()).collect(),
                found: self.feature_names.clone(),
            });
        }

        let width = FEATURE_COLUMNS.len();
        let check_width = |name: &str, values: &[f64]| {
            if values.len() == width {
                Ok(())
            } else {
                Err(ModelError::Invalid(format!(
                    "{} has {} values, expected {}",
                    name,
                    values.len(),
                    width
                )))
            }
        };

        if let Some(means) = &self.imputer_means {
            check_width("imputer_means", means)?;
        }
        if let Some(scaler) = &self.scaler {
            check_width("scaler.mean", &scaler.mean)?;
            check_width("scaler.scale", &scaler.scale)?;
            if scaler.scale.iter().any(|s| *s == 0.0 || !s.is_finite()) {
                return Err(ModelError::Invalid("scaler.scale must be finite and non-zero".to_string()));
            }
        }

        match &self.head {
            ModelHead::Logistic { coefficients, .. } => check_width("coefficients", coefficients)?,
            ModelHead::RandomForest { trees } => {
                if trees.is_empty() {
                    return Err(ModelError::Invalid("random forest has no trees".to_string()));
                }
                for (i, tree) in trees.iter().enumerate() {
                    tree.validate(i)?;
                }
            }
        }

        Ok(())
    }

    fn preprocess(&self, row: &FeatureRow) -> FeatureRow {
        let mut x = *row;
        if let Some(means) = &self.imputer_means {
            for (value, mean) in x.iter_mut().zip(means) {
                if value.is_nan() {
                    *value = *mean;
                }
            }
        }
        if let Some(scaler) = &self.scaler {
            for ((value, mean), scale) in x.iter_mut().zip(&scaler.mean).zip(&scaler.scale) {
                *value = (*value - mean) / scale;
            }
        }
        x
    }

    fn predict_one(&self, row: &FeatureRow) -> DayState {
        let x = self.preprocess(row);
        match &self.head {
            ModelHead::Logistic {
                coefficients,
                intercept,
            } => {
                let decision: f64 =
                    intercept + coefficients.iter().zip(&x).map(|(w, v)| w * v).sum::<f64>();
                if decision > 0.0 {
                    DayState::Day
                } else {
                    DayState::Night
                }
            }
            ModelHead::RandomForest { trees } => {
                // Mean of per-tree leaf probabilities; a tie goes to night
                let (night, day) = trees.iter().fold((0.0, 0.0), |(night, day), tree| {
                    let [p_night, p_day] = tree.leaf_probabilities(&x);
                    (night + p_night, day + p_day)
                });
                if day > night {
                    DayState::Day
                } else {
                    DayState::Night
                }
            }
        }
    }
}

impl DayNightClassifier for ModelArtifact {
    fn describe(&self) -> String {
        match &self.head {
            ModelHead::Logistic { .. } => "logistic regression".to_string(),
            ModelHead::RandomForest { trees } => format!("random forest ({} trees)", trees.len()),
        }
    }

    fn predict(&self, rows: &[FeatureRow]) -> Vec<DayState> {
        rows.iter().map(|row| self.predict_one(row)).collect()
    }
}

/// Scores of predictions against known labels; Day is the positive class
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub f1: f64,
}

impl ClassificationMetrics {
    /// `None` when the inputs are empty or of different lengths
    pub fn evaluate(truth: &[DayState], predicted: &[DayState]) -> Option<Self> {
        if truth.is_empty() || truth.len() != predicted.len() {
            return None;
        }

        let (mut tp, mut fp, mut fn_, mut correct) = (0usize, 0usize, 0usize, 0usize);
        for (t, p) in truth.iter().zip(predicted) {
            match (t, p) {
                (DayState::Day, DayState::Day) => tp += 1,
                (DayState::Night, DayState::Day) => fp += 1,
                (DayState::Day, DayState::Night) => fn_ += 1,
                (DayState::Night, DayState::Night) => {}
            }
            if t == p {
                correct += 1;
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        };

        Some(Self {
            accuracy: ratio(correct, truth.len()),
            precision,
            f1,
        })
    }
}
