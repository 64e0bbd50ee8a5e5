use serde::{Deserialize, Serialize};

/// Canonical model roster, in the order every per-model table is laid out.
pub const MODEL_ROSTER: [&str; 5] = ["SVM", "Random Forest", "AdaBoost", "Gradient Boosting", "LGBM"];

/// Models left out of the restricted (second-tier) consensus vote.
pub const RESTRICTED_EXCLUDED: [&str; 2] = ["Random Forest", "AdaBoost"];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("expected {expected} features, got {got}")]
    FeatureCount { expected: usize, got: usize },
    #[error("tree {tree} is malformed: {reason}")]
    MalformedTree { tree: usize, reason: String },
    #[error("ensemble has no trees")]
    EmptyEnsemble,
    #[error("ensemble has {trees} trees but {weights} weights")]
    WeightCount { trees: usize, weights: usize },
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),
}

pub trait FeatureScaler {
    fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError>;
}

/// Opaque predict(features) -> score contract every model kind satisfies.
pub trait Regressor {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, rows: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, ModelError> {
        if self.mean.len() != self.scale.len() {
            return Err(ModelError::FeatureCount {
                expected: self.mean.len(),
                got: self.scale.len(),
            });
        }
        rows.iter()
            .map(|row| {
                check_width(row, self.mean.len())?;
                Ok(row
                    .iter()
                    .zip(self.mean.iter().zip(&self.scale))
                    .map(|(x, (mean, scale))| {
                        // Zero-variance features are centred only.
                        let s = if *scale == 0.0 { 1.0 } else { *scale };
                        (x - mean) / s
                    })
                    .collect())
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
}

impl Regressor for LinearModel {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        rows.iter()
            .map(|row| {
                check_width(row, self.coefficients.len())?;
                Ok(self.intercept + dot(row, &self.coefficients))
            })
            .collect()
    }
}

/// Epsilon-SVR with an RBF kernel, exported as support vectors and dual
/// coefficients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelSvr {
    pub support_vectors: Vec<Vec<f64>>,
    pub dual_coefficients: Vec<f64>,
    pub gamma: f64,
    #[serde(default)]
    pub intercept: f64,
}

impl Regressor for KernelSvr {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if self.support_vectors.len() != self.dual_coefficients.len() {
            return Err(ModelError::FeatureCount {
                expected: self.support_vectors.len(),
                got: self.dual_coefficients.len(),
            });
        }
        let width = self.support_vectors.first().map(Vec::len).unwrap_or(0);
        rows.iter()
            .map(|row| {
                let mut sum = self.intercept;
                for (sv, coef) in self.support_vectors.iter().zip(&self.dual_coefficients) {
                    check_width(sv, width)?;
                    check_width(row, width)?;
                    let dist: f64 = row.iter().zip(sv).map(|(a, b)| (a - b) * (a - b)).sum();
                    sum += coef * (-self.gamma * dist).exp();
                }
                Ok(sum)
            })
            .collect()
    }
}

/// Array-encoded regression tree: node `i` splits on `feature[i]` at
/// `threshold[i]` (`x <= threshold` goes left); a node whose `left` is
/// negative is a leaf holding `value[i]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub feature: Vec<i32>,
    pub threshold: Vec<f64>,
    pub left: Vec<i32>,
    pub right: Vec<i32>,
    pub value: Vec<f64>,
}

impl RegressionTree {
    fn validate(&self, tree: usize) -> Result<(), ModelError> {
        let n = self.value.len();
        let lens = [self.feature.len(), self.threshold.len(), self.left.len(), self.right.len()];
        if n == 0 || lens.iter().any(|len| *len != n) {
            return Err(ModelError::MalformedTree {
                tree,
                reason: "node arrays differ in length".to_string(),
            });
        }
        Ok(())
    }

    fn evaluate(&self, tree: usize, row: &[f64]) -> Result<f64, ModelError> {
        let n = self.value.len();
        let mut node = 0usize;
        // A well-formed tree reaches a leaf in fewer than n steps.
        for _ in 0..n {
            if self.left[node] < 0 {
                return Ok(self.value[node]);
            }
            let feature = usize::try_from(self.feature[node]).map_err(|_| ModelError::MalformedTree {
                tree,
                reason: format!("node {node} splits on a negative feature"),
            })?;
            let x = *row.get(feature).ok_or(ModelError::FeatureCount {
                expected: feature + 1,
                got: row.len(),
            })?;
            let next = if x <= self.threshold[node] {
                self.left[node]
            } else {
                self.right[node]
            };
            node = usize::try_from(next)
                .ok()
                .filter(|idx| *idx < n)
                .ok_or_else(|| ModelError::MalformedTree {
                    tree,
                    reason: format!("node {node} points outside the tree"),
                })?;
        }
        Err(ModelError::MalformedTree {
            tree,
            reason: "cycle in node links".to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Bagged trees (random forest): plain average.
    Mean,
    /// Gradient boosting: `base_score + learning_rate * sum`.
    Boosted,
    /// AdaBoost.R2: weighted median of the tree outputs.
    WeightedMedian,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsemble {
    pub aggregation: Aggregation,
    pub trees: Vec<RegressionTree>,
    #[serde(default)]
    pub weights: Vec<f64>,
    #[serde(default)]
    pub base_score: f64,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,
}

fn default_learning_rate() -> f64 {
    1.0
}

impl Regressor for TreeEnsemble {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::EmptyEnsemble);
        }
        if self.aggregation == Aggregation::WeightedMedian && self.weights.len() != self.trees.len() {
            return Err(ModelError::WeightCount {
                trees: self.trees.len(),
                weights: self.weights.len(),
            });
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            tree.validate(idx)?;
        }

        rows.iter()
            .map(|row| {
                let outputs = self
                    .trees
                    .iter()
                    .enumerate()
                    .map(|(idx, tree)| tree.evaluate(idx, row))
                    .collect::<Result<Vec<f64>, _>>()?;
                Ok(match self.aggregation {
                    Aggregation::Mean => outputs.iter().sum::<f64>() / outputs.len() as f64,
                    Aggregation::Boosted => self.base_score + self.learning_rate * outputs.iter().sum::<f64>(),
                    Aggregation::WeightedMedian => weighted_median(&outputs, &self.weights),
                })
            })
            .collect()
    }
}

/// Lowest output whose cumulative weight reaches half the total weight.
fn weighted_median(values: &[f64], weights: &[f64]) -> f64 {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));
    let total: f64 = weights.iter().sum();
    let mut acc = 0.0;
    for idx in &order {
        acc += weights[*idx];
        if acc >= 0.5 * total {
            return values[*idx];
        }
    }
    order.last().map(|idx| values[*idx]).unwrap_or(0.0)
}

/// Serialized form of one fitted regressor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegressorArtifact {
    Linear(LinearModel),
    KernelSvr(KernelSvr),
    TreeEnsemble(TreeEnsemble),
}

impl RegressorArtifact {
    pub fn kind(&self) -> &'static str {
        match self {
            RegressorArtifact::Linear(_) => "linear",
            RegressorArtifact::KernelSvr(_) => "kernel_svr",
            RegressorArtifact::TreeEnsemble(_) => "tree_ensemble",
        }
    }
}

impl Regressor for RegressorArtifact {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let out = match self {
            RegressorArtifact::Linear(m) => m.predict(rows)?,
            RegressorArtifact::KernelSvr(m) => m.predict(rows)?,
            RegressorArtifact::TreeEnsemble(m) => m.predict(rows)?,
        };
        if out.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFinite("prediction"));
        }
        Ok(out)
    }
}

/// A regressor plus, optionally, the scaler it was fitted with. Models without
/// their own scaler use the shared one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub regressor: RegressorArtifact,
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
}

fn check_width(row: &[f64], expected: usize) -> Result<(), ModelError> {
    if row.len() != expected {
        return Err(ModelError::FeatureCount {
            expected,
            got: row.len(),
        });
    }
    Ok(())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
