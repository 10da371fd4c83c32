// Evaluation Metrics
// Binary classification metrics over composite scores

use serde::{Deserialize, Serialize};

use crate::models::{ConfusionMatrix, TestMetrics};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizationMetric {
    Accuracy,
    Precision,
    Recall,
    #[default]
    F1Score,
}

impl OptimizationMetric {
    pub fn from_str(val: &str) -> Self {
        match val.trim().to_lowercase().as_str() {
            "accuracy" => Self::Accuracy,
            "precision" => Self::Precision,
            "recall" => Self::Recall,
            _ => Self::F1Score,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accuracy => "accuracy",
            Self::Precision => "precision",
            Self::Recall => "recall",
            Self::F1Score => "f1_score",
        }
    }
}

/// Metrics for one threshold over the rows that produced a score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub scores: Vec<f64>,
    pub predictions: Vec<bool>,
    pub true_labels: Vec<bool>,
    pub evaluated: usize,
    pub skipped: usize,
    pub threshold_used: f64,
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl EvaluationMetrics {
    /// `scores[i]` is `None` for rows that could not be scored; those are
    /// counted as skipped. A row is predicted positive when `score >= threshold`.
    pub fn from_scores(scores: &[Option<f64>], labels: &[bool], threshold: f64) -> Self {
        let mut matrix = ConfusionMatrix::default();
        let mut kept_scores = Vec::new();
        let mut predictions = Vec::new();
        let mut true_labels = Vec::new();
        let mut skipped = 0;

        for (score, label) in scores.iter().zip(labels) {
            let Some(score) = score else {
                skipped += 1;
                continue;
            };
            let predicted = *score >= threshold;
            matrix.record(*label, predicted);
            kept_scores.push(*score);
            predictions.push(predicted);
            true_labels.push(*label);
        }

        let tp = matrix.true_positives();
        let precision = ratio(tp, tp + matrix.false_positives());
        let recall = ratio(tp, tp + matrix.false_negatives());
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            accuracy: ratio(tp + matrix.true_negatives(), matrix.total()),
            precision,
            recall,
            f1_score,
            confusion_matrix: matrix,
            evaluated: kept_scores.len(),
            scores: kept_scores,
            predictions,
            true_labels,
            skipped,
            threshold_used: threshold,
        }
    }

    pub fn get(&self, metric: OptimizationMetric) -> f64 {
        match metric {
            OptimizationMetric::Accuracy => self.accuracy,
            OptimizationMetric::Precision => self.precision,
            OptimizationMetric::Recall => self.recall,
            OptimizationMetric::F1Score => self.f1_score,
        }
    }

    pub fn test_metrics(&self) -> TestMetrics {
        TestMetrics {
            accuracy: self.accuracy,
            precision: self.precision,
            recall: self.recall,
            f1_score: self.f1_score,
            confusion_matrix: self.confusion_matrix,
        }
    }
}
