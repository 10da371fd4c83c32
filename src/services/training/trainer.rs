// Model Trainer
// Tunes category weights and the decision threshold against a labeled dataset

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{CategoryScores, ModelConfig, TestMetrics, TrainingRun, WeightConfig};
use crate::services::config_store::{self, ConfigError};
use crate::services::detection::{composite_score, PlagiarismDetector};
use crate::services::embeddings::ProviderError;

use super::dataset::{Dataset, DatasetError};
use super::evaluation::{EvaluationMetrics, OptimizationMetric};

/// Seed for the train/test split.
pub const SPLIT_SEED: u64 = 42;
/// Threshold used to score weight candidates during grid search.
pub const GRID_SEARCH_THRESHOLD: f64 = 0.5;
const DEFAULT_THRESHOLD: f64 = 0.5;

#[derive(Error, Debug)]
pub enum TrainingError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("Embedding provider failed: {0}")]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Candidate values per category for the weight grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightRanges {
    pub semantic: Vec<f64>,
    pub lexical: Vec<f64>,
    pub structural: Vec<f64>,
    pub sequence: Vec<f64>,
}

impl Default for WeightRanges {
    fn default() -> Self {
        Self {
            semantic: vec![0.3, 0.4, 0.5],
            lexical: vec![0.2, 0.3, 0.4],
            structural: vec![0.1, 0.2, 0.3],
            sequence: vec![0.05, 0.1, 0.15],
        }
    }
}

impl WeightRanges {
    /// Cartesian product in nested order (sequence varies fastest), each
    /// candidate normalized to sum 1. Invalid tuples are dropped.
    pub fn candidates(&self) -> Vec<WeightConfig> {
        let mut out = Vec::new();
        for &sem in &self.semantic {
            for &lex in &self.lexical {
                for &st in &self.structural {
                    for &seq in &self.sequence {
                        if let Some(w) = WeightConfig::normalized(sem, lex, st, seq) {
                            out.push(w);
                        }
                    }
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOptions {
    pub optimize_weights: bool,
    pub optimize_threshold: bool,
    pub test_fraction: f64,
}

impl Default for TrainOptions {
    fn default() -> Self {
        Self {
            optimize_weights: true,
            optimize_threshold: true,
            test_fraction: 0.2,
        }
    }
}

/// Category scores of one dataset row; `None` when the row could not be scored.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRow {
    pub scores: Option<CategoryScores>,
    pub label: bool,
}

/// Evaluate cached rows under one weight configuration.
pub fn evaluate_scored(rows: &[ScoredRow], weights: &WeightConfig, threshold: f64) -> EvaluationMetrics {
    let scores: Vec<Option<f64>> = rows
        .iter()
        .map(|r| r.scores.map(|s| composite_score(&s, weights)))
        .collect();
    let labels: Vec<bool> = rows.iter().map(|r| r.label).collect();
    EvaluationMetrics::from_scores(&scores, &labels, threshold)
}

/// Thresholds 0.10, 0.15, ..., 0.95.
pub fn threshold_grid() -> impl Iterator<Item = f64> {
    (2..=19).map(|i| (i * 5) as f64 / 100.0)
}

/// Scan the threshold grid; only strict improvements replace the best, so
/// ties keep the lowest threshold and an all-zero metric keeps 0.5.
pub fn optimize_threshold_scored(
    rows: &[ScoredRow],
    weights: &WeightConfig,
    metric: OptimizationMetric,
) -> (f64, EvaluationMetrics) {
    let mut best_threshold = DEFAULT_THRESHOLD;
    let mut best_score = 0.0;
    let mut best_metrics = EvaluationMetrics::default();

    for threshold in threshold_grid() {
        let metrics = evaluate_scored(rows, weights, threshold);
        let score = metrics.get(metric);
        if score > best_score {
            best_score = score;
            best_threshold = threshold;
            best_metrics = metrics;
        }
    }

    (best_threshold, best_metrics)
}

/// Evaluate every candidate at the fixed grid-search threshold and keep the
/// first one with the highest F1. `None` when no candidate beats F1 = 0.
pub fn grid_search_scored(rows: &[ScoredRow], ranges: &WeightRanges) -> Option<(WeightConfig, f64)> {
    let candidates = ranges.candidates();
    let f1_scores: Vec<f64> = candidates
        .par_iter()
        .map(|w| evaluate_scored(rows, w, GRID_SEARCH_THRESHOLD).f1_score)
        .collect();

    let mut best: Option<(WeightConfig, f64)> = None;
    for (weights, f1) in candidates.into_iter().zip(f1_scores) {
        let best_f1 = best.map(|(_, f)| f).unwrap_or(0.0);
        if f1 > best_f1 {
            best = Some((weights, f1));
        }
    }
    best
}

/// Offline optimizer around a detector it owns.
///
/// Rows are analysed once; every weight or threshold candidate is then
/// scored from the cached category scores, so candidates never share a
/// mutable detector.
pub struct PlagiarismModelTrainer {
    detector: PlagiarismDetector,
}

impl PlagiarismModelTrainer {
    pub fn new(detector: PlagiarismDetector) -> Self {
        Self { detector }
    }

    pub fn detector(&self) -> &PlagiarismDetector {
        &self.detector
    }

    pub fn into_detector(self) -> PlagiarismDetector {
        self.detector
    }

    /// Analyse every row in parallel. Rows with empty text are kept as unscored.
    pub fn score_rows(&self, dataset: &Dataset) -> Result<Vec<ScoredRow>, ProviderError> {
        let start = Instant::now();
        let rows = dataset
            .rows()
            .par_iter()
            .map(|row| -> Result<ScoredRow, ProviderError> {
                let analysis = self.detector.analyze(&row.text1, &row.text2)?;
                Ok(ScoredRow {
                    scores: analysis.map(|a| a.scores),
                    label: row.is_plagiarism,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let skipped = rows.iter().filter(|r| r.scores.is_none()).count();
        if skipped > 0 {
            warn!("[TRAINER] {} of {} rows could not be scored", skipped, rows.len());
        }
        debug!(
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "[TRAINER] rows scored"
        );
        Ok(rows)
    }

    /// Metrics of the current weights at `threshold`.
    pub fn evaluate(&self, dataset: &Dataset, threshold: f64) -> Result<EvaluationMetrics, TrainingError> {
        let rows = self.score_rows(dataset)?;
        Ok(evaluate_scored(&rows, self.detector.weights(), threshold))
    }

    /// Pick the threshold maximizing `metric` and install it as the moderate tier.
    pub fn optimize_threshold(
        &mut self,
        dataset: &Dataset,
        metric: OptimizationMetric,
    ) -> Result<(f64, EvaluationMetrics), TrainingError> {
        let rows = self.score_rows(dataset)?;
        Ok(self.apply_threshold_search(&rows, metric))
    }

    /// Pick the best weight candidate and install it on the detector. Keeps the
    /// current weights when no candidate reaches a positive F1.
    pub fn grid_search_weights(
        &mut self,
        dataset: &Dataset,
        ranges: &WeightRanges,
    ) -> Result<(WeightConfig, f64), TrainingError> {
        let rows = self.score_rows(dataset)?;
        Ok(self.apply_grid_search(&rows, ranges))
    }

    fn apply_threshold_search(&mut self, rows: &[ScoredRow], metric: OptimizationMetric) -> (f64, EvaluationMetrics) {
        let (threshold, metrics) = optimize_threshold_scored(rows, self.detector.weights(), metric);
        info!(
            "[TRAINER] Best threshold {:.2} ({}: {:.4})",
            threshold,
            metric.as_str(),
            metrics.get(metric)
        );

        let thresholds = self.detector.thresholds().with_moderate(threshold);
        self.detector = self.detector.clone().with_thresholds(thresholds);
        (threshold, metrics)
    }

    fn apply_grid_search(&mut self, rows: &[ScoredRow], ranges: &WeightRanges) -> (WeightConfig, f64) {
        let (weights, f1) = match grid_search_scored(rows, ranges) {
            Some(best) => best,
            None => {
                warn!("[TRAINER] No weight candidate reached a positive F1; keeping current weights");
                (*self.detector.weights(), 0.0)
            }
        };
        info!(
            semantic = weights.semantic,
            lexical = weights.lexical,
            structural = weights.structural,
            sequence = weights.sequence,
            "[TRAINER] Best weights (F1: {:.4})",
            f1
        );

        self.detector = self.detector.clone().with_weights(weights);
        (weights, f1)
    }

    /// Split, optionally tune weights then threshold on the train split, and
    /// report metrics on the held-out split.
    pub fn train(&mut self, dataset: &Dataset, options: TrainOptions) -> Result<TrainingRun, TrainingError> {
        let run_id = Uuid::new_v4().to_string();
        let (train, test) = dataset.stratified_split(options.test_fraction, SPLIT_SEED)?;
        info!(
            "[TRAINER] Run {} started. Train: {}, Test: {}",
            run_id,
            train.len(),
            test.len()
        );

        let train_rows = self.score_rows(&train)?;

        if options.optimize_weights {
            info!("[TRAINER] Phase 1: weight optimization");
            self.apply_grid_search(&train_rows, &WeightRanges::default());
        }

        if options.optimize_threshold {
            info!("[TRAINER] Phase 2: threshold optimization");
            self.apply_threshold_search(&train_rows, OptimizationMetric::F1Score);
        }

        let threshold = self.detector.thresholds().moderate_plagiarism;
        let test_rows = self.score_rows(&test)?;
        let test_metrics = evaluate_scored(&test_rows, self.detector.weights(), threshold);

        info!(
            "[TRAINER] Test accuracy {:.4}, precision {:.4}, recall {:.4}, F1 {:.4}",
            test_metrics.accuracy, test_metrics.precision, test_metrics.recall, test_metrics.f1_score
        );

        Ok(TrainingRun {
            run_id,
            train_size: train.len(),
            test_size: test.len(),
            optimized_weights: *self.detector.weights(),
            optimized_threshold: threshold,
            thresholds: *self.detector.thresholds(),
            test_metrics: test_metrics.test_metrics(),
            test_evaluated: test_metrics.evaluated,
            test_skipped: test_metrics.skipped,
            completed_at: chrono::Utc::now().to_rfc3339(),
        })
    }

    pub fn model_config(&self, test_metrics: TestMetrics) -> ModelConfig {
        ModelConfig {
            weights: *self.detector.weights(),
            threshold: self.detector.thresholds().moderate_plagiarism,
            test_metrics,
            language: self.detector.language().as_str().to_string(),
        }
    }

    pub fn save_model_config(&self, path: &Path, run: &TrainingRun) -> Result<(), TrainingError> {
        let config = ModelConfig {
            weights: run.optimized_weights,
            threshold: run.optimized_threshold,
            test_metrics: run.test_metrics.clone(),
            language: self.detector.language().as_str().to_string(),
        };
        config_store::save_model_config(path, &config)?;
        Ok(())
    }

    /// Restore weights and the moderate threshold; other tiers are only
    /// moved as far as needed to stay ordered.
    pub fn load_model_config(&mut self, path: &Path) -> Result<ModelConfig, TrainingError> {
        let config = config_store::load_model_config(path)?;
        let thresholds = self.detector.thresholds().with_moderate(config.threshold);
        self.detector = self
            .detector
            .clone()
            .with_weights(config.weights)
            .with_thresholds(thresholds);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ThresholdConfig;
    use crate::services::test_support::{
        ConceptEmbedder, FailingEmbedder, AI_TEXT, CLIMATE_TEXT, ORIGINAL, PARAPHRASE,
    };
    use crate::services::text_processor::Language;
    use crate::services::training::DatasetRow;
    use std::sync::Arc;

    fn trainer() -> PlagiarismModelTrainer {
        PlagiarismModelTrainer::new(PlagiarismDetector::new(
            Language::Spanish,
            Arc::new(ConceptEmbedder::new()),
        ))
    }

    fn positives() -> Vec<DatasetRow> {
        vec![
            DatasetRow::new(ORIGINAL, ORIGINAL, true),
            DatasetRow::new(ORIGINAL, PARAPHRASE, true),
            DatasetRow::new(PARAPHRASE, ORIGINAL, true),
            DatasetRow::new(AI_TEXT, AI_TEXT, true),
            DatasetRow::new(CLIMATE_TEXT, CLIMATE_TEXT, true),
        ]
    }

    fn negatives() -> Vec<DatasetRow> {
        vec![
            DatasetRow::new(AI_TEXT, CLIMATE_TEXT, false),
            DatasetRow::new(CLIMATE_TEXT, AI_TEXT, false),
            DatasetRow::new(ORIGINAL, CLIMATE_TEXT, false),
            DatasetRow::new(AI_TEXT, ORIGINAL, false),
            DatasetRow::new(PARAPHRASE, AI_TEXT, false),
        ]
    }

    fn balanced() -> Dataset {
        Dataset::new(positives().into_iter().chain(negatives()).collect())
    }

    fn row(scores: [f64; 4], label: bool) -> ScoredRow {
        ScoredRow {
            scores: Some(CategoryScores {
                semantic: scores[0],
                lexical: scores[1],
                structural: scores[2],
                sequence: scores[3],
            }),
            label,
        }
    }

    #[test]
    fn test_threshold_grid() {
        let grid: Vec<f64> = threshold_grid().collect();
        assert_eq!(grid.len(), 18);
        assert_eq!(grid[0], 0.10);
        assert_eq!(grid[1], 0.15);
        assert_eq!(grid[17], 0.95);
    }

    #[test]
    fn test_threshold_ties_keep_lowest() {
        // composite = 0.6 / 0.2 with uniform scores; any threshold in (0.2, 0.6] is perfect
        let rows = vec![row([0.6; 4], true), row([0.2; 4], false)];
        let (threshold, metrics) =
            optimize_threshold_scored(&rows, &WeightConfig::default(), OptimizationMetric::F1Score);
        assert!((threshold - 0.25).abs() < 1e-12);
        assert_eq!(metrics.f1_score, 1.0);
    }

    #[test]
    fn test_uniform_labels_do_not_fail() {
        let mut t = trainer();
        let all_negative = Dataset::new(negatives());
        let (threshold, metrics) = t.optimize_threshold(&all_negative, OptimizationMetric::F1Score).unwrap();
        assert_eq!(threshold, 0.5);
        assert_eq!(metrics.f1_score, 0.0);

        // every row predicted positive, none labelled positive
        let m = t.evaluate(&all_negative, 0.0).unwrap();
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.recall, 0.0);
        assert_eq!(m.f1_score, 0.0);
        assert_eq!(m.confusion_matrix.false_positives(), 5);

        // nothing predicted positive
        let m = t.evaluate(&Dataset::new(positives()), 1.01).unwrap();
        assert_eq!(m.precision, 0.0);
        assert_eq!(m.f1_score, 0.0);
    }

    #[test]
    fn test_optimize_threshold_separates_classes() {
        let mut t = trainer();
        let (threshold, metrics) = t.optimize_threshold(&balanced(), OptimizationMetric::F1Score).unwrap();
        assert_eq!(metrics.f1_score, 1.0);
        assert!(threshold > 0.1 && threshold <= 0.7, "{}", threshold);
        assert_eq!(t.detector().thresholds().moderate_plagiarism, threshold);
        assert!(t.detector().thresholds().is_monotonic());
    }

    #[test]
    fn test_grid_search_first_found_wins() {
        // every candidate separates these rows perfectly
        let rows = vec![row([1.0; 4], true), row([0.0; 4], false)];
        let (weights, f1) = grid_search_scored(&rows, &WeightRanges::default()).unwrap();
        assert_eq!(f1, 1.0);
        assert_eq!(weights, WeightRanges::default().candidates()[0]);
        assert!((weights.sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_grid_search_keeps_weights_without_signal() {
        let mut t = trainer();
        let custom = WeightConfig::normalized(0.7, 0.1, 0.1, 0.1).unwrap();
        t.detector = t.detector.clone().with_weights(custom);
        let (weights, f1) = t.grid_search_weights(&Dataset::new(negatives()), &WeightRanges::default()).unwrap();
        assert_eq!(f1, 0.0);
        assert_eq!(weights, custom);
    }

    #[test]
    fn test_empty_rows_are_skipped() {
        let t = trainer();
        let mut rows = positives();
        rows.push(DatasetRow::new("", ORIGINAL, true));
        let m = t.evaluate(&Dataset::new(rows), 0.5).unwrap();
        assert_eq!(m.skipped, 1);
        assert_eq!(m.evaluated, 5);
    }

    #[test]
    fn test_train_produces_consistent_run() {
        let mut t = trainer();
        let run = t.train(&balanced(), TrainOptions::default()).unwrap();

        assert_eq!(run.train_size, 8);
        assert_eq!(run.test_size, 2);
        assert!((run.optimized_weights.sum() - 1.0).abs() < 1e-9);
        assert_eq!(run.test_metrics.confusion_matrix.total(), 2);
        assert_eq!(run.test_evaluated, 2);
        assert_eq!(run.test_skipped, 0);
        assert!(!run.run_id.is_empty());
        assert!(run.thresholds.is_monotonic());
        assert_eq!(run.thresholds.moderate_plagiarism, run.optimized_threshold);
        assert_eq!(*t.detector().weights(), run.optimized_weights);
    }

    #[test]
    fn test_train_without_optimization_keeps_defaults() {
        let mut t = trainer();
        let options = TrainOptions {
            optimize_weights: false,
            optimize_threshold: false,
            test_fraction: 0.4,
        };
        let run = t.train(&balanced(), options).unwrap();
        assert_eq!(run.optimized_weights, WeightConfig::default());
        assert_eq!(run.optimized_threshold, 0.5);
        assert_eq!(run.thresholds, ThresholdConfig::default());
        assert_eq!(run.test_size, 4);
    }

    #[test]
    fn test_train_rejects_bad_fraction() {
        let err = trainer()
            .train(&balanced(), TrainOptions { test_fraction: 0.0, ..Default::default() })
            .unwrap_err();
        assert!(matches!(err, TrainingError::Dataset(DatasetError::InvalidTestFraction(_))));
    }

    #[test]
    fn test_provider_failure_aborts_training() {
        let mut t = PlagiarismModelTrainer::new(PlagiarismDetector::new(Language::Spanish, Arc::new(FailingEmbedder)));
        let err = t.train(&balanced(), TrainOptions::default()).unwrap_err();
        assert!(matches!(err, TrainingError::Provider(_)));
    }

    #[test]
    fn test_save_and_load_model_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("optimized_config.json");

        let mut source = trainer();
        let run = source.train(&balanced(), TrainOptions::default()).unwrap();
        source.save_model_config(&path, &run).unwrap();

        let mut target = trainer();
        let loaded = target.load_model_config(&path).unwrap();
        assert_eq!(loaded.language, "spanish");
        assert!((target.detector().weights().sum() - 1.0).abs() < 1e-9);
        assert!((target.detector().weights().semantic - run.optimized_weights.semantic).abs() < 1e-9);
        assert_eq!(target.detector().thresholds().moderate_plagiarism, run.optimized_threshold);
        assert!(target.detector().thresholds().is_monotonic());
    }

    #[test]
    fn test_load_clamps_out_of_order_threshold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let t0 = trainer();
        let mut config = t0.model_config(TestMetrics::default());
        config.threshold = 0.9;
        config_store::save_model_config(&path, &config).unwrap();

        let mut t = trainer();
        t.load_model_config(&path).unwrap();
        let thresholds = t.detector().thresholds();
        assert_eq!(thresholds.moderate_plagiarism, 0.9);
        assert_eq!(thresholds.high_plagiarism, 0.9);
        assert_eq!(thresholds.low_plagiarism, 0.3);
    }
}
