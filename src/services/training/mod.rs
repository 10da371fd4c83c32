// Training Module
// Offline weight and threshold optimization:
// - dataset: labeled pair loading and stratified splitting
// - evaluation: classification metrics
// - trainer: grid search, threshold scan and the training run

pub mod dataset;
pub mod evaluation;
pub mod trainer;

pub use dataset::{Dataset, DatasetError, DatasetRow};
pub use evaluation::{EvaluationMetrics, OptimizationMetric};
pub use trainer::{PlagiarismModelTrainer, ScoredRow, TrainOptions, TrainingError, WeightRanges};
