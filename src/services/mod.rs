// Plagiscope Core Services

pub mod text_processor;
pub mod config_store;
pub mod embeddings;
pub mod detection;
pub mod training;

#[cfg(test)]
pub(crate) mod test_support;

pub use text_processor::*;
pub use config_store::*;
pub use embeddings::*;

// Re-export detection and training entry points
pub use detection::{decide_verdict, finish, PairAnalysis, PlagiarismDetector, SimilarityMetrics};
pub use training::{
    Dataset,
    DatasetError,
    DatasetRow,
    EvaluationMetrics,
    OptimizationMetric,
    PlagiarismModelTrainer,
    TrainOptions,
    TrainingError,
    WeightRanges,
};
