// Plagiarism Detector
// Runs a text pair through feature extraction, metrics and embeddings, then
// applies category weights and verdict thresholds

use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::{
    AnalysisDetails, CategoryScores, ComparedFiles, Comparison, ComparisonResult, ErrorResult,
    FeaturePair, ThresholdConfig, WeightConfig,
};
use crate::services::embeddings::{EmbeddingProvider, ProviderError};
use crate::services::text_processor::{FeatureExtractor, Language, TextPreprocessor};

use super::aggregation::{category_scores, composite_score, lexical_detail, sequence_detail, structural_detail};
use super::metrics::SimilarityMetrics;
use super::semantic::{compute_semantic_similarity, compute_sentence_level_similarity, semantic_detail};
use super::verdict::decide_verdict;

pub const EMPTY_INPUT_MESSAGE: &str = "Ambos textos deben tener contenido";

/// Every weight-independent score of one text pair.
#[derive(Debug, Clone, PartialEq)]
pub struct PairAnalysis {
    pub scores: CategoryScores,
    pub details: AnalysisDetails,
}

impl PairAnalysis {
    pub fn composite(&self, weights: &WeightConfig) -> f64 {
        composite_score(&self.scores, weights)
    }
}

/// Apply a weight and threshold policy to an analysed pair.
pub fn finish(analysis: PairAnalysis, weights: &WeightConfig, thresholds: &ThresholdConfig) -> ComparisonResult {
    let final_score = analysis.composite(weights);
    let similarity_percentage = final_score * 100.0;

    ComparisonResult {
        similarity_percentage,
        final_score,
        verdict: decide_verdict(similarity_percentage, thresholds),
        breakdown: analysis.scores,
        weights_used: *weights,
        thresholds_used: *thresholds,
        details: analysis.details,
        files: None,
    }
}

/// Pairwise plagiarism scorer.
///
/// Configuration is fixed per value: `with_weights` / `with_thresholds`
/// return a new detector, so clones can be handed to concurrent callers.
#[derive(Clone)]
pub struct PlagiarismDetector {
    language: Language,
    preprocessor: Arc<dyn FeatureExtractor>,
    metrics: SimilarityMetrics,
    embedder: Arc<dyn EmbeddingProvider>,
    weights: WeightConfig,
    thresholds: ThresholdConfig,
}

impl PlagiarismDetector {
    pub fn new(language: Language, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            language,
            preprocessor: Arc::new(TextPreprocessor::new(language, false)),
            metrics: SimilarityMetrics::new(),
            embedder,
            weights: WeightConfig::default(),
            thresholds: ThresholdConfig::default(),
        }
    }

    pub fn with_weights(self, weights: WeightConfig) -> Self {
        Self { weights, ..self }
    }

    pub fn with_thresholds(self, thresholds: ThresholdConfig) -> Self {
        Self { thresholds, ..self }
    }

    pub fn with_preprocessor(self, preprocessor: Arc<dyn FeatureExtractor>) -> Self {
        Self { preprocessor, ..self }
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn weights(&self) -> &WeightConfig {
        &self.weights
    }

    pub fn thresholds(&self) -> &ThresholdConfig {
        &self.thresholds
    }

    /// Score a pair without applying weights.
    /// `Ok(None)` when either text is empty or whitespace-only.
    pub fn analyze(&self, text1: &str, text2: &str) -> Result<Option<PairAnalysis>, ProviderError> {
        if text1.trim().is_empty() || text2.trim().is_empty() {
            return Ok(None);
        }

        let pre = self.preprocessor.as_ref();
        let norm1 = pre.normalize(text1);
        let norm2 = pre.normalize(text2);
        let tokens1 = pre.tokenize_words(&norm1);
        let tokens2 = pre.tokenize_words(&norm2);
        let features1 = pre.extract_features(text1);
        let features2 = pre.extract_features(text2);
        let sentences1 = pre.tokenize_sentences(text1);
        let sentences2 = pre.tokenize_sentences(text2);

        let overall = compute_semantic_similarity(self.embedder.as_ref(), &norm1, &norm2)?;
        let sentence_sim = compute_sentence_level_similarity(self.embedder.as_ref(), &sentences1, &sentences2)?;
        let semantic = semantic_detail(overall, sentence_sim);

        let metrics = self
            .metrics
            .compute_all_metrics(&norm1, &norm2, &tokens1, &tokens2, &features1, &features2);
        let scores = category_scores(semantic.score, &metrics);

        debug!(
            semantic = scores.semantic,
            lexical = scores.lexical,
            structural = scores.structural,
            sequence = scores.sequence,
            sentences1 = sentences1.len(),
            sentences2 = sentences2.len(),
            "[DETECTOR] pair analysed"
        );

        Ok(Some(PairAnalysis {
            scores,
            details: AnalysisDetails {
                semantic,
                lexical: lexical_detail(&metrics),
                structural: structural_detail(&metrics),
                sequence: sequence_detail(&metrics),
                detailed_metrics: metrics,
                features: FeaturePair {
                    text1: features1,
                    text2: features2,
                },
            },
        }))
    }

    /// Compare two texts with this detector's weights and thresholds.
    ///
    /// Empty input is reported as a `Comparison::Failed` value; only an
    /// embedding failure is an `Err`.
    pub fn compare(&self, text1: &str, text2: &str) -> Result<Comparison, ProviderError> {
        let Some(analysis) = self.analyze(text1, text2)? else {
            warn!("[DETECTOR] Rejected comparison with empty input");
            return Ok(Comparison::Failed(ErrorResult::input(EMPTY_INPUT_MESSAGE)));
        };

        let result = finish(analysis, &self.weights, &self.thresholds);
        info!(
            "[DETECTOR] Similarity {:.2}% -> {}",
            result.similarity_percentage, result.verdict
        );
        Ok(Comparison::Completed(Box::new(result)))
    }

    /// Compare two UTF-8 files. Unreadable files become a `Failed` value
    /// naming which file and path failed.
    pub fn compare_files(&self, path1: &Path, path2: &Path) -> Result<Comparison, ProviderError> {
        let mut texts = Vec::with_capacity(2);
        for (idx, path) in [path1, path2].into_iter().enumerate() {
            match fs::read_to_string(path) {
                Ok(text) => texts.push(text),
                Err(e) => {
                    warn!("[DETECTOR] Failed to read {}: {}", path.display(), e);
                    return Ok(Comparison::Failed(ErrorResult::resource(
                        format!("Error al leer archivo {}: {}", idx + 1, e),
                        path.to_path_buf(),
                    )));
                }
            }
        }

        info!("[DETECTOR] Comparing {} and {}", path1.display(), path2.display());
        let comparison = self.compare(&texts[0], &texts[1])?;

        Ok(match comparison {
            Comparison::Completed(mut result) => {
                result.files = Some(ComparedFiles {
                    file1: display_name(path1),
                    file2: display_name(path2),
                });
                Comparison::Completed(result)
            }
            failed => failed,
        })
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
