// Aggregation Logic
// Folds the metric bundle into category scores and the weighted composite

use crate::models::{
    CategoryScores, LexicalDetail, MetricBundle, SequenceDetail, StructuralDetail, WeightConfig,
};

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of tfidf cosine, word jaccard, trigram similarity and dice.
pub fn lexical_score(metrics: &MetricBundle) -> f64 {
    mean(&[
        metrics.tfidf_cosine,
        metrics.jaccard_words,
        metrics.trigram_similarity,
        metrics.dice_coefficient,
    ])
}

pub fn structural_score(metrics: &MetricBundle) -> f64 {
    metrics.structural_similarity
}

/// Mean of the matching-block ratio and the LCS ratio.
pub fn sequence_score(metrics: &MetricBundle) -> f64 {
    mean(&[metrics.sequence_matcher, metrics.lcs_ratio])
}

pub fn category_scores(semantic: f64, metrics: &MetricBundle) -> CategoryScores {
    CategoryScores {
        semantic,
        lexical: lexical_score(metrics),
        structural: structural_score(metrics),
        sequence: sequence_score(metrics),
    }
}

/// Weighted sum of the four category scores.
pub fn composite_score(scores: &CategoryScores, weights: &WeightConfig) -> f64 {
    scores.semantic * weights.semantic
        + scores.lexical * weights.lexical
        + scores.structural * weights.structural
        + scores.sequence * weights.sequence
}

pub fn lexical_detail(metrics: &MetricBundle) -> LexicalDetail {
    LexicalDetail {
        tfidf_cosine: metrics.tfidf_cosine,
        jaccard: metrics.jaccard_words,
        trigram: metrics.trigram_similarity,
        dice: metrics.dice_coefficient,
        score: lexical_score(metrics),
    }
}

pub fn structural_detail(metrics: &MetricBundle) -> StructuralDetail {
    StructuralDetail {
        similarity: metrics.structural_similarity,
        score: structural_score(metrics),
    }
}

pub fn sequence_detail(metrics: &MetricBundle) -> SequenceDetail {
    SequenceDetail {
        sequence_matcher: metrics.sequence_matcher,
        lcs_ratio: metrics.lcs_ratio,
        score: sequence_score(metrics),
    }
}
