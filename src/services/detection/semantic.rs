// Semantic Similarity
// Embedding-based document and sentence scores

use crate::models::SemanticDetail;
use crate::services::embeddings::{cosine_similarity, EmbeddingProvider, ProviderError};

pub const DOCUMENT_WEIGHT: f64 = 0.6;
pub const SENTENCE_WEIGHT: f64 = 0.4;
/// A source sentence counts as matched when its best similarity exceeds this.
pub const SENTENCE_MATCH_THRESHOLD: f64 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SentenceSimilarity {
    pub avg_similarity: f64,
    pub max_similarity: f64,
    pub matched_sentences: usize,
    pub match_ratio: f64,
}

/// Whole-document embedding cosine, clamped to [0, 1].
pub fn compute_semantic_similarity(
    embedder: &dyn EmbeddingProvider,
    text1: &str,
    text2: &str,
) -> Result<f64, ProviderError> {
    let v1 = embedder.encode(text1)?;
    let v2 = embedder.encode(text2)?;
    Ok(cosine_similarity(&v1, &v2).clamp(0.0, 1.0))
}

/// Best match in `sentences2` for every sentence of `sentences1`.
///
/// Directional: only source sentences are scored, so swapping the
/// arguments generally changes the result.
pub fn compute_sentence_level_similarity(
    embedder: &dyn EmbeddingProvider,
    sentences1: &[String],
    sentences2: &[String],
) -> Result<SentenceSimilarity, ProviderError> {
    if sentences1.is_empty() || sentences2.is_empty() {
        return Ok(SentenceSimilarity::default());
    }

    let emb1 = embedder.encode_batch(sentences1)?;
    let emb2 = embedder.encode_batch(sentences2)?;

    let best_matches: Vec<f64> = emb1
        .iter()
        .map(|source| {
            emb2.iter()
                .map(|target| cosine_similarity(source, target))
                .fold(0.0_f64, f64::max)
        })
        .collect();

    let matched_sentences = best_matches
        .iter()
        .filter(|s| **s > SENTENCE_MATCH_THRESHOLD)
        .count();

    Ok(SentenceSimilarity {
        avg_similarity: best_matches.iter().sum::<f64>() / best_matches.len() as f64,
        max_similarity: best_matches.iter().copied().fold(0.0_f64, f64::max),
        matched_sentences,
        match_ratio: matched_sentences as f64 / sentences1.len() as f64,
    })
}

pub fn semantic_detail(overall: f64, sentences: SentenceSimilarity) -> SemanticDetail {
    SemanticDetail {
        overall,
        sentence_avg: sentences.avg_similarity,
        sentence_max: sentences.max_similarity,
        matched_sentences: sentences.matched_sentences,
        match_ratio: sentences.match_ratio,
        score: DOCUMENT_WEIGHT * overall + SENTENCE_WEIGHT * sentences.avg_similarity,
    }
}
