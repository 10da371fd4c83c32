// Similarity Metrics
// Lexical, n-gram, sequence, structural and containment scores for a text pair

use std::collections::{BTreeSet, HashSet};
use std::hash::Hash;

use crate::models::{FeatureSet, MetricBundle};
use crate::services::text_processor::get_ngrams;

use super::sequence::{lcs_length, levenshtein_distance, SequenceMatcher};
use super::tfidf::TfidfVectorizer;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct VocabularyOverlap {
    pub jaccard: f64,
    pub overlap_coefficient: f64,
    pub dice_coefficient: f64,
}

/// Stateless apart from the vectorizer settings; safe to share between threads.
#[derive(Debug, Clone, Default)]
pub struct SimilarityMetrics {
    vectorizer: TfidfVectorizer,
}

impl SimilarityMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cosine of the two TF-IDF rows fitted on exactly these two documents.
    pub fn cosine_similarity_tfidf(&self, text1: &str, text2: &str) -> f64 {
        match self.vectorizer.fit_transform(&[text1, text2]) {
            Ok(matrix) => matrix.row_cosine(0, 1).clamp(0.0, 1.0),
            Err(_) => 0.0,
        }
    }

    pub fn jaccard_similarity<T: Eq + Hash>(&self, set1: &HashSet<T>, set2: &HashSet<T>) -> f64 {
        if set1.is_empty() || set2.is_empty() {
            return 0.0;
        }
        let intersection = set1.intersection(set2).count();
        let union = set1.union(set2).count();
        if union == 0 {
            0.0
        } else {
            intersection as f64 / union as f64
        }
    }

    /// Jaccard similarity of the sets of contiguous n-token windows.
    pub fn ngram_similarity(&self, tokens1: &[String], tokens2: &[String], n: usize) -> f64 {
        if n == 0 || tokens1.len() < n || tokens2.len() < n {
            return 0.0;
        }
        let ngrams1: HashSet<&[String]> = get_ngrams(tokens1, n).into_iter().collect();
        let ngrams2: HashSet<&[String]> = get_ngrams(tokens2, n).into_iter().collect();
        self.jaccard_similarity(&ngrams1, &ngrams2)
    }

    pub fn sequence_similarity(&self, text1: &str, text2: &str) -> f64 {
        SequenceMatcher::new(text1, text2).ratio()
    }

    /// `1 - distance / max_len`; 1.0 for two empty strings.
    pub fn levenshtein_similarity(&self, text1: &str, text2: &str) -> f64 {
        let max_len = text1.chars().count().max(text2.chars().count());
        if max_len == 0 {
            return 1.0;
        }
        1.0 - levenshtein_distance(text1, text2) as f64 / max_len as f64
    }

    /// Share of each text's distinct tokens found in the other: (1 in 2, 2 in 1).
    pub fn containment_score(&self, tokens1: &[String], tokens2: &[String]) -> (f64, f64) {
        if tokens1.is_empty() || tokens2.is_empty() {
            return (0.0, 0.0);
        }
        let set1: HashSet<&String> = tokens1.iter().collect();
        let set2: HashSet<&String> = tokens2.iter().collect();
        let shared = set1.intersection(&set2).count() as f64;
        (shared / set1.len() as f64, shared / set2.len() as f64)
    }

    pub fn vocabulary_overlap(&self, vocab1: &BTreeSet<String>, vocab2: &BTreeSet<String>) -> VocabularyOverlap {
        if vocab1.is_empty() || vocab2.is_empty() {
            return VocabularyOverlap::default();
        }

        let intersection = vocab1.intersection(vocab2).count() as f64;
        let union = vocab1.union(vocab2).count() as f64;
        let min_size = vocab1.len().min(vocab2.len()) as f64;

        VocabularyOverlap {
            jaccard: intersection / union,
            overlap_coefficient: intersection / min_size,
            dice_coefficient: 2.0 * intersection / (vocab1.len() + vocab2.len()) as f64,
        }
    }

    /// Mean closeness of counts, average lengths and lexical diversity.
    pub fn structural_similarity(&self, features1: &FeatureSet, features2: &FeatureSet) -> f64 {
        let ratio_sim = |a: f64, b: f64| {
            let max = a.max(b);
            if max > 0.0 {
                1.0 - (a - b).abs() / max
            } else {
                0.0
            }
        };

        let parts = [
            ratio_sim(features1.word_count as f64, features2.word_count as f64),
            ratio_sim(features1.sentence_count as f64, features2.sentence_count as f64),
            ratio_sim(features1.avg_word_length, features2.avg_word_length),
            ratio_sim(features1.avg_sentence_length, features2.avg_sentence_length),
            1.0 - (features1.lexical_diversity - features2.lexical_diversity).abs(),
        ];

        parts.iter().sum::<f64>() / parts.len() as f64
    }

    /// LCS length over the longer string's length; 0.0 if either is empty.
    pub fn longest_common_subsequence(&self, text1: &str, text2: &str) -> f64 {
        let m = text1.chars().count();
        let n = text2.chars().count();
        if m == 0 || n == 0 {
            return 0.0;
        }
        lcs_length(text1, text2) as f64 / m.max(n) as f64
    }

    pub fn compute_all_metrics(
        &self,
        text1: &str,
        text2: &str,
        tokens1: &[String],
        tokens2: &[String],
        features1: &FeatureSet,
        features2: &FeatureSet,
    ) -> MetricBundle {
        let vocab = self.vocabulary_overlap(&features1.vocabulary, &features2.vocabulary);
        let (containment_1_in_2, containment_2_in_1) = self.containment_score(tokens1, tokens2);
        let words1: HashSet<&String> = tokens1.iter().collect();
        let words2: HashSet<&String> = tokens2.iter().collect();

        MetricBundle {
            tfidf_cosine: self.cosine_similarity_tfidf(text1, text2),
            jaccard_words: self.jaccard_similarity(&words1, &words2),
            jaccard_vocab: vocab.jaccard,
            dice_coefficient: vocab.dice_coefficient,
            overlap_coefficient: vocab.overlap_coefficient,
            bigram_similarity: self.ngram_similarity(tokens1, tokens2, 2),
            trigram_similarity: self.ngram_similarity(tokens1, tokens2, 3),
            fourgram_similarity: self.ngram_similarity(tokens1, tokens2, 4),
            sequence_matcher: self.sequence_similarity(text1, text2),
            levenshtein: self.levenshtein_similarity(text1, text2),
            lcs_ratio: self.longest_common_subsequence(text1, text2),
            structural_similarity: self.structural_similarity(features1, features2),
            containment_1_in_2,
            containment_2_in_1,
            max_containment: containment_1_in_2.max(containment_2_in_1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::text_processor::{FeatureExtractor, TextPreprocessor};
    use proptest::prelude::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn bundle(a: &str, b: &str) -> MetricBundle {
        let p = TextPreprocessor::default();
        let (n1, n2) = (p.normalize(a), p.normalize(b));
        let (t1, t2) = (p.tokenize_words(&n1), p.tokenize_words(&n2));
        SimilarityMetrics::new().compute_all_metrics(
            &n1,
            &n2,
            &t1,
            &t2,
            &p.extract_features(a),
            &p.extract_features(b),
        )
    }

    #[test]
    fn test_identical_texts_score_one() {
        let text = "El aprendizaje automático analiza datos. Los modelos reconocen patrones útiles.";
        let m = bundle(text, text);
        for (name, value) in [
            ("tfidf_cosine", m.tfidf_cosine),
            ("jaccard_words", m.jaccard_words),
            ("dice_coefficient", m.dice_coefficient),
            ("sequence_matcher", m.sequence_matcher),
            ("lcs_ratio", m.lcs_ratio),
            ("levenshtein", m.levenshtein),
            ("structural_similarity", m.structural_similarity),
            ("max_containment", m.max_containment),
        ] {
            assert!((value - 1.0).abs() < 1e-9, "{} = {}", name, value);
        }
    }

    #[test]
    fn test_disjoint_vocabularies_score_zero() {
        let m = bundle("perros gatos caballos", "mesas sillas lámparas");
        assert_eq!(m.jaccard_words, 0.0);
        assert_eq!(m.dice_coefficient, 0.0);
        assert_eq!(m.overlap_coefficient, 0.0);
        assert_eq!(m.tfidf_cosine, 0.0);
        assert_eq!(m.max_containment, 0.0);
    }

    #[test]
    fn test_empty_inputs_fall_back_to_defaults() {
        let metrics = SimilarityMetrics::new();
        let empty = FeatureSet::default();
        let m = metrics.compute_all_metrics("", "", &[], &[], &empty, &empty);
        assert_eq!(m.tfidf_cosine, 0.0);
        assert_eq!(m.jaccard_words, 0.0);
        assert_eq!(m.bigram_similarity, 0.0);
        assert_eq!(m.sequence_matcher, 1.0);
        assert_eq!(m.levenshtein, 1.0);
        assert_eq!(m.lcs_ratio, 0.0);
        // four ratio parts are 0, diversity part is 1 - 0
        assert!((m.structural_similarity - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_vocabulary_overlap_formulas() {
        let v1: BTreeSet<String> = ["a1", "b2", "c3", "d4"].iter().map(|s| s.to_string()).collect();
        let v2: BTreeSet<String> = ["c3", "d4"].iter().map(|s| s.to_string()).collect();
        let o = SimilarityMetrics::new().vocabulary_overlap(&v1, &v2);
        assert!((o.jaccard - 0.5).abs() < 1e-12);
        assert!((o.overlap_coefficient - 1.0).abs() < 1e-12);
        assert!((o.dice_coefficient - 4.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_containment_is_directional() {
        let m = SimilarityMetrics::new();
        let (c12, c21) = m.containment_score(&toks("uno dos"), &toks("uno dos tres cuatro"));
        assert!((c12 - 1.0).abs() < 1e-12);
        assert!((c21 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_ngram_similarity_short_input_is_zero() {
        let m = SimilarityMetrics::new();
        assert_eq!(m.ngram_similarity(&toks("uno dos"), &toks("uno dos"), 3), 0.0);
        assert!((m.ngram_similarity(&toks("uno dos tres"), &toks("uno dos tres"), 3) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_structural_similarity_uses_ratio_and_diversity() {
        let f1 = FeatureSet {
            word_count: 10,
            sentence_count: 2,
            avg_word_length: 5.0,
            avg_sentence_length: 5.0,
            lexical_diversity: 1.0,
            ..Default::default()
        };
        let f2 = FeatureSet {
            word_count: 5,
            sentence_count: 1,
            avg_word_length: 5.0,
            avg_sentence_length: 5.0,
            lexical_diversity: 0.5,
            ..Default::default()
        };
        let expected = (0.5 + 0.5 + 1.0 + 1.0 + 0.5) / 5.0;
        assert!((SimilarityMetrics::new().structural_similarity(&f1, &f2) - expected).abs() < 1e-12);
    }

    proptest! {
        #[test]
        fn prop_ngram_self_similarity(words in proptest::collection::vec("[a-z]{2,6}", 0..12), n in 1usize..6) {
            let m = SimilarityMetrics::new();
            let expected = if n <= words.len() { 1.0 } else { 0.0 };
            prop_assert_eq!(m.ngram_similarity(&words, &words, n), expected);
        }

        #[test]
        fn prop_lcs_ratio_and_levenshtein_are_symmetric(a in "[a-f ]{0,25}", b in "[a-f ]{0,25}") {
            let m = SimilarityMetrics::new();
            prop_assert_eq!(m.longest_common_subsequence(&a, &b), m.longest_common_subsequence(&b, &a));
            prop_assert_eq!(m.levenshtein_similarity(&a, &b), m.levenshtein_similarity(&b, &a));
        }
    }
}
