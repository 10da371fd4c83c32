// Detection Module
// Plagiarism scoring core organized into specialized submodules:
// - tfidf / sequence: vectorizer and character-level matching algorithms
// - metrics: the per-pair metric bundle
// - semantic: embedding-based document and sentence similarity
// - aggregation: category scores and the weighted composite
// - verdict: threshold tiers and verdict mapping
// - detector: the pairwise detector tying it all together

pub mod tfidf;
pub mod sequence;
pub mod metrics;
pub mod semantic;
pub mod aggregation;
pub mod verdict;
pub mod detector;

// Re-export commonly used items
pub use aggregation::{category_scores, composite_score};
pub use detector::{finish, PairAnalysis, PlagiarismDetector, EMPTY_INPUT_MESSAGE};
pub use metrics::{SimilarityMetrics, VocabularyOverlap};
pub use semantic::{compute_semantic_similarity, compute_sentence_level_similarity, SentenceSimilarity};
pub use sequence::SequenceMatcher;
pub use tfidf::{TfidfMatrix, TfidfVectorizer, VectorizeError};
pub use verdict::decide_verdict;
