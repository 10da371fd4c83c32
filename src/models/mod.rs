// Plagiscope Data Models
// Serializable records shared by the scoring engine, the trainer and the CLI

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

// ============ Text Features ============

/// Structural and statistical summary of one text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureSet {
    pub char_count: usize,
    pub word_count: usize,
    pub sentence_count: usize,
    pub avg_word_length: f64,
    pub avg_sentence_length: f64,
    pub unique_words: usize,
    /// unique_words / word_count, in [0, 1]
    pub lexical_diversity: f64,
    pub vocabulary: BTreeSet<String>,
}

// ============ Metric Bundle ============

/// Every lexical, structural and sequence score for one comparison.
/// All values are in [0, 1].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MetricBundle {
    pub tfidf_cosine: f64,
    pub jaccard_words: f64,
    pub jaccard_vocab: f64,
    pub dice_coefficient: f64,
    pub overlap_coefficient: f64,
    pub bigram_similarity: f64,
    pub trigram_similarity: f64,
    pub fourgram_similarity: f64,
    pub sequence_matcher: f64,
    pub levenshtein: f64,
    pub lcs_ratio: f64,
    pub structural_similarity: f64,
    pub containment_1_in_2: f64,
    pub containment_2_in_1: f64,
    pub max_containment: f64,
}

impl MetricBundle {
    pub const NAMES: [&'static str; 15] = [
        "tfidf_cosine",
        "jaccard_words",
        "jaccard_vocab",
        "dice_coefficient",
        "overlap_coefficient",
        "bigram_similarity",
        "trigram_similarity",
        "fourgram_similarity",
        "sequence_matcher",
        "levenshtein",
        "lcs_ratio",
        "structural_similarity",
        "containment_1_in_2",
        "containment_2_in_1",
        "max_containment",
    ];

    /// Look a metric up by its key.
    pub fn get(&self, name: &str) -> Option<f64> {
        let value = match name {
            "tfidf_cosine" => self.tfidf_cosine,
            "jaccard_words" => self.jaccard_words,
            "jaccard_vocab" => self.jaccard_vocab,
            "dice_coefficient" => self.dice_coefficient,
            "overlap_coefficient" => self.overlap_coefficient,
            "bigram_similarity" => self.bigram_similarity,
            "trigram_similarity" => self.trigram_similarity,
            "fourgram_similarity" => self.fourgram_similarity,
            "sequence_matcher" => self.sequence_matcher,
            "levenshtein" => self.levenshtein,
            "lcs_ratio" => self.lcs_ratio,
            "structural_similarity" => self.structural_similarity,
            "containment_1_in_2" => self.containment_1_in_2,
            "containment_2_in_1" => self.containment_2_in_1,
            "max_containment" => self.max_containment,
            _ => return None,
        };
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        Self::NAMES
            .iter()
            .filter_map(move |name| self.get(name).map(|v| (*name, v)))
    }
}

// ============ Categories & Weights ============

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Semantic,
    Lexical,
    Structural,
    Sequence,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Semantic,
        Category::Lexical,
        Category::Structural,
        Category::Sequence,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Semantic => "semantic",
            Category::Lexical => "lexical",
            Category::Structural => "structural",
            Category::Sequence => "sequence",
        }
    }
}

/// Per-category weights. Values produced by `normalized` sum to 1.0.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightConfig {
    pub semantic: f64,
    pub lexical: f64,
    pub structural: f64,
    pub sequence: f64,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self {
            semantic: 0.40,
            lexical: 0.30,
            structural: 0.20,
            sequence: 0.10,
        }
    }
}

impl WeightConfig {
    /// Rescale raw weights so they sum to 1.0.
    /// Returns `None` for negative, non-finite or all-zero input.
    pub fn normalized(semantic: f64, lexical: f64, structural: f64, sequence: f64) -> Option<Self> {
        let raw = [semantic, lexical, structural, sequence];
        if raw.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return None;
        }
        let total: f64 = raw.iter().sum();
        if total <= 0.0 {
            return None;
        }
        Some(Self {
            semantic: semantic / total,
            lexical: lexical / total,
            structural: structural / total,
            sequence: sequence / total,
        })
    }

    pub fn renormalized(&self) -> Option<Self> {
        Self::normalized(self.semantic, self.lexical, self.structural, self.sequence)
    }

    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Semantic => self.semantic,
            Category::Lexical => self.lexical,
            Category::Structural => self.structural,
            Category::Sequence => self.sequence,
        }
    }

    pub fn sum(&self) -> f64 {
        self.semantic + self.lexical + self.structural + self.sequence
    }
}

// ============ Thresholds & Verdict ============

/// Verdict cut points on the composite score, highest first.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdConfig {
    pub high_plagiarism: f64,
    pub moderate_plagiarism: f64,
    pub low_plagiarism: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            high_plagiarism: 0.75,
            moderate_plagiarism: 0.50,
            low_plagiarism: 0.30,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    #[serde(rename = "plagio muy probable")]
    HighPlagiarism,
    #[serde(rename = "plagio probable")]
    ModeratePlagiarism,
    #[serde(rename = "plagio improbable, revisar")]
    LowPlagiarism,
    #[serde(rename = "similitud baja, original")]
    Original,
}

impl Verdict {
    pub fn label(&self) -> &'static str {
        match self {
            Verdict::HighPlagiarism => "plagio muy probable",
            Verdict::ModeratePlagiarism => "plagio probable",
            Verdict::LowPlagiarism => "plagio improbable, revisar",
            Verdict::Original => "similitud baja, original",
        }
    }

    /// 3 for the most severe tier, 0 for original text.
    pub fn severity(&self) -> u8 {
        match self {
            Verdict::HighPlagiarism => 3,
            Verdict::ModeratePlagiarism => 2,
            Verdict::LowPlagiarism => 1,
            Verdict::Original => 0,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ============ Comparison Result ============

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CategoryScores {
    pub semantic: f64,
    pub lexical: f64,
    pub structural: f64,
    pub sequence: f64,
}

impl CategoryScores {
    pub fn get(&self, category: Category) -> f64 {
        match category {
            Category::Semantic => self.semantic,
            Category::Lexical => self.lexical,
            Category::Structural => self.structural,
            Category::Sequence => self.sequence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SemanticDetail {
    pub overall: f64,
    pub sentence_avg: f64,
    pub sentence_max: f64,
    pub matched_sentences: usize,
    pub match_ratio: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LexicalDetail {
    pub tfidf_cosine: f64,
    pub jaccard: f64,
    pub trigram: f64,
    pub dice: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct StructuralDetail {
    pub similarity: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SequenceDetail {
    pub sequence_matcher: f64,
    pub lcs_ratio: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeaturePair {
    pub text1: FeatureSet,
    pub text2: FeatureSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AnalysisDetails {
    pub semantic: SemanticDetail,
    pub lexical: LexicalDetail,
    pub structural: StructuralDetail,
    pub sequence: SequenceDetail,
    pub detailed_metrics: MetricBundle,
    pub features: FeaturePair,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparedFiles {
    pub file1: String,
    pub file2: String,
}

/// Snapshot produced by one successful comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub similarity_percentage: f64,
    pub final_score: f64,
    pub verdict: Verdict,
    pub breakdown: CategoryScores,
    pub weights_used: WeightConfig,
    pub thresholds_used: ThresholdConfig,
    pub details: AnalysisDetails,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<ComparedFiles>,
}

impl ComparisonResult {
    /// Category scores rendered as percentages with two decimals.
    pub fn breakdown_labels(&self) -> Vec<(Category, String)> {
        Category::ALL
            .iter()
            .map(|c| (*c, format!("{:.2}%", self.breakdown.get(*c) * 100.0)))
            .collect()
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Empty or whitespace-only text
    Input,
    /// File could not be read or decoded
    Resource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResult {
    pub error: String,
    pub kind: ErrorKind,
    pub similarity_percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl ErrorResult {
    pub fn input(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            kind: ErrorKind::Input,
            similarity_percentage: 0.0,
            path: None,
        }
    }

    pub fn resource(message: impl Into<String>, path: PathBuf) -> Self {
        Self {
            error: message.into(),
            kind: ErrorKind::Resource,
            similarity_percentage: 0.0,
            path: Some(path),
        }
    }
}

/// Outcome of `compare`/`compare_files`: a result or an error record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Comparison {
    Completed(Box<ComparisonResult>),
    Failed(ErrorResult),
}

impl Comparison {
    pub fn similarity_percentage(&self) -> f64 {
        match self {
            Comparison::Completed(r) => r.similarity_percentage,
            Comparison::Failed(e) => e.similarity_percentage,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Comparison::Failed(_))
    }

    pub fn result(&self) -> Option<&ComparisonResult> {
        match self {
            Comparison::Completed(r) => Some(r),
            Comparison::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&ErrorResult> {
        match self {
            Comparison::Completed(_) => None,
            Comparison::Failed(e) => Some(e),
        }
    }
}

// ============ Training ============

/// `[[tn, fp], [fn, tp]]`, rows are true labels, columns predictions.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct ConfusionMatrix(pub [[u64; 2]; 2]);

impl ConfusionMatrix {
    pub fn record(&mut self, actual: bool, predicted: bool) {
        self.0[actual as usize][predicted as usize] += 1;
    }

    pub fn true_negatives(&self) -> u64 { self.0[0][0] }
    pub fn false_positives(&self) -> u64 { self.0[0][1] }
    pub fn false_negatives(&self) -> u64 { self.0[1][0] }
    pub fn true_positives(&self) -> u64 { self.0[1][1] }

    pub fn total(&self) -> u64 {
        self.0.iter().flatten().sum()
    }
}

/// Held-out metrics as persisted in the model configuration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TestMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub confusion_matrix: ConfusionMatrix,
}

/// One optimizer invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRun {
    pub run_id: String,
    pub train_size: usize,
    pub test_size: usize,
    pub optimized_weights: WeightConfig,
    pub optimized_threshold: f64,
    pub thresholds: ThresholdConfig,
    pub test_metrics: TestMetrics,
    pub test_evaluated: usize,
    pub test_skipped: usize,
    pub completed_at: String,
}

/// Flat configuration record written after training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub weights: WeightConfig,
    pub threshold: f64,
    pub test_metrics: TestMetrics,
    pub language: String,
}
