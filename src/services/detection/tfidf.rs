// TF-IDF Vectorizer
// Fits a vocabulary over the documents of one call and returns L2-normalised rows

use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum VectorizeError {
    #[error("empty vocabulary; perhaps the documents only contain stop words")]
    EmptyVocabulary,
}

fn term_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("term regex"))
}

/// Sparse row: (term index, weight), sorted by index.
pub type SparseRow = Vec<(usize, f64)>;

#[derive(Debug, Clone)]
pub struct TfidfMatrix {
    pub vocabulary: BTreeMap<String, usize>,
    pub rows: Vec<SparseRow>,
}

impl TfidfMatrix {
    /// Dot product of two rows; rows are unit length so this is their cosine.
    pub fn row_cosine(&self, a: usize, b: usize) -> f64 {
        let (Some(ra), Some(rb)) = (self.rows.get(a), self.rows.get(b)) else {
            return 0.0;
        };
        let mut i = 0;
        let mut j = 0;
        let mut dot = 0.0;
        while i < ra.len() && j < rb.len() {
            match ra[i].0.cmp(&rb[j].0) {
                std::cmp::Ordering::Equal => {
                    dot += ra[i].1 * rb[j].1;
                    i += 1;
                    j += 1;
                }
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
            }
        }
        dot
    }
}

/// Raw term counts, smoothed idf `ln((1 + n) / (1 + df)) + 1`, L2 row norm.
/// Holds no fitted state: each `fit_transform` builds its vocabulary from scratch.
#[derive(Debug, Clone, Copy)]
pub struct TfidfVectorizer {
    pub lowercase: bool,
    pub smooth_idf: bool,
    pub sublinear_tf: bool,
}

impl Default for TfidfVectorizer {
    fn default() -> Self {
        Self {
            lowercase: true,
            smooth_idf: true,
            sublinear_tf: false,
        }
    }
}

impl TfidfVectorizer {
    pub fn new() -> Self {
        Self::default()
    }

    fn analyze(&self, doc: &str) -> Vec<String> {
        let doc = if self.lowercase { doc.to_lowercase() } else { doc.to_string() };
        term_re().find_iter(&doc).map(|m| m.as_str().to_string()).collect()
    }

    pub fn fit_transform(&self, docs: &[&str]) -> Result<TfidfMatrix, VectorizeError> {
        let analyzed: Vec<Vec<String>> = docs.iter().map(|d| self.analyze(d)).collect();

        let mut vocabulary: BTreeMap<String, usize> = BTreeMap::new();
        for terms in &analyzed {
            for term in terms {
                vocabulary.entry(term.clone()).or_insert(0);
            }
        }
        if vocabulary.is_empty() {
            return Err(VectorizeError::EmptyVocabulary);
        }
        // Feature indices follow sorted term order
        for (idx, value) in vocabulary.values_mut().enumerate() {
            *value = idx;
        }

        let counts: Vec<BTreeMap<usize, f64>> = analyzed
            .iter()
            .map(|terms| {
                let mut row: BTreeMap<usize, f64> = BTreeMap::new();
                for term in terms {
                    if let Some(idx) = vocabulary.get(term) {
                        *row.entry(*idx).or_insert(0.0) += 1.0;
                    }
                }
                row
            })
            .collect();

        let mut df = vec![0usize; vocabulary.len()];
        for row in &counts {
            for idx in row.keys() {
                df[*idx] += 1;
            }
        }

        let n = docs.len() as f64;
        let smooth = if self.smooth_idf { 1.0 } else { 0.0 };
        let idf: Vec<f64> = df
            .iter()
            .map(|d| ((n + smooth) / (*d as f64 + smooth)).ln() + 1.0)
            .collect();

        let rows = counts
            .into_iter()
            .map(|row| {
                let mut weighted: SparseRow = row
                    .into_iter()
                    .map(|(idx, tf)| {
                        let tf = if self.sublinear_tf { tf.ln() + 1.0 } else { tf };
                        (idx, tf * idf[idx])
                    })
                    .collect();
                let norm = weighted.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
                if norm > 0.0 {
                    weighted.iter_mut().for_each(|(_, w)| *w /= norm);
                }
                weighted
            })
            .collect();

        Ok(TfidfMatrix { vocabulary, rows })
    }
}
