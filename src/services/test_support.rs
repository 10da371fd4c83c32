// Test Support
// Deterministic embedders for unit tests

use std::collections::HashMap;

use crate::services::embeddings::{EmbeddingProvider, ProviderError};

pub const ORIGINAL: &str = "El perro grande corre por el parque. Los niños juegan con la pelota roja. \
                            Después todos regresan a casa contentos.";
pub const PARAPHRASE: &str = "El can enorme trota por el jardín. Los chicos juegan con el balón rojo. \
                              Luego todos vuelven al hogar felices.";
pub const AI_TEXT: &str = "La inteligencia artificial transforma la industria moderna. Los algoritmos \
                           aprenden patrones complejos de grandes volúmenes de datos.";
pub const CLIMATE_TEXT: &str = "El cambio climático amenaza los ecosistemas del planeta. Las temperaturas \
                                globales aumentan cada década. Los glaciares se derriten rápidamente.";

/// Concept axes and the surface words that load on them.
const CONCEPTS: &[&[&str]] = &[
    &["perro", "can", "perros"],
    &["grande", "enorme"],
    &["corre", "trota"],
    &["parque", "jardín"],
    &["niños", "chicos"],
    &["juegan"],
    &["pelota", "balón"],
    &["roja", "rojo"],
    &["después", "luego"],
    &["regresan", "vuelven"],
    &["casa", "hogar"],
    &["contentos", "felices"],
    &["todos"],
    &["lluvia"],
    &["cae"],
    &["océano", "mar"],
    &["inteligencia", "algoritmos", "artificial"],
    &["datos", "patrones"],
    &["climático", "clima"],
    &["temperaturas", "globales"],
    &["glaciares", "derriten"],
];

/// Bag-of-concepts embedder: synonyms share an axis, unknown words are ignored.
#[derive(Debug, Clone)]
pub struct ConceptEmbedder {
    index: HashMap<&'static str, usize>,
}

impl ConceptEmbedder {
    pub fn new() -> Self {
        let index = CONCEPTS
            .iter()
            .enumerate()
            .flat_map(|(axis, words)| words.iter().map(move |w| (*w, axis)))
            .collect();
        Self { index }
    }
}

impl EmbeddingProvider for ConceptEmbedder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0_f32; CONCEPTS.len()];
        let lowered = text.to_lowercase();
        for word in lowered.split(|c: char| !c.is_alphanumeric()) {
            if let Some(axis) = self.index.get(word) {
                vector[*axis] += 1.0;
            }
        }
        Ok(vector)
    }
}

/// Always fails, as an unreachable embedding service would.
#[derive(Debug, Clone, Default)]
pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn encode(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::ApiError {
            status: 503,
            message: "service unavailable".to_string(),
        })
    }
}
