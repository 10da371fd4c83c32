// Embedding Provider Service
// Maps text to dense vectors: local feature hashing or an OpenAI-compatible HTTP endpoint

use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

const DEFAULT_EMBEDDINGS_URL: &str = "https://api.openai.com/v1/embeddings";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_HASHING_DIMENSIONS: usize = 384;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },
    #[error("Expected {expected} embeddings, got {got}")]
    MissingEmbeddings { expected: usize, got: usize },
    #[error("Failed to start embedding runtime: {0}")]
    Runtime(#[from] std::io::Error),
    #[error("API key not configured")]
    MissingApiKey,
}

/// Opaque text → vector model.
///
/// Implementations are blocking and must be shareable across threads; the
/// trainer scores dataset rows in parallel against a single provider.
pub trait EmbeddingProvider: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>, ProviderError>;

    /// One vector per input, in input order.
    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        texts.iter().map(|t| self.encode(t)).collect()
    }
}

/// Cosine similarity; 0.0 when either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;
    for (x, y) in a.iter().zip(b.iter()) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a <= 0.0 || norm_b <= 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// ============ Local Hashing Embedder ============

/// Deterministic offline embedder: word unigrams and character trigrams hashed
/// into a fixed number of signed buckets, L2-normalised.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimensions: usize,
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_HASHING_DIMENSIONS)
    }
}

impl HashingEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = fnv1a(feature.as_bytes());
        let idx = (hash % self.dimensions as u64) as usize;
        let sign = if (hash >> 63) & 1 == 1 { -1.0 } else { 1.0 };
        vector[idx] += sign * weight;
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    hash
}

impl EmbeddingProvider for HashingEmbedder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0_f32; self.dimensions];
        let lowered = text.to_lowercase();

        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.add_feature(&mut vector, word, 1.0);

            let padded: Vec<char> = format!(" {} ", word).chars().collect();
            for gram in padded.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vector, &gram, 0.5);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        Ok(vector)
    }
}

// ============ HTTP Embedding Provider ============

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}

/// Blocking client for an OpenAI-compatible `/embeddings` endpoint.
///
/// Owns a small tokio runtime; do not call it from inside another async runtime.
pub struct HttpEmbeddingProvider {
    client: Client,
    runtime: tokio::runtime::Runtime,
    url: String,
    model: String,
    api_key: String,
}

impl HttpEmbeddingProvider {
    pub fn new(base_url: Option<&str>, model: Option<&str>, api_key: &str) -> Result<Self, ProviderError> {
        Self::build(base_url, model, api_key, None)
    }

    pub fn with_proxy(
        base_url: Option<&str>,
        model: Option<&str>,
        api_key: &str,
        proxy_url: &str,
    ) -> Result<Self, ProviderError> {
        Self::build(base_url, model, api_key, Some(proxy_url))
    }

    fn build(
        base_url: Option<&str>,
        model: Option<&str>,
        api_key: &str,
        proxy_url: Option<&str>,
    ) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }

        let mut builder = Client::builder().timeout(Duration::from_secs(80));
        if let Some(proxy_url) = proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        let client = builder.build()?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()?;

        let url = base_url
            .map(str::to_string)
            .or_else(|| env::var("PLAGISCOPE_EMBEDDINGS_URL").ok())
            .unwrap_or_else(|| DEFAULT_EMBEDDINGS_URL.to_string());

        Ok(Self {
            client,
            runtime,
            url,
            model: model.unwrap_or(DEFAULT_EMBEDDING_MODEL).to_string(),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let start = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("[EMBEDDINGS] request failed with status {}", status.as_u16());
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        let mut data: EmbeddingResponse = response.json().await?;
        debug!(
            inputs = texts.len(),
            latency_ms = start.elapsed().as_millis() as u64,
            "[EMBEDDINGS] batch encoded"
        );

        if data.data.len() != texts.len() {
            return Err(ProviderError::MissingEmbeddings {
                expected: texts.len(),
                got: data.data.len(),
            });
        }
        data.data.sort_by_key(|d| d.index);
        Ok(data.data.into_iter().map(|d| d.embedding).collect())
    }
}

impl EmbeddingProvider for HttpEmbeddingProvider {
    fn encode(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let input = [text.to_string()];
        let mut vectors = self.encode_batch(&input)?;
        vectors.pop().ok_or(ProviderError::MissingEmbeddings { expected: 1, got: 0 })
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        self.runtime.block_on(self.request_embeddings(texts))
    }
}

/// Resolve the embedding API key: environment first, then the config store.
pub fn get_api_key(provider: &str) -> Option<String> {
    for key in ["PLAGISCOPE_EMBEDDING_API_KEY", "OPENAI_API_KEY"] {
        if let Ok(val) = env::var(key) {
            let v = val.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    let config_dir = super::ConfigStore::default_config_dir()?;
    let store = super::ConfigStore::new(config_dir);
    store.get_api_key(provider).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_edge_cases() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-9);
        assert!((cosine_similarity(&[1.0, 0.0], &[0.0, 1.0])).abs() < 1e-12);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hashing_embedder_is_deterministic_and_normalized() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.encode("La inteligencia artificial").unwrap();
        let b = embedder.encode("La inteligencia artificial").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hashing_embedder_keeps_at_least_one_dimension() {
        let embedder = HashingEmbedder::new(0);
        assert_eq!(embedder.dimensions(), 1);
        assert_eq!(embedder.encode("texto").unwrap().len(), 1);
    }

    #[test]
    fn test_hashing_embedder_empty_text_is_zero_vector() {
        let v = HashingEmbedder::default().encode("  ").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_encode_batch_preserves_order() {
        let embedder = HashingEmbedder::default();
        let texts = vec!["uno".to_string(), "dos".to_string()];
        let batch = embedder.encode_batch(&texts).unwrap();
        assert_eq!(batch[0], embedder.encode("uno").unwrap());
        assert_eq!(batch[1], embedder.encode("dos").unwrap());
    }

    #[test]
    fn test_http_provider_requires_api_key() {
        let result = HttpEmbeddingProvider::new(None, None, "  ");
        assert!(matches!(result, Err(ProviderError::MissingApiKey)));
    }
}
