//! Deterministic embedding provider for tests and offline runs.

use async_trait::async_trait;
use cdx_domain::error::Result;
use cdx_domain::ports::providers::EmbeddingProvider;
use cdx_domain::value_objects::Embedding;
use sha2::{Digest, Sha256};

/// Hash-based embedding provider
///
/// Maps each text to a vector derived from its SHA-256 digest: identical
/// texts always embed identically, distinct texts almost never collide.
/// Useful wherever a real model is unavailable or undesirable.
pub struct NullEmbeddingProvider {
    dimensions: usize,
}

impl NullEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        (0..self.dimensions)
            .map(|i| {
                let byte = digest[i % digest.len()];
                // Spread values over [-1, 1] so cosine similarity behaves.
                (f32::from(byte) / 127.5) - 1.0
            })
            .collect()
    }
}

impl Default for NullEmbeddingProvider {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts
            .iter()
            .map(|text| Embedding {
                vector: self.vector_for(text),
                model: "null".to_string(),
                dimensions: self.dimensions,
            })
            .collect())
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn provider_name(&self) -> &str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_embeds_identically() {
        let provider = NullEmbeddingProvider::new(32);
        let a = provider.embed_batch(&["hello".to_string()]).await.unwrap();
        let b = provider.embed_batch(&["hello".to_string()]).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].vector.len(), 32);
    }

    #[tokio::test]
    async fn distinct_texts_differ() {
        let provider = NullEmbeddingProvider::new(32);
        let out = provider
            .embed_batch(&["alpha".to_string(), "beta".to_string()])
            .await
            .unwrap();
        assert_ne!(out[0].vector, out[1].vector);
    }
}
