use async_trait::async_trait;
use std::sync::Arc;

use docsearch_core::config::{EmbeddingConfig, EmbeddingProviderKind, SuggestionConfig};
use docsearch_core::text::words;
use docsearch_core::traits::{EmbeddingClient, SuggestionProvider};
use docsearch_core::Result;

pub mod http;

pub use http::{HttpEmbeddingClient, HttpSuggestionClient};

/// Deterministic bag-of-words embedder: each term hashes into one bucket.
///
/// Texts sharing vocabulary get high cosine similarity, which is all the
/// retrieval tests need. No network, no model files.
pub struct HashEmbedder {
    dim: usize,
    id: String,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1), id: format!("hash:d{}", dim.max(1)) }
    }

    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;

        let mut v = vec![0f32; self.dim];
        for (i, token) in words(text).enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h as usize) % self.dim;
            let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32) * 0.5;
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

#[async_trait]
impl EmbeddingClient for HashEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }
}

fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Provider selected by configuration; `APP_USE_FAKE_EMBEDDINGS=1` forces [`HashEmbedder`].
pub fn get_default_embedder(cfg: &EmbeddingConfig, dim: usize) -> Result<Arc<dyn EmbeddingClient>> {
    if use_fake_embeddings() {
        tracing::info!(dim, "using hash embedder (APP_USE_FAKE_EMBEDDINGS)");
        return Ok(Arc::new(HashEmbedder::new(dim)));
    }
    match cfg.provider {
        EmbeddingProviderKind::Hash => Ok(Arc::new(HashEmbedder::new(dim))),
        EmbeddingProviderKind::Http => {
            let api_key = std::env::var(&cfg.api_key_env).ok();
            if api_key.is_none() {
                tracing::warn!(var = %cfg.api_key_env, "embedding api key not set; sending unauthenticated requests");
            }
            Ok(Arc::new(HttpEmbeddingClient::new(cfg, api_key, dim)?))
        }
    }
}

/// AI suggestion provider, or `None` when no endpoint is configured.
pub fn get_suggestion_provider(cfg: &SuggestionConfig) -> Result<Option<Arc<dyn SuggestionProvider>>> {
    if cfg.endpoint.trim().is_empty() {
        return Ok(None);
    }
    let api_key = std::env::var(&cfg.api_key_env).ok();
    Ok(Some(Arc::new(HttpSuggestionClient::new(cfg, api_key)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docsearch_core::memory::cosine_similarity;

    #[test]
    fn hash_embeddings_are_normalized_and_deterministic() {
        let e = HashEmbedder::new(64);
        let a = e.embed_sync("REST API pagination");
        let b = e.embed_sync("rest api pagination");
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
        assert_eq!(a, b);
    }

    #[test]
    fn shared_vocabulary_scores_higher() {
        let e = HashEmbedder::new(256);
        let q = e.embed_sync("tokio runtime tasks");
        let near = e.embed_sync("spawning tasks on the tokio runtime");
        let far = e.embed_sync("css grid layout");
        assert!(cosine_similarity(&q, &near) > cosine_similarity(&q, &far));
    }
}
