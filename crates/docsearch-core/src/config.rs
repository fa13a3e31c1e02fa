//! Configuration loader, typed engine settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys use `__`, e.g. `APP_ENGINE__CACHE_TTL_SECS=60`). Typed sections
//! carry serde defaults so a missing file yields a working configuration.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::load_for_env(&env_name)
    }

    pub fn load_for_env(env_name: &str) -> Result<Self> {
        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let config = Self { figment };
        config.engine()?.validate()?;
        Ok(config)
    }

    pub fn get<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to get '{}': {}", key, e)))
    }

    /// Typed section with defaults for absent keys.
    fn section<T>(&self, key: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned + Serialize + Default,
    {
        Figment::from(Serialized::default(key, T::default()))
            .merge(self.figment.clone())
            .extract_inner::<T>(key)
            .map_err(|e| Error::InvalidConfig(format!("Failed to read section '{}': {}", key, e)))
    }

    pub fn engine(&self) -> Result<EngineConfig> {
        self.section("engine")
    }

    pub fn data(&self) -> Result<DataConfig> {
        self.section("data")
    }

    pub fn embedding(&self) -> Result<EmbeddingConfig> {
        self.section("embedding")
    }

    pub fn suggestions(&self) -> Result<SuggestionConfig> {
        self.section("suggestions")
    }

    pub fn cache(&self) -> Result<CacheConfig> {
        self.section("cache")
    }
}

/// Ranking, retrieval and budget settings. Constructed once and shared read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Queries longer than this (in chars) are truncated, not rejected.
    pub max_query_length: usize,
    pub default_max_results: usize,
    pub min_similarity: f32,
    pub semantic_weight: f32,
    pub keyword_weight: f32,
    /// Per-retriever cap inside hybrid mode, independent of the caller's `max_results`.
    pub hybrid_candidate_limit: usize,
    /// Chunk over-fetch factor for vector search before collapsing to documents.
    pub candidate_multiplier: usize,
    pub cache_ttl_secs: u64,
    pub snippet_max_length: usize,
    pub highlight_max_count: usize,
    pub headline_min_words: usize,
    pub headline_max_words: usize,
    /// Largest possible |difficulty - preferred| distance.
    pub difficulty_scale_max: u8,
    pub embedding_dim: usize,
    pub request_timeout_ms: u64,
    pub suggestion_timeout_ms: u64,
    pub suggestion_source_cap: usize,
    pub suggestion_combined_cap: usize,
    pub chunk_max_tokens: usize,
    pub chunk_overlap_percent: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_query_length: 8000,
            default_max_results: 20,
            min_similarity: 0.7,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            hybrid_candidate_limit: 30,
            candidate_multiplier: 4,
            cache_ttl_secs: 3600,
            snippet_max_length: 300,
            highlight_max_count: 5,
            headline_min_words: 20,
            headline_max_words: 50,
            difficulty_scale_max: 4,
            embedding_dim: 1536,
            request_timeout_ms: 10_000,
            suggestion_timeout_ms: 1_500,
            suggestion_source_cap: 3,
            suggestion_combined_cap: 5,
            chunk_max_tokens: 500,
            chunk_overlap_percent: 0.2,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));
        if self.max_query_length == 0 {
            return invalid("engine.max_query_length must be greater than 0".into());
        }
        if !(0.0..=1.0).contains(&self.min_similarity) {
            return invalid(format!("engine.min_similarity must be between 0.0 and 1.0, got {}", self.min_similarity));
        }
        if self.semantic_weight < 0.0 || self.keyword_weight < 0.0 {
            return invalid("engine.semantic_weight and engine.keyword_weight must be non-negative".into());
        }
        if self.headline_min_words > self.headline_max_words {
            return invalid(format!(
                "engine.headline_min_words ({}) exceeds engine.headline_max_words ({})",
                self.headline_min_words, self.headline_max_words
            ));
        }
        if self.difficulty_scale_max == 0 {
            return invalid("engine.difficulty_scale_max must be greater than 0".into());
        }
        if self.embedding_dim == 0 {
            return invalid("engine.embedding_dim must be greater than 0".into());
        }
        if !(0.0..1.0).contains(&self.chunk_overlap_percent) {
            return invalid(format!("engine.chunk_overlap_percent must be in [0.0, 1.0), got {}", self.chunk_overlap_percent));
        }
        if self.hybrid_candidate_limit == 0 || self.candidate_multiplier == 0 {
            return invalid("engine.hybrid_candidate_limit and engine.candidate_multiplier must be greater than 0".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub lancedb_dir: String,
    pub tantivy_dir: String,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self { lancedb_dir: "data/lancedb".to_string(), tantivy_dir: "data/tantivy".to_string() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    /// Deterministic token-hash vectors, no network.
    #[default]
    Hash,
    /// OpenAI-compatible `/embeddings` endpoint.
    Http,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProviderKind,
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Hash,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggestionConfig {
    /// OpenAI-compatible chat endpoint; AI suggestions are disabled when empty.
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Lance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub backend: CacheBackend,
}

/// `data.*` directory with `${VAR}`/`$VAR` and a leading `~` expanded.
/// Unknown variables leave the input unchanged; nothing is canonicalized.
pub fn expand_path<S: AsRef<str>>(raw: S) -> PathBuf {
    let raw = raw.as_ref();
    let with_vars = shellexpand::env(raw).unwrap_or(std::borrow::Cow::Borrowed(raw));
    PathBuf::from(shellexpand::tilde(&with_vars).as_ref())
}
