//! Domain types shared by the retrieval backends and the engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type DocumentId = String;
pub type Meta = serde_json::Map<String, serde_json::Value>;

/// Kind of documentation page.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ContentType {
    ApiDocs,
    Tutorial,
    Reference,
    #[default]
    Documentation,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApiDocs => "api-docs",
            Self::Tutorial => "tutorial",
            Self::Reference => "reference",
            Self::Documentation => "documentation",
        }
    }

    /// Lenient parse; unknown labels fall back to `Documentation`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "api-docs" | "api_docs" | "apidocs" | "api" => Self::ApiDocs,
            "tutorial" => Self::Tutorial,
            "reference" => Self::Reference,
            _ => Self::Documentation,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured part of a document's open metadata map.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DocumentMetadata {
    #[serde(default)]
    pub technology: Vec<String>,
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default, rename = "codeBlocks")]
    pub code_blocks: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, flatten)]
    pub extra: Meta,
}

/// An ingested documentation page.
///
/// `url` is the unique key; `id` is derived from it (see [`document_id_for_url`]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub title: String,
    pub content: String,
    pub url: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    pub difficulty_level: u8,
    pub authority_score: f32,
    pub word_count: u32,
    pub reading_time: u32,
    pub content_hash: String,
    pub source: String,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Stable document id for a url: the first 16 bytes of its blake3 digest, hex-encoded.
pub fn document_id_for_url(url: &str) -> DocumentId {
    let hash = blake3::hash(url.trim().as_bytes());
    hash.to_hex()[..32].to_string()
}

/// Content digest used for change detection.
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// A documentation origin. Inactive sources never appear in results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Source {
    pub name: String,
    pub source_type: String,
    pub authority_weight: f32,
    pub is_active: bool,
}

impl Source {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), source_type: "web".to_string(), authority_weight: 1.0, is_active: true }
    }
}

/// A sub-document unit with its own embedding vector.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingChunk {
    pub document_id: DocumentId,
    pub chunk_index: u32,
    pub content_text: String,
    pub vector: Vec<f32>,
}

/// A document joined with its source, as returned by catalog lookups.
#[derive(Debug, Clone)]
pub struct DocumentRow {
    pub document: Document,
    pub source: Source,
}

/// Nearest-neighbour hit at chunk granularity.
#[derive(Debug, Clone)]
pub struct ChunkHit {
    pub document_id: DocumentId,
    pub chunk_index: u32,
    pub content_text: String,
    /// Cosine similarity; higher is better.
    pub similarity: f32,
}

/// Lexical hit at document granularity.
#[derive(Debug, Clone)]
pub struct TextHit {
    pub document_id: DocumentId,
    pub score: f32,
    /// Extractive excerpt produced by the text backend, if any.
    pub headline: Option<String>,
}

/// Retrieval strategy requested by the caller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Semantic,
    Keyword,
    #[default]
    Hybrid,
    Faceted,
    Contextual,
}

impl SearchType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Semantic => "semantic",
            Self::Keyword => "keyword",
            Self::Hybrid => "hybrid",
            Self::Faceted => "faceted",
            Self::Contextual => "contextual",
        }
    }
}

impl std::str::FromStr for SearchType {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "semantic" => Ok(Self::Semantic),
            "keyword" => Ok(Self::Keyword),
            "hybrid" => Ok(Self::Hybrid),
            "faceted" => Ok(Self::Faceted),
            "contextual" => Ok(Self::Contextual),
            other => Err(crate::error::Error::Validation(format!("unknown search type '{other}'"))),
        }
    }
}

/// Optional retrieval filters. Field order is fixed, so serialization is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technologies: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_types: Option<Vec<ContentType>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

/// Caller's project, used by the contextual strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProjectContext {
    #[serde(default)]
    pub tech_stack: Vec<String>,
}

/// Per-call options. Unset numeric options fall back to `EngineConfig` defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchOptions {
    #[serde(default)]
    pub search_type: SearchType,
    #[serde(default)]
    pub filters: SearchFilters,
    pub max_results: Option<usize>,
    pub min_similarity: Option<f32>,
    #[serde(default)]
    pub skip_cache: bool,
    #[serde(default)]
    pub skip_reranking: bool,
    pub preferred_difficulty: Option<u8>,
    pub project_context: Option<ProjectContext>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub source_type: String,
    pub authority: f32,
}

impl From<&Source> for SourceInfo {
    fn from(s: &Source) -> Self {
        Self { name: s.name.clone(), source_type: s.source_type.clone(), authority: s.authority_weight }
    }
}

/// Sub-scores kept for hybrid results.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct ScoreBreakdown {
    pub semantic: f32,
    pub keyword: f32,
    pub combined: f32,
}

/// Diagnostic breakdown of every reranking step.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RerankingFactors {
    pub original_score: f32,
    pub title_matches: u32,
    pub authority_boost: f32,
    pub source_authority_boost: f32,
    pub recency: f32,
    pub recency_boost: f32,
    pub quality_boost: f32,
    pub difficulty_alignment: Option<f32>,
    pub context_boost: Option<f32>,
}

/// One ranked hit in a search response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: DocumentId,
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub source: SourceInfo,
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<ScoreBreakdown>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reranking_factors: Option<RerankingFactors>,
    pub search_type: SearchType,
    pub content_type: ContentType,
    pub difficulty_level: u8,
    pub authority_score: f32,
    pub word_count: u32,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    History,
    Content,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Suggestion {
    pub text: String,
    pub confidence: f32,
    pub source: SuggestionSource,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Suggestions {
    pub history: Vec<Suggestion>,
    pub content: Vec<Suggestion>,
    pub ai: Vec<Suggestion>,
    pub combined: Vec<Suggestion>,
}

/// Facet counts attached by the faceted strategy.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Facets {
    pub content_types: Vec<(String, u64)>,
    pub technologies: Vec<(String, u64)>,
    pub difficulty: Vec<(u8, u64)>,
    pub sources: Vec<(String, u64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub total_results: usize,
    pub search_time_ms: u64,
    pub search_type: SearchType,
    pub query: String,
    pub applied_filters: SearchFilters,
    pub cache_key: String,
    pub suggestions: Suggestions,
    #[serde(default)]
    pub from_cache: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facets: Option<Facets>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub metadata: ResponseMetadata,
}

/// Caller-supplied attributes for a document being indexed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexMetadata {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content_type: ContentType,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub technology: Vec<String>,
    #[serde(default)]
    pub headings: Vec<String>,
    #[serde(default)]
    pub code_blocks: Vec<String>,
    pub difficulty_level: Option<u8>,
    pub authority_score: Option<f32>,
    pub content_hash: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Process-wide counters exposed for diagnostics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_searches: u64,
    pub cache_hits: u64,
    pub average_latency_ms: f64,
    pub error_count: u64,
}

/// One analytics row per completed (or failed) search.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsRecord {
    pub query_hash: String,
    /// Sanitized query text, kept so history suggestions can be derived.
    pub query: String,
    pub result_count: usize,
    pub latency_ms: u64,
    pub success: bool,
    pub filters: SearchFilters,
    pub session_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_serializes_kebab_case() {
        let json = serde_json::to_string(&ContentType::ApiDocs).unwrap();
        assert_eq!(json, "\"api-docs\"");
        assert_eq!(ContentType::parse("Tutorial"), ContentType::Tutorial);
        assert_eq!(ContentType::parse("blog"), ContentType::Documentation);
    }

    #[test]
    fn document_id_is_stable_per_url() {
        let a = document_id_for_url("https://docs.rs/tokio");
        let b = document_id_for_url("https://docs.rs/tokio");
        let c = document_id_for_url("https://docs.rs/serde");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn search_type_parses_case_insensitively() {
        assert_eq!("Hybrid".parse::<SearchType>().unwrap(), SearchType::Hybrid);
        assert!("fuzzy".parse::<SearchType>().is_err());
    }
}
