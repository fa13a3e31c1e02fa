use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;
use crate::filter::FilterSet;
use crate::types::{AnalyticsRecord, ChunkHit, Document, DocumentId, DocumentRow, EmbeddingChunk, Source, TextHit};

/// Turns text into a fixed-dimension vector.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `http:text-embedding-3-small:d1536`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for t in texts {
            out.push(self.embed(t).await?);
        }
        Ok(out)
    }
}

/// Relational side of the store: documents joined with their sources.
#[async_trait]
pub trait DocumentCatalog: Send + Sync {
    /// Atomic insert-or-update keyed by `url`; returns the document id.
    async fn upsert_document(&self, doc: &Document) -> Result<DocumentId>;
    async fn get_document_by_url(&self, url: &str) -> Result<Option<Document>>;
    /// Rows for `ids` whose source is active and which satisfy every clause in `filters`.
    async fn fetch_documents(&self, ids: &[DocumentId], filters: &FilterSet) -> Result<Vec<DocumentRow>>;
    async fn upsert_source(&self, source: &Source) -> Result<()>;
    async fn sources(&self) -> Result<Vec<Source>>;
    async fn count_documents(&self) -> Result<usize>;
}

/// Chunk-level nearest-neighbour index.
#[async_trait]
pub trait VectorIndexer: Send + Sync {
    /// Replaces every chunk owned by `document_id`.
    async fn replace_chunks(&self, document_id: &str, chunks: &[EmbeddingChunk]) -> Result<()>;
    /// Top `k` chunks by cosine similarity, highest first.
    async fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<ChunkHit>>;
}

/// Lexical query handed to a [`TextIndexer`].
#[derive(Debug, Clone)]
pub struct TextQuery {
    pub text: String,
    pub filters: FilterSet,
    /// Names of active sources; hits from any other source are excluded.
    pub active_sources: Vec<String>,
    pub limit: usize,
    /// Inclusive (min, max) word bounds for the extracted headline.
    pub headline_words: (usize, usize),
}

/// Full-text relevance index over `title || ' ' || content`.
#[async_trait]
pub trait TextIndexer: Send + Sync {
    /// Insert or replace the document with the same url.
    async fn index(&self, doc: &Document) -> Result<()>;
    async fn search(&self, query: &TextQuery) -> Result<Vec<TextHit>>;
}

/// Byte-valued key/value store with per-entry TTL.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;
    /// Drops every entry whose key starts with `prefix`.
    async fn invalidate_prefix(&self, prefix: &str) -> Result<()>;
}

/// Append-only search analytics.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, record: AnalyticsRecord) -> Result<()>;
    /// Most recent successful queries, newest first.
    async fn recent_queries(&self, limit: usize) -> Result<Vec<String>>;
}

/// External generator of related queries.
#[async_trait]
pub trait SuggestionProvider: Send + Sync {
    async fn suggest(&self, query: &str, limit: usize) -> Result<Vec<String>>;
}
