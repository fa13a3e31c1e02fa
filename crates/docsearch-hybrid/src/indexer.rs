//! Write path: stores a document, embeds its chunks, updates the text index
//! and invalidates cached search responses.

use std::sync::Arc;

use docsearch_core::config::EngineConfig;
use docsearch_core::text::words;
use docsearch_core::traits::{DocumentCatalog, EmbeddingClient, TextIndexer, VectorIndexer};
use docsearch_core::types::{
    content_hash, document_id_for_url, Document, DocumentId, DocumentMetadata, EmbeddingChunk, IndexMetadata, Source,
};
use docsearch_core::{Error, Result};

use crate::cache::{CacheLayer, SEARCH_KEY_PREFIX};
use crate::rerank::Clock;

const WORDS_PER_MINUTE: u32 = 200;
const DEFAULT_DIFFICULTY: u8 = 2;
const DEFAULT_AUTHORITY: f32 = 50.0;

/// Canonical technology tag and the lowercase words that imply it.
const TECHNOLOGIES: &[(&str, &[&str])] = &[
    ("rust", &["rust", "cargo", "rustc"]),
    ("tokio", &["tokio"]),
    ("python", &["python", "pip", "django", "flask"]),
    ("javascript", &["javascript", "ecmascript"]),
    ("typescript", &["typescript"]),
    ("nodejs", &["nodejs", "npm"]),
    ("react", &["react", "jsx"]),
    ("vue", &["vue", "vuejs"]),
    ("angular", &["angular"]),
    ("go", &["golang"]),
    ("java", &["java", "jvm", "maven", "gradle"]),
    ("kotlin", &["kotlin"]),
    ("swift", &["swift"]),
    ("docker", &["docker", "dockerfile"]),
    ("kubernetes", &["kubernetes", "k8s", "kubectl"]),
    ("postgresql", &["postgres", "postgresql"]),
    ("mysql", &["mysql"]),
    ("redis", &["redis"]),
    ("graphql", &["graphql"]),
    ("html", &["html"]),
    ("css", &["css"]),
    ("sql", &["sql"]),
    ("aws", &["aws"]),
    ("terraform", &["terraform"]),
    ("git", &["git"]),
];

pub struct RealtimeIndexer {
    embedder: Arc<dyn EmbeddingClient>,
    catalog: Arc<dyn DocumentCatalog>,
    vectors: Arc<dyn VectorIndexer>,
    text: Arc<dyn TextIndexer>,
    cache: CacheLayer,
    config: Arc<EngineConfig>,
    clock: Clock,
}

impl RealtimeIndexer {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        catalog: Arc<dyn DocumentCatalog>,
        vectors: Arc<dyn VectorIndexer>,
        text: Arc<dyn TextIndexer>,
        cache: CacheLayer,
        config: Arc<EngineConfig>,
        clock: Clock,
    ) -> Self {
        Self { embedder, catalog, vectors, text, cache, config, clock }
    }

    /// Inserts or updates the document keyed by `meta.url` and returns its id.
    pub async fn index(&self, content: &str, meta: IndexMetadata) -> Result<DocumentId> {
        self.index_inner(content, meta).await.map_err(|e| match e {
            Error::Validation(_) | Error::Indexing(_) => e,
            other => Error::Indexing(other.to_string()),
        })
    }

    async fn index_inner(&self, content: &str, meta: IndexMetadata) -> Result<DocumentId> {
        let url = meta.url.trim().to_string();
        if url.is_empty() {
            return Err(Error::Validation("document url is required".into()));
        }
        if content.trim().is_empty() {
            return Err(Error::Validation(format!("document content is empty for {url}")));
        }

        let source_name = meta.source.clone().filter(|s| !s.trim().is_empty()).unwrap_or_else(|| source_from_url(&url));
        let doc = self.build_document(content, &url, source_name, meta);

        // No store is written until chunks are embedded and checked.
        let texts = chunk_paragraphs(content, self.config.chunk_max_tokens, self.config.chunk_overlap_percent);
        let vectors = self.embedder.embed_batch(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(Error::Indexing(format!("embedder returned {} vectors for {} chunks", vectors.len(), texts.len())));
        }
        let dim = self.config.embedding_dim;
        if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
            return Err(Error::Indexing(format!("embedding dimension {} does not match configured {}", bad.len(), dim)));
        }

        self.ensure_source(&doc.source).await?;
        let id = self.catalog.upsert_document(&doc).await?;
        let doc = Document { id: id.clone(), ..doc };
        let chunks: Vec<EmbeddingChunk> = texts
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(i, (content_text, vector))| EmbeddingChunk {
                document_id: id.clone(),
                chunk_index: i as u32,
                content_text,
                vector,
            })
            .collect();
        self.vectors.replace_chunks(&id, &chunks).await?;
        self.text.index(&doc).await?;
        self.cache.invalidate_prefix(SEARCH_KEY_PREFIX).await;

        tracing::info!(%id, url = %doc.url, chunks = chunks.len(), technologies = ?doc.metadata.technology, "indexed document");
        Ok(id)
    }

    async fn ensure_source(&self, name: &str) -> Result<()> {
        let known = self.catalog.sources().await?.iter().any(|s| s.name == name);
        if !known {
            tracing::debug!(source = name, "registering new source");
            self.catalog.upsert_source(&Source::new(name)).await?;
        }
        Ok(())
    }

    fn build_document(&self, content: &str, url: &str, source: String, meta: IndexMetadata) -> Document {
        let word_count = content.split_whitespace().count() as u32;
        let reading_time = word_count.div_ceil(WORDS_PER_MINUTE).max(1);
        let title = if meta.title.trim().is_empty() {
            meta.headings.first().cloned().unwrap_or_else(|| url.to_string())
        } else {
            meta.title.trim().to_string()
        };

        let detected = detect_technologies(&title, content, &meta.headings);
        let mut technology = meta.technology.clone();
        for tag in &detected {
            if !technology.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                technology.push(tag.clone());
            }
        }
        let mut tags: Vec<String> = technology.iter().map(|t| t.to_lowercase()).collect();
        tags.push(meta.content_type.as_str().to_string());
        if !meta.code_blocks.is_empty() {
            tags.push("code-examples".to_string());
        }
        let mut seen = std::collections::HashSet::new();
        tags.retain(|t| seen.insert(t.clone()));

        Document {
            id: document_id_for_url(url),
            title,
            content: content.to_string(),
            url: url.to_string(),
            content_type: meta.content_type,
            metadata: DocumentMetadata {
                technology,
                headings: meta.headings,
                code_blocks: meta.code_blocks,
                tags,
                ..Default::default()
            },
            difficulty_level: meta.difficulty_level.unwrap_or(DEFAULT_DIFFICULTY).min(self.config.difficulty_scale_max),
            authority_score: meta.authority_score.unwrap_or(DEFAULT_AUTHORITY).clamp(0.0, 100.0),
            word_count,
            reading_time,
            content_hash: meta.content_hash.unwrap_or_else(|| content_hash(content)),
            source,
            updated_at: Some(meta.updated_at.unwrap_or_else(|| (self.clock)())),
        }
    }
}

/// Dictionary tags whose trigger words appear in the title, headings or content.
pub fn detect_technologies(title: &str, content: &str, headings: &[String]) -> Vec<String> {
    let haystack: Vec<String> = words(title)
        .chain(headings.iter().flat_map(|h| words(h)))
        .chain(words(content))
        .collect();
    TECHNOLOGIES
        .iter()
        .filter(|(_, triggers)| triggers.iter().any(|t| haystack.iter().any(|w| w == t)))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

/// Host part of `url` (without `www.`), used as the source name when none is given.
pub fn source_from_url(url: &str) -> String {
    let rest = url.split_once("://").map_or(url, |(_, r)| r);
    let host = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    let host = host.rsplit_once('@').map_or(host, |(_, h)| h);
    let host = host.split(':').next().unwrap_or(host);
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() { "unknown".to_string() } else { host.to_lowercase() }
}

/// Splits on blank lines; paragraphs over `max_tokens` become overlapping word windows.
pub fn chunk_paragraphs(content: &str, max_tokens: usize, overlap_percent: f32) -> Vec<String> {
    let words_per_chunk = (max_tokens * 3 / 5).max(1);
    let overlap_words = ((words_per_chunk as f32 * overlap_percent) as usize).min(words_per_chunk - 1);
    let mut chunks = Vec::new();
    for paragraph in content.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if count_tokens(paragraph) <= max_tokens {
            chunks.push(paragraph.to_string());
            continue;
        }
        let words: Vec<&str> = paragraph.split_whitespace().collect();
        let mut start = 0;
        while start < words.len() {
            let end = (start + words_per_chunk).min(words.len());
            chunks.push(words[start..end].join(" "));
            if end >= words.len() {
                break;
            }
            start = end - overlap_words;
        }
    }
    chunks
}

fn count_tokens(text: &str) -> usize {
    (text.split_whitespace().count() as f32 / 0.75) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_paragraphs_stay_whole() {
        let chunks = chunk_paragraphs("first para\n\n  \n\nsecond para", 500, 0.2);
        assert_eq!(chunks, vec!["first para", "second para"]);
    }

    #[test]
    fn long_paragraph_is_windowed_with_overlap() {
        let text: Vec<String> = (0..25).map(|i| format!("w{i}")).collect();
        // max_tokens 10 -> 6 words per chunk, 1 word overlap
        let chunks = chunk_paragraphs(&text.join(" "), 10, 0.2);
        assert_eq!(chunks[0], "w0 w1 w2 w3 w4 w5");
        assert!(chunks[1].starts_with("w5 "));
        assert!(chunks.last().is_some_and(|c| c.ends_with("w24")));
    }

    #[test]
    fn detects_technologies_as_whole_words() {
        let found = detect_technologies("Async Rust", "Spawn tasks on tokio. Trusted advice.", &["Using Docker".into()]);
        assert_eq!(found, vec!["rust", "tokio", "docker"]);
        assert!(detect_technologies("Trust", "gone golfing", &[]).is_empty());
    }

    #[test]
    fn source_name_comes_from_host() {
        assert_eq!(source_from_url("https://www.Rust-Lang.org/learn?x=1"), "rust-lang.org");
        assert_eq!(source_from_url("http://user@docs.rs:8080/tokio"), "docs.rs");
        assert_eq!(source_from_url("not a url"), "not a url");
    }
}
