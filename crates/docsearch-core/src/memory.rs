//! In-process store implementing every retrieval capability.
//!
//! Backs tests and the `memory` backend. Documents, sources and chunks live
//! behind one lock, so upserts are atomic per url.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::filter::FilterSet;
use crate::text::{headline_window, squash_relevance, words, STOP_WORDS};
use crate::traits::{DocumentCatalog, TextIndexer, TextQuery, VectorIndexer};
use crate::types::{document_id_for_url, ChunkHit, Document, DocumentId, DocumentRow, EmbeddingChunk, Source, TextHit};

#[derive(Default)]
struct State {
    documents: HashMap<DocumentId, Document>,
    sources: HashMap<String, Source>,
    chunks: HashMap<DocumentId, Vec<EmbeddingChunk>>,
    /// Documents visible to lexical search; populated by `TextIndexer::index`.
    text_indexed: HashMap<DocumentId, Document>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk_count(&self, document_id: &str) -> usize {
        self.state.read().chunks.get(document_id).map_or(0, Vec::len)
    }

    fn source_for(state: &State, name: &str) -> Source {
        state.sources.get(name).cloned().unwrap_or_else(|| Source::new(name))
    }
}

#[async_trait]
impl DocumentCatalog for MemoryStore {
    async fn upsert_document(&self, doc: &Document) -> Result<DocumentId> {
        if doc.url.trim().is_empty() {
            return Err(Error::Indexing("document url is empty".into()));
        }
        let id = document_id_for_url(&doc.url);
        let mut stored = doc.clone();
        stored.id = id.clone();
        self.state.write().documents.insert(id.clone(), stored);
        Ok(id)
    }

    async fn get_document_by_url(&self, url: &str) -> Result<Option<Document>> {
        Ok(self.state.read().documents.get(&document_id_for_url(url)).cloned())
    }

    async fn fetch_documents(&self, ids: &[DocumentId], filters: &FilterSet) -> Result<Vec<DocumentRow>> {
        let state = self.state.read();
        Ok(ids
            .iter()
            .filter_map(|id| state.documents.get(id))
            .map(|d| DocumentRow { document: d.clone(), source: Self::source_for(&state, &d.source) })
            .filter(|row| filters.matches(&row.document, &row.source))
            .collect())
    }

    async fn upsert_source(&self, source: &Source) -> Result<()> {
        self.state.write().sources.insert(source.name.clone(), source.clone());
        Ok(())
    }

    async fn sources(&self) -> Result<Vec<Source>> {
        let mut out: Vec<Source> = self.state.read().sources.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    async fn count_documents(&self) -> Result<usize> {
        Ok(self.state.read().documents.len())
    }
}

#[async_trait]
impl VectorIndexer for MemoryStore {
    async fn replace_chunks(&self, document_id: &str, chunks: &[EmbeddingChunk]) -> Result<()> {
        self.state.write().chunks.insert(document_id.to_string(), chunks.to_vec());
        Ok(())
    }

    async fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<ChunkHit>> {
        let state = self.state.read();
        let mut hits: Vec<ChunkHit> = state
            .chunks
            .values()
            .flatten()
            .filter(|c| c.vector.len() == query_vec.len())
            .map(|c| ChunkHit {
                document_id: c.document_id.clone(),
                chunk_index: c.chunk_index,
                content_text: c.content_text.clone(),
                similarity: cosine_similarity(query_vec, &c.vector),
            })
            .collect();
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k);
        Ok(hits)
    }
}

#[async_trait]
impl TextIndexer for MemoryStore {
    async fn index(&self, doc: &Document) -> Result<()> {
        let id = document_id_for_url(&doc.url);
        let mut stored = doc.clone();
        stored.id = id.clone();
        self.state.write().text_indexed.insert(id, stored);
        Ok(())
    }

    async fn search(&self, query: &TextQuery) -> Result<Vec<TextHit>> {
        let terms: Vec<String> = words(&query.text).filter(|w| !STOP_WORDS.contains(&w.as_str())).collect();
        if terms.is_empty() {
            return Ok(vec![]);
        }
        let state = self.state.read();
        let mut hits: Vec<TextHit> = state
            .text_indexed
            .values()
            .filter(|d| query.active_sources.iter().any(|s| s == &d.source))
            .filter(|d| {
                let source = Self::source_for(&state, &d.source);
                query.filters.clauses.iter().all(|c| c.matches(d, &source))
            })
            .filter_map(|d| {
                let score = lexical_score(&terms, &d.title, &d.content);
                (score > 0.0).then(|| TextHit {
                    document_id: d.id.clone(),
                    score,
                    headline: headline(&d.content, &terms, query.headline_words),
                })
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.document_id.cmp(&b.document_id)));
        hits.truncate(query.limit);
        Ok(hits)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na < f32::EPSILON || nb < f32::EPSILON {
        return 0.0;
    }
    dot / (na * nb)
}

/// Log-damped term frequency over title (double weight) and content,
/// length-normalized and squashed into `[0, 1)`.
fn lexical_score(terms: &[String], title: &str, content: &str) -> f32 {
    let title_words: Vec<String> = words(title).collect();
    let content_words: Vec<String> = words(content).collect();
    let mut score = 0.0f32;
    for term in terms {
        let tf_title = title_words.iter().filter(|w| *w == term).count() as f32;
        let tf_content = content_words.iter().filter(|w| *w == term).count() as f32;
        score += (1.0 + 2.0 * tf_title + tf_content).ln();
    }
    let len_norm = 1.0 + (1.0 + content_words.len() as f32 / 100.0).ln();
    squash_relevance(score / len_norm)
}

/// Headline anchored at the first content word matching a query term.
fn headline(content: &str, terms: &[String], bounds: (usize, usize)) -> Option<String> {
    let first = content.split_whitespace().position(|w| words(w).any(|x| terms.contains(&x)))?;
    Some(headline_window(content, first, bounds))
}
