use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use docsearch_core::config::EngineConfig;
use docsearch_core::filter::FilterSet;
use docsearch_core::text::{query_terms, MIN_TERM_LEN};
use docsearch_core::traits::{DocumentCatalog, EmbeddingClient, VectorIndexer};
use docsearch_core::types::{ChunkHit, SearchType};
use docsearch_core::{Error, Result};

use super::{title_match_rank, Candidate, SnippetSource};

pub struct SemanticRetriever {
    embedder: Arc<dyn EmbeddingClient>,
    vectors: Arc<dyn VectorIndexer>,
    catalog: Arc<dyn DocumentCatalog>,
    config: Arc<EngineConfig>,
}

impl SemanticRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingClient>,
        vectors: Arc<dyn VectorIndexer>,
        catalog: Arc<dyn DocumentCatalog>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self { embedder, vectors, catalog, config }
    }

    /// Documents whose best chunk is more similar than `min_similarity`,
    /// ordered by similarity then title-match rank.
    pub async fn retrieve(
        &self,
        query: &str,
        filters: &FilterSet,
        min_similarity: f32,
        limit: usize,
    ) -> Result<Vec<Candidate>> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let query_vec = self.embedder.embed(query).await.map_err(|e| match e {
            Error::EmbeddingGeneration(_) => e,
            other => Error::EmbeddingGeneration(other.to_string()),
        })?;

        // The scan widens until `limit` documents pass the filters, the
        // similarity floor is crossed or the index runs out of chunks.
        let terms = query_terms(query, MIN_TERM_LEN);
        let mut k = limit.saturating_mul(self.config.candidate_multiplier.max(1));
        let mut ranked = loop {
            let hits = self.vectors.search_vec(&query_vec, k).await?;
            let exhausted = hits.len() < k;
            let floor_reached = hits.last().is_some_and(|h| h.similarity <= min_similarity);
            let ranked = self.join_rows(best_chunk_per_document(hits, min_similarity), filters, &terms).await?;
            if ranked.len() >= limit || exhausted || floor_reached || k == usize::MAX {
                break ranked;
            }
            tracing::debug!(k, kept = ranked.len(), limit, "widening vector scan");
            k = k.saturating_mul(2);
        };
        ranked.sort_by(|(ra, a), (rb, b)| b.score.total_cmp(&a.score).then_with(|| rb.total_cmp(ra)));
        ranked.truncate(limit);
        tracing::debug!(candidates = ranked.len(), "semantic retrieval done");
        Ok(ranked.into_iter().map(|(_, c)| c).collect())
    }

    /// Joins chunk hits to their rows, dropping documents the filters reject.
    async fn join_rows(&self, best: Vec<ChunkHit>, filters: &FilterSet, terms: &[String]) -> Result<Vec<(f32, Candidate)>> {
        if best.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<String> = best.iter().map(|h| h.document_id.clone()).collect();
        let mut rows: HashMap<String, _> =
            self.catalog.fetch_documents(&ids, filters).await?.into_iter().map(|r| (r.document.id.clone(), r)).collect();
        Ok(best
            .into_iter()
            .filter_map(|hit| {
                let row = rows.remove(&hit.document_id)?;
                let rank = title_match_rank(&row.document.title, terms);
                Some((
                    rank,
                    Candidate {
                        row,
                        score: hit.similarity,
                        scores: None,
                        snippet_source: SnippetSource::Chunk { index: hit.chunk_index, text: hit.content_text },
                        search_type: SearchType::Semantic,
                    },
                ))
            })
            .collect())
    }
}

/// Keeps the first (highest) chunk per document above the similarity floor.
/// `hits` must already be ordered by similarity descending.
fn best_chunk_per_document(hits: Vec<ChunkHit>, min_similarity: f32) -> Vec<ChunkHit> {
    let mut seen = HashSet::new();
    hits.into_iter().filter(|h| h.similarity > min_similarity && seen.insert(h.document_id.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(doc: &str, idx: u32, sim: f32) -> ChunkHit {
        ChunkHit { document_id: doc.into(), chunk_index: idx, content_text: format!("{doc}-{idx}"), similarity: sim }
    }

    #[test]
    fn collapses_to_best_chunk_and_applies_floor() {
        let hits = vec![hit("a", 2, 0.95), hit("b", 0, 0.9), hit("a", 0, 0.85), hit("c", 1, 0.7)];
        let best = best_chunk_per_document(hits, 0.7);
        let ids: Vec<_> = best.iter().map(|h| (h.document_id.as_str(), h.chunk_index)).collect();
        assert_eq!(ids, vec![("a", 2), ("b", 0)]);
    }
}
