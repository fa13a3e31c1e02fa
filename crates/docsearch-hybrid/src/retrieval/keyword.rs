use std::collections::HashMap;
use std::sync::Arc;

use docsearch_core::config::EngineConfig;
use docsearch_core::filter::FilterSet;
use docsearch_core::traits::{DocumentCatalog, TextIndexer, TextQuery};
use docsearch_core::types::SearchType;
use docsearch_core::Result;

use super::{Candidate, SnippetSource};

pub struct KeywordRetriever {
    text: Arc<dyn TextIndexer>,
    catalog: Arc<dyn DocumentCatalog>,
    config: Arc<EngineConfig>,
}

impl KeywordRetriever {
    pub fn new(text: Arc<dyn TextIndexer>, catalog: Arc<dyn DocumentCatalog>, config: Arc<EngineConfig>) -> Self {
        Self { text, catalog, config }
    }

    /// Lexical hits over title and content, ordered by relevance then authority.
    pub async fn retrieve(&self, query: &str, filters: &FilterSet, limit: usize) -> Result<Vec<Candidate>> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let active_sources: Vec<String> =
            self.catalog.sources().await?.into_iter().filter(|s| s.is_active).map(|s| s.name).collect();
        if active_sources.is_empty() {
            return Ok(vec![]);
        }
        let hits = self
            .text
            .search(&TextQuery {
                text: query.to_string(),
                filters: filters.clone(),
                active_sources,
                limit,
                headline_words: (self.config.headline_min_words, self.config.headline_max_words),
            })
            .await?;
        if hits.is_empty() {
            return Ok(vec![]);
        }

        let ids: Vec<String> = hits.iter().map(|h| h.document_id.clone()).collect();
        let mut rows: HashMap<String, _> =
            self.catalog.fetch_documents(&ids, filters).await?.into_iter().map(|r| (r.document.id.clone(), r)).collect();

        let mut candidates: Vec<Candidate> = hits
            .into_iter()
            .filter_map(|hit| {
                let row = rows.remove(&hit.document_id)?;
                Some(Candidate {
                    row,
                    score: hit.score,
                    scores: None,
                    snippet_source: SnippetSource::Headline(hit.headline),
                    search_type: SearchType::Keyword,
                })
            })
            .collect();
        candidates.sort_by(|a, b| {
            b.score.total_cmp(&a.score).then_with(|| b.row.document.authority_score.total_cmp(&a.row.document.authority_score))
        });
        candidates.truncate(limit);
        tracing::debug!(candidates = candidates.len(), "keyword retrieval done");
        Ok(candidates)
    }
}
