//! Weighted fusion of semantic and keyword candidates.

use std::collections::HashMap;

use docsearch_core::filter::FilterSet;
use docsearch_core::types::{ScoreBreakdown, SearchType};
use docsearch_core::Result;

use crate::retrieval::{Candidate, KeywordRetriever, SemanticRetriever};

#[derive(Debug, Clone, Copy)]
pub struct HybridMerger {
    pub semantic_weight: f32,
    pub keyword_weight: f32,
}

impl Default for HybridMerger {
    fn default() -> Self {
        Self { semantic_weight: 0.7, keyword_weight: 0.3 }
    }
}

impl HybridMerger {
    pub fn new(semantic_weight: f32, keyword_weight: f32) -> Self {
        Self { semantic_weight, keyword_weight }
    }

    /// Runs both retrievers concurrently; the first failure cancels the other branch.
    pub async fn run(
        &self,
        semantic: &SemanticRetriever,
        keyword: &KeywordRetriever,
        query: &str,
        filters: &FilterSet,
        min_similarity: f32,
        per_retriever_limit: usize,
    ) -> Result<Vec<Candidate>> {
        let (sem, kw) = tokio::try_join!(
            semantic.retrieve(query, filters, min_similarity, per_retriever_limit),
            keyword.retrieve(query, filters, per_retriever_limit),
        )?;
        tracing::debug!(semantic = sem.len(), keyword = kw.len(), "hybrid fan-in");
        Ok(self.fuse(sem, kw))
    }

    /// Fuses by document id and sorts by combined score descending.
    ///
    /// The snippet source follows the higher raw sub-score; ties keep the semantic one.
    pub fn fuse(&self, semantic: Vec<Candidate>, keyword: Vec<Candidate>) -> Vec<Candidate> {
        let mut order: Vec<Candidate> = Vec::with_capacity(semantic.len() + keyword.len());
        let mut index: HashMap<String, usize> = HashMap::new();

        for mut c in semantic {
            let s = c.score;
            let combined = s * self.semantic_weight;
            c.scores = Some(ScoreBreakdown { semantic: s, keyword: 0.0, combined });
            c.score = combined;
            c.search_type = SearchType::Hybrid;
            index.insert(c.id().to_string(), order.len());
            order.push(c);
        }

        for mut k in keyword {
            let kscore = k.score;
            let existing_pos = index.get(k.id()).copied();
            match existing_pos {
                Some(pos) => {
                    let existing = &mut order[pos];
                    let s = existing.scores.map_or(0.0, |b| b.semantic);
                    let combined = s * self.semantic_weight + kscore * self.keyword_weight;
                    if kscore > s {
                        existing.snippet_source = k.snippet_source;
                    }
                    existing.scores = Some(ScoreBreakdown { semantic: s, keyword: kscore, combined });
                    existing.score = combined;
                }
                None => {
                    let combined = kscore * self.keyword_weight;
                    k.scores = Some(ScoreBreakdown { semantic: 0.0, keyword: kscore, combined });
                    k.score = combined;
                    k.search_type = SearchType::Hybrid;
                    index.insert(k.id().to_string(), order.len());
                    order.push(k);
                }
            }
        }

        order.sort_by(|a, b| b.score.total_cmp(&a.score));
        order
    }
}
