//! Document-level candidates produced by the semantic and keyword retrievers.

pub mod keyword;
pub mod semantic;

pub use keyword::KeywordRetriever;
pub use semantic::SemanticRetriever;

use docsearch_core::types::{DocumentRow, ScoreBreakdown, SearchResult, SearchType, SourceInfo};

/// Text a result's snippet and highlights are built from.
#[derive(Debug, Clone, PartialEq)]
pub enum SnippetSource {
    /// Best-matching chunk of a semantic hit.
    Chunk { index: u32, text: String },
    /// Store-provided headline of a keyword hit, if any.
    Headline(Option<String>),
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub row: DocumentRow,
    pub score: f32,
    pub scores: Option<ScoreBreakdown>,
    pub snippet_source: SnippetSource,
    pub search_type: SearchType,
}

impl Candidate {
    pub fn id(&self) -> &str {
        &self.row.document.id
    }

    pub fn into_result(self, snippet: String, highlights: Vec<String>) -> SearchResult {
        let source = SourceInfo::from(&self.row.source);
        let doc = self.row.document;
        SearchResult {
            id: doc.id,
            title: doc.title,
            snippet,
            url: doc.url,
            source,
            score: self.score,
            scores: self.scores,
            highlights,
            metadata: doc.metadata,
            reranking_factors: None,
            search_type: self.search_type,
            content_type: doc.content_type,
            difficulty_level: doc.difficulty_level,
            authority_score: doc.authority_score,
            word_count: doc.word_count,
            updated_at: doc.updated_at,
        }
    }
}

/// Fraction of length-filtered query terms appearing as whole words in `title`.
pub(crate) fn title_match_rank(title: &str, terms: &[String]) -> f32 {
    if terms.is_empty() {
        return 0.0;
    }
    let hits = terms.iter().filter(|t| docsearch_core::text::contains_word(title, t)).count();
    hits as f32 / terms.len() as f32
}
