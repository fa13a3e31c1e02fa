//! Rule-based score adjustment applied after retrieval.
//!
//! Steps run in a fixed order on each result:
//! 1. title matches, additive `0.3` per term
//! 2. document authority, `× (1 + authority/100 × 0.2)`
//! 3. source authority weight, `× (1 + weight × 0.1)`
//! 4. recency over a 365-day horizon, `× (1 + recency × 0.15)`
//! 5. quality bands (word count, authority), capped at `0.5`
//! 6. difficulty alignment, only when a preferred difficulty is given
//!
//! A project tech stack adds a seventh multiplicative context boost. The
//! final re-sort is stable.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use docsearch_core::text::{contains_word, query_terms, MIN_TERM_LEN};
use docsearch_core::types::{RerankingFactors, SearchResult};

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

const TITLE_MATCH_BONUS: f32 = 0.3;
const AUTHORITY_FACTOR: f32 = 0.2;
const SOURCE_AUTHORITY_FACTOR: f32 = 0.1;
const RECENCY_FACTOR: f32 = 0.15;
const RECENCY_HORIZON_DAYS: f32 = 365.0;
const QUALITY_CAP: f32 = 0.5;
const DIFFICULTY_FACTOR: f32 = 0.1;
const CONTEXT_FACTOR: f32 = 0.1;

#[derive(Debug, Clone, Default)]
pub struct RerankOptions<'a> {
    pub preferred_difficulty: Option<u8>,
    pub tech_stack: Option<&'a [String]>,
}

pub struct Reranker {
    difficulty_scale_max: u8,
    clock: Clock,
}

impl Reranker {
    pub fn new(difficulty_scale_max: u8) -> Self {
        Self::with_clock(difficulty_scale_max, Arc::new(Utc::now))
    }

    pub fn with_clock(difficulty_scale_max: u8, clock: Clock) -> Self {
        Self { difficulty_scale_max: difficulty_scale_max.max(1), clock }
    }

    pub fn rerank(&self, mut results: Vec<SearchResult>, query: &str, opts: &RerankOptions<'_>) -> Vec<SearchResult> {
        let terms = query_terms(query, MIN_TERM_LEN);
        let now = (self.clock)();
        for r in &mut results {
            self.apply(r, &terms, now, opts);
        }
        results.sort_by(|a, b| b.score.total_cmp(&a.score));
        results
    }

    fn apply(&self, r: &mut SearchResult, terms: &[String], now: DateTime<Utc>, opts: &RerankOptions<'_>) {
        let original_score = r.score;
        let mut score = r.score;

        let title_matches = terms.iter().filter(|t| contains_word(&r.title, t)).count() as u32;
        score += title_matches as f32 * TITLE_MATCH_BONUS;

        let authority_boost = 1.0 + r.authority_score / 100.0 * AUTHORITY_FACTOR;
        score *= authority_boost;

        let source_authority_boost = 1.0 + r.source.authority * SOURCE_AUTHORITY_FACTOR;
        score *= source_authority_boost;

        let recency = recency(r.updated_at, now);
        let recency_boost = 1.0 + recency * RECENCY_FACTOR;
        score *= recency_boost;

        let quality_boost = quality_boost(r.word_count, r.authority_score);
        score *= 1.0 + quality_boost;

        let difficulty_alignment = opts.preferred_difficulty.map(|preferred| {
            let distance = (i32::from(r.difficulty_level) - i32::from(preferred)).abs() as f32;
            (1.0 - distance / f32::from(self.difficulty_scale_max)).max(0.0)
        });
        if let Some(alignment) = difficulty_alignment {
            score *= 1.0 + alignment * DIFFICULTY_FACTOR;
        }

        let context_boost = opts.tech_stack.filter(|s| !s.is_empty()).map(|stack| {
            let overlap = stack
                .iter()
                .filter(|t| r.metadata.technology.iter().any(|d| d.eq_ignore_ascii_case(t)))
                .count();
            1.0 + CONTEXT_FACTOR * overlap as f32 / stack.len() as f32
        });
        if let Some(boost) = context_boost {
            score *= boost;
        }

        r.score = score;
        r.reranking_factors = Some(RerankingFactors {
            original_score,
            title_matches,
            authority_boost,
            source_authority_boost,
            recency,
            recency_boost,
            quality_boost,
            difficulty_alignment,
            context_boost,
        });
    }
}

/// `1` when updated now, falling linearly to `0` at 365 days; `0` when unknown.
pub fn recency(updated_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
    let Some(updated) = updated_at else {
        return 0.0;
    };
    let days = (now - updated).num_milliseconds() as f32 / 86_400_000.0;
    (1.0 - days / RECENCY_HORIZON_DAYS).clamp(0.0, 1.0)
}

pub fn quality_boost(word_count: u32, authority_score: f32) -> f32 {
    let mut boost = 0.0;
    if word_count > 1000 {
        boost += 0.2;
    } else if word_count > 500 {
        boost += 0.1;
    }
    if authority_score > 80.0 {
        boost += 0.3;
    } else if authority_score > 60.0 {
        boost += 0.2;
    } else if authority_score > 40.0 {
        boost += 0.1;
    }
    f32::min(boost, QUALITY_CAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use docsearch_core::types::{ContentType, DocumentMetadata, SearchType, SourceInfo};

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 1, 12, 0, 0).single().unwrap_or_default()
    }

    fn result(id: &str, title: &str, score: f32) -> SearchResult {
        SearchResult {
            id: id.into(),
            title: title.into(),
            snippet: String::new(),
            url: format!("https://x.dev/{id}"),
            source: SourceInfo { name: "x".into(), source_type: "web".into(), authority: 1.0 },
            score,
            scores: None,
            highlights: vec![],
            metadata: DocumentMetadata::default(),
            reranking_factors: None,
            search_type: SearchType::Hybrid,
            content_type: ContentType::Documentation,
            difficulty_level: 2,
            authority_score: 0.0,
            word_count: 100,
            updated_at: None,
        }
    }

    fn reranker() -> Reranker {
        Reranker::with_clock(4, Arc::new(fixed_now))
    }

    #[test]
    fn recency_is_zero_at_horizon_and_one_now() {
        let now = fixed_now();
        assert_eq!(recency(None, now), 0.0);
        assert_eq!(recency(Some(now - Duration::days(365)), now), 0.0);
        assert_eq!(recency(Some(now - Duration::days(400)), now), 0.0);
        assert!((recency(Some(now), now) - 1.0).abs() < 1e-6);
        assert!((recency(Some(now - Duration::days(73)), now) - 0.8).abs() < 1e-4);
    }

    #[test]
    fn quality_boost_is_capped() {
        assert!((quality_boost(5000, 95.0) - 0.5).abs() < 1e-6);
        assert!((quality_boost(600, 50.0) - 0.2).abs() < 1e-6);
        assert_eq!(quality_boost(10, 10.0), 0.0);
    }

    #[test]
    fn applies_steps_in_order() {
        let mut r = result("a", "REST API pagination guide", 0.5);
        r.authority_score = 50.0;
        r.source.authority = 2.0;
        r.updated_at = Some(fixed_now());
        let out = reranker().rerank(vec![r], "rest api pagination", &RerankOptions { preferred_difficulty: Some(3), tech_stack: None });
        let f = out[0].reranking_factors.unwrap();
        assert_eq!(f.title_matches, 3);
        // (0.5 + 0.9) * 1.1 * 1.2 * 1.15 * 1.1 * (1 + 0.75 * 0.1)
        let expected = 1.4 * 1.1 * 1.2 * 1.15 * 1.1 * 1.075;
        assert!((out[0].score - expected).abs() < 1e-4, "{} vs {}", out[0].score, expected);
        assert_eq!(f.difficulty_alignment, Some(0.75));
        assert!((f.original_score - 0.5).abs() < 1e-6);
        assert!(f.context_boost.is_none());
    }

    #[test]
    fn equal_scores_keep_prior_order() {
        let input = vec![result("first", "x", 0.4), result("second", "y", 0.4), result("top", "z", 0.9)];
        let out = reranker().rerank(input, "nothing", &RerankOptions::default());
        let ids: Vec<_> = out.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["top", "first", "second"]);
    }

    #[test]
    fn context_boost_scales_with_overlap() {
        let mut r = result("a", "t", 1.0);
        r.metadata.technology = vec!["Rust".into()];
        let stack = vec!["rust".to_string(), "tokio".to_string()];
        let out = reranker().rerank(vec![r], "q", &RerankOptions { preferred_difficulty: None, tech_stack: Some(&stack) });
        let boost = out[0].reranking_factors.unwrap().context_boost.unwrap();
        assert!((boost - 1.05).abs() < 1e-6);
    }
}
