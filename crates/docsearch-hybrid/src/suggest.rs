//! Best-effort related-query suggestions from history, corpus and an AI provider.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use docsearch_core::text::{query_terms, words, MIN_TERM_LEN, STOP_WORDS};
use docsearch_core::traits::{AnalyticsSink, SuggestionProvider};
use docsearch_core::types::{SearchResult, Suggestion, SuggestionSource, Suggestions};
use docsearch_core::{Error, Result};

/// How many past queries are scanned for history suggestions.
const HISTORY_WINDOW: usize = 200;

pub struct SuggestionGenerator {
    analytics: Option<Arc<dyn AnalyticsSink>>,
    provider: Option<Arc<dyn SuggestionProvider>>,
    source_cap: usize,
    combined_cap: usize,
    timeout: Duration,
}

impl SuggestionGenerator {
    pub fn new(
        analytics: Option<Arc<dyn AnalyticsSink>>,
        provider: Option<Arc<dyn SuggestionProvider>>,
        source_cap: usize,
        combined_cap: usize,
        timeout: Duration,
    ) -> Self {
        Self { analytics, provider, source_cap, combined_cap, timeout }
    }

    /// Never fails: a failing or slow sub-source contributes an empty list.
    pub async fn generate(&self, query: &str, results: &[SearchResult]) -> Suggestions {
        let (history, ai) = tokio::join!(
            self.bounded("history", self.history(query)),
            self.bounded("ai", self.ai(query)),
        );
        let content = self.content(query, results);
        let combined = combine(&[&history, &content, &ai], self.combined_cap);
        Suggestions { history, content, ai, combined }
    }

    async fn bounded<F>(&self, kind: &'static str, fut: F) -> Vec<Suggestion>
    where
        F: Future<Output = Result<Vec<Suggestion>>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(list)) => list,
            Ok(Err(e)) => {
                tracing::warn!(source = kind, error = %e, "suggestion source failed");
                vec![]
            }
            Err(_) => {
                tracing::warn!(source = kind, timeout_ms = self.timeout.as_millis() as u64, "suggestion source timed out");
                vec![]
            }
        }
    }

    /// Past queries sharing a term with `query`, ranked by how often they were issued.
    async fn history(&self, query: &str) -> Result<Vec<Suggestion>> {
        let Some(analytics) = &self.analytics else {
            return Ok(vec![]);
        };
        let past = analytics
            .recent_queries(HISTORY_WINDOW)
            .await
            .map_err(|e| Error::Suggestion(format!("history lookup: {e}")))?;

        let needle = query.trim().to_lowercase();
        let terms = query_terms(query, MIN_TERM_LEN);
        let mut order: Vec<String> = Vec::new();
        let mut freq: HashMap<String, (String, u32)> = HashMap::new();
        for q in past {
            let key = q.trim().to_lowercase();
            if key.is_empty() || key == needle {
                continue;
            }
            let related = key.contains(&needle) || words(&key).any(|w| terms.contains(&w));
            if !related {
                continue;
            }
            let entry = freq.entry(key.clone()).or_insert_with(|| {
                order.push(key);
                (q.trim().to_string(), 0)
            });
            entry.1 += 1;
        }
        let max = freq.values().map(|(_, n)| *n).max().unwrap_or(1) as f32;
        let mut out: Vec<Suggestion> = order
            .iter()
            .filter_map(|k| freq.get(k))
            .map(|(text, n)| Suggestion {
                text: text.clone(),
                confidence: 0.5 + 0.4 * (*n as f32 / max),
                source: SuggestionSource::History,
            })
            .collect();
        out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        out.truncate(self.source_cap);
        Ok(out)
    }

    /// Terms co-occurring with the query in retrieved titles, technology tags
    /// and headings, ranked by the number of results carrying them.
    fn content(&self, query: &str, results: &[SearchResult]) -> Vec<Suggestion> {
        if results.is_empty() {
            return vec![];
        }
        let query_words = query_terms(query, 0);
        let mut order: Vec<String> = Vec::new();
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        for r in results {
            let mut seen_here: Vec<String> = Vec::new();
            let fields = std::iter::once(r.title.as_str())
                .chain(r.metadata.technology.iter().map(String::as_str))
                .chain(r.metadata.headings.iter().map(String::as_str));
            for field in fields {
                for term in query_terms(field, MIN_TERM_LEN) {
                    if STOP_WORDS.contains(&term.as_str())
                        || query_words.contains(&term)
                        || term.chars().all(|c| c.is_ascii_digit())
                        || seen_here.contains(&term)
                    {
                        continue;
                    }
                    seen_here.push(term);
                }
            }
            for term in seen_here {
                let n = doc_freq.entry(term.clone()).or_insert(0);
                if *n == 0 {
                    order.push(term);
                }
                *n += 1;
            }
        }

        let base = query.trim();
        let total = results.len() as f32;
        let mut out: Vec<Suggestion> = order
            .into_iter()
            .map(|term| {
                let df = doc_freq.get(&term).copied().unwrap_or(0) as f32;
                Suggestion {
                    text: format!("{base} {term}"),
                    confidence: 0.3 + 0.5 * (df / total),
                    source: SuggestionSource::Content,
                }
            })
            .collect();
        out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        out.truncate(self.source_cap);
        out
    }

    async fn ai(&self, query: &str) -> Result<Vec<Suggestion>> {
        let Some(provider) = &self.provider else {
            return Ok(vec![]);
        };
        let lines = provider.suggest(query, self.source_cap).await.map_err(|e| match e {
            Error::Suggestion(_) => e,
            other => Error::Suggestion(other.to_string()),
        })?;
        let needle = query.trim().to_lowercase();
        Ok(lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty() && l.to_lowercase() != needle)
            .take(self.source_cap)
            .enumerate()
            .map(|(i, text)| Suggestion {
                text,
                confidence: (0.7 - 0.1 * i as f32).max(0.1),
                source: SuggestionSource::Ai,
            })
            .collect())
    }
}

/// Case-insensitive dedup keeping the higher confidence, stable sort, capped.
fn combine(lists: &[&Vec<Suggestion>], cap: usize) -> Vec<Suggestion> {
    let mut out: Vec<Suggestion> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for s in lists.iter().flat_map(|l| l.iter()) {
        let key = s.text.to_lowercase();
        match index.get(&key).copied() {
            Some(pos) if out[pos].confidence < s.confidence => out[pos] = s.clone(),
            Some(_) => {}
            None => {
                index.insert(key, out.len());
                out.push(s.clone());
            }
        }
    }
    out.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    out.truncate(cap);
    out
}
