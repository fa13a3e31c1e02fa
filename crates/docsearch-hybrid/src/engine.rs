//! Search orchestrator.
//!
//! `search` runs: sanitize, cache lookup, strategy dispatch under the request
//! deadline, snippet annotation, reranking, truncation, suggestions, cache
//! write, metrics and a detached analytics write. Fatal errors are counted and
//! returned as `Error::SearchFailed`; validation errors are returned as-is.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use docsearch_core::config::EngineConfig;
use docsearch_core::filter::FilterSet;
use docsearch_core::memory::MemoryStore;
use docsearch_core::text::truncate_chars;
use docsearch_core::traits::{
    AnalyticsSink, CacheStore, DocumentCatalog, EmbeddingClient, SuggestionProvider, TextIndexer, VectorIndexer,
};
use docsearch_core::types::{
    AnalyticsRecord, DocumentId, Facets, IndexMetadata, MetricsSnapshot, ResponseMetadata, SearchOptions,
    SearchResponse, SearchResult, SearchType,
};
use docsearch_core::{Error, Result};

use crate::cache::{cache_key, CacheLayer, SEARCH_KEY_PREFIX};
use crate::indexer::RealtimeIndexer;
use crate::merge::HybridMerger;
use crate::metrics::Metrics;
use crate::rerank::{Clock, RerankOptions, Reranker};
use crate::retrieval::{Candidate, KeywordRetriever, SemanticRetriever, SnippetSource};
use crate::snippet::SnippetHighlighter;
use crate::suggest::SuggestionGenerator;

pub struct SearchEngine {
    config: Arc<EngineConfig>,
    semantic: SemanticRetriever,
    keyword: KeywordRetriever,
    merger: HybridMerger,
    reranker: Reranker,
    highlighter: SnippetHighlighter,
    suggestions: SuggestionGenerator,
    indexer: RealtimeIndexer,
    cache: CacheLayer,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    metrics: Metrics,
}

/// Retrieval output before response assembly.
struct Ranked {
    results: Vec<SearchResult>,
    facets: Option<Facets>,
}

impl SearchEngine {
    pub fn builder(config: EngineConfig) -> SearchEngineBuilder {
        SearchEngineBuilder::new(config)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn index(&self, content: &str, metadata: IndexMetadata) -> Result<DocumentId> {
        self.indexer.index(content, metadata).await
    }

    /// Drops every cached search response.
    pub async fn invalidate_cache(&self) {
        self.cache.invalidate_prefix(SEARCH_KEY_PREFIX).await;
    }

    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        let started = Instant::now();
        self.metrics.record_search();

        let query = match self.sanitize(query) {
            Ok(q) => q,
            Err(e) => {
                self.metrics.record_error();
                return Err(e);
            }
        };
        let search_type = options.search_type;
        let key = cache_key(&query, &options.filters, search_type);

        if !options.skip_cache {
            if let Some(mut cached) = self.cache.get(&key).await {
                let elapsed = elapsed_ms(started);
                self.metrics.record_cache_hit();
                self.metrics.record_latency(elapsed);
                cached.metadata.from_cache = true;
                cached.metadata.search_time_ms = elapsed;
                tracing::debug!(cache_key = %key, "cache hit");
                self.record_analytics(&query, &options, cached.results.len(), elapsed, true);
                return Ok(cached);
            }
        }

        let timeout_ms = self.config.request_timeout_ms;
        let ranked = match tokio::time::timeout(Duration::from_millis(timeout_ms), self.run_strategy(&query, &options)).await {
            Ok(Ok(ranked)) => ranked,
            Ok(Err(e)) => return Err(self.fail(&query, &options, started, e)),
            Err(_) => return Err(self.fail(&query, &options, started, Error::Timeout(timeout_ms))),
        };

        let suggestions = self.suggestions.generate(&query, &ranked.results).await;
        let elapsed = elapsed_ms(started);
        let response = SearchResponse {
            metadata: ResponseMetadata {
                total_results: ranked.results.len(),
                search_time_ms: elapsed,
                search_type,
                query: query.clone(),
                applied_filters: options.filters.clone(),
                cache_key: key.clone(),
                suggestions,
                from_cache: false,
                facets: ranked.facets,
            },
            results: ranked.results,
        };

        if !options.skip_cache {
            self.cache.set(&key, &response).await;
        }
        self.metrics.record_latency(elapsed);
        self.record_analytics(&query, &options, response.results.len(), elapsed, true);
        tracing::debug!(search_type = search_type.as_str(), results = response.results.len(), elapsed_ms = elapsed, "search done");
        Ok(response)
    }

    /// Trims, rejects empty input and truncates to `max_query_length` chars.
    fn sanitize(&self, query: &str) -> Result<String> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(Error::Validation("query must be a non-empty string".into()));
        }
        Ok(truncate_chars(trimmed, self.config.max_query_length).to_string())
    }

    fn fail(&self, query: &str, options: &SearchOptions, started: Instant, err: Error) -> Error {
        let elapsed = elapsed_ms(started);
        self.metrics.record_error();
        self.record_analytics(query, options, 0, elapsed, false);
        tracing::warn!(error = %err, elapsed_ms = elapsed, "search failed");
        err.into_search_failed()
    }

    async fn run_strategy(&self, query: &str, options: &SearchOptions) -> Result<Ranked> {
        let filters = FilterSet::from_filters(&options.filters);
        let max_results = options.max_results.unwrap_or(self.config.default_max_results);
        let min_similarity = options
            .min_similarity
            .filter(|v| v.is_finite())
            .unwrap_or(self.config.min_similarity)
            .clamp(0.0, 1.0);
        let tech_stack: Option<&[String]> = match options.search_type {
            SearchType::Contextual => {
                options.project_context.as_ref().map(|p| p.tech_stack.as_slice()).filter(|s| !s.is_empty())
            }
            _ => None,
        };

        let candidates = match options.search_type {
            SearchType::Semantic => self.semantic.retrieve(query, &filters, min_similarity, max_results).await?,
            SearchType::Keyword => self.keyword.retrieve(query, &filters, max_results).await?,
            SearchType::Hybrid | SearchType::Faceted => self.hybrid(query, &filters, min_similarity).await?,
            SearchType::Contextual => {
                let enriched = match tech_stack {
                    Some(stack) => format!("{query} {}", stack.join(" ")),
                    None => query.to_string(),
                };
                let enriched = truncate_chars(&enriched, self.config.max_query_length).to_string();
                self.hybrid(&enriched, &filters, min_similarity).await?
            }
        };
        tracing::debug!(search_type = options.search_type.as_str(), candidates = candidates.len(), "retrieval done");

        let mut results = self.annotate(candidates, query);
        if !options.skip_reranking {
            let opts = RerankOptions { preferred_difficulty: options.preferred_difficulty, tech_stack };
            results = self.reranker.rerank(results, query, &opts);
        }
        results.truncate(max_results);

        let facets = (options.search_type == SearchType::Faceted).then(|| facet_counts(&results));
        Ok(Ranked { results, facets })
    }

    async fn hybrid(&self, query: &str, filters: &FilterSet, min_similarity: f32) -> Result<Vec<Candidate>> {
        self.merger
            .run(&self.semantic, &self.keyword, query, filters, min_similarity, self.config.hybrid_candidate_limit)
            .await
    }

    fn annotate(&self, candidates: Vec<Candidate>, query: &str) -> Vec<SearchResult> {
        candidates
            .into_iter()
            .map(|c| {
                let (snippet, highlights) = match &c.snippet_source {
                    SnippetSource::Chunk { text, .. } => {
                        (self.highlighter.snippet(text, query), self.highlighter.highlights(text, query))
                    }
                    SnippetSource::Headline(headline) => {
                        let content = &c.row.document.content;
                        (
                            self.highlighter.snippet_with_fallback(content, query, headline.as_deref()),
                            self.highlighter.highlights(content, query),
                        )
                    }
                };
                c.into_result(snippet, highlights)
            })
            .collect()
    }

    /// Detached write; never awaited on the response path. Without a Tokio
    /// runtime to spawn onto, the record is dropped.
    fn record_analytics(&self, query: &str, options: &SearchOptions, result_count: usize, latency_ms: u64, success: bool) {
        let Some(sink) = self.analytics.clone() else {
            return;
        };
        let record = AnalyticsRecord {
            query_hash: blake3::hash(query.as_bytes()).to_hex().to_string(),
            query: query.to_string(),
            result_count,
            latency_ms,
            success,
            filters: options.filters.clone(),
            session_id: options.session_id.clone(),
            timestamp: Utc::now(),
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            tracing::debug!("no tokio runtime, analytics record dropped");
            return;
        };
        handle.spawn(async move {
            if let Err(e) = sink.record(record).await {
                tracing::debug!(error = %e, "analytics write dropped");
            }
        });
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

/// Counts over the final result set, most frequent first, then by key.
fn facet_counts(results: &[SearchResult]) -> Facets {
    fn sorted<K: Ord + Clone>(counts: BTreeMap<K, u64>) -> Vec<(K, u64)> {
        let mut v: Vec<(K, u64)> = counts.into_iter().collect();
        v.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        v
    }
    let mut content_types = BTreeMap::new();
    let mut technologies = BTreeMap::new();
    let mut difficulty = BTreeMap::new();
    let mut sources = BTreeMap::new();
    for r in results {
        *content_types.entry(r.content_type.as_str().to_string()).or_insert(0) += 1;
        *difficulty.entry(r.difficulty_level).or_insert(0) += 1;
        *sources.entry(r.source.name.clone()).or_insert(0) += 1;
        let mut seen: Vec<String> = Vec::new();
        for t in &r.metadata.technology {
            let t = t.to_lowercase();
            if !seen.contains(&t) {
                *technologies.entry(t.clone()).or_insert(0) += 1;
                seen.push(t);
            }
        }
    }
    Facets {
        content_types: sorted(content_types),
        technologies: sorted(technologies),
        difficulty: sorted(difficulty),
        sources: sorted(sources),
    }
}

/// Wires collaborators into a [`SearchEngine`].
pub struct SearchEngineBuilder {
    config: EngineConfig,
    embedder: Option<Arc<dyn EmbeddingClient>>,
    catalog: Option<Arc<dyn DocumentCatalog>>,
    vectors: Option<Arc<dyn VectorIndexer>>,
    text: Option<Arc<dyn TextIndexer>>,
    cache_store: Option<Arc<dyn CacheStore>>,
    analytics: Option<Arc<dyn AnalyticsSink>>,
    suggestion_provider: Option<Arc<dyn SuggestionProvider>>,
    clock: Option<Clock>,
}

impl SearchEngineBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            embedder: None,
            catalog: None,
            vectors: None,
            text: None,
            cache_store: None,
            analytics: None,
            suggestion_provider: None,
            clock: None,
        }
    }

    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingClient>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn catalog(mut self, catalog: Arc<dyn DocumentCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn vectors(mut self, vectors: Arc<dyn VectorIndexer>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    pub fn text(mut self, text: Arc<dyn TextIndexer>) -> Self {
        self.text = Some(text);
        self
    }

    /// Uses one in-process store for the catalog, vector and text roles.
    pub fn memory_store(self, store: Arc<MemoryStore>) -> Self {
        self.catalog(store.clone()).vectors(store.clone()).text(store)
    }

    pub fn cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    pub fn analytics(mut self, sink: Arc<dyn AnalyticsSink>) -> Self {
        self.analytics = Some(sink);
        self
    }

    pub fn suggestion_provider(mut self, provider: Arc<dyn SuggestionProvider>) -> Self {
        self.suggestion_provider = Some(provider);
        self
    }

    pub fn clock(mut self, clock: Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Result<SearchEngine> {
        self.config.validate()?;
        let missing = |what: &str| Error::InvalidConfig(format!("search engine requires a {what}"));
        let embedder = self.embedder.ok_or_else(|| missing("embedder"))?;
        let catalog = self.catalog.ok_or_else(|| missing("document catalog"))?;
        let vectors = self.vectors.ok_or_else(|| missing("vector index"))?;
        let text = self.text.ok_or_else(|| missing("text index"))?;
        if embedder.dim() != self.config.embedding_dim {
            return Err(Error::InvalidConfig(format!(
                "embedder '{}' produces {} dimensions, engine.embedding_dim is {}",
                embedder.id(),
                embedder.dim(),
                self.config.embedding_dim
            )));
        }

        let config = Arc::new(self.config);
        let clock: Clock = self.clock.unwrap_or_else(|| Arc::new(Utc::now));
        let cache = CacheLayer::new(self.cache_store, Duration::from_secs(config.cache_ttl_secs));

        Ok(SearchEngine {
            semantic: SemanticRetriever::new(embedder.clone(), vectors.clone(), catalog.clone(), config.clone()),
            keyword: KeywordRetriever::new(text.clone(), catalog.clone(), config.clone()),
            merger: HybridMerger::new(config.semantic_weight, config.keyword_weight),
            reranker: Reranker::with_clock(config.difficulty_scale_max, clock.clone()),
            highlighter: SnippetHighlighter::new(config.snippet_max_length, config.highlight_max_count),
            suggestions: SuggestionGenerator::new(
                self.analytics.clone(),
                self.suggestion_provider,
                config.suggestion_source_cap,
                config.suggestion_combined_cap,
                Duration::from_millis(config.suggestion_timeout_ms),
            ),
            indexer: RealtimeIndexer::new(embedder, catalog, vectors, text, cache.clone(), config.clone(), clock),
            cache,
            analytics: self.analytics,
            metrics: Metrics::new(),
            config,
        })
    }
}
