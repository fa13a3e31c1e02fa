pub mod analytics;
pub mod cache;
pub mod engine;
pub mod indexer;
pub mod merge;
pub mod metrics;
pub mod rerank;
pub mod retrieval;
pub mod snippet;
pub mod suggest;

pub use analytics::{MemoryAnalytics, TracingAnalytics};
pub use cache::{cache_key, CacheLayer, MemoryCache};
pub use engine::{SearchEngine, SearchEngineBuilder};
pub use indexer::RealtimeIndexer;
pub use merge::HybridMerger;
pub use rerank::{Clock, Reranker};
pub use snippet::SnippetHighlighter;
pub use suggest::SuggestionGenerator;
