use std::sync::Arc;

use docsearch_core::config::EngineConfig;
use docsearch_core::traits::DocumentCatalog;
use docsearch_core::types::{ContentType, IndexMetadata, SearchFilters, SearchOptions, SearchType};
use docsearch_embed::HashEmbedder;
use docsearch_hybrid::{MemoryAnalytics, SearchEngine};
use docsearch_text::TantivyIndexer;
use docsearch_vector::{LanceCache, LanceStore};
use tempfile::TempDir;

const DIM: usize = 64;

fn meta(url: &str, title: &str, content_type: ContentType, difficulty: u8) -> IndexMetadata {
    IndexMetadata {
        url: url.into(),
        title: title.into(),
        content_type,
        difficulty_level: Some(difficulty),
        authority_score: Some(80.0),
        ..Default::default()
    }
}

#[tokio::test]
async fn lance_and_tantivy_full_flow() {
    let tmp = TempDir::new().expect("tmp");
    let lance_uri = tmp.path().join("lancedb").to_string_lossy().to_string();
    let store = Arc::new(LanceStore::open(&lance_uri, DIM).await.expect("lance store"));
    let text = Arc::new(TantivyIndexer::open_or_create(&tmp.path().join("tantivy")).expect("tantivy"));
    let cache = Arc::new(LanceCache::open(&lance_uri).await.expect("lance cache"));

    let engine = SearchEngine::builder(EngineConfig { embedding_dim: DIM, min_similarity: 0.0, ..EngineConfig::default() })
        .embedder(Arc::new(HashEmbedder::new(DIM)))
        .catalog(store.clone())
        .vectors(store.clone())
        .text(text.clone())
        .cache_store(cache)
        .analytics(Arc::new(MemoryAnalytics::default()))
        .build()
        .expect("engine");

    engine
        .index(
            "Cursor pagination for REST APIs. Return a next cursor with every page of results.",
            meta("https://api.example.dev/pagination", "REST API pagination", ContentType::ApiDocs, 2),
        )
        .await
        .expect("index rest");
    engine
        .index(
            "Build a tokio runtime and spawn tasks onto it.\n\nTasks are scheduled cooperatively.",
            meta("https://docs.rs/tokio", "Tokio runtime tutorial", ContentType::Tutorial, 1),
        )
        .await
        .expect("index tokio");
    // re-index: same url, new content
    engine
        .index(
            "Cursor based pagination for REST APIs. Each page of results carries a next cursor.",
            meta("https://api.example.dev/pagination", "REST API pagination", ContentType::ApiDocs, 3),
        )
        .await
        .expect("reindex rest");

    assert_eq!(store.count_documents().await.unwrap(), 2);
    assert_eq!(text.num_docs(), 2);

    let resp = engine.search("rest api pagination", SearchOptions::default()).await.expect("search");
    assert_eq!(resp.results[0].url, "https://api.example.dev/pagination");
    assert_eq!(resp.results[0].difficulty_level, 3);
    assert!(resp.results[0].snippet.contains("pagination"));

    let cached = engine.search("rest api pagination", SearchOptions::default()).await.expect("cached search");
    assert!(cached.metadata.from_cache);
    assert_eq!(engine.metrics().cache_hits, 1);

    let options = SearchOptions {
        search_type: SearchType::Keyword,
        filters: SearchFilters { content_types: Some(vec![ContentType::Tutorial]), ..Default::default() },
        ..Default::default()
    };
    let resp = engine.search("tasks runtime", options).await.expect("keyword search");
    assert_eq!(resp.results.len(), 1);
    assert_eq!(resp.results[0].content_type, ContentType::Tutorial);
}
