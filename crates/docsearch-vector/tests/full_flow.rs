use std::time::Duration;

use docsearch_core::filter::FilterSet;
use docsearch_core::traits::{CacheStore, DocumentCatalog, VectorIndexer};
use docsearch_core::types::{ContentType, Document, DocumentMetadata, EmbeddingChunk, SearchFilters, Source};
use docsearch_embed::HashEmbedder;
use docsearch_vector::{LanceCache, LanceStore};
use tempfile::TempDir;

const DIM: usize = 64;

fn doc(url: &str, title: &str, content: &str, tech: &[&str], source: &str) -> Document {
    Document {
        id: String::new(),
        title: title.into(),
        content: content.into(),
        url: url.into(),
        content_type: ContentType::ApiDocs,
        metadata: DocumentMetadata {
            technology: tech.iter().map(|s| s.to_string()).collect(),
            headings: vec!["Overview".into()],
            ..Default::default()
        },
        difficulty_level: 2,
        authority_score: 75.0,
        word_count: content.split_whitespace().count() as u32,
        reading_time: 1,
        content_hash: docsearch_core::types::content_hash(content),
        source: source.into(),
        updated_at: Some(chrono::Utc::now()),
    }
}

async fn open_store(tmp: &TempDir) -> LanceStore {
    LanceStore::open(&tmp.path().to_string_lossy(), DIM).await.expect("store")
}

#[tokio::test]
async fn lancedb_full_flow() {
    let tmp = TempDir::new().expect("tmp");
    let store = open_store(&tmp).await;
    let embedder = HashEmbedder::new(DIM);

    store.upsert_source(&Source::new("docs.rs")).await.unwrap();
    let content = "Tokio tasks run on a multi threaded runtime";
    let id = store.upsert_document(&doc("https://docs.rs/tokio", "Tokio", content, &["rust", "tokio"], "docs.rs")).await.unwrap();
    let chunk = EmbeddingChunk { document_id: id.clone(), chunk_index: 0, content_text: content.into(), vector: embedder.embed_sync(content) };
    store.replace_chunks(&id, &[chunk]).await.unwrap();

    let hits = store.search_vec(&embedder.embed_sync("tokio runtime tasks"), 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document_id, id);
    assert!(hits[0].similarity > 0.0 && hits[0].similarity <= 1.0 + 1e-5);

    let rows = store.fetch_documents(&[id.clone()], &FilterSet::default()).await.unwrap();
    assert_eq!(rows.len(), 1);
    let stored = &rows[0].document;
    assert_eq!(stored.metadata.technology, vec!["rust", "tokio"]);
    assert_eq!(stored.metadata.headings, vec!["Overview"]);
    assert_eq!(stored.content_type, ContentType::ApiDocs);
    assert!(stored.updated_at.is_some());
}

#[tokio::test]
async fn upsert_by_url_and_chunk_replacement() {
    let tmp = TempDir::new().expect("tmp");
    let store = open_store(&tmp).await;
    let embedder = HashEmbedder::new(DIM);
    let url = "https://docs.rs/serde";

    let first = store.upsert_document(&doc(url, "Serde", "first body", &["rust"], "docs.rs")).await.unwrap();
    let second = store.upsert_document(&doc(url, "Serde", "second body", &["rust"], "docs.rs")).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(store.count_documents().await.unwrap(), 1);
    assert_eq!(store.get_document_by_url(url).await.unwrap().unwrap().content, "second body");

    let chunks: Vec<EmbeddingChunk> = (0..3)
        .map(|i| EmbeddingChunk {
            document_id: first.clone(),
            chunk_index: i,
            content_text: format!("part {i}"),
            vector: embedder.embed_sync(&format!("part {i}")),
        })
        .collect();
    store.replace_chunks(&first, &chunks).await.unwrap();
    store.replace_chunks(&first, &chunks[..1]).await.unwrap();
    assert_eq!(store.search_vec(&embedder.embed_sync("part"), 10).await.unwrap().len(), 1);

    let wrong = EmbeddingChunk { document_id: first.clone(), chunk_index: 0, content_text: "x".into(), vector: vec![0.0; 3] };
    assert!(store.replace_chunks(&first, &[wrong]).await.is_err());
}

#[tokio::test]
async fn fetch_applies_filters_and_source_activity() {
    let tmp = TempDir::new().expect("tmp");
    let store = open_store(&tmp).await;
    let rust = store.upsert_document(&doc("https://docs.rs/a", "A", "a", &["rust"], "docs.rs")).await.unwrap();
    let go = store.upsert_document(&doc("https://go.dev/b", "B", "b", &["go"], "go.dev")).await.unwrap();
    let old = store.upsert_document(&doc("https://old.dev/c", "C", "c", &["rust"], "old.dev")).await.unwrap();
    store.upsert_source(&Source::new("docs.rs")).await.unwrap();
    store.upsert_source(&Source::new("go.dev")).await.unwrap();
    store.upsert_source(&Source { is_active: false, ..Source::new("old.dev") }).await.unwrap();

    let all = [rust.clone(), go.clone(), old];
    assert_eq!(store.fetch_documents(&all, &FilterSet::default()).await.unwrap().len(), 2);

    let filters = FilterSet::from_filters(&SearchFilters { technologies: Some(vec!["rust".into()]), ..Default::default() });
    let rows = store.fetch_documents(&all, &filters).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].document.id, rust);

    let filters = FilterSet::from_filters(&SearchFilters { sources: Some(vec!["go.dev".into()]), ..Default::default() });
    let rows = store.fetch_documents(&all, &filters).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].document.id, go);
}

#[tokio::test]
async fn technology_filter_treats_like_wildcards_literally() {
    let tmp = TempDir::new().expect("tmp");
    let store = open_store(&tmp).await;
    store.upsert_source(&Source::new("docs.rs")).await.unwrap();
    let ca = store.upsert_document(&doc("https://docs.rs/ca", "Ca", "a", &["ca"], "docs.rs")).await.unwrap();
    let pct = store.upsert_document(&doc("https://docs.rs/pct", "Pct", "b", &["50%"], "docs.rs")).await.unwrap();
    let ids = [ca.clone(), pct.clone()];

    let wildcard = FilterSet::from_filters(&SearchFilters { technologies: Some(vec!["c_".into()]), ..Default::default() });
    assert!(store.fetch_documents(&ids, &wildcard).await.unwrap().is_empty());

    let literal = FilterSet::from_filters(&SearchFilters { technologies: Some(vec!["50%".into()]), ..Default::default() });
    let rows = store.fetch_documents(&ids, &literal).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].document.id, pct);
}

#[tokio::test]
async fn lance_cache_expiry_and_prefix_invalidation() {
    let tmp = TempDir::new().expect("tmp");
    let cache = LanceCache::open(&tmp.path().to_string_lossy()).await.expect("cache");

    cache.set_with_ttl("search:a", b"one".to_vec(), Duration::from_secs(60)).await.unwrap();
    cache.set_with_ttl("search:a", b"two".to_vec(), Duration::from_secs(60)).await.unwrap();
    cache.set_with_ttl("other:b", b"keep".to_vec(), Duration::from_secs(60)).await.unwrap();
    cache.set_with_ttl("search:gone", b"x".to_vec(), Duration::from_millis(0)).await.unwrap();

    assert_eq!(cache.get("search:a").await.unwrap().as_deref(), Some(&b"two"[..]));
    assert_eq!(cache.get("search:gone").await.unwrap(), None);
    assert_eq!(cache.get("missing").await.unwrap(), None);

    cache.invalidate_prefix("search:").await.unwrap();
    assert_eq!(cache.get("search:a").await.unwrap(), None);
    assert_eq!(cache.get("other:b").await.unwrap().as_deref(), Some(&b"keep"[..]));

    cache.set_with_ttl("tmp_1", b"x".to_vec(), Duration::from_secs(60)).await.unwrap();
    cache.set_with_ttl("tmpz1", b"y".to_vec(), Duration::from_secs(60)).await.unwrap();
    cache.invalidate_prefix("tmp_").await.unwrap();
    assert_eq!(cache.get("tmp_1").await.unwrap(), None);
    assert_eq!(cache.get("tmpz1").await.unwrap().as_deref(), Some(&b"y"[..]));
}
