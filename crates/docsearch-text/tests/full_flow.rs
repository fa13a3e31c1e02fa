use docsearch_core::filter::FilterSet;
use docsearch_core::traits::{TextIndexer, TextQuery};
use docsearch_core::types::{document_id_for_url, ContentType, Document, DocumentMetadata, SearchFilters};
use docsearch_text::TantivyIndexer;

fn doc(url: &str, title: &str, content: &str, tech: &[&str], difficulty: u8, source: &str) -> Document {
    Document {
        id: String::new(),
        title: title.into(),
        content: content.into(),
        url: url.into(),
        content_type: ContentType::Tutorial,
        metadata: DocumentMetadata { technology: tech.iter().map(|s| s.to_string()).collect(), ..Default::default() },
        difficulty_level: difficulty,
        authority_score: 50.0,
        word_count: 0,
        reading_time: 1,
        content_hash: String::new(),
        source: source.into(),
        updated_at: None,
    }
}

fn query(text: &str, filters: FilterSet, sources: &[&str]) -> TextQuery {
    TextQuery {
        text: text.into(),
        filters,
        active_sources: sources.iter().map(|s| s.to_string()).collect(),
        limit: 10,
        headline_words: (3, 8),
    }
}

async fn seeded() -> TantivyIndexer {
    let idx = TantivyIndexer::create_in_ram().expect("index");
    idx.index(&doc(
        "https://docs.rs/axum/pagination",
        "REST API pagination with axum",
        "Cursor pagination keeps REST API responses small. Return a next cursor with every page.",
        &["rust", "axum"],
        2,
        "docs.rs",
    ))
    .await
    .unwrap();
    idx.index(&doc(
        "https://go.dev/blog/pagination",
        "Paging in Go services",
        "Offset pagination is simple but slow on deep pages of an API.",
        &["go"],
        3,
        "go.dev",
    ))
    .await
    .unwrap();
    idx.index(&doc(
        "https://docs.rs/tokio/intro",
        "Tokio runtime",
        "Spawning tasks onto the runtime.",
        &["rust", "tokio"],
        1,
        "docs.rs",
    ))
    .await
    .unwrap();
    idx
}

#[tokio::test]
async fn tantivy_full_flow() {
    let idx = seeded().await;
    assert_eq!(idx.num_docs(), 3);

    let hits = idx.search(&query("rest api pagination", FilterSet::default(), &["docs.rs", "go.dev"])).await.unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].document_id, document_id_for_url("https://docs.rs/axum/pagination"));
    assert!(hits[0].score >= hits[1].score);
    assert!(hits.iter().all(|h| h.score > 0.0 && h.score < 1.0));
    let headline = hits[0].headline.as_deref().unwrap();
    let words = headline.split_whitespace().count();
    assert!((3..=8).contains(&words), "headline '{headline}' has {words} words");
}

#[tokio::test]
async fn filters_and_inactive_sources_restrict_hits() {
    let idx = seeded().await;

    let rust_only = FilterSet::from_filters(&SearchFilters { technologies: Some(vec!["Rust".into()]), ..Default::default() });
    let hits = idx.search(&query("pagination", rust_only, &["docs.rs", "go.dev"])).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document_id, document_id_for_url("https://docs.rs/axum/pagination"));

    let level_three = FilterSet::from_filters(&SearchFilters { difficulty: Some(vec![3]), ..Default::default() });
    let hits = idx.search(&query("pagination", level_three, &["docs.rs", "go.dev"])).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document_id, document_id_for_url("https://go.dev/blog/pagination"));

    let hits = idx.search(&query("pagination", FilterSet::default(), &["go.dev"])).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(idx.search(&query("pagination", FilterSet::default(), &[])).await.unwrap().is_empty());
}

#[tokio::test]
async fn reindexing_a_url_replaces_the_document() {
    let dir = tempfile::tempdir().unwrap();
    let idx = TantivyIndexer::open_or_create(dir.path()).expect("index");
    let url = "https://docs.rs/serde/derive";
    idx.index(&doc(url, "Serde derive", "Derive Serialize for structs.", &["rust"], 1, "docs.rs")).await.unwrap();
    idx.index(&doc(url, "Serde derive", "Derive Deserialize with attributes.", &["rust"], 1, "docs.rs")).await.unwrap();
    assert_eq!(idx.num_docs(), 1);

    let sources = ["docs.rs"];
    assert!(idx.search(&query("serialize", FilterSet::default(), &sources)).await.unwrap().is_empty());
    assert_eq!(idx.search(&query("deserialize", FilterSet::default(), &sources)).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_searches_return_identical_hits() {
    let idx = seeded().await;
    let q = query("pagination", FilterSet::default(), &["docs.rs", "go.dev"]);
    let (a, b) = tokio::join!(idx.search(&q), idx.search(&q));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.len(), 2);
    let ids = |hits: &[docsearch_core::types::TextHit]| hits.iter().map(|h| h.document_id.clone()).collect::<Vec<_>>();
    assert_eq!(ids(&a), ids(&b));
}
