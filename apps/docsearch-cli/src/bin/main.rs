use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use docsearch_core::config::{expand_path, CacheBackend, Config};
use docsearch_core::traits::{CacheStore, DocumentCatalog};
use docsearch_core::types::{ContentType, IndexMetadata, ProjectContext, SearchFilters, SearchOptions, SearchType};
use docsearch_embed::{get_default_embedder, get_suggestion_provider};
use docsearch_hybrid::{MemoryCache, SearchEngine, TracingAnalytics};
use docsearch_text::TantivyIndexer;
use docsearch_vector::{LanceCache, LanceStore};

#[derive(Parser)]
#[command(name = "docsearch", about = "Hybrid semantic + keyword documentation search")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index one document read from a file (or stdin with `-`).
    Index {
        #[arg(long)]
        url: String,
        #[arg(long, default_value = "")]
        title: String,
        #[arg(long)]
        file: PathBuf,
        #[arg(long, default_value = "documentation")]
        content_type: String,
        #[arg(long)]
        source: Option<String>,
        #[arg(long = "tech")]
        technology: Vec<String>,
        #[arg(long)]
        difficulty: Option<u8>,
        #[arg(long)]
        authority: Option<f32>,
    },
    /// Run a search and print the ranked results.
    Search {
        query: String,
        #[arg(long = "type", default_value = "hybrid")]
        search_type: String,
        #[arg(long)]
        max: Option<usize>,
        #[arg(long)]
        min_similarity: Option<f32>,
        #[arg(long = "tech")]
        technologies: Vec<String>,
        #[arg(long = "difficulty")]
        difficulty: Vec<u8>,
        #[arg(long = "content-type")]
        content_types: Vec<String>,
        #[arg(long = "source")]
        sources: Vec<String>,
        #[arg(long)]
        preferred_difficulty: Option<u8>,
        #[arg(long = "stack")]
        tech_stack: Vec<String>,
        #[arg(long)]
        skip_cache: bool,
        #[arg(long)]
        skip_rerank: bool,
        #[arg(long)]
        json: bool,
    },
    /// Print corpus statistics.
    Stats,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn non_empty<T>(v: Vec<T>) -> Option<Vec<T>> {
    if v.is_empty() { None } else { Some(v) }
}

struct Services {
    engine: SearchEngine,
    store: Arc<LanceStore>,
}

async fn build_services(config: &Config) -> anyhow::Result<Services> {
    let engine_cfg = config.engine()?;
    let data = config.data()?;
    let lancedb_dir = expand_path(&data.lancedb_dir);
    let tantivy_dir = expand_path(&data.tantivy_dir);
    tracing::info!(lancedb = %lancedb_dir.display(), tantivy = %tantivy_dir.display(), "opening stores");

    let store = Arc::new(
        LanceStore::open(&lancedb_dir.to_string_lossy(), engine_cfg.embedding_dim)
            .await
            .with_context(|| format!("opening LanceDB at {}", lancedb_dir.display()))?,
    );
    let text = Arc::new(
        TantivyIndexer::open_or_create(&tantivy_dir)
            .with_context(|| format!("opening Tantivy index at {}", tantivy_dir.display()))?,
    );
    let embedder = get_default_embedder(&config.embedding()?, engine_cfg.embedding_dim)?;
    let cache: Arc<dyn CacheStore> = match config.cache()?.backend {
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::Lance => Arc::new(LanceCache::with_connection(store.connection().clone()).await?),
    };

    let mut builder = SearchEngine::builder(engine_cfg)
        .embedder(embedder)
        .catalog(store.clone())
        .vectors(store.clone())
        .text(text)
        .cache_store(cache)
        .analytics(Arc::new(TracingAnalytics));
    if let Some(provider) = get_suggestion_provider(&config.suggestions()?)? {
        builder = builder.suggestion_provider(provider);
    }
    Ok(Services { engine: builder.build()?, store })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {}", e);
        e
    })?;
    let services = build_services(&config).await?;

    match cli.command {
        Command::Index { url, title, file, content_type, source, technology, difficulty, authority } => {
            let content = if file.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin()).context("reading stdin")?
            } else {
                std::fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?
            };
            let meta = IndexMetadata {
                url,
                title,
                content_type: ContentType::parse(&content_type),
                source,
                technology,
                difficulty_level: difficulty,
                authority_score: authority,
                ..Default::default()
            };
            let id = services.engine.index(&content, meta).await?;
            println!("Indexed {}", id);
        }
        Command::Search {
            query,
            search_type,
            max,
            min_similarity,
            technologies,
            difficulty,
            content_types,
            sources,
            preferred_difficulty,
            tech_stack,
            skip_cache,
            skip_rerank,
            json,
        } => {
            let search_type: SearchType = search_type.parse()?;
            let options = SearchOptions {
                search_type,
                filters: SearchFilters {
                    technologies: non_empty(technologies),
                    difficulty: non_empty(difficulty),
                    content_types: non_empty(content_types.iter().map(|c| ContentType::parse(c)).collect()),
                    sources: non_empty(sources),
                },
                max_results: max,
                min_similarity,
                skip_cache,
                skip_reranking: skip_rerank,
                preferred_difficulty,
                project_context: non_empty(tech_stack).map(|tech_stack| ProjectContext { tech_stack }),
                session_id: None,
            };
            let resp = services.engine.search(&query, options).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&resp)?);
                return Ok(());
            }
            println!(
                "Found {} results for \"{}\" ({} ms, {}{})",
                resp.metadata.total_results,
                resp.metadata.query,
                resp.metadata.search_time_ms,
                resp.metadata.search_type.as_str(),
                if resp.metadata.from_cache { ", cached" } else { "" }
            );
            for (i, r) in resp.results.iter().enumerate() {
                println!("\n  {}. score={:.4}  {}  [{}]", i + 1, r.score, r.title, r.source.name);
                println!("     {}", r.url);
                println!("     {}", r.snippet);
                if !r.highlights.is_empty() {
                    println!("     highlights: {}", r.highlights.join(", "));
                }
            }
            if let Some(facets) = &resp.metadata.facets {
                println!("\nFacets:");
                for (name, count) in &facets.content_types {
                    println!("  content_type {}: {}", name, count);
                }
                for (name, count) in &facets.technologies {
                    println!("  technology {}: {}", name, count);
                }
            }
            if !resp.metadata.suggestions.combined.is_empty() {
                println!("\nRelated searches:");
                for s in &resp.metadata.suggestions.combined {
                    println!("  {} ({:.2})", s.text, s.confidence);
                }
            }
        }
        Command::Stats => {
            let documents = services.store.count_documents().await?;
            let sources = services.store.sources().await?;
            println!("Documents: {}", documents);
            println!("Sources: {}", sources.len());
            for s in sources {
                println!("  {} (type={}, weight={:.2}, active={})", s.name, s.source_type, s.authority_weight, s.is_active);
            }
            let m = services.engine.metrics();
            println!("Searches this process: {} (cache hits {}, errors {})", m.total_searches, m.cache_hits, m.error_count);
        }
    }
    Ok(())
}
