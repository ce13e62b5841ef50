//! # Freshrag CLI (`freshrag`)
//!
//! Coordinated freshness crawler with retrieval-augmented answering.
//!
//! ## Usage
//!
//! ```bash
//! freshrag --config ./freshrag.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `freshrag crawl` | Crawl the configured sites under per-domain concurrency limits |
//! | `freshrag index` | Embed stored crawl artifacts into the vector index |
//! | `freshrag query "<question>"` | Answer a question against the freshest crawled content |
//! | `freshrag run "<question>"` | Crawl, index, and answer in one pass |
//! | `freshrag health` | Check the coordination service and model server |
//!
//! ## Examples
//!
//! ```bash
//! # Crawl the configured music sites
//! freshrag crawl
//!
//! # Re-embed everything that was crawled
//! freshrag index
//!
//! # Ask against the current index (re-indexed from disk first)
//! freshrag query "What's new on the Hot 100 this week?"
//!
//! # End-to-end: fresh crawl, fresh index, answer
//! freshrag run "What's new on the Hot 100 this week?"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use freshrag::config::{self, Config};
use freshrag::content_store::ContentStore;
use freshrag::crawl::CrawlOrchestrator;
use freshrag::etcd::EtcdCoordinator;
use freshrag::fetch::HttpPageFetcher;
use freshrag::indexer::EmbeddingIndexer;
use freshrag::ollama::{self, OllamaEmbedder, OllamaGenerator};
use freshrag::query::QueryEngine;

use freshrag_core::cancel::CancelToken;
use freshrag_core::generator::GenerationMode;
use freshrag_core::models::{CrawlResult, CrawlTarget};
use freshrag_core::semaphore::DomainSemaphore;

const CONTEXT_PREVIEW_CHARS: usize = 500;

/// Freshrag CLI: crawl news sites under a distributed per-domain
/// concurrency limit and answer questions against the freshest content.
#[derive(Parser)]
#[command(
    name = "freshrag",
    about = "Coordinated freshness crawler with retrieval-augmented answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./freshrag.toml`. Missing file means built-in defaults;
    /// `ETCD_URL` and `OLLAMA_URL` override the service endpoints.
    #[arg(long, global = true, default_value = "./freshrag.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Crawl the configured sites.
    ///
    /// One concurrent task per site, gated so that no domain ever has more
    /// than `crawler.thread_limit` crawls in flight across every process
    /// sharing the coordination service. Each successful crawl writes one
    /// JSON artifact per domain; failures are reported per site.
    Crawl,

    /// Embed stored crawl artifacts into the vector index.
    ///
    /// Idempotent: each domain maps to exactly one index record, and
    /// re-indexing replaces it. Artifacts with no extractable text are
    /// skipped.
    Index,

    /// Answer a question against previously crawled content.
    ///
    /// Rebuilds the in-process vector index from the artifacts on disk,
    /// retrieves the closest documents, and asks the generation model.
    Query {
        /// The question to answer.
        question: String,

        /// Number of documents to retrieve as context.
        #[arg(long)]
        top_n: Option<usize>,

        /// Generation mode: `chat` or `completion`. Overrides config.
        #[arg(long)]
        mode: Option<String>,
    },

    /// Crawl, index, and answer in one pass.
    ///
    /// The query runs even if some sites failed to crawl; those failures
    /// are reported and reflected in the exit code.
    Run {
        /// The question to answer.
        question: String,
    },

    /// Check connectivity to the coordination service and model server.
    Health,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Crawl => {
            let results = run_crawl(&cfg).await?;
            Ok(report_crawl(&results))
        }
        Commands::Index => {
            run_index(&cfg).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Query {
            question,
            top_n,
            mode,
        } => {
            run_query(&cfg, &question, top_n, mode.as_deref()).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { question } => {
            let results = run_crawl(&cfg).await?;
            let crawl_code = report_crawl(&results);
            run_query(&cfg, &question, None, None).await?;
            Ok(crawl_code)
        }
        Commands::Health => run_health(&cfg).await,
    }
}

/// Crawl every configured site. Fails fast when the coordination service
/// is unreachable: without it there is no concurrency guarantee.
async fn run_crawl(cfg: &Config) -> Result<Vec<CrawlResult>> {
    let coordinator = EtcdCoordinator::connect(
        &cfg.coordination.url,
        Duration::from_secs(cfg.coordination.timeout_secs),
    )
    .await
    .context("Coordination service is required for crawling")?;

    let semaphore = Arc::new(DomainSemaphore::with_limits(
        Arc::new(coordinator),
        cfg.crawler.thread_limit,
        cfg.crawler.lease_ttl(),
        cfg.crawler.poll_backoff(),
    ));
    let fetcher = Arc::new(HttpPageFetcher::new(Duration::from_secs(
        cfg.crawler.fetch_timeout_secs,
    ))?);
    let store = Arc::new(ContentStore::new(&cfg.crawler.artifact_dir));
    let orchestrator = CrawlOrchestrator::new(semaphore, fetcher, store);

    let mut targets = Vec::new();
    for site in &cfg.crawler.sites {
        targets.push(CrawlTarget::parse(site)?);
    }

    println!("Crawling {} site(s)...", targets.len());
    Ok(orchestrator.run(&targets, &CancelToken::new()).await)
}

fn report_crawl(results: &[CrawlResult]) -> ExitCode {
    let mut failures = 0;
    for result in results {
        match (&result.output_location, &result.error) {
            (Some(location), _) => println!("  ok   {} -> {}", result.url, location),
            (None, Some(error)) => {
                failures += 1;
                println!("  FAIL {} ({})", result.url, error);
            }
            (None, None) => {}
        }
    }
    println!(
        "Crawl finished: {} succeeded, {} failed.",
        results.len() - failures,
        failures
    );
    if failures > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

async fn run_index(cfg: &Config) -> Result<()> {
    let (indexer, _) = build_indexer(cfg)?;
    let results = indexer.index_all().await?;

    let mut failures = 0;
    for result in &results {
        match &result.error {
            None => println!("  ok   {}", result.doc_id),
            Some(error) => {
                failures += 1;
                println!("  FAIL {} ({})", result.doc_id, error);
            }
        }
    }
    println!(
        "Indexed {} artifact(s), {} failed.",
        results.len() - failures,
        failures
    );
    Ok(())
}

/// The bundled vector index is in-process, so a query pass always starts
/// by re-indexing the artifacts on disk. Indexing is idempotent, so the
/// rebuild is equivalent to whatever a previous `index` run produced.
async fn run_query(
    cfg: &Config,
    question: &str,
    top_n: Option<usize>,
    mode_override: Option<&str>,
) -> Result<()> {
    let (indexer, vector_store) = build_indexer(cfg)?;
    indexer.index_all().await?;

    let mode_str = mode_override.unwrap_or(&cfg.generation.mode);
    let mode = GenerationMode::parse(mode_str)
        .with_context(|| format!("Unknown generation mode: '{mode_str}'"))?;

    let embedder = build_embedder(cfg)?;
    let generator = Arc::new(OllamaGenerator::new(
        &cfg.generation.url,
        &cfg.generation.model,
        cfg.generation.persona.clone(),
        Duration::from_secs(cfg.generation.timeout_secs),
    )?);
    let engine = QueryEngine::new(
        embedder,
        vector_store,
        generator,
        top_n.unwrap_or(cfg.retrieval.top_n),
    );

    let context = engine.retrieve(question).await?;
    let context_text = context.context_string();
    println!("--- Retrieved context ({} docs) ---", context.retrieved_docs.len());
    println!("{}", preview(&context_text, CONTEXT_PREVIEW_CHARS));

    let answer = engine.answer_with_context(&context, mode).await?;
    println!("--- Answer ---");
    println!("{answer}");
    Ok(())
}

async fn run_health(cfg: &Config) -> Result<ExitCode> {
    let mut healthy = true;

    match EtcdCoordinator::connect(
        &cfg.coordination.url,
        Duration::from_secs(cfg.coordination.timeout_secs),
    )
    .await
    {
        Ok(_) => println!("  ok   coordination ({})", cfg.coordination.url),
        Err(e) => {
            healthy = false;
            println!("  FAIL coordination ({e})");
        }
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.embedding.timeout_secs))
        .build()?;
    match ollama::check_connection(&client, &cfg.embedding.url).await {
        Ok(version) => println!("  ok   ollama {} ({})", version, cfg.embedding.url),
        Err(e) => {
            healthy = false;
            println!("  FAIL ollama ({e})");
        }
    }

    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn build_indexer(
    cfg: &Config,
) -> Result<(
    EmbeddingIndexer,
    Arc<freshrag_core::vector_store::memory::InMemoryVectorStore>,
)> {
    let embedder = build_embedder(cfg)?;
    let vector_store = Arc::new(freshrag_core::vector_store::memory::InMemoryVectorStore::new());
    let content_store = Arc::new(ContentStore::new(&cfg.crawler.artifact_dir));
    Ok((
        EmbeddingIndexer::new(embedder, vector_store.clone(), content_store),
        vector_store,
    ))
}

fn build_embedder(cfg: &Config) -> Result<Arc<OllamaEmbedder>> {
    Ok(Arc::new(OllamaEmbedder::new(
        &cfg.embedding.url,
        &cfg.embedding.model,
        cfg.embedding.dims,
        Duration::from_secs(cfg.embedding.timeout_secs),
        cfg.embedding.max_retries,
    )?))
}

fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}…")
}
