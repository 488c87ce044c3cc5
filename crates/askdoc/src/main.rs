//! # askdoc CLI
//!
//! Document question answering over local files.
//!
//! ```bash
//! # Ingest one or more documents
//! askdoc ingest policy.pdf handbook.docx notes.txt
//!
//! # Retrieve supporting passages without calling the answering model
//! askdoc search "What is the grace period for premium payment?"
//!
//! # Retrieve and answer
//! askdoc ask "What is the grace period for premium payment?"
//!
//! # Restrict a question to one document by fingerprint
//! askdoc ask "What is covered?" --doc <fingerprint>
//!
//! # Show the catalog
//! askdoc catalog
//! ```
//!
//! All commands accept `--config` pointing to a TOML file; a missing
//! file means built-in defaults (store under `./askdoc_data`).

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use askdoc_core::engine::retrieve;
use askdoc_core::error::RetrievalError;
use askdoc_core::models::ScoredChunk;
use askdoc_core::store::DocumentStore;

use askdoc::answer::create_answerer;
use askdoc::config::{load_config, Config};
use askdoc::embedding::create_embedder;
use askdoc::fs_store::FsStore;
use askdoc::ingest::Ingestor;

/// askdoc — ask questions about your documents.
#[derive(Parser)]
#[command(
    name = "askdoc",
    about = "Ingest local documents and answer questions about them",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file = defaults.
    #[arg(long, global = true, default_value = "./askdoc.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest documents: extract, chunk, tag, embed, index, register.
    ///
    /// Already-ingested content (by fingerprint) is skipped. Failures
    /// are reported per file; the remaining files still process.
    Ingest {
        /// Files to ingest (.pdf, .docx, .txt, .md, .eml).
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Retrieve the passages that best match a question.
    Search {
        /// The question or phrase to search for.
        question: String,

        /// Restrict the search to one document fingerprint.
        #[arg(long)]
        doc: Option<String>,

        /// Maximum passages to print.
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },

    /// Answer a question using the best-matching passages.
    Ask {
        /// The question to answer.
        question: String,

        /// Restrict the question to one document fingerprint.
        #[arg(long)]
        doc: Option<String>,
    },

    /// Show every registered document and the catalog totals.
    Catalog,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Ingest { files } => cmd_ingest(&config, &files).await,
        Commands::Search {
            question,
            doc,
            limit,
        } => cmd_search(&config, &question, doc.as_deref(), limit).await,
        Commands::Ask { question, doc } => cmd_ask(&config, &question, doc.as_deref()).await,
        Commands::Catalog => cmd_catalog(&config).await,
    }
}

async fn cmd_ingest(config: &Config, files: &[PathBuf]) -> Result<()> {
    let store = FsStore::open(&config.storage.root)?;
    let embedder = create_embedder(&config.embedding)?;
    let ingestor = Ingestor::new(&store, embedder.as_ref(), config.chunking.clone());

    let mut ok = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;
    for path in files {
        match ingestor.ingest_file(path).await {
            Ok(outcome) if outcome.already_processed => {
                skipped += 1;
                println!(
                    "= {} already ingested ({} chunks) [{}]",
                    outcome.filename,
                    outcome.chunk_count,
                    short(&outcome.fingerprint)
                );
            }
            Ok(outcome) => {
                ok += 1;
                println!(
                    "+ {} ingested: {} pages, {} chunks [{}]",
                    outcome.filename,
                    outcome.pages,
                    outcome.chunk_count,
                    short(&outcome.fingerprint)
                );
            }
            Err(e) => {
                failed += 1;
                eprintln!("! {} failed: {}", path.display(), e);
            }
        }
    }
    println!("\n{} ingested, {} skipped, {} failed", ok, skipped, failed);
    if failed > 0 {
        anyhow::bail!("{} file(s) failed to ingest", failed);
    }
    Ok(())
}

async fn cmd_search(
    config: &Config,
    question: &str,
    doc: Option<&str>,
    limit: usize,
) -> Result<()> {
    let results = run_retrieval(config, question, doc).await?;
    if results.is_empty() {
        println!("No matching passages found.");
        return Ok(());
    }
    for (i, sc) in results.iter().take(limit).enumerate() {
        println!(
            "{}. [{:.3}] {} · {} / {}{}",
            i + 1,
            sc.combined_score,
            sc.filename,
            sc.chunk.category,
            sc.chunk.section,
            if sc.direct_match { " (direct match)" } else { "" }
        );
        println!("   {}\n", preview(&sc.chunk.text, 300));
    }
    Ok(())
}

async fn cmd_ask(config: &Config, question: &str, doc: Option<&str>) -> Result<()> {
    let results = run_retrieval(config, question, doc).await?;
    if results.is_empty() {
        println!("No relevant passages found for that question.");
        return Ok(());
    }
    let answerer = create_answerer(&config.answerer)?;
    let answer = answerer.answer(question, &results).await?;
    println!("{}\n", answer);
    println!("Sources:");
    for sc in results.iter().take(config.answerer.max_context_chunks) {
        println!(
            "  - {} · {} / {} [{:.3}]",
            sc.filename, sc.chunk.category, sc.chunk.section, sc.combined_score
        );
    }
    Ok(())
}

async fn cmd_catalog(config: &Config) -> Result<()> {
    let store = FsStore::open(&config.storage.root)?;
    let catalog = store.load_catalog().await?;
    if catalog.is_empty() {
        println!("No documents ingested yet.");
        return Ok(());
    }
    println!(
        "{} document(s), {} chunk(s)\n",
        catalog.total_documents, catalog.total_chunks
    );
    for record in catalog.documents.values() {
        println!(
            "{}  {}  {} pages, {} chunks, {} bytes, ingested {}",
            short(&record.fingerprint),
            record.filename,
            record.pages,
            record.num_chunks,
            record.size_bytes,
            record.processed_at.format("%Y-%m-%d %H:%M"),
        );
    }
    Ok(())
}

async fn run_retrieval(
    config: &Config,
    question: &str,
    doc: Option<&str>,
) -> Result<Vec<ScoredChunk>> {
    let store = FsStore::open(&config.storage.root)?;
    let embedder = create_embedder(&config.embedding)?;
    let params = config.retrieval.params();
    match retrieve(&store, embedder.as_ref(), &params, question, doc).await {
        Ok(results) => Ok(results),
        Err(RetrievalError::NoDocumentsRegistered) => {
            anyhow::bail!("no documents ingested yet; run `askdoc ingest <file>` first")
        }
        Err(RetrievalError::Other(e)) => Err(e),
    }
}

fn short(fingerprint: &str) -> &str {
    &fingerprint[..fingerprint.len().min(12)]
}

fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.len() <= max {
        return flat;
    }
    let mut end = max;
    while !flat.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &flat[..end])
}
