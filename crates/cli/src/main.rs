use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tabrag_core::config::{self, AppConfig};
use tabrag_core::pipeline::Engine;
use tabrag_core::rows::ResultRow;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest {
            paths,
            reset,
            collection,
            window_size,
            identifier_column,
        } => {
            run_ingest(
                cfg,
                paths,
                reset,
                collection,
                window_size,
                identifier_column,
            )
            .await
        }
        Commands::Rows { query, k, json } => run_rows(cfg, &query, k, json).await,
        Commands::Search { query, k, prefetch } => run_search(cfg, &query, k, prefetch).await,
        Commands::Collections => {
            let engine = Engine::open(cfg).await?;
            for name in engine.list_collections().await? {
                println!("{}", name);
            }
            Ok(())
        }
        Commands::Reset { collection } => {
            let engine = Engine::open(cfg).await?;
            let collection = collection.unwrap_or_else(|| engine.collection().to_string());
            engine.reset(&collection).await?;
            println!("reset {}", collection);
            Ok(())
        }
    }
}

#[derive(Parser)]
#[command(name = "tabrag")]
#[command(about = "Row retrieval over CSV datasets", long_about = None)]
struct Cli {
    /// Path to config TOML
    #[arg(short, long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and index datasets
    Ingest {
        /// Files to ingest; defaults to every dataset under the data directory
        paths: Vec<PathBuf>,
        /// Drop the collection and its ledger entries first
        #[arg(long, default_value_t = false)]
        reset: bool,
        /// Target collection (defaults to vectors.collection)
        #[arg(long)]
        collection: Option<String>,
        /// Rows per window chunk; 0 disables windows
        #[arg(long)]
        window_size: Option<usize>,
        /// Column whose value identifies a row
        #[arg(long)]
        identifier_column: Option<String>,
    },
    /// Find the source rows that answer a query
    Rows {
        query: String,
        /// Number of rows to return
        #[arg(short, long)]
        k: Option<usize>,
        /// Output JSON
        #[arg(long)]
        json: bool,
    },
    /// Raw chunk-level semantic search
    Search {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
        /// Candidate pool fetched before re-ranking
        #[arg(long)]
        prefetch: Option<usize>,
    },
    /// List collections in the vector index
    Collections,
    /// Delete a collection and restart its chunk ids
    Reset {
        #[arg(long)]
        collection: Option<String>,
    },
}

async fn run_ingest(
    cfg: AppConfig,
    paths: Vec<PathBuf>,
    reset: bool,
    collection: Option<String>,
    window_size: Option<usize>,
    identifier_column: Option<String>,
) -> Result<()> {
    let engine = Engine::open(cfg).await?;
    let collection = collection.unwrap_or_else(|| engine.collection().to_string());
    if reset {
        engine.reset(&collection).await?;
    }
    let mut opts = engine.ingest_options();
    if let Some(size) = window_size {
        opts.chunking.window_size = size;
    }
    if let Some(column) = identifier_column {
        opts.chunking.identifier_column = column;
    }
    let outcomes = engine.ingest(&paths, &collection, &opts).await?;
    let failed = outcomes.iter().filter(|o| !o.is_ok()).count();
    if failed > 0 {
        warn!(failed, total = outcomes.len(), "some files were not ingested");
    }
    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    Ok(())
}

async fn run_rows(cfg: AppConfig, query: &str, k: Option<usize>, json: bool) -> Result<()> {
    let k = k.unwrap_or(cfg.retrieval.k);
    let engine = Engine::open(cfg).await?;
    let rows = engine.find_rows(query, k).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        print!("{}", render_rows(&rows));
    }
    Ok(())
}

async fn run_search(
    cfg: AppConfig,
    query: &str,
    k: Option<usize>,
    prefetch: Option<usize>,
) -> Result<()> {
    let k = k.unwrap_or(cfg.retrieval.k);
    let prefetch = prefetch.unwrap_or(cfg.retrieval.prefetch);
    let engine = Engine::open(cfg).await?;
    let candidates = engine.search(query, k, prefetch).await?;
    println!("{}", serde_json::to_string_pretty(&candidates)?);
    Ok(())
}

fn render_rows(rows: &[ResultRow]) -> String {
    if rows.is_empty() {
        return "No results found.\n".to_string();
    }
    rows.iter()
        .enumerate()
        .map(|(i, r)| format!("{}. {} (source: {})\n", i + 1, r.formatted_value, r.source_file))
        .collect()
}
