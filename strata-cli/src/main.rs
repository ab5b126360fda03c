//! `strata`: ingest documents and compare retrieval strategies.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

mod commands;
mod render;
mod telemetry;

/// The three queries the comparison runs when none are given.
const DEFAULT_QUERIES: [&str; 3] = [
    "How does vector storage work with embeddings?",
    "What are the steps to build a RAG system?",
    "Explain advanced retrieval strategies",
];

#[derive(Parser)]
#[command(name = "strata")]
#[command(about = "Ingest a document into a vector index and compare retrieval strategies")]
#[command(version)]
struct Cli {
    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    /// Collection holding the flat spans (overrides STRATA_COLLECTION)
    #[arg(long, global = true)]
    collection: Option<String>,

    /// Qdrant gRPC URL (overrides QDRANT_HOST/QDRANT_PORT)
    #[arg(long, global = true)]
    qdrant_url: Option<String>,

    /// Ollama base URL (overrides OLLAMA_HOST)
    #[arg(long, global = true)]
    ollama_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Mode {
    /// Run every strategy and print its documents and timing
    Results,
    /// Run the baseline and explain what the other strategies do
    Behavior,
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, tag, embed, cache, and upsert a text file
    Ingest {
        /// UTF-8 text file to ingest
        #[arg(long)]
        input: PathBuf,
        /// Where to write the JSON ingestion cache
        #[arg(long, default_value = "data/demo_data.json")]
        cache: PathBuf,
        /// Document title (defaults to the file stem)
        #[arg(long)]
        title: Option<String>,
        /// Only write the cache; do not touch the index
        #[arg(long)]
        no_upload: bool,
    },
    /// Replay an ingestion cache into the collection
    Upload {
        #[arg(long, default_value = "data/demo_data.json")]
        cache: PathBuf,
    },
    /// List index collections
    Collections,
    /// Compare retrieval strategies on one or more queries
    Compare {
        /// A single query
        #[arg(long, conflicts_with = "queries")]
        query: Option<String>,
        /// Several queries
        #[arg(long, num_args = 1..)]
        queries: Vec<String>,
        /// Documents per strategy
        #[arg(short, default_value_t = 2)]
        k: usize,
        #[arg(long, value_enum, default_value_t = Mode::Results)]
        mode: Mode,
        /// Build the parent/child hierarchy from this file before comparing
        #[arg(long)]
        parent_source: Option<PathBuf>,
        /// Run strategies concurrently
        #[arg(long)]
        concurrent: bool,
        /// Per-strategy timeout in milliseconds before falling back to baseline
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Print the reports as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Commands {
    fn queries(query: Option<String>, queries: Vec<String>) -> Vec<String> {
        match (query, queries.is_empty()) {
            (Some(query), _) => vec![query],
            (None, false) => queries,
            (None, true) => DEFAULT_QUERIES.iter().map(|q| q.to_string()).collect(),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format)?;

    let mut service = strata_rag::ServiceConfig::from_env();
    if let Some(collection) = cli.collection {
        service.collection = collection;
    }
    if let Some(url) = cli.qdrant_url {
        service.qdrant_url = url;
    }
    if let Some(url) = cli.ollama_url {
        service.ollama_url = url.trim_end_matches('/').to_string();
    }

    match cli.command {
        Commands::Ingest { input, cache, title, no_upload } => {
            commands::ingest(&service, &input, &cache, title, no_upload).await?;
        }
        Commands::Upload { cache } => {
            commands::upload(&service, &cache).await?;
        }
        Commands::Collections => {
            commands::collections(&service).await?;
        }
        Commands::Compare { query, queries, k, mode, parent_source, concurrent, timeout_ms, json } => {
            let options = commands::CompareOptions {
                queries: Commands::queries(query, queries),
                k,
                behavior_only: mode == Mode::Behavior,
                parent_source,
                concurrent,
                timeout: timeout_ms.map(std::time::Duration::from_millis),
                json,
            };
            commands::compare(&service, options).await?;
        }
    }

    Ok(())
}
