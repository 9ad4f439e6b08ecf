use clap::{Parser, Subcommand};
use gdpr_ai_embed::{EmbedConfig, ProviderKind, create_provider};
use gdpr_ai_retriever::{
    config::RetrieverConfig,
    corpus::load_corpus,
    retrieval::{chunking_strategy::ChunkingStrategy, retriever::Retriever},
    storage::{DistanceMetric, SearchHit},
};
use serde::Serialize;
use std::path::PathBuf;
use std::process;

/// A CLI tool to build and query the GDPR article index.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON file with the GDPR articles
    #[arg(short, long, default_value = "data/gdpr_articles.json")]
    corpus: PathBuf,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = 1000)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[arg(long, default_value_t = 100)]
    chunk_overlap: usize,

    /// Distance metric: cosine or euclidean
    #[arg(long, default_value = "cosine")]
    metric: DistanceMetric,

    /// Embedding provider: openai, fastembed or hash
    #[arg(long, default_value = "hash")]
    provider: ProviderKind,

    /// Embedding model (defaults to the provider's default model)
    #[arg(long)]
    model: Option<String>,

    /// Embedding dimension override
    #[arg(long)]
    dimensions: Option<usize>,

    /// SQLite file caching chunk embeddings between runs
    #[arg(long)]
    cache: Option<PathBuf>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List the chunks the corpus splits into (no embeddings needed)
    Chunks {
        /// Only show chunks of this article
        #[arg(short, long)]
        article: Option<u32>,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Build the index and show statistics
    Stats {
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
    /// Build the index and search it
    Search {
        /// The question to search for
        query: String,
        /// Maximum number of results
        #[arg(short, long, default_value_t = 4)]
        limit: usize,
        /// Output format
        #[arg(short, long, default_value = "summary")]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum OutputFormat {
    Summary,
    Full,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "summary" => Ok(OutputFormat::Summary),
            "full" => Ok(OutputFormat::Full),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {s}")),
        }
    }
}

#[derive(Serialize)]
struct ChunkOutput<'a> {
    article_number: u32,
    article_summary: &'a str,
    sequence: usize,
    start: usize,
    characters: usize,
    content: &'a str,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(std::io::stderr)
            .init();
    }

    let mut config = RetrieverConfig::new(&args.corpus)
        .with_chunking(args.chunk_size, args.chunk_overlap)
        .with_metric(args.metric);
    if let Some(cache) = &args.cache {
        config = config.with_cache_path(cache);
    }
    config.validate()?;
    let embed_config = embedding_config(&args);

    match args.command {
        Commands::Chunks { article, format } => {
            let articles = load_corpus(&config.corpus_path).await?;
            let chunks = ChunkingStrategy::from_config(&config)?.chunk_corpus(&articles);
            let outputs: Vec<ChunkOutput> = chunks
                .iter()
                .filter(|c| article.is_none_or(|n| c.metadata.article_number == n))
                .map(|c| ChunkOutput {
                    article_number: c.metadata.article_number,
                    article_summary: &c.metadata.article_summary,
                    sequence: c.sequence,
                    start: c.start,
                    characters: c.char_len(),
                    content: &c.content,
                })
                .collect();

            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&outputs)?),
                OutputFormat::Summary | OutputFormat::Full => {
                    for chunk in &outputs {
                        println!(
                            "Article {} chunk {} (chars {}..{}): {}",
                            chunk.article_number,
                            chunk.sequence,
                            chunk.start,
                            chunk.start + chunk.characters,
                            chunk.article_summary
                        );
                        if format == OutputFormat::Full {
                            println!("{}\n", chunk.content);
                        }
                    }
                    println!("{} chunks", outputs.len());
                }
            }
            Ok(())
        }
        Commands::Stats { format } => {
            let retriever = build_retriever(&embed_config, config).await?;
            let stats = retriever.stats();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(stats)?),
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Index Statistics:");
                    println!("  Articles: {}", stats.articles);
                    println!("  Chunks: {}", stats.chunks);
                    match stats.dimension {
                        Some(dimension) => println!("  Dimension: {dimension}"),
                        None => println!("  Dimension: n/a (empty index)"),
                    }
                    println!("  Metric: {}", stats.metric);
                    println!(
                        "  Chunking: {} chars, {} overlap",
                        stats.chunk_size, stats.chunk_overlap
                    );
                    println!("  Model: {}", stats.model_id);
                    println!("  Embedded: {} ({} from cache)", stats.embedded, stats.cached);
                    println!("  Corpus fingerprint: {}", stats.corpus_fingerprint);
                    println!("  Build time: {}ms", stats.build_millis);
                }
            }
            Ok(())
        }
        Commands::Search {
            query,
            limit,
            format,
        } => {
            let retriever = build_retriever(&embed_config, config).await?;
            let hits: Vec<SearchHit> = retriever.find_relevant_scored(&query, limit).await?;
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
                OutputFormat::Summary | OutputFormat::Full => {
                    println!("Found {} relevant chunks:", hits.len());
                    for (rank, hit) in hits.iter().enumerate() {
                        println!(
                            "{}. Article {} ({}), chunk {} - distance {:.4}",
                            rank + 1,
                            hit.chunk.metadata.article_number,
                            hit.chunk.metadata.article_summary,
                            hit.chunk.sequence,
                            hit.distance
                        );
                        if format == OutputFormat::Full {
                            println!("{}\n", hit.chunk.content);
                        } else {
                            let preview: String = hit.chunk.content.chars().take(120).collect();
                            println!("   {preview}...");
                        }
                    }
                }
            }
            Ok(())
        }
    }
}

fn embedding_config(args: &Args) -> EmbedConfig {
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| args.provider.default_model().to_string());
    let mut config = EmbedConfig::new(args.provider, model);
    if let Some(dimensions) = args.dimensions {
        config = config.with_dimensions(dimensions);
    }
    if let Some(key) = &args.openai_api_key {
        config = config.with_api_key(key);
    }
    config
}

async fn build_retriever(
    embed_config: &EmbedConfig,
    config: RetrieverConfig,
) -> anyhow::Result<Retriever> {
    let provider = create_provider(embed_config.clone()).await?;
    Ok(Retriever::initialize(config, provider).await?)
}
