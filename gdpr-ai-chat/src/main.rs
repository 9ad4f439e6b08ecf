use anyhow::Context;
use clap::{Parser, Subcommand};
use gdpr_ai_chat::generation::{ExtractiveGenerator, OpenAiChatService};
use gdpr_ai_chat::{AppConfig, ChatSession, GenerationService};
use gdpr_ai_embed::{ProviderKind, create_provider};
use gdpr_ai_retriever::SharedRetriever;
use std::io::Write;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Ask questions about the GDPR articles.
#[derive(Parser, Debug)]
#[command(name = "gdpr-ai", author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, default_value = "gdpr-ai.toml")]
    config: PathBuf,

    /// JSON file with the GDPR articles (overrides the config file)
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Chunks retrieved per question (overrides the config file)
    #[arg(short = 'k', long)]
    top_k: Option<usize>,

    /// Chat model (overrides the config file)
    #[arg(long)]
    model: Option<String>,

    /// SQLite file caching chunk embeddings between runs
    #[arg(long)]
    cache: Option<PathBuf>,

    /// Use hash embeddings and quote the context instead of calling OpenAI
    #[arg(long)]
    offline: bool,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive conversation (the default)
    Chat,
    /// Answer a single question and exit
    Ask {
        /// The question
        question: String,
    },
    /// Print the effective configuration as TOML
    Config,
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

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .init();

    let mut config = AppConfig::load_or_default(&args.config)?;
    if let Some(corpus) = &args.corpus {
        config.retriever.corpus_path = corpus.clone();
    }
    if let Some(top_k) = args.top_k {
        config.retriever.top_k = top_k;
    }
    if let Some(model) = &args.model {
        config.generation.model = model.clone();
    }
    if let Some(cache) = &args.cache {
        config.retriever.cache_path = Some(cache.clone());
    }
    if args.offline {
        config.embedding.provider = ProviderKind::Hash;
        config.embedding.model = None;
    }
    config.validate()?;

    let command = args.command.unwrap_or(Commands::Chat);
    if let Commands::Config = command {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let api_key = args.openai_api_key.as_deref();
    let generator: Arc<dyn GenerationService> = if args.offline {
        Arc::new(ExtractiveGenerator::default())
    } else {
        let key = api_key.context("OPENAI_API_KEY is required unless --offline is given")?;
        Arc::new(OpenAiChatService::new(
            config.generation.to_openai_config(key),
        )?)
    };

    let retriever: SharedRetriever = SharedRetriever::new();
    let embed_config = config.embedding.to_embed_config(api_key);
    let build = {
        let retriever = retriever.clone();
        let retriever_config = config.retriever.clone();
        tokio::spawn(async move {
            let provider = create_provider(embed_config).await?;
            retriever.initialize(retriever_config, provider).await?;
            anyhow::Ok(())
        })
    };

    let session = ChatSession::new(retriever, generator, config.answer_options());

    match command {
        Commands::Ask { question } => {
            build.await??;
            println!("{}", session.ask(&question).await?);
        }
        Commands::Chat => {
            println!(
                "[AI Assistant]: Hi, wait couple of seconds till I setup all the components!"
            );
            build.await??;
            println!("\n[AI Assistant]: It's all set! I'm ready to help! Ask your GDPR question.\n");
            chat_loop(&session).await?;
        }
        Commands::Config => {}
    }
    Ok(())
}

async fn chat_loop(session: &ChatSession) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("[Your question]: ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            break;
        }

        match session.ask(question).await {
            Ok(reply) => println!("\n[AI Assistant]: {reply}\n"),
            Err(e) => {
                tracing::error!("Failed to answer: {e}");
                eprintln!("\n[AI Assistant]: Sorry, I could not answer that: {e}\n");
            }
        }
    }
    Ok(())
}
