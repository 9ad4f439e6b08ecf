use clap::Parser;
use gdpr_ai_context::text::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, TextSplitter, parse_articles,
};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};

/// A CLI tool to split a GDPR article corpus into JSON chunks.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the corpus JSON file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Maximum number of characters per chunk.
    #[arg(short = 's', long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Characters shared by consecutive chunks of one article.
    #[arg(short = 'o', long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    chunk_overlap: usize,

    /// Only emit chunks of this article number.
    #[arg(short, long)]
    article: Option<u32>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let corpus = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let splitter = TextSplitter::new(args.chunk_size, args.chunk_overlap)?;
    let articles: Vec<_> = parse_articles(&corpus)?
        .into_iter()
        .filter(|a| args.article.is_none_or(|n| a.article_number == n))
        .collect();
    let chunks = splitter.split_all(&articles);

    #[derive(Serialize)]
    struct SerializableChunk<'a> {
        article_number: u32,
        sequence: usize,
        start: usize,
        overlap: usize,
        content: &'a str,
        passage: String,
    }

    let serializable_chunks: Vec<SerializableChunk> = chunks
        .iter()
        .map(|c| SerializableChunk {
            article_number: c.metadata.article_number,
            sequence: c.sequence,
            start: c.start,
            overlap: c.overlap,
            content: &c.content,
            passage: c.passage(),
        })
        .collect();

    let json_output = serde_json::to_string_pretty(&serializable_chunks)?;
    println!("{}", json_output);

    Ok(())
}
