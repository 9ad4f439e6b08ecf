pub mod text;

// Re-export the chunking types for external use
pub use text::{
    Article, Chunk, ChunkMetadata, DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, SplitError,
    TextSplitter, parse_articles, reassemble,
};
