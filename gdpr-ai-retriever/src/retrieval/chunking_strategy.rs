use crate::config::RetrieverConfig;
use crate::error::Result;
use gdpr_ai_context::{Article, Chunk, TextSplitter};

/// Strategy for chunking the corpus - delegates the splitting to gdpr-ai-context
#[derive(Debug, Clone, Copy)]
pub struct ChunkingStrategy {
    splitter: TextSplitter,
}

impl ChunkingStrategy {
    pub fn new(splitter: TextSplitter) -> Self {
        Self { splitter }
    }

    /// Create a strategy from the chunking settings of a retriever configuration
    pub fn from_config(config: &RetrieverConfig) -> Result<Self> {
        Ok(Self::new(config.splitter()?))
    }

    pub fn splitter(&self) -> &TextSplitter {
        &self.splitter
    }

    /// Chunk one article
    pub fn chunk_article(&self, article: &Article) -> Vec<Chunk> {
        let chunks = self.splitter.split(article);
        if chunks.is_empty() {
            tracing::warn!(
                "Article {} has no text and will not be searchable",
                article.article_number
            );
        } else {
            tracing::debug!(
                "Chunked article {} into {} chunks (max size: {})",
                article.article_number,
                chunks.len(),
                self.splitter.chunk_size()
            );
        }
        chunks
    }

    /// Chunk every article, keeping corpus order and then chunk order
    pub fn chunk_corpus(&self, articles: &[Article]) -> Vec<Chunk> {
        articles
            .iter()
            .flat_map(|article| self.chunk_article(article))
            .collect()
    }
}
