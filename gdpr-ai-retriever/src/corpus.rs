//! Loading the GDPR article corpus from disk.

use crate::error::{RagError, Result};
use gdpr_ai_context::{Article, parse_articles};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

/// Read, parse and validate the corpus at `path`.
///
/// The file holds either a JSON array of articles or a JSON object mapping an
/// index to an article (see [`parse_articles`]). The corpus must contain at
/// least one article, and article numbers must be positive and unique.
pub async fn load_corpus(path: &Path) -> Result<Vec<Article>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| RagError::corpus_load(path, e.to_string()))?;
    let articles = parse_corpus(path, &raw)?;
    info!(
        "Loaded {} articles from {}",
        articles.len(),
        path.display()
    );
    Ok(articles)
}

/// Parse and validate corpus text; `path` is only used in error messages.
pub fn parse_corpus(path: &Path, raw: &str) -> Result<Vec<Article>> {
    let articles = parse_articles(raw)
        .map_err(|e| RagError::corpus_load(path, format!("malformed JSON: {e}")))?;

    if articles.is_empty() {
        return Err(RagError::corpus_load(path, "corpus contains no articles"));
    }

    let mut seen = HashSet::with_capacity(articles.len());
    for article in &articles {
        if article.article_number == 0 {
            return Err(RagError::corpus_load(path, "article numbers start at 1"));
        }
        if !seen.insert(article.article_number) {
            return Err(RagError::corpus_load(
                path,
                format!("duplicate article number {}", article.article_number),
            ));
        }
    }

    Ok(articles)
}

/// Hex blake3 digest over every article, in corpus order.
///
/// Two corpora with the same fingerprint produce the same chunks for the same
/// chunking settings.
pub fn corpus_fingerprint(articles: &[Article]) -> String {
    let mut hasher = blake3::Hasher::new();
    for article in articles {
        hasher.update(&article.article_number.to_le_bytes());
        for field in [&article.article_summary, &article.article_text] {
            hasher.update(&(field.len() as u64).to_le_bytes());
            hasher.update(field.as_bytes());
        }
    }
    hex::encode(hasher.finalize().as_bytes())
}
