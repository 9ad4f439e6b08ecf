//! This module turns GDPR articles into overlapping, bounded "passages" that can be
//! embedded and indexed for retrieval within a RAG (Retrieval Augmented Generation)
//! system.
//!
//! Articles are long legal texts. Embedding models accept a limited amount of text,
//! so each article is cut into windows of at most `chunk_size` characters, where
//! consecutive windows share `chunk_overlap` characters. The overlap keeps a sentence
//! that straddles a boundary visible in both neighbouring windows.
//!
//! The module defines the following types:
//! - [`Article`]: One record of the GDPR corpus (number, summary, full text).
//! - [`TextSplitter`]: The configured character-window splitter.
//! - [`Chunk`]: A single window together with the metadata of its source article.
//!
//! # Example Passage Format
//!
//! [`Chunk::passage`] renders a chunk for the embedding model and for the answer
//! generator like this:
//!
//! ```text
//! article: {"number": 17, "summary": "Right to erasure ('right to be forgotten')"}
//!
//! The data subject shall have the right to obtain from the controller the erasure
//! of personal data concerning him or her without undue delay ...
//! ```
//!
//! # Usage
//!
//! ```
//! use gdpr_ai_context::text::{Article, TextSplitter, reassemble};
//!
//! let article = Article::new(
//!     5,
//!     "Principles relating to processing of personal data",
//!     "Personal data shall be processed lawfully, fairly and in a transparent manner.",
//! );
//!
//! // Windows of 30 characters sharing 5 characters with their predecessor.
//! let splitter = TextSplitter::new(30, 5).unwrap();
//! let chunks = splitter.split(&article);
//!
//! assert!(chunks.len() > 1);
//! assert!(chunks.iter().all(|c| c.char_len() <= 30));
//! assert!(chunks.iter().all(|c| c.metadata.article_number == 5));
//!
//! // Dropping the shared prefix of every window restores the article text.
//! assert_eq!(reassemble(&chunks), article.article_text);
//! ```
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default maximum number of characters in a chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of characters shared by consecutive chunks of one article.
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Errors raised when configuring a [`TextSplitter`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SplitError {
    #[error("Invalid chunking configuration: {message}")]
    InvalidConfig { message: String },
}

impl SplitError {
    fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

/// A single GDPR article as stored in the corpus file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    /// Article number, starting at 1.
    pub article_number: u32,
    /// The article title, e.g. "Right to erasure ('right to be forgotten')".
    pub article_summary: String,
    /// The full legal text of the article.
    pub article_text: String,
}

impl Article {
    pub fn new(
        article_number: u32,
        article_summary: impl Into<String>,
        article_text: impl Into<String>,
    ) -> Self {
        Self {
            article_number,
            article_summary: article_summary.into(),
            article_text: article_text.into(),
        }
    }
}

/// Parse a corpus document into articles.
///
/// Two layouts are accepted:
/// - a JSON array of article objects, kept in file order;
/// - a JSON object mapping an index to an article object, ordered by the
///   numeric value of the index (non-numeric keys sort last, alphabetically).
///
/// No validation beyond the JSON shape happens here; see the retriever's corpus
/// loader for the corpus-level checks.
pub fn parse_articles(json: &str) -> serde_json::Result<Vec<Article>> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ArticleCollection {
        List(Vec<Article>),
        Indexed(BTreeMap<String, Article>),
    }

    Ok(match serde_json::from_str(json)? {
        ArticleCollection::List(articles) => articles,
        ArticleCollection::Indexed(map) => {
            let mut entries: Vec<(String, Article)> = map.into_iter().collect();
            // Stable sort keeps BTreeMap order among keys that do not parse.
            entries.sort_by_key(|(key, _)| key.trim().parse::<u64>().unwrap_or(u64::MAX));
            entries.into_iter().map(|(_, article)| article).collect()
        }
    })
}

/// Metadata every chunk carries about the article it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub article_number: u32,
    pub article_summary: String,
}

impl From<&Article> for ChunkMetadata {
    fn from(article: &Article) -> Self {
        Self {
            article_number: article.article_number,
            article_summary: article.article_summary.clone(),
        }
    }
}

/// A window of article text plus the metadata of its source article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The text of this window.
    pub content: String,
    /// Which article the window belongs to.
    pub metadata: ChunkMetadata,
    /// Position of this chunk within its article (0-indexed).
    pub sequence: usize,
    /// Character offset of the window within the article text.
    pub start: usize,
    /// Number of leading characters shared with the previous chunk of the same article.
    pub overlap: usize,
}

impl Chunk {
    /// Length of the window in characters (not bytes).
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    /// Render the chunk as a passage for embedding models and prompts.
    ///
    /// The header line is JSON-ish so that the summary is quoted and escaped the
    /// same way regardless of the characters it contains.
    ///
    /// # Example
    /// ```
    /// use gdpr_ai_context::text::{Article, TextSplitter};
    ///
    /// let article = Article::new(20, "Right to data portability", "The data subject shall have the right.");
    /// let chunks = TextSplitter::default().split(&article);
    /// assert_eq!(
    ///     chunks[0].passage(),
    ///     "article: {\"number\": 20, \"summary\": \"Right to data portability\"}\n\nThe data subject shall have the right."
    /// );
    /// ```
    pub fn passage(&self) -> String {
        let summary = serde_json::Value::String(self.metadata.article_summary.clone());
        format!(
            "article: {{\"number\": {}, \"summary\": {}}}\n\n{}",
            self.metadata.article_number, summary, self.content
        )
    }
}

/// Splits article text into fixed-size character windows with a fixed overlap.
///
/// Sizes are measured in Unicode scalar values, so a window never cuts a
/// multi-byte character in half. Splitting is a pure function of the text and
/// the two parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl TextSplitter {
    /// Creates a new splitter.
    ///
    /// # Arguments
    /// * `chunk_size` - Maximum number of characters per chunk; must be positive.
    /// * `chunk_overlap` - Characters shared by consecutive chunks; must be smaller
    ///   than `chunk_size`, otherwise the window would never advance.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, SplitError> {
        if chunk_size == 0 {
            return Err(SplitError::invalid_config(
                "chunk_size must be greater than zero",
            ));
        }
        if chunk_overlap >= chunk_size {
            return Err(SplitError::invalid_config(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Splits one article into chunks.
    ///
    /// An article with empty text yields no chunks. Text that fits in one window
    /// yields exactly one chunk holding the whole text. Otherwise every window but
    /// the last is exactly `chunk_size` characters long and each window after the
    /// first starts `chunk_size - chunk_overlap` characters after its predecessor.
    pub fn split(&self, article: &Article) -> Vec<Chunk> {
        let text = article.article_text.as_str();
        // Byte offset of every char boundary, including the end of the text.
        let boundaries: Vec<usize> = text
            .char_indices()
            .map(|(offset, _)| offset)
            .chain(std::iter::once(text.len()))
            .collect();
        let char_count = boundaries.len() - 1;
        if char_count == 0 {
            return Vec::new();
        }

        let metadata = ChunkMetadata::from(article);
        let stride = self.chunk_size - self.chunk_overlap;
        let mut chunks = Vec::with_capacity(char_count.div_ceil(stride));
        let mut start = 0;
        loop {
            let end = (start + self.chunk_size).min(char_count);
            chunks.push(Chunk {
                content: text[boundaries[start]..boundaries[end]].to_string(),
                metadata: metadata.clone(),
                sequence: chunks.len(),
                start,
                overlap: if chunks.is_empty() {
                    0
                } else {
                    self.chunk_overlap
                },
            });
            if end == char_count {
                break;
            }
            start += stride;
        }
        chunks
    }

    /// Splits every article, keeping corpus order and then chunk order.
    pub fn split_all(&self, articles: &[Article]) -> Vec<Chunk> {
        articles
            .iter()
            .flat_map(|article| self.split(article))
            .collect()
    }
}

/// Concatenates the chunks of one article, skipping each chunk's shared prefix.
///
/// For the output of [`TextSplitter::split`] this yields the original article text.
pub fn reassemble(chunks: &[Chunk]) -> String {
    chunks
        .iter()
        .flat_map(|chunk| chunk.content.chars().skip(chunk.overlap))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(text: &str) -> Article {
        Article::new(6, "Lawfulness of processing", text.to_string())
    }

    #[test]
    fn test_split_covers_text_with_bounded_overlap() {
        let sentence = "Processing shall be lawful only if and to the extent that \
                        at least one of the following applies. ";
        let text = sentence.repeat(30);
        let splitter = TextSplitter::new(200, 20).unwrap();
        let chunks = splitter.split(&article(&text));

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.sequence, i);
            assert!(chunk.char_len() <= 200);
            assert_eq!(chunk.metadata.article_number, 6);
        }
        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].content.chars().collect();
            let next: Vec<char> = pair[1].content.chars().collect();
            // The tail of one window is the head of the next.
            assert_eq!(&prev[prev.len() - 20..], &next[..20]);
            assert_eq!(pair[1].start, pair[0].start + 180);
        }
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn test_split_short_text_is_single_chunk() {
        let chunks = TextSplitter::default().split(&article("Short article body."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, "Short article body.");
        assert_eq!(chunks[0].overlap, 0);
        assert_eq!(chunks[0].start, 0);
    }

    #[test]
    fn test_split_empty_text_yields_no_chunks() {
        assert!(TextSplitter::default().split(&article("")).is_empty());
    }

    #[test]
    fn test_split_exact_boundaries() {
        let splitter = TextSplitter::new(10, 3).unwrap();

        let exact = splitter.split(&article("abcdefghij"));
        assert_eq!(exact.len(), 1);

        let one_more = splitter.split(&article("abcdefghijk"));
        assert_eq!(one_more.len(), 2);
        assert_eq!(one_more[0].content, "abcdefghij");
        assert_eq!(one_more[1].content, "hijk");
        assert_eq!(one_more[1].overlap, 3);
    }

    #[test]
    fn test_split_counts_characters_not_bytes() {
        let text = "Données à caractère personnel, traitement licite ".repeat(10);
        let splitter = TextSplitter::new(40, 8).unwrap();
        let chunks = splitter.split(&article(&text));

        assert!(chunks.iter().all(|c| c.char_len() <= 40));
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn test_split_is_deterministic() {
        let text = "Consent should be given by a clear affirmative act. ".repeat(50);
        let splitter = TextSplitter::new(120, 30).unwrap();
        assert_eq!(splitter.split(&article(&text)), splitter.split(&article(&text)));
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(TextSplitter::new(0, 0).is_err());
        assert!(TextSplitter::new(100, 100).is_err());
        assert!(TextSplitter::new(100, 150).is_err());
        assert!(TextSplitter::new(100, 99).is_ok());
        assert!(TextSplitter::new(1, 0).is_ok());
    }

    #[test]
    fn test_split_all_preserves_corpus_order() {
        let articles = vec![
            Article::new(1, "Subject-matter and objectives", "a".repeat(25)),
            Article::new(2, "Material scope", ""),
            Article::new(3, "Territorial scope", "b".repeat(5)),
        ];
        let chunks = TextSplitter::new(10, 2).unwrap().split_all(&articles);
        let numbers: Vec<u32> = chunks.iter().map(|c| c.metadata.article_number).collect();
        assert_eq!(numbers, vec![1, 1, 1, 3]);
    }

    #[test]
    fn test_passage_escapes_summary() {
        let article = Article::new(17, "Right to erasure ('right to be \"forgotten\"')", "Text.");
        let chunks = TextSplitter::default().split(&article);
        let passage = chunks[0].passage();
        let expected_header = "article: {\"number\": 17, \"summary\": \
                               \"Right to erasure ('right to be \\\"forgotten\\\"')\"}";
        assert!(passage.starts_with(expected_header));
        assert!(passage.ends_with("\n\nText."));
    }

    #[test]
    fn test_parse_articles_list_and_indexed() {
        let list = r#"[{"article_number": 2, "article_summary": "Material scope", "article_text": "x"},
                       {"article_number": 1, "article_summary": "Subject-matter", "article_text": "y"}]"#;
        let parsed = parse_articles(list).unwrap();
        assert_eq!(parsed[0].article_number, 2);
        assert_eq!(parsed[1].article_number, 1);

        let indexed = r#"{"10": {"article_number": 11, "article_summary": "s", "article_text": "t"},
                          "2": {"article_number": 3, "article_summary": "s", "article_text": "t"},
                          "0": {"article_number": 1, "article_summary": "s", "article_text": "t"}}"#;
        let numbers: Vec<u32> = parse_articles(indexed)
            .unwrap()
            .iter()
            .map(|a| a.article_number)
            .collect();
        assert_eq!(numbers, vec![1, 3, 11]);

        assert!(parse_articles("not json").is_err());
        assert!(parse_articles(r#"[{"article_number": 1}]"#).is_err());
    }
}
