//! A generator that needs no model: it quotes the context back.

use super::{FALLBACK_ANSWER, GenerationError, GenerationRequest, GenerationService};
use async_trait::async_trait;
use gdpr_ai_embed::hashing::tokens;
use std::collections::HashSet;

/// Shortest question word that counts as a keyword.
const MIN_KEYWORD_CHARS: usize = 4;

/// Extractive answers for offline demos and tests.
///
/// Sentences of the retrieved passages that share a keyword with the question
/// are quoted with their article number. When no passage shares a keyword the
/// answer is [`FALLBACK_ANSWER`].
#[derive(Debug, Clone)]
pub struct ExtractiveGenerator {
    max_sentences: usize,
}

impl Default for ExtractiveGenerator {
    fn default() -> Self {
        Self { max_sentences: 3 }
    }
}

impl ExtractiveGenerator {
    pub fn new(max_sentences: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
        }
    }

    fn keywords(question: &str) -> HashSet<String> {
        tokens(question)
            .filter(|token| token.chars().count() >= MIN_KEYWORD_CHARS)
            .collect()
    }

    fn sentences(text: &str) -> impl Iterator<Item = &str> {
        text.split(['\n', ';'])
            .flat_map(|line| line.split(". "))
            .map(str::trim)
            .filter(|sentence| !sentence.is_empty())
    }
}

#[async_trait]
impl GenerationService for ExtractiveGenerator {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let keywords = Self::keywords(request.question().unwrap_or_default());
        if keywords.is_empty() {
            return Ok(FALLBACK_ANSWER.to_string());
        }

        let mut quoted = Vec::new();
        'passages: for passage in &request.context {
            for sentence in Self::sentences(&passage.text) {
                if tokens(sentence).any(|token| keywords.contains(&token)) {
                    let line = format!(
                        "Article {} ({}): {}",
                        passage.article_number,
                        passage.article_summary.trim(),
                        sentence
                    );
                    if !quoted.contains(&line) {
                        quoted.push(line);
                    }
                    if quoted.len() == self.max_sentences {
                        break 'passages;
                    }
                }
            }
        }

        if quoted.is_empty() {
            Ok(FALLBACK_ANSWER.to_string())
        } else {
            Ok(quoted.join("\n"))
        }
    }

    fn service_name(&self) -> &str {
        "extractive"
    }
}
