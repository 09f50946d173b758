// Local document retrieval
//
// KeywordRetriever is a small in-process Retriever: documents are split into
// overlapping character chunks and ranked against the query by shared terms.
// It lets the CLI answer over local files without a vector database.

use std::collections::HashSet;
use std::path::Path;

use async_trait::async_trait;

use crate::error::{AgentError, Result};
use crate::traits::{Passage, Retriever};

pub const DEFAULT_CHUNK_SIZE: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Split text into overlapping chunks of at most `chunk_size` characters
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() || chunk_size == 0 {
        return vec![];
    }

    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= chunk_size {
        return vec![text.to_string()];
    }

    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim().to_string();
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        if end >= chars.len() {
            break;
        }
        start += step;
    }

    chunks
}

fn terms(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[derive(Debug, Clone)]
struct Chunk {
    passage: Passage,
    terms: HashSet<String>,
}

/// In-memory keyword retriever over chunked documents
#[derive(Debug, Clone)]
pub struct KeywordRetriever {
    chunks: Vec<Chunk>,
    k: usize,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl KeywordRetriever {
    /// Create an empty retriever returning up to `k` passages
    pub fn new(k: usize) -> Self {
        Self {
            chunks: Vec::new(),
            k,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }

    pub fn with_chunking(mut self, chunk_size: usize, overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = overlap;
        self
    }

    /// Index a document under a source label
    pub fn add_document(&mut self, source: impl Into<String>, text: &str) -> usize {
        let source = source.into();
        let pieces = chunk_text(text, self.chunk_size, self.chunk_overlap);
        let added = pieces.len();
        for piece in pieces {
            self.chunks.push(Chunk {
                terms: terms(&piece),
                passage: Passage::new(piece).with_source(source.clone()),
            });
        }
        tracing::debug!(source = %source, chunks = added, "Indexed document");
        added
    }

    /// Read and index text files
    pub fn from_files<P: AsRef<Path>>(paths: &[P], k: usize) -> Result<Self> {
        let mut retriever = Self::new(k);
        for path in paths {
            let path = path.as_ref();
            let text = std::fs::read_to_string(path).map_err(|e| {
                AgentError::retrieval(format!("Failed to read {}: {}", path.display(), e))
            })?;
            retriever.add_document(path.display().to_string(), &text);
        }
        Ok(retriever)
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

#[async_trait]
impl Retriever for KeywordRetriever {
    async fn retrieve(&self, query: &str) -> Result<Vec<Passage>> {
        let query_terms = terms(query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, usize)> = self
            .chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| (i, chunk.terms.intersection(&query_terms).count()))
            .filter(|(_, score)| *score > 0)
            .collect();

        // Stable sort keeps document order among equal scores
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(scored
            .into_iter()
            .take(self.k)
            .map(|(i, _)| self.chunks[i].passage.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_text_short() {
        assert_eq!(chunk_text("  Hello world ", 100, 20), vec!["Hello world"]);
        assert!(chunk_text("   ", 100, 20).is_empty());
    }

    #[test]
    fn test_chunk_text_overlap() {
        let text: String = ('a'..='z').cycle().take(100).collect();
        let chunks = chunk_text(&text, 40, 10);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 40);
        assert_eq!(&chunks[0][30..40], &chunks[1][..10]);
    }

    #[test]
    fn test_chunk_text_overlap_not_smaller_than_size_terminates() {
        let text = "x".repeat(10);
        let chunks = chunk_text(&text, 4, 4);
        assert_eq!(chunks.len(), 7);
    }

    #[tokio::test]
    async fn test_retrieve_ranks_by_shared_terms() {
        let mut retriever = KeywordRetriever::new(2);
        retriever.add_document("cnn.md", "Convolutional networks use kernels over images.");
        retriever.add_document("rnn.md", "Recurrent networks process sequences step by step.");
        retriever.add_document("cooking.md", "Boil the pasta for ten minutes.");

        let passages = retriever
            .retrieve("How do recurrent networks handle sequences?")
            .await
            .unwrap();

        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].source.as_deref(), Some("rnn.md"));
        assert_eq!(passages[1].source.as_deref(), Some("cnn.md"));
    }

    #[tokio::test]
    async fn test_retrieve_no_match_is_empty() {
        let mut retriever = KeywordRetriever::new(3);
        retriever.add_document("a.md", "Transformers use attention.");
        assert!(retriever.retrieve("pasta recipe").await.unwrap().is_empty());
        assert!(retriever.retrieve("?!").await.unwrap().is_empty());
    }

    #[test]
    fn test_from_files_missing_file() {
        let err = KeywordRetriever::from_files(&["/definitely/not/here.md"], 3).unwrap_err();
        assert!(matches!(err, AgentError::Retrieval(_)));
    }
}
