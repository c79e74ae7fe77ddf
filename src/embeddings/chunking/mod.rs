#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::debug;

use crate::config::ConfigError;
use crate::corpus::SourceDocument;

/// Separators tried in order before falling back to splitting between characters
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// A contiguous piece of a source document, ready for embedding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentChunk {
    /// Stable identity, `{source}#{chunk_index}`
    pub id: String,
    /// Relative path of the document this chunk was cut from
    pub source: String,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    /// The chunk text
    pub content: String,
}

/// Configuration for content chunking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters
    pub chunk_size: usize,
    /// Characters of trailing context carried from one chunk into the next
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 0,
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunk_size));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ConfigError::ChunkOverlapTooLarge(
                self.chunk_overlap,
                self.chunk_size,
            ));
        }
        Ok(())
    }
}

#[inline]
pub fn chunk_id(source: &str, chunk_index: usize) -> String {
    format!("{}#{}", source, chunk_index)
}

/// Split every document into chunks, keeping document order and chunk order
#[inline]
pub fn chunk_documents(
    documents: &[SourceDocument],
    config: &ChunkingConfig,
) -> Result<Vec<DocumentChunk>, ConfigError> {
    config.validate()?;

    let mut chunks = Vec::new();
    for document in documents {
        let pieces = split_text(&document.text, config);
        debug!("Split {} into {} chunks", document.source, pieces.len());

        chunks.extend(
            pieces
                .into_iter()
                .enumerate()
                .map(|(chunk_index, content)| DocumentChunk {
                    id: chunk_id(&document.source, chunk_index),
                    source: document.source.clone(),
                    chunk_index,
                    content,
                }),
        );
    }

    debug!(
        "Chunked {} documents into {} chunks",
        documents.len(),
        chunks.len()
    );
    Ok(chunks)
}

/// Split a single text into pieces of at most `chunk_size` characters.
///
/// Separators stay attached to the piece they end, so without overlap the
/// pieces concatenate back to the original text.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    split_recursive(text, &SEPARATORS, config)
}

fn split_recursive(text: &str, separators: &[&str], config: &ChunkingConfig) -> Vec<String> {
    if char_len(text) <= config.chunk_size {
        return vec![text.to_string()];
    }

    let Some(position) = separators.iter().position(|sep| text.contains(sep)) else {
        return split_by_chars(text, config);
    };
    let separator = separators[position];
    let finer_separators = &separators[position + 1..];

    let mut chunks = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut window_len = 0;

    for piece in text.split_inclusive(separator) {
        let piece_len = char_len(piece);

        // Oversized pieces are split with the next separator on their own
        if piece_len > config.chunk_size {
            if !window.is_empty() {
                chunks.push(window.iter().copied().collect::<String>());
                window.clear();
                window_len = 0;
            }
            chunks.extend(split_recursive(piece, finer_separators, config));
            continue;
        }

        if window_len + piece_len > config.chunk_size && !window.is_empty() {
            chunks.push(window.iter().copied().collect::<String>());

            while window_len > config.chunk_overlap
                || (window_len > 0 && window_len + piece_len > config.chunk_size)
            {
                let Some(front) = window.pop_front() else {
                    break;
                };
                window_len -= char_len(front);
            }
        }

        window.push_back(piece);
        window_len += piece_len;
    }

    if !window.is_empty() {
        chunks.push(window.iter().copied().collect::<String>());
    }

    chunks
}

/// Last resort for text without any separator: fixed windows of characters
fn split_by_chars(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let step = config.chunk_size - config.chunk_overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}
