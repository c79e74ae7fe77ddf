#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

use crate::chat::{ChatMessage, ChatModel, ChatRequest};
use crate::config::ConfigError;
use crate::embeddings::DocumentChunk;

/// A chunk returned by a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: DocumentChunk,
    /// L2 distance between the query vector and the chunk vector
    pub distance: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    #[default]
    Plain,
    MultiQuery,
}

impl fmt::Display for RetrievalStrategy {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::MultiQuery => write!(f, "multi_query"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub strategy: RetrievalStrategy,
    /// Chunks returned per similarity search
    pub top_k: usize,
    /// Alternative phrasings requested by the multi-query strategy
    pub query_variants: usize,
    /// Search with the user's own question alongside the generated variants
    pub include_original: bool,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            strategy: RetrievalStrategy::Plain,
            top_k: 4,
            query_variants: 3,
            include_original: true,
        }
    }
}

impl RetrievalConfig {
    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_k == 0 || self.top_k > 100 {
            return Err(ConfigError::InvalidTopK(self.top_k));
        }
        if self.query_variants == 0 || self.query_variants > 10 {
            return Err(ConfigError::InvalidQueryVariants(self.query_variants));
        }
        Ok(())
    }
}

/// Nearest-neighbour search over stored chunks
#[async_trait]
pub trait ChunkSearch: Send + Sync {
    /// Return up to `k` chunks nearest to `query`, nearest first
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>>;
}

/// Turns a question into the chunks used as answer context
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, index: &dyn ChunkSearch, query: &str)
    -> Result<Vec<RetrievedChunk>>;
}

#[derive(Debug, Clone)]
pub struct PlainRetriever {
    top_k: usize,
}

impl PlainRetriever {
    #[inline]
    pub fn new(top_k: usize) -> Self {
        Self { top_k }
    }
}

#[async_trait]
impl Retriever for PlainRetriever {
    #[inline]
    async fn retrieve(
        &self,
        index: &dyn ChunkSearch,
        query: &str,
    ) -> Result<Vec<RetrievedChunk>> {
        let results = index.search(query, self.top_k).await?;
        debug!("Plain retrieval returned {} chunks", results.len());
        Ok(results)
    }
}

/// Searches with several model-written phrasings of the question and merges the hits
pub struct MultiQueryRetriever {
    chat: Arc<dyn ChatModel>,
    top_k: usize,
    query_variants: usize,
    include_original: bool,
    temperature: f32,
}

impl MultiQueryRetriever {
    #[inline]
    pub fn new(chat: Arc<dyn ChatModel>, config: &RetrievalConfig, temperature: f32) -> Self {
        Self {
            chat,
            top_k: config.top_k,
            query_variants: config.query_variants,
            include_original: config.include_original,
            temperature,
        }
    }

    /// Ask the chat model for alternative phrasings of `query`
    #[inline]
    pub fn generate_variants(&self, query: &str) -> Result<Vec<String>> {
        let request = ChatRequest {
            messages: vec![ChatMessage::user(variant_prompt(query, self.query_variants))],
            temperature: self.temperature,
        };

        let response = self
            .chat
            .complete(&request)
            .context("Failed to generate alternative queries")?;

        let variants: Vec<String> = parse_variants(&response)
            .into_iter()
            .take(self.query_variants)
            .collect();
        debug!("Generated {} query variants", variants.len());
        Ok(variants)
    }
}

#[async_trait]
impl Retriever for MultiQueryRetriever {
    async fn retrieve(
        &self,
        index: &dyn ChunkSearch,
        query: &str,
    ) -> Result<Vec<RetrievedChunk>> {
        let mut queries = Vec::with_capacity(self.query_variants + 1);
        if self.include_original {
            queries.push(query.to_string());
        }
        queries.extend(self.generate_variants(query)?);

        let mut seen = HashSet::new();
        let mut merged = Vec::new();
        for variant in &queries {
            for hit in index.search(variant, self.top_k).await? {
                if seen.insert(hit.chunk.id.clone()) {
                    merged.push(hit);
                }
            }
        }

        info!(
            "Multi-query retrieval: {} queries, {} unique chunks",
            queries.len(),
            merged.len()
        );
        Ok(merged)
    }
}

fn variant_prompt(query: &str, count: usize) -> String {
    format!(
        "You are an AI language model assistant. Your task is to generate {count} \
         different versions of the given user question to retrieve relevant documents \
         from a vector database. By generating multiple perspectives on the user \
         question, your goal is to help the user overcome some of the limitations of \
         distance-based similarity search. Provide these alternative questions \
         separated by newlines.\nOriginal question: {query}"
    )
}

/// One variant per non-blank line, with list numbering and bullets removed
fn parse_variants(response: &str) -> Vec<String> {
    response
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let without_bullet = line
        .strip_prefix(['-', '*', '•'])
        .map(str::trim_start)
        .unwrap_or(line);

    let rest = without_bullet.trim_start_matches(|c: char| c.is_ascii_digit());
    if rest.len() < without_bullet.len() {
        if let Some(stripped) = rest.strip_prefix(['.', ')']) {
            if stripped.starts_with(char::is_whitespace) {
                return stripped.trim_start();
            }
        }
    }
    without_bullet
}

/// Retriever for the configured strategy
#[inline]
pub fn build_retriever(
    config: &RetrievalConfig,
    chat: Arc<dyn ChatModel>,
    temperature: f32,
) -> Box<dyn Retriever> {
    match config.strategy {
        RetrievalStrategy::Plain => Box::new(PlainRetriever::new(config.top_k)),
        RetrievalStrategy::MultiQuery => {
            Box::new(MultiQueryRetriever::new(chat, config, temperature))
        }
    }
}
