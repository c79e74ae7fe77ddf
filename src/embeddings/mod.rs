// Embeddings module
// Content chunking and the embedding seam used by the index

pub mod chunking;

use anyhow::{Result, anyhow};

pub use chunking::{ChunkingConfig, DocumentChunk, chunk_documents, split_text};

/// Turns text into fixed-dimension vectors
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning one vector per text in the same order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text
    #[inline]
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Embedding response contained no vectors"))
    }

    /// Identifier of the model producing the vectors
    fn model_name(&self) -> &str;
}

/// Embed chunk contents in order
#[inline]
pub fn embed_chunks(embedder: &dyn Embedder, chunks: &[DocumentChunk]) -> Result<Vec<Vec<f32>>> {
    if chunks.is_empty() {
        return Ok(Vec::new());
    }

    let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
    let vectors = embedder.embed_batch(&texts)?;

    if vectors.len() != chunks.len() {
        return Err(anyhow!(
            "Mismatch between chunk and embedding counts: {} vs {}",
            chunks.len(),
            vectors.len()
        ));
    }

    Ok(vectors)
}
