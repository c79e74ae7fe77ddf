// Index module
// Builds the vector index once per path and reopens it afterwards

pub mod lock;
pub mod store;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::corpus::load_documents;
use crate::embeddings::{Embedder, chunk_documents, embed_chunks};

pub use lock::{BuildLock, WaitOutcome};
pub use store::VectorIndex;

/// Open the configured index, building it from the corpus if it does not exist yet
///
/// Only one process builds a given index path. Others wait for the build to finish,
/// up to `index.build_lock_timeout_secs`, before treating the lock as stale.
#[inline]
pub async fn open_or_build(
    config: &Config,
    embedder: Arc<dyn Embedder>,
    progress: &ProgressBar,
) -> Result<VectorIndex> {
    let index_path = config.index_path();
    let timeout = Duration::from_secs(config.index.build_lock_timeout_secs);

    loop {
        if index_path.exists() {
            progress.set_message("Opening index");
            return Ok(VectorIndex::open(&index_path, embedder).await?);
        }

        let Some(lock) = BuildLock::try_acquire(&index_path)? else {
            progress.set_message("Waiting for another process to build the index");
            match lock::wait_for_build(&index_path, timeout).await? {
                WaitOutcome::IndexReady => {}
                WaitOutcome::LockReleased => {
                    warn!("Index build lock released without an index, retrying");
                }
                WaitOutcome::StaleLockRemoved => {
                    warn!("Removed stale index build lock, retrying");
                }
            }
            continue;
        };

        // Another process may have finished between the existence check and the lock
        if index_path.exists() {
            drop(lock);
            continue;
        }

        let index = build_from_corpus(config, embedder, progress).await;
        drop(lock);
        return index;
    }
}

async fn build_from_corpus(
    config: &Config,
    embedder: Arc<dyn Embedder>,
    progress: &ProgressBar,
) -> Result<VectorIndex> {
    let corpus_path = config.corpus_path();

    progress.set_message(format!("Loading documents from {}", corpus_path.display()));
    let documents = load_documents(&corpus_path, config.corpus.recursive)?;

    progress.set_message(format!("Chunking {} documents", documents.len()));
    let chunks = chunk_documents(&documents, &config.chunking)?;

    progress.set_message(format!(
        "Embedding {} chunks with {}",
        chunks.len(),
        embedder.model_name()
    ));
    let vectors = embed_chunks(embedder.as_ref(), &chunks).context("Failed to embed chunks")?;

    let configured = config.openai.embedding_dimension as usize;
    let dimension = vectors.first().map_or(configured, Vec::len);
    if dimension != configured {
        warn!(
            "Embedding model returned {} dimensions, config says {}",
            dimension, configured
        );
    }

    progress.set_message(format!("Writing {} chunks", chunks.len()));
    let index =
        VectorIndex::build(&config.index_path(), dimension, &chunks, &vectors, embedder).await?;

    info!(
        "Built index from {} documents, {} chunks",
        documents.len(),
        chunks.len()
    );
    Ok(index)
}
