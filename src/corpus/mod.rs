// Corpus loading
// Reads the plain-text documents that make up the searchable corpus

#[cfg(test)]
mod tests;

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use tracing::{debug, info};
use walkdir::WalkDir;

/// A source document read from the corpus directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDocument {
    /// Path relative to the corpus root, using `/` separators
    pub source: String,
    pub text: String,
}

/// Load every `.txt` file in `dir`.
///
/// Only direct children are read unless `recursive` is set. Symlinks are
/// followed. Documents are
/// sorted by their relative path so chunk identities are stable between runs.
/// An empty directory yields an empty list.
#[inline]
pub fn load_documents(dir: &Path, recursive: bool) -> Result<Vec<SourceDocument>> {
    if !dir.is_dir() {
        bail!("Corpus directory does not exist: {}", dir.display());
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let mut documents = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(max_depth)
    {
        let entry = entry
            .with_context(|| format!("Failed to walk corpus directory: {}", dir.display()))?;

        if !entry.file_type().is_file() || !is_text_file(entry.path()) {
            continue;
        }

        let text = fs::read_to_string(entry.path())
            .with_context(|| format!("Failed to read document: {}", entry.path().display()))?;

        let source = entry
            .path()
            .strip_prefix(dir)
            .unwrap_or_else(|_| entry.path())
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        debug!("Loaded {} ({} bytes)", source, text.len());
        documents.push(SourceDocument { source, text });
    }

    documents.sort_by(|a, b| a.source.cmp(&b.source));

    info!(
        "Loaded {} documents from {}",
        documents.len(),
        dir.display()
    );
    Ok(documents)
}

fn is_text_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "txt")
}
