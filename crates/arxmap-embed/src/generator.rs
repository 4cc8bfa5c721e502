//! Chunked, checkpointed embedding of a paper set.
//!
//! Papers are embedded `chunk_size` at a time. Every finished chunk is written
//! to `chunk_{index:05}.json` inside a scratch directory; once all chunks are
//! done the files are read back in index order and merged. The scratch
//! directory is a `TempDir`, so it is gone on every exit path.

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::TempDir;

use arxmap_core::error::{Error, Result};
use arxmap_core::traits::{BlobStore, Embedder};
use arxmap_core::types::{EmbeddingMap, PaperRecord};

pub const DEFAULT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbeddingInput {
    /// Title and abstract, the default.
    #[default]
    TitleSummary,
    /// Extracted PDF text read from `text_location`.
    FullText,
}

impl FromStr for EmbeddingInput {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title_summary" | "title-summary" | "summary" => Ok(Self::TitleSummary),
            "full_text" | "full-text" | "text" => Ok(Self::FullText),
            other => Err(Error::Config(format!("unknown embedding input '{other}'"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EmbedOptions {
    pub chunk_size: usize,
    pub input: EmbeddingInput,
    /// Parent for the scratch directory; system temp dir when `None`.
    pub checkpoint_root: Option<PathBuf>,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, input: EmbeddingInput::TitleSummary, checkpoint_root: None }
    }
}

#[derive(Serialize, Deserialize)]
struct ChunkEntry {
    id: String,
    embedding: Vec<f32>,
}

pub fn title_summary_text(paper: &PaperRecord) -> String {
    format!("Title : {}\n Abstract : {}", paper.title, paper.summary)
}

fn chunk_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("chunk_{index:05}.json"))
}

fn create_checkpoint_dir(root: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix("arxmap-embeddings-");
    let made = match root {
        Some(root) => fs::create_dir_all(root).and_then(|_| builder.tempdir_in(root)),
        None => builder.tempdir(),
    };
    made.map_err(|e| Error::Resource(format!("cannot create checkpoint directory: {e}")))
}

async fn chunk_texts(
    chunk: &[PaperRecord],
    input: EmbeddingInput,
    blobs: Option<&dyn BlobStore>,
) -> Result<Vec<String>> {
    match input {
        EmbeddingInput::TitleSummary => Ok(chunk.iter().map(title_summary_text).collect()),
        EmbeddingInput::FullText => {
            let blobs = blobs.ok_or_else(|| Error::Config("full-text embedding needs a blob store".into()))?;
            let mut texts = Vec::with_capacity(chunk.len());
            for paper in chunk {
                let bytes = blobs.get(&paper.text_location).await?.ok_or_else(|| {
                    Error::NotFound(format!("extracted text '{}' for paper '{}'", paper.text_location, paper.id))
                })?;
                texts.push(String::from_utf8_lossy(&bytes).into_owned());
            }
            Ok(texts)
        }
    }
}

fn check_batch(vectors: &[Vec<f32>], expected_count: usize, dim: usize, index: usize) -> Result<()> {
    if vectors.len() != expected_count {
        return Err(Error::Embedding(format!(
            "chunk {index}: model returned {} vectors for {expected_count} inputs",
            vectors.len()
        )));
    }
    if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
        return Err(Error::Embedding(format!("chunk {index}: vector dim {} != {dim}", bad.len())));
    }
    Ok(())
}

/// Embed every paper and return `id -> vector`.
///
/// Fatal conditions: `chunk_size == 0`, missing full text, a model error, a
/// count or dimension mismatch in a chunk's output, and any failure to write,
/// read or remove the checkpoint files.
pub async fn embed_papers(
    papers: &[PaperRecord],
    embedder: &dyn Embedder,
    blobs: Option<&dyn BlobStore>,
    options: &EmbedOptions,
) -> Result<EmbeddingMap> {
    if options.chunk_size == 0 {
        return Err(Error::Config("chunk_size must be at least 1".into()));
    }
    let checkpoints = create_checkpoint_dir(options.checkpoint_root.as_deref())?;
    let dim = embedder.dim();
    let total_chunks = papers.len().div_ceil(options.chunk_size);
    tracing::info!(
        papers = papers.len(),
        chunks = total_chunks,
        chunk_size = options.chunk_size,
        dir = %checkpoints.path().display(),
        "embedding papers"
    );

    let pb = ProgressBar::new(papers.len() as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} papers ({percent}%) {msg}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }

    for (index, chunk) in papers.chunks(options.chunk_size).enumerate() {
        let texts = chunk_texts(chunk, options.input, blobs).await?;
        let vectors = embedder
            .embed_batch(&texts)
            .map_err(|e| Error::Embedding(format!("chunk {index}: {e}")))?;
        check_batch(&vectors, chunk.len(), dim, index)?;

        let entries: Vec<ChunkEntry> = chunk
            .iter()
            .zip(vectors)
            .map(|(paper, embedding)| ChunkEntry { id: paper.id.clone(), embedding })
            .collect();
        let path = chunk_path(checkpoints.path(), index);
        let encoded = serde_json::to_vec(&entries)?;
        fs::write(&path, encoded)
            .map_err(|e| Error::Resource(format!("cannot write checkpoint {}: {e}", path.display())))?;

        pb.inc(chunk.len() as u64);
        pb.set_message(format!("chunk {}/{}", index + 1, total_chunks));
        tracing::debug!(chunk = index, size = chunk.len(), "checkpoint written");
    }
    pb.finish_and_clear();

    let mut consolidated = EmbeddingMap::new();
    for index in 0..total_chunks {
        let path = chunk_path(checkpoints.path(), index);
        let bytes = fs::read(&path)
            .map_err(|e| Error::Resource(format!("cannot read checkpoint {}: {e}", path.display())))?;
        let entries: Vec<ChunkEntry> = serde_json::from_slice(&bytes)?;
        consolidated.extend(entries.into_iter().map(|e| (e.id, e.embedding)));
    }

    checkpoints
        .close()
        .map_err(|e| Error::Resource(format!("cannot remove checkpoint directory: {e}")))?;
    tracing::info!(embeddings = consolidated.len(), dim, "embedding complete");
    Ok(consolidated)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_input_names() {
        assert_eq!("title_summary".parse::<EmbeddingInput>().unwrap(), EmbeddingInput::TitleSummary);
        assert_eq!("FULL_TEXT".parse::<EmbeddingInput>().unwrap(), EmbeddingInput::FullText);
        assert!(matches!("pdf".parse::<EmbeddingInput>(), Err(Error::Config(_))));
    }

    #[test]
    fn chunk_file_names_are_zero_padded() {
        let p = chunk_path(Path::new("/tmp/x"), 7);
        assert_eq!(p, PathBuf::from("/tmp/x/chunk_00007.json"));
    }

    #[test]
    fn batch_check_reports_mismatches() {
        let ok = vec![vec![0.0; 4], vec![0.0; 4]];
        assert!(check_batch(&ok, 2, 4, 0).is_ok());
        assert!(matches!(check_batch(&ok, 3, 4, 0), Err(Error::Embedding(_))));
        let ragged = vec![vec![0.0; 4], vec![0.0; 3]];
        assert!(matches!(check_batch(&ragged, 2, 4, 1), Err(Error::Embedding(_))));
    }
}
