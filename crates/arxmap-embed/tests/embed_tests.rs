use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::TempDir;

use arxmap_core::error::{Error, Result};
use arxmap_core::traits::{BlobStore, Embedder};
use arxmap_core::types::PaperRecord;
use arxmap_embed::{embed_papers, get_default_embedder, EmbedOptions, EmbeddingInput, FakeEmbedder, FAKE_DIM};

fn paper(i: usize) -> PaperRecord {
    PaperRecord {
        id: format!("http://arxiv.org/abs/2401.{i:05}v1"),
        title: format!("Paper number {i}"),
        authors: vec!["A. Author".into()],
        summary: format!("Abstract text for paper {i} about topic {}", i % 3),
        published: None,
        updated: None,
        primary_category: "cs.LG".into(),
        categories: vec!["cs.LG".into()],
        links: vec![],
        comment: None,
        journal_ref: None,
        doi: None,
        pdf_url: None,
        pdf_location: format!("papers/cs.LG/{i}.pdf"),
        text_location: format!("papers/cs.LG/{i}.txt"),
        text_length: None,
        year_published: None,
    }
}

fn options(chunk_size: usize, root: &TempDir) -> EmbedOptions {
    EmbedOptions {
        chunk_size,
        input: EmbeddingInput::TitleSummary,
        checkpoint_root: Some(root.path().to_path_buf()),
    }
}

fn is_empty_dir(dir: &TempDir) -> bool {
    std::fs::read_dir(dir.path()).unwrap().next().is_none()
}

#[derive(Default)]
struct MemoryBlobs {
    items: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl BlobStore for MemoryBlobs {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.items.lock().unwrap().get(key).cloned())
    }
    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<()> {
        self.items.lock().unwrap().insert(key.to_string(), bytes);
        Ok(())
    }
    fn describe(&self) -> String {
        "memory".into()
    }
}

/// Fails on the second batch it sees.
struct FlakyEmbedder {
    inner: FakeEmbedder,
    calls: Mutex<usize>,
}

impl Embedder for FlakyEmbedder {
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        if *calls == 2 {
            anyhow::bail!("device lost");
        }
        self.inner.embed_batch(texts)
    }
}

#[test]
fn fake_embedder_shapes_and_determinism() {
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder(None).expect("embedder");
    let texts = vec!["hello world".to_string(), "hello world".to_string(), "other".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");

    assert_eq!(embs.len(), 3);
    assert_eq!(embs[0].len(), FAKE_DIM);
    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    assert_eq!(embs[0], embs[1]);
    assert_ne!(embs[0], embs[2]);
}

#[tokio::test]
async fn chunking_does_not_change_result() {
    let papers: Vec<_> = (0..23).map(paper).collect();
    let embedder = FakeEmbedder::new(32);
    let root = TempDir::new().unwrap();

    let whole = embed_papers(&papers, &embedder, None, &options(500, &root)).await.expect("one chunk");
    for chunk_size in [1, 4, 7, 23] {
        let chunked = embed_papers(&papers, &embedder, None, &options(chunk_size, &root)).await.expect("chunked");
        assert_eq!(chunked, whole, "chunk_size={chunk_size}");
    }
    assert_eq!(whole.len(), 23);
    assert!(is_empty_dir(&root), "checkpoint directories are removed");
}

#[tokio::test]
async fn zero_chunk_size_is_config_error() {
    let root = TempDir::new().unwrap();
    let err = embed_papers(&[paper(0)], &FakeEmbedder::new(8), None, &options(0, &root))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[tokio::test]
async fn model_failure_aborts_and_cleans_up() {
    let papers: Vec<_> = (0..6).map(paper).collect();
    let embedder = FlakyEmbedder { inner: FakeEmbedder::new(8), calls: Mutex::new(0) };
    let root = TempDir::new().unwrap();

    let err = embed_papers(&papers, &embedder, None, &options(2, &root)).await.unwrap_err();
    assert!(matches!(err, Error::Embedding(msg) if msg.contains("chunk 1")));
    assert!(is_empty_dir(&root), "partial checkpoints are removed");
}

#[tokio::test]
async fn full_text_reads_from_blob_store() {
    let papers: Vec<_> = (0..3).map(paper).collect();
    let blobs = MemoryBlobs::default();
    for p in &papers {
        blobs.put(&p.text_location, format!("full body of {}", p.id).into_bytes(), "text/plain").await.unwrap();
    }
    let embedder = FakeEmbedder::new(16);
    let root = TempDir::new().unwrap();
    let opts = EmbedOptions { input: EmbeddingInput::FullText, ..options(2, &root) };

    let map = embed_papers(&papers, &embedder, Some(&blobs as &dyn BlobStore), &opts).await.expect("full text");
    let expected = embedder.embed_batch(&[format!("full body of {}", papers[1].id)]).unwrap();
    assert_eq!(map[&papers[1].id], expected[0]);

    let missing = vec![paper(9)];
    let err = embed_papers(&missing, &embedder, Some(&blobs as &dyn BlobStore), &opts).await.unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    let err = embed_papers(&papers, &embedder, None, &opts).await.unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}
