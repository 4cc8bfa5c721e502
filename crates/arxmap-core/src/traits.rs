use async_trait::async_trait;

use crate::error::Result;
use crate::types::{CatalogEntry, SortCriterion};

pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// Vectors come back in input order, L2-normalized.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Key-addressed blob storage (local directory or remote bucket).
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
    /// Human readable location, used in log lines.
    fn describe(&self) -> String;
}

/// Source of candidate papers.
///
/// `search` fails as a whole only when the query itself fails; a broken
/// entry inside an otherwise good response is an `Err` item in the list.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn search(
        &self,
        category: &str,
        max_results: usize,
        sort: SortCriterion,
    ) -> Result<Vec<Result<CatalogEntry>>>;

    async fn download_pdf(&self, entry: &CatalogEntry) -> Result<Vec<u8>>;
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<String>;
}
