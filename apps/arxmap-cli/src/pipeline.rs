//! The pipeline stages as the binaries run them. Each stage reads its input
//! from the blob store or the previous stage's artifact and writes its own.

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arxmap_core::config::{expand_path, Settings};
use arxmap_core::traits::{BlobStore, Embedder};
use arxmap_core::types::{EmbeddingMap, ReducedMap};
use arxmap_embed::{embed_papers, EmbedOptions};
use arxmap_ingest::{
    extract_missing_texts, load_corpus, open_blob_store, save_corpus, AcquisitionReport, Acquirer, ArxivClient,
    ExtractionReport, PdfTextExtractor,
};
use arxmap_project::{normalize, reduce, ReduceParams};
use arxmap_viz::{build, generate_category_colors, merge, BuildOptions, VisualizationPayload};

use crate::artifacts::{read_json, write_json};

pub struct Stages {
    settings: Settings,
    blobs: Arc<dyn BlobStore>,
}

impl Stages {
    pub fn new(settings: Settings) -> Result<Self> {
        let blobs = open_blob_store(&settings.storage, Duration::from_secs(settings.catalog.timeout_secs))?;
        Ok(Self::with_store(settings, blobs))
    }

    pub fn with_store(settings: Settings, blobs: Arc<dyn BlobStore>) -> Self {
        Self { settings, blobs }
    }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub async fn acquire(&self) -> Result<AcquisitionReport> {
        let catalog = ArxivClient::new(&self.settings.catalog)?;
        let key = &self.settings.storage.corpus_key;
        let existing = load_corpus(self.blobs.as_ref(), key).await?;
        let categories = if self.settings.catalog.discover_categories {
            catalog.fetch_categories(&self.settings.catalog.categories_url).await?
        } else {
            self.settings.catalog.categories.clone()
        };

        let (table, report) = Acquirer::new(&catalog, self.blobs.as_ref())
            .with_papers_prefix(self.settings.storage.papers_prefix.clone())
            .with_max_categories(self.settings.catalog.max_categories)
            .acquire(&categories, self.settings.catalog.max_results_per_category, existing)
            .await;
        save_corpus(self.blobs.as_ref(), key, &table).await?;
        Ok(report)
    }

    pub async fn extract(&self) -> Result<ExtractionReport> {
        let key = &self.settings.storage.corpus_key;
        let mut table = load_corpus(self.blobs.as_ref(), key).await?;
        let report = extract_missing_texts(&mut table, self.blobs.as_ref(), &PdfTextExtractor).await;
        save_corpus(self.blobs.as_ref(), key, &table).await?;
        Ok(report)
    }

    pub async fn embed(&self, embedder: &dyn Embedder) -> Result<EmbeddingMap> {
        let table = load_corpus(self.blobs.as_ref(), &self.settings.storage.corpus_key).await?;
        let opts = &self.settings.embedding;
        let options = EmbedOptions {
            chunk_size: opts.chunk_size,
            input: opts.input.parse()?,
            checkpoint_root: opts.checkpoint_dir.as_deref().map(expand_path),
        };

        let started = Instant::now();
        let embeddings = embed_papers(table.records(), embedder, Some(self.blobs.as_ref()), &options).await?;
        tracing::info!(papers = embeddings.len(), elapsed_ms = started.elapsed().as_millis() as u64, "embedding finished");

        write_json(&self.settings.output.path(&self.settings.output.embeddings_file), &embeddings)?;
        Ok(embeddings)
    }

    pub fn project(&self) -> Result<ReducedMap> {
        let out = &self.settings.output;
        let embeddings: EmbeddingMap = read_json(&out.path(&out.embeddings_file))?;
        let p = &self.settings.projection;

        let normalized = normalize(&embeddings, p.normalization.parse()?)?;
        let reduced = reduce(&normalized, p.method.parse()?, &ReduceParams::from_settings(p)?)?;

        write_json(&out.path(&out.reduced_file), &reduced)?;
        Ok(reduced)
    }

    pub async fn visualize(&self) -> Result<VisualizationPayload> {
        let out = &self.settings.output;
        let table = load_corpus(self.blobs.as_ref(), &self.settings.storage.corpus_key).await?;
        let reduced: ReducedMap = read_json(&out.path(&out.reduced_file))?;

        let merged = merge(&table, &reduced, self.settings.viz.verify_policy.parse()?)?;
        let payload = build(&merged, &BuildOptions::from_settings(&self.settings.viz));
        let colors = generate_category_colors(&payload);

        write_json(&out.path(&out.payload_file), &payload)?;
        write_json(&out.path(&out.colors_file), &colors)?;
        Ok(payload)
    }
}
