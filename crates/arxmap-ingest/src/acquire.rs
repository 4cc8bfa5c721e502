//! Incremental, deduplicated corpus acquisition.

use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashSet;
use std::time::Duration;

use arxmap_core::error::Result;
use arxmap_core::traits::{BlobStore, CatalogClient};
use arxmap_core::types::{CatalogEntry, CorpusTable, PaperId, PaperRecord, SortCriterion};

pub const DEFAULT_MAX_CATEGORIES: usize = 10;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AcquisitionReport {
    pub fetched: usize,
    pub skipped_known: usize,
    pub skipped_duplicate: usize,
    pub failed_items: usize,
    pub failed_categories: usize,
}

pub struct Acquirer<'a> {
    catalog: &'a dyn CatalogClient,
    blobs: &'a dyn BlobStore,
    papers_prefix: String,
    max_categories: usize,
}

fn blob_key(prefix: &str, category: &str, short_id: &str, ext: &str) -> String {
    let dir = category.replace(' ', "_");
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        format!("{dir}/{short_id}.{ext}")
    } else {
        format!("{prefix}/{dir}/{short_id}.{ext}")
    }
}

fn to_record(entry: CatalogEntry, pdf_location: String, text_location: String) -> PaperRecord {
    PaperRecord {
        id: entry.entry_id,
        title: entry.title,
        authors: entry.authors,
        summary: entry.summary,
        published: entry.published,
        updated: entry.updated,
        primary_category: entry.primary_category,
        categories: entry.categories,
        links: entry.links,
        comment: entry.comment,
        journal_ref: entry.journal_ref,
        doi: entry.doi,
        pdf_url: entry.pdf_url,
        pdf_location,
        text_location,
        text_length: None,
        year_published: None,
    }
    .sanitized()
}

impl<'a> Acquirer<'a> {
    pub fn new(catalog: &'a dyn CatalogClient, blobs: &'a dyn BlobStore) -> Self {
        Self { catalog, blobs, papers_prefix: "papers".to_string(), max_categories: DEFAULT_MAX_CATEGORIES }
    }

    pub fn with_papers_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.papers_prefix = prefix.into();
        self
    }

    pub fn with_max_categories(mut self, max: usize) -> Self {
        self.max_categories = max;
        self
    }

    /// Fetch up to `max_results_per_category` recent papers per category and
    /// append the ones whose id is not yet in `existing`.
    ///
    /// Catalog, download and storage failures are logged and skipped; they
    /// only show up in the report.
    pub async fn acquire(
        &self,
        categories: &[String],
        max_results_per_category: usize,
        existing: CorpusTable,
    ) -> (CorpusTable, AcquisitionReport) {
        let known = existing.known_ids();
        let mut seen: HashSet<PaperId> = HashSet::new();
        let mut new_records = Vec::new();
        let mut report = AcquisitionReport::default();

        if categories.len() > self.max_categories {
            tracing::warn!(
                requested = categories.len(),
                max = self.max_categories,
                "too many categories, extra ones are ignored"
            );
        }
        let categories = &categories[..categories.len().min(self.max_categories)];

        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(Duration::from_millis(120));

        for (i, category) in categories.iter().enumerate() {
            pb.set_message(format!("{category} ({}/{})", i + 1, categories.len()));
            let results = match self
                .catalog
                .search(category, max_results_per_category, SortCriterion::SubmittedDate)
                .await
            {
                Ok(results) => results,
                Err(e) => {
                    tracing::warn!(category = %category, error = %e, "catalog search failed, skipping category");
                    report.failed_categories += 1;
                    continue;
                }
            };

            let before = new_records.len();
            for item in results {
                let entry = match item {
                    Ok(entry) => entry,
                    Err(e) => {
                        tracing::warn!(category = %category, error = %e, "skipping malformed catalog item");
                        report.failed_items += 1;
                        continue;
                    }
                };
                if known.contains(&entry.entry_id) {
                    tracing::debug!(paper_id = %entry.entry_id, "already in corpus");
                    report.skipped_known += 1;
                    continue;
                }
                if seen.contains(&entry.entry_id) {
                    tracing::debug!(paper_id = %entry.entry_id, category = %category, "already fetched in this run");
                    report.skipped_duplicate += 1;
                    continue;
                }

                let pdf = match self.catalog.download_pdf(&entry).await {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        tracing::warn!(paper_id = %entry.entry_id, error = %e, "pdf download failed");
                        report.failed_items += 1;
                        continue;
                    }
                };
                let pdf_location = blob_key(&self.papers_prefix, category, &entry.short_id, "pdf");
                if let Err(e) = self.blobs.put(&pdf_location, pdf, "application/pdf").await {
                    tracing::warn!(paper_id = %entry.entry_id, key = %pdf_location, error = %e, "storing pdf failed");
                    report.failed_items += 1;
                    continue;
                }
                let text_location = blob_key(&self.papers_prefix, category, &entry.short_id, "txt");

                seen.insert(entry.entry_id.clone());
                tracing::info!(paper_id = %entry.entry_id, title = %entry.title, "added paper");
                new_records.push(to_record(entry, pdf_location, text_location));
                report.fetched += 1;
                pb.tick();
            }
            tracing::info!(category = %category, added = new_records.len() - before, "category done");
        }
        pb.finish_and_clear();

        let mut table = existing;
        table.append(new_records);
        table.derive_years();
        tracing::info!(
            total = table.len(),
            fetched = report.fetched,
            skipped_known = report.skipped_known,
            skipped_duplicate = report.skipped_duplicate,
            failed_items = report.failed_items,
            failed_categories = report.failed_categories,
            "acquisition finished"
        );
        (table, report)
    }
}

/// Load the corpus table; a missing blob is an empty table.
pub async fn load_corpus(blobs: &dyn BlobStore, key: &str) -> Result<CorpusTable> {
    match blobs.get(key).await? {
        Some(bytes) => CorpusTable::from_csv(&bytes),
        None => {
            tracing::info!(key, store = %blobs.describe(), "no corpus table yet, starting empty");
            Ok(CorpusTable::new())
        }
    }
}

pub async fn save_corpus(blobs: &dyn BlobStore, key: &str, table: &CorpusTable) -> Result<()> {
    let bytes = table.to_csv()?;
    blobs.put(key, bytes, "text/csv").await?;
    tracing::info!(key, rows = table.len(), store = %blobs.describe(), "saved corpus table");
    Ok(())
}
