use arxmap_core::error::{Error, Result};
use arxmap_core::sanitize::sanitize_text;
use arxmap_core::traits::{BlobStore, TextExtractor};
use arxmap_core::types::CorpusTable;

/// Text layer extraction through `pdf_extract`. Scanned PDFs give (near) empty text.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract(&self, pdf_bytes: &[u8]) -> Result<String> {
        // pdf_extract panics on some malformed inputs.
        std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(pdf_bytes))
            .map_err(|_| Error::External("PDF text extraction panicked".into()))?
            .map_err(|e| Error::External(format!("PDF text extraction failed: {e}")))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub extracted: usize,
    pub already_done: usize,
    pub failed: usize,
}

/// Extract text for every row whose `text_length` is unset, store it at the
/// row's `text_location` and record its character count.
pub async fn extract_missing_texts(
    table: &mut CorpusTable,
    blobs: &dyn BlobStore,
    extractor: &dyn TextExtractor,
) -> ExtractionReport {
    let mut report = ExtractionReport::default();
    for record in table.records_mut() {
        if record.text_length.is_some() {
            report.already_done += 1;
            continue;
        }
        let pdf = match blobs.get(&record.pdf_location).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                tracing::warn!(paper_id = %record.id, key = %record.pdf_location, "pdf missing from store");
                report.failed += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(paper_id = %record.id, error = %e, "reading pdf failed");
                report.failed += 1;
                continue;
            }
        };
        let text = match extractor.extract(&pdf) {
            Ok(text) => sanitize_text(&text),
            Err(e) => {
                tracing::warn!(paper_id = %record.id, error = %e, "text extraction failed");
                report.failed += 1;
                continue;
            }
        };
        let length = text.chars().count() as u64;
        if let Err(e) = blobs
            .put(&record.text_location, text.into_bytes(), "text/plain; charset=utf-8")
            .await
        {
            tracing::warn!(paper_id = %record.id, key = %record.text_location, error = %e, "storing text failed");
            report.failed += 1;
            continue;
        }
        record.text_length = Some(length);
        report.extracted += 1;
    }
    tracing::info!(
        extracted = report.extracted,
        already_done = report.already_done,
        failed = report.failed,
        "text extraction finished"
    );
    report
}
