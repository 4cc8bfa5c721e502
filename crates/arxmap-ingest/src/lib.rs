pub mod acquire;
pub mod arxiv;
pub mod blob;
pub mod extract;

pub use acquire::{load_corpus, save_corpus, AcquisitionReport, Acquirer};
pub use arxiv::{parse_atom_feed, parse_category_page, ArxivClient};
pub use blob::{open_blob_store, HttpBlobStore, LocalBlobStore};
pub use extract::{extract_missing_texts, ExtractionReport, PdfTextExtractor};
