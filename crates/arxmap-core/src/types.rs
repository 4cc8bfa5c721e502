//! Domain types shared by every pipeline stage.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::sanitize::Sanitize;

pub type PaperId = String;

/// Paper id → embedding vector. Ordered so iteration is canonical.
pub type EmbeddingMap = BTreeMap<PaperId, Vec<f32>>;

/// Paper id → 3D coordinates after reduction.
pub type ReducedMap = BTreeMap<PaperId, [f32; 3]>;

/// Column names a `PaperRecord` exposes to detail selection.
pub const FIELD_NAMES: &[&str] = &[
    "id",
    "title",
    "authors",
    "summary",
    "published",
    "updated",
    "primary_category",
    "categories",
    "links",
    "comment",
    "journal_ref",
    "doi",
    "pdf_url",
    "pdf_location",
    "text_location",
    "text_length",
    "year_published",
];

/// One row of the corpus table.
///
/// - `id`: catalog-assigned stable id (the arXiv `entry_id` URL), unique key
/// - `pdf_location`/`text_location`: blob store keys
/// - `text_length`: set by the extraction stage
/// - `year_published`: derived from `published` after every acquisition run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    pub id: PaperId,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub primary_category: String,
    pub categories: Vec<String>,
    pub links: Vec<String>,
    pub comment: Option<String>,
    pub journal_ref: Option<String>,
    pub doi: Option<String>,
    pub pdf_url: Option<String>,
    pub pdf_location: String,
    pub text_location: String,
    pub text_length: Option<u64>,
    pub year_published: Option<i32>,
}

/// A single field value as seen by the visualization builder.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    List(Vec<String>),
    Integer(i64),
    Timestamp(DateTime<Utc>),
}

impl PaperRecord {
    /// Look a column up by name. `None` means the column does not exist;
    /// unset or empty values come back as `FieldValue::Null`.
    pub fn field(&self, name: &str) -> Option<FieldValue> {
        fn text(s: &str) -> FieldValue {
            if s.trim().is_empty() { FieldValue::Null } else { FieldValue::Text(s.to_string()) }
        }
        fn opt_text(s: &Option<String>) -> FieldValue {
            s.as_deref().map_or(FieldValue::Null, text)
        }
        fn list(items: &[String]) -> FieldValue {
            if items.is_empty() { FieldValue::Null } else { FieldValue::List(items.to_vec()) }
        }
        fn stamp(ts: &Option<DateTime<Utc>>) -> FieldValue {
            ts.map_or(FieldValue::Null, FieldValue::Timestamp)
        }
        let value = match name {
            "id" => text(&self.id),
            "title" => text(&self.title),
            "authors" => list(&self.authors),
            "summary" => text(&self.summary),
            "published" => stamp(&self.published),
            "updated" => stamp(&self.updated),
            "primary_category" => text(&self.primary_category),
            "categories" => list(&self.categories),
            "links" => list(&self.links),
            "comment" => opt_text(&self.comment),
            "journal_ref" => opt_text(&self.journal_ref),
            "doi" => opt_text(&self.doi),
            "pdf_url" => opt_text(&self.pdf_url),
            "pdf_location" => text(&self.pdf_location),
            "text_location" => text(&self.text_location),
            "text_length" => self.text_length.map_or(FieldValue::Null, |n| FieldValue::Integer(n as i64)),
            "year_published" => self.year_published.map_or(FieldValue::Null, |y| FieldValue::Integer(i64::from(y))),
            _ => return None,
        };
        Some(value)
    }

    /// Run every text-bearing field through the sanitizer.
    pub fn sanitized(self) -> Self {
        Self {
            id: self.id.sanitize(),
            title: self.title.sanitize(),
            authors: self.authors.sanitize(),
            summary: self.summary.sanitize(),
            published: self.published,
            updated: self.updated,
            primary_category: self.primary_category.sanitize(),
            categories: self.categories.sanitize(),
            links: self.links.sanitize(),
            comment: self.comment.sanitize(),
            journal_ref: self.journal_ref.sanitize(),
            doi: self.doi.sanitize(),
            pdf_url: self.pdf_url.sanitize(),
            pdf_location: self.pdf_location.sanitize(),
            text_location: self.text_location.sanitize(),
            text_length: self.text_length,
            year_published: self.year_published,
        }
    }
}

/// Append-only collection of papers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusTable {
    records: Vec<PaperRecord>,
}

impl CorpusTable {
    pub fn new() -> Self { Self::default() }

    pub fn from_records(records: Vec<PaperRecord>) -> Self { Self { records } }

    pub fn records(&self) -> &[PaperRecord] { &self.records }

    pub fn records_mut(&mut self) -> &mut [PaperRecord] { &mut self.records }

    pub fn into_records(self) -> Vec<PaperRecord> { self.records }

    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Ids already present; the dedup key for a run.
    pub fn known_ids(&self) -> HashSet<PaperId> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    /// Concatenate `new_records` after the existing rows.
    pub fn append(&mut self, new_records: Vec<PaperRecord>) {
        if self.records.is_empty() {
            self.records = new_records;
        } else {
            self.records.extend(new_records);
        }
    }

    /// Recompute `year_published` from `published` for every row.
    pub fn derive_years(&mut self) {
        for r in &mut self.records {
            r.year_published = r.published.map(|p| p.year());
        }
    }
}

/// Sort criterion for catalog queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortCriterion {
    Relevance,
    LastUpdatedDate,
    SubmittedDate,
}

impl SortCriterion {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            SortCriterion::Relevance => "relevance",
            SortCriterion::LastUpdatedDate => "lastUpdatedDate",
            SortCriterion::SubmittedDate => "submittedDate",
        }
    }
}

/// A raw result from the catalog before it becomes a `PaperRecord`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub entry_id: String,
    pub short_id: String,
    pub title: String,
    pub authors: Vec<String>,
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub primary_category: String,
    pub categories: Vec<String>,
    pub links: Vec<String>,
    pub pdf_url: Option<String>,
    pub comment: Option<String>,
    pub journal_ref: Option<String>,
    pub doi: Option<String>,
}
