//! CSV codec for the corpus table.
//!
//! One header row, one paper per line. List columns hold a JSON array,
//! timestamps are RFC 3339, unset optional values are empty cells.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{CorpusTable, PaperRecord};

#[derive(Debug, Serialize, Deserialize)]
struct CorpusRow {
    id: String,
    title: String,
    authors: String,
    summary: String,
    published: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
    primary_category: String,
    categories: String,
    links: String,
    comment: Option<String>,
    journal_ref: Option<String>,
    doi: Option<String>,
    pdf_url: Option<String>,
    pdf_location: String,
    text_location: String,
    text_length: Option<u64>,
    year_published: Option<i32>,
}

fn encode_list(items: &[String]) -> Result<String> {
    Ok(serde_json::to_string(items)?)
}

fn decode_list(cell: &str, column: &str, id: &str) -> Result<Vec<String>> {
    if cell.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(cell)
        .map_err(|e| Error::Config(format!("column '{column}' of paper '{id}' is not a JSON list: {e}")))
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl CorpusRow {
    fn from_record(r: &PaperRecord) -> Result<Self> {
        Ok(Self {
            id: r.id.clone(),
            title: r.title.clone(),
            authors: encode_list(&r.authors)?,
            summary: r.summary.clone(),
            published: r.published,
            updated: r.updated,
            primary_category: r.primary_category.clone(),
            categories: encode_list(&r.categories)?,
            links: encode_list(&r.links)?,
            comment: r.comment.clone(),
            journal_ref: r.journal_ref.clone(),
            doi: r.doi.clone(),
            pdf_url: r.pdf_url.clone(),
            pdf_location: r.pdf_location.clone(),
            text_location: r.text_location.clone(),
            text_length: r.text_length,
            year_published: r.year_published,
        })
    }

    fn into_record(self) -> Result<PaperRecord> {
        let authors = decode_list(&self.authors, "authors", &self.id)?;
        let categories = decode_list(&self.categories, "categories", &self.id)?;
        let links = decode_list(&self.links, "links", &self.id)?;
        Ok(PaperRecord {
            id: self.id,
            title: self.title,
            authors,
            summary: self.summary,
            published: self.published,
            updated: self.updated,
            primary_category: self.primary_category,
            categories,
            links,
            comment: blank_to_none(self.comment),
            journal_ref: blank_to_none(self.journal_ref),
            doi: blank_to_none(self.doi),
            pdf_url: blank_to_none(self.pdf_url),
            pdf_location: self.pdf_location,
            text_location: self.text_location,
            text_length: self.text_length,
            year_published: self.year_published,
        })
    }
}

impl CorpusTable {
    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        for record in self.records() {
            writer.serialize(CorpusRow::from_record(record)?)?;
        }
        writer
            .into_inner()
            .map_err(|e| Error::Io(e.into_error()))
    }

    /// Parse a serialized table. Empty input is an empty table.
    pub fn from_csv(bytes: &[u8]) -> Result<Self> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::new());
        }
        let mut reader = csv::Reader::from_reader(bytes);
        let mut records = Vec::new();
        for row in reader.deserialize::<CorpusRow>() {
            records.push(row?.into_record()?);
        }
        Ok(Self::from_records(records))
    }
}
