use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;

use arxmap_core::error::{Error, Result};
use arxmap_core::types::{CorpusTable, PaperId, PaperRecord, ReducedMap};

/// What to do when the join loses ids from either side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VerifyPolicy {
    /// Log the loss and keep the partial table.
    #[default]
    Warn,
    /// Fail with `Error::DataIntegrity`.
    Strict,
}

impl FromStr for VerifyPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "warn" => Ok(Self::Warn),
            "strict" => Ok(Self::Strict),
            other => Err(Error::Config(format!("unknown verify policy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub record: PaperRecord,
    pub coords: [f32; 3],
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub metadata_rows: usize,
    pub reduced_rows: usize,
    pub merged_rows: usize,
    /// Metadata ids with no coordinates.
    pub missing_coordinates: Vec<PaperId>,
    /// Coordinate ids with no metadata row.
    pub missing_metadata: Vec<PaperId>,
}

impl MergeReport {
    pub fn is_complete(&self) -> bool {
        self.missing_coordinates.is_empty() && self.missing_metadata.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergedTable {
    pub rows: Vec<MergedRow>,
    pub report: MergeReport,
}

impl MergedTable {
    pub fn len(&self) -> usize { self.rows.len() }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }
}

/// Inner join of `metadata` and `reduced` on the trimmed paper id, in
/// metadata row order.
pub fn merge(metadata: &CorpusTable, reduced: &ReducedMap, policy: VerifyPolicy) -> Result<MergedTable> {
    let coords: BTreeMap<&str, [f32; 3]> = reduced.iter().map(|(k, v)| (k.trim(), *v)).collect();

    let mut rows = Vec::with_capacity(metadata.len().min(coords.len()));
    let mut matched: HashSet<&str> = HashSet::new();
    let mut missing_coordinates = Vec::new();
    for record in metadata.records() {
        let key = record.id.trim();
        match coords.get(key) {
            Some(c) => {
                matched.insert(key);
                rows.push(MergedRow { record: record.clone(), coords: *c });
            }
            None => missing_coordinates.push(key.to_string()),
        }
    }
    let missing_metadata: Vec<PaperId> =
        coords.keys().filter(|k| !matched.contains(*k)).map(|k| k.to_string()).collect();

    let report = MergeReport {
        metadata_rows: metadata.len(),
        reduced_rows: reduced.len(),
        merged_rows: rows.len(),
        missing_coordinates,
        missing_metadata,
    };

    if !report.is_complete() {
        match policy {
            VerifyPolicy::Warn => tracing::warn!(
                metadata_rows = report.metadata_rows,
                reduced_rows = report.reduced_rows,
                merged_rows = report.merged_rows,
                missing_coordinates = report.missing_coordinates.len(),
                missing_metadata = report.missing_metadata.len(),
                "merge dropped ids present on only one side"
            ),
            VerifyPolicy::Strict => {
                return Err(Error::DataIntegrity(format!(
                    "merge kept {} of {} metadata rows and {} coordinate rows ({} without coordinates, {} without metadata)",
                    report.merged_rows,
                    report.metadata_rows,
                    report.reduced_rows,
                    report.missing_coordinates.len(),
                    report.missing_metadata.len()
                )))
            }
        }
    } else {
        tracing::info!(rows = report.merged_rows, "merged coordinates with metadata");
    }

    Ok(MergedTable { rows, report })
}
