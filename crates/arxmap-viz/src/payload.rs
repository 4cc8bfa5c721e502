use chrono::{SecondsFormat, Utc};
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use arxmap_core::config::VizSettings;
use arxmap_core::types::{FieldValue, PaperRecord};

use crate::merge::MergedTable;

pub const DEFAULT_SUMMARY_MAX_LENGTH: usize = 200;
pub const DEFAULT_TOP_CATEGORIES: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub id: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

pub type Details = BTreeMap<String, BTreeMap<String, Value>>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizationPayload {
    pub coordinates: Vec<Coordinate>,
    pub details: Details,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub total_papers: usize,
    pub date_generated: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub center: Option<Center>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
}

/// `[min, max]` per axis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: [f64; 2],
    pub y: [f64; 2],
    pub z: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Center {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year_range: Option<[i32; 2]>,
    pub top_categories: CategoryCounts,
    pub available_fields: Vec<String>,
}

/// Category counts, most frequent first. Serialized as a JSON object whose
/// key order is the ranking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryCounts(pub Vec<(String, u64)>);

impl CategoryCounts {
    pub fn iter(&self) -> impl Iterator<Item = &(String, u64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl Serialize for CategoryCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (category, count) in &self.0 {
            map.serialize_entry(category, count)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for CategoryCounts {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CountsVisitor;

        impl<'de> Visitor<'de> for CountsVisitor {
            type Value = CategoryCounts;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of category to count")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut out = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((k, v)) = access.next_entry::<String, u64>()? {
                    out.push((k, v));
                }
                Ok(CategoryCounts(out))
            }
        }

        deserializer.deserialize_map(CountsVisitor)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildOptions {
    pub detail_fields: Vec<String>,
    pub summary_max_length: usize,
    pub calculate_bounds: bool,
    pub add_statistics: bool,
    pub top_categories: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from_settings(&VizSettings::default())
    }
}

impl BuildOptions {
    pub fn from_settings(s: &VizSettings) -> Self {
        Self {
            detail_fields: s.detail_fields.clone(),
            summary_max_length: s.summary_max_length,
            calculate_bounds: s.calculate_bounds,
            add_statistics: s.add_statistics,
            top_categories: s.top_categories,
        }
    }
}

/// First 32 hex chars of the blake3 digest of the internal id.
pub fn public_id(paper_id: &str) -> String {
    let hex = blake3::hash(paper_id.as_bytes()).to_hex();
    hex.as_str()[..32].to_string()
}

/// Trim, and if still longer than `max_length` chars keep the first
/// `max_length`, cut back to the last whitespace and append `...`.
pub fn truncate_text(text: &str, max_length: usize) -> String {
    let text = text.trim();
    if text.chars().count() <= max_length {
        return text.to_string();
    }
    let head: String = text.chars().take(max_length).collect();
    let cut = match head.rfind(char::is_whitespace) {
        Some(pos) => head[..pos].to_string(),
        None => head,
    };
    format!("{cut}...")
}

fn detail_value(field: &str, value: FieldValue, summary_max_length: usize) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Text(s) if field == "summary" => Value::String(truncate_text(&s, summary_max_length)),
        FieldValue::Integer(n) if field == "year_published" => Value::from(n),
        FieldValue::Text(s) => Value::String(s),
        FieldValue::List(items) => Value::String(items.join(", ")),
        FieldValue::Integer(n) => Value::String(n.to_string()),
        FieldValue::Timestamp(ts) => Value::String(ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
    }
}

fn details_for(record: &PaperRecord, options: &BuildOptions) -> BTreeMap<String, Value> {
    options
        .detail_fields
        .iter()
        .filter_map(|field| {
            let value = record.field(field)?;
            Some((field.clone(), detail_value(field, value, options.summary_max_length)))
        })
        .collect()
}

fn bounds_and_center(coordinates: &[Coordinate]) -> Option<(Bounds, Center)> {
    if coordinates.is_empty() {
        return None;
    }
    let axis = |get: fn(&Coordinate) -> f64| {
        let (lo, hi, sum) = coordinates.iter().map(get).fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0),
            |(lo, hi, sum), v| (lo.min(v), hi.max(v), sum + v),
        );
        ([lo, hi], sum / coordinates.len() as f64)
    };
    let (x, cx) = axis(|c| c.x);
    let (y, cy) = axis(|c| c.y);
    let (z, cz) = axis(|c| c.z);
    Some((Bounds { x, y, z }, Center { x: cx, y: cy, z: cz }))
}

fn statistics(merged: &MergedTable, options: &BuildOptions) -> Statistics {
    let years = merged.rows.iter().filter_map(|r| r.record.year_published);
    let year_range = years.fold(None, |acc: Option<[i32; 2]>, y| match acc {
        None => Some([y, y]),
        Some([lo, hi]) => Some([lo.min(y), hi.max(y)]),
    });

    let mut counts: HashMap<&str, u64> = HashMap::new();
    for row in &merged.rows {
        let category = row.record.primary_category.as_str();
        if !category.is_empty() {
            *counts.entry(category).or_default() += 1;
        }
    }
    let mut ranked: Vec<(String, u64)> = counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(options.top_categories);

    Statistics {
        year_range,
        top_categories: CategoryCounts(ranked),
        available_fields: options.detail_fields.clone(),
    }
}

/// Build the browsable payload: coordinates and details keyed by
/// `public_id`, plus summary metadata.
pub fn build(merged: &MergedTable, options: &BuildOptions) -> VisualizationPayload {
    let mut coordinates = Vec::with_capacity(merged.len());
    let mut details = Details::new();
    for row in &merged.rows {
        let id = public_id(row.record.id.trim());
        let [x, y, z] = row.coords;
        coordinates.push(Coordinate { id: id.clone(), x: f64::from(x), y: f64::from(y), z: f64::from(z) });
        if details.insert(id, details_for(&row.record, options)).is_some() {
            tracing::warn!(paper_id = %row.record.id, "duplicate paper id in merged table");
        }
    }

    let (bounds, center) = match options.calculate_bounds.then(|| bounds_and_center(&coordinates)).flatten() {
        Some((b, c)) => (Some(b), Some(c)),
        None => (None, None),
    };

    let metadata = Metadata {
        total_papers: merged.len(),
        date_generated: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        bounds,
        center,
        statistics: options.add_statistics.then(|| statistics(merged, options)),
    };
    tracing::info!(papers = metadata.total_papers, fields = options.detail_fields.len(), "built visualization payload");

    VisualizationPayload { coordinates, details, metadata }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_without_whitespace_keeps_the_prefix() {
        assert_eq!(truncate_text("abcdefghij", 4), "abcd...");
        assert_eq!(truncate_text("  short  ", 10), "short");
    }

    #[test]
    fn public_id_is_short_hex() {
        let id = public_id("http://arxiv.org/abs/2101.00001v1");
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, public_id("http://arxiv.org/abs/2101.00001v1"));
    }

    #[test]
    fn category_counts_keep_rank_order_in_json() {
        let counts = CategoryCounts(vec![("math.CO".into(), 5), ("cs.AI".into(), 2)]);
        let json = serde_json::to_string(&counts).unwrap();
        assert_eq!(json, r#"{"math.CO":5,"cs.AI":2}"#);
        let back: CategoryCounts = serde_json::from_str(&json).unwrap();
        assert_eq!(back, counts);
    }
}
