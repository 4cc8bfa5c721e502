use chrono::{TimeZone, Utc};
use serde_json::Value;

use arxmap_core::types::{CorpusTable, PaperRecord, ReducedMap};
use arxmap_core::Error;
use arxmap_viz::payload::CategoryCounts;
use arxmap_viz::{
    build, generate_category_colors, get_category_color, get_category_color_with, merge, public_id, truncate_text,
    BuildOptions, MergedTable, VerifyPolicy,
};

fn paper(n: u32, category: &str, year: i32) -> PaperRecord {
    PaperRecord {
        id: format!("http://arxiv.org/abs/2101.{n:05}v1"),
        title: format!("Paper {n}"),
        authors: vec!["Ada Lovelace".into(), "Alan Turing".into()],
        summary: "word ".repeat(60),
        published: Some(Utc.with_ymd_and_hms(year, 3, 1, 12, 0, 0).unwrap()),
        updated: None,
        primary_category: category.to_string(),
        categories: vec![category.to_string(), "stat.ML".into()],
        links: vec![],
        comment: None,
        journal_ref: None,
        doi: None,
        pdf_url: None,
        pdf_location: format!("papers/{category}/2101.{n:05}v1.pdf"),
        text_location: format!("papers/{category}/2101.{n:05}v1.txt"),
        text_length: None,
        year_published: Some(year),
    }
}

fn corpus() -> CorpusTable {
    CorpusTable::from_records(vec![paper(1, "cs.CV", 2021), paper(2, "cs.LG", 2023), paper(3, "cs.CV", 2019)])
}

fn reduced_for(table: &CorpusTable) -> ReducedMap {
    table
        .records()
        .iter()
        .enumerate()
        .map(|(i, r)| (r.id.clone(), [i as f32, -(i as f32), 2.0 * i as f32]))
        .collect()
}

#[test]
fn truncate_cuts_on_a_space() {
    let out = truncate_text(&"word ".repeat(100), 200);
    assert!(out.chars().count() <= 203, "len {}", out.chars().count());
    assert!(out.ends_with("..."));
    assert!(!out.trim_end_matches("...").ends_with(' '));
    assert!(out.trim_end_matches("...").ends_with("word"));
}

#[test]
fn merge_keeps_metadata_order_and_trims_ids() {
    let table = corpus();
    let mut reduced = reduced_for(&table);
    let padded = reduced.remove(&table.records()[1].id).unwrap();
    reduced.insert(format!("  {}\n", table.records()[1].id), padded);

    let merged = merge(&table, &reduced, VerifyPolicy::Strict).expect("complete merge");
    assert!(merged.report.is_complete());
    let ids: Vec<&str> = merged.rows.iter().map(|r| r.record.id.as_str()).collect();
    let expected: Vec<&str> = table.records().iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, expected);
    assert_eq!(merged.rows[1].coords, padded);
}

#[test]
fn merge_loss_warns_or_fails_by_policy() {
    let table = corpus();
    let mut reduced = reduced_for(&table);
    reduced.remove(&table.records()[0].id);
    reduced.insert("http://arxiv.org/abs/9999.99999v1".into(), [0.0, 0.0, 0.0]);

    let merged = merge(&table, &reduced, VerifyPolicy::Warn).expect("warn keeps going");
    assert_eq!(merged.len(), 2);
    assert_eq!(merged.report.missing_coordinates, vec![table.records()[0].id.clone()]);
    assert_eq!(merged.report.missing_metadata, vec!["http://arxiv.org/abs/9999.99999v1".to_string()]);
    for row in &merged.rows {
        assert!(reduced.contains_key(&row.record.id));
    }

    assert!(matches!(merge(&table, &reduced, VerifyPolicy::Strict), Err(Error::DataIntegrity(_))));
    assert!(matches!("lenient".parse::<VerifyPolicy>(), Err(Error::Config(_))));
}

#[test]
fn build_three_rows_with_two_fields() {
    let table = corpus();
    let merged = merge(&table, &reduced_for(&table), VerifyPolicy::Strict).unwrap();
    let options = BuildOptions {
        detail_fields: vec!["summary".into(), "year_published".into()],
        ..BuildOptions::default()
    };

    let payload = build(&merged, &options);

    assert_eq!(payload.coordinates.len(), 3);
    assert_eq!(payload.details.len(), 3);
    for (coord, record) in payload.coordinates.iter().zip(table.records()) {
        assert_eq!(coord.id, public_id(&record.id));
        let detail = &payload.details[&coord.id];
        assert_eq!(detail.len(), 2);
        assert!(detail["summary"].as_str().unwrap().ends_with("..."));
        assert_eq!(detail["year_published"], Value::from(record.year_published.unwrap()));
    }

    let bounds = payload.metadata.bounds.as_ref().unwrap();
    assert_eq!(bounds.x, [0.0, 2.0]);
    assert_eq!(bounds.y, [-2.0, 0.0]);
    let center = payload.metadata.center.as_ref().unwrap();
    assert!((center.z - 2.0).abs() < 1e-9);

    let stats = payload.metadata.statistics.as_ref().unwrap();
    assert_eq!(stats.year_range, Some([2019, 2023]));
    assert_eq!(stats.top_categories, CategoryCounts(vec![("cs.CV".into(), 2), ("cs.LG".into(), 1)]));
    assert_eq!(stats.available_fields, options.detail_fields);
}

#[test]
fn detail_values_follow_field_rules() {
    let mut record = paper(7, "math.CO", 2020);
    record.doi = None;
    let table = CorpusTable::from_records(vec![record]);
    let merged = merge(&table, &reduced_for(&table), VerifyPolicy::Warn).unwrap();
    let options = BuildOptions {
        detail_fields: vec!["authors".into(), "published".into(), "doi".into(), "no_such_column".into()],
        calculate_bounds: false,
        add_statistics: false,
        ..BuildOptions::default()
    };

    let payload = build(&merged, &options);
    let detail = payload.details.values().next().unwrap();

    assert_eq!(detail["authors"], Value::from("Ada Lovelace, Alan Turing"));
    assert_eq!(detail["published"], Value::from("2020-03-01T12:00:00Z"));
    assert_eq!(detail["doi"], Value::Null);
    assert!(!detail.contains_key("no_such_column"));
    assert!(payload.metadata.bounds.is_none());
    assert!(payload.metadata.statistics.is_none());
}

#[test]
fn empty_merge_builds_an_empty_payload() {
    let payload = build(&MergedTable::default(), &BuildOptions::default());
    assert_eq!(payload.metadata.total_papers, 0);
    assert!(payload.metadata.bounds.is_none());
    let stats = payload.metadata.statistics.unwrap();
    assert!(stats.year_range.is_none());
    assert!(stats.top_categories.is_empty());
}

#[test]
fn payload_survives_json() {
    let table = corpus();
    let merged = merge(&table, &reduced_for(&table), VerifyPolicy::Warn).unwrap();
    let payload = build(&merged, &BuildOptions::default());
    let json = serde_json::to_string(&payload).unwrap();
    let back: arxmap_viz::VisualizationPayload = serde_json::from_str(&json).unwrap();
    assert_eq!(back, payload);
}

#[test]
fn category_colors_are_deterministic() {
    assert_eq!(get_category_color("cs"), "#3c8cdd");
    assert_eq!(get_category_color("cs.CV"), "#44cdd5");
    assert_eq!(get_category_color("cs.LG"), "#3f94d9");
    assert_eq!(get_category_color("math.CO"), "#d835e3");
    assert_eq!(get_category_color("astro-ph.GA"), "#6941d8");
    assert_eq!(get_category_color("cs.CV"), get_category_color("cs.CV"));
    assert_eq!(get_category_color("cs"), get_category_color_with("cs", 70.0, 55.0));
}

#[test]
fn unknown_domain_is_grey() {
    let color = get_category_color("alchemy.XX");
    let (r, g, b) = (&color[1..3], &color[3..5], &color[5..7]);
    assert!(r == g && g == b, "{color}");
}

#[test]
fn palette_covers_top_categories() {
    let table = corpus();
    let merged = merge(&table, &reduced_for(&table), VerifyPolicy::Warn).unwrap();
    let payload = build(&merged, &BuildOptions::default());

    let colors = generate_category_colors(&payload);
    assert_eq!(colors.keys().collect::<Vec<_>>(), vec!["cs.CV", "cs.LG"]);
    assert_eq!(colors["cs.CV"], "#44cdd5");
}
