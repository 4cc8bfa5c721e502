//! Deterministic category palette. Categories sharing a domain (`cs` in
//! `cs.CV`) stay within 30 degrees of the domain's base hue.

use std::collections::BTreeMap;

use crate::payload::VisualizationPayload;

pub const DEFAULT_SATURATION: f64 = 70.0;
pub const DEFAULT_LIGHTNESS: f64 = 55.0;

const DOMAIN_BASE_HUES: &[(&str, f64)] = &[
    ("cs", 210.0),
    ("math", 270.0),
    ("physics", 30.0),
    ("quant-ph", 180.0),
    ("stat", 120.0),
    ("econ", 330.0),
    ("cond-mat", 60.0),
    ("astro-ph", 240.0),
    ("q-bio", 150.0),
    ("eess", 195.0),
    ("hep", 15.0),
    ("gr-qc", 285.0),
    ("q-fin", 345.0),
    ("nlin", 75.0),
    ("nucl", 45.0),
];

/// `cs.CV` -> `cs`, `astro-ph.GA` -> `astro-ph`.
pub fn get_domain(category: &str) -> &str {
    category.split('.').next().unwrap_or(category)
}

fn base_hue(domain: &str) -> Option<f64> {
    DOMAIN_BASE_HUES.iter().find(|(d, _)| *d == domain).map(|(_, h)| *h)
}

/// `h = (h << 5) - h + c` over code points, kept to 32 bits.
pub fn hash_string(s: &str) -> u32 {
    s.chars().fold(0u64, |h, c| ((h << 5) - h + u64::from(u32::from(c))) & 0xFFFF_FFFF) as u32
}

fn hue_to_channel(m1: f64, m2: f64, hue: f64) -> f64 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

/// `h` in degrees, `s` and `l` in percent.
pub fn hsl_to_hex(h: f64, s: f64, l: f64) -> String {
    let (h, s, l) = (h / 360.0, s / 100.0, l / 100.0);
    let (r, g, b) = if s == 0.0 {
        (l, l, l)
    } else {
        let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let m1 = 2.0 * l - m2;
        (
            hue_to_channel(m1, m2, h + 1.0 / 3.0),
            hue_to_channel(m1, m2, h),
            hue_to_channel(m1, m2, h - 1.0 / 3.0),
        )
    };
    let byte = |v: f64| (v * 255.0).round_ties_even().clamp(0.0, 255.0) as u8;
    format!("#{:02x}{:02x}{:02x}", byte(r), byte(g), byte(b))
}

pub fn get_category_color(category: &str) -> String {
    get_category_color_with(category, DEFAULT_SATURATION, DEFAULT_LIGHTNESS)
}

pub fn get_category_color_with(category: &str, saturation: f64, lightness: f64) -> String {
    let domain = get_domain(category);
    let Some(hue) = base_hue(domain) else {
        // unknown domains render grey
        return hsl_to_hex(0.0, 0.0, lightness);
    };

    let Some((_, subcategory)) = category.split_once('.') else {
        return hsl_to_hex(hue, saturation, lightness);
    };

    let h = hash_string(subcategory);
    let hue_shift = f64::from(h % 60) - 30.0;
    let sat_shift = f64::from(h % 20) - 10.0;
    let final_hue = (hue + hue_shift + 360.0).rem_euclid(360.0);
    let final_sat = (saturation + sat_shift).clamp(50.0, 90.0);
    hsl_to_hex(final_hue, final_sat, lightness)
}

/// Colour every category listed in the payload's top categories.
pub fn generate_category_colors(payload: &VisualizationPayload) -> BTreeMap<String, String> {
    let Some(stats) = payload.metadata.statistics.as_ref() else {
        tracing::warn!("payload carries no statistics, category palette is empty");
        return BTreeMap::new();
    };
    stats
        .top_categories
        .iter()
        .map(|(category, _)| (category.clone(), get_category_color(category)))
        .collect()
}
