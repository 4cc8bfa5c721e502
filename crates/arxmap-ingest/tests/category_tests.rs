use arxmap_ingest::parse_category_page;

const HOME: &str = include_str!("fixtures/arxiv_home.html");

#[test]
fn front_page_links_become_sorted_unique_codes() {
    let codes = parse_category_page(HOME).expect("parse");
    assert_eq!(codes, vec!["astro-ph.CO", "astro-ph.GA", "cs.AI", "cs.CV", "cs.LG"]);
}

#[test]
fn archive_shortcuts_and_other_links_are_ignored() {
    let html = r#"<p>
        <a href="/list/math/new">new</a>
        <a href="/list/math/recent"> recent </a>
        <a href="/archive/math">Mathematics</a>
        <a href="/list/math.CO/recent">Combinatorics</a>
    </p>"#;
    assert_eq!(parse_category_page(html).expect("parse"), vec!["math.CO"]);
}

#[test]
fn page_without_list_links_yields_nothing() {
    assert!(parse_category_page("<html><body>maintenance</body></html>").expect("parse").is_empty());
}
