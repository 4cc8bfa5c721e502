use arxmap_core::Error;
use arxmap_ingest::parse_atom_feed;

const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:arxiv="http://arxiv.org/schemas/atom">
  <title type="html">ArXiv Query: search_query=cs.CV</title>
  <id>http://arxiv.org/api/abcdef</id>
  <entry>
    <id>http://arxiv.org/abs/1706.03762v7</id>
    <updated>2023-08-02T00:41:18Z</updated>
    <published>2017-06-12T17:57:34Z</published>
    <title>Attention Is All
      You Need</title>
    <summary>  The dominant sequence transduction models are based on complex
recurrent or convolutional neural networks &amp; more.</summary>
    <author><name>Ashish Vaswani</name></author>
    <author><name>Noam Shazeer</name></author>
    <arxiv:comment xmlns:arxiv="http://arxiv.org/schemas/atom">15 pages, 5 figures</arxiv:comment>
    <arxiv:journal_ref xmlns:arxiv="http://arxiv.org/schemas/atom">NeurIPS 2017</arxiv:journal_ref>
    <link href="http://arxiv.org/abs/1706.03762v7" rel="alternate" type="text/html"/>
    <link title="pdf" href="http://arxiv.org/pdf/1706.03762v7" rel="related" type="application/pdf"/>
    <arxiv:primary_category xmlns:arxiv="http://arxiv.org/schemas/atom" term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.LG" scheme="http://arxiv.org/schemas/atom"/>
    <category term="cs.CL" scheme="http://arxiv.org/schemas/atom"/>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2301.12345v1</id>
    <published>not-a-date</published>
    <title>Broken timestamp</title>
    <summary>x</summary>
  </entry>
  <entry>
    <id>http://arxiv.org/abs/2301.54321v2</id>
    <published>2023-01-15T00:00:00Z</published>
    <updated>2023-01-16T00:00:00Z</updated>
    <title>A Simple Paper</title>
    <summary>A summary.</summary>
    <author><name>John Doe</name></author>
    <category term="cs.AI"/>
  </entry>
</feed>"#;

#[test]
fn parses_entries_with_all_fields() {
    let items = parse_atom_feed(FEED).expect("feed");
    assert_eq!(items.len(), 3);

    let first = items[0].as_ref().expect("first entry");
    assert_eq!(first.entry_id, "http://arxiv.org/abs/1706.03762v7");
    assert_eq!(first.short_id, "1706.03762v7");
    assert_eq!(first.title, "Attention Is All You Need");
    assert_eq!(first.authors, vec!["Ashish Vaswani".to_string(), "Noam Shazeer".to_string()]);
    assert!(first.summary.starts_with("The dominant"));
    assert!(first.summary.ends_with("& more."));
    assert_eq!(first.primary_category, "cs.CL");
    assert_eq!(first.categories, vec!["cs.CL".to_string(), "cs.LG".to_string()]);
    assert_eq!(first.links.len(), 2);
    assert_eq!(first.pdf_url.as_deref(), Some("http://arxiv.org/pdf/1706.03762v7"));
    assert_eq!(first.comment.as_deref(), Some("15 pages, 5 figures"));
    assert_eq!(first.journal_ref.as_deref(), Some("NeurIPS 2017"));
    assert!(first.doi.is_none());
    assert_eq!(first.published.map(|p| p.to_rfc3339()), Some("2017-06-12T17:57:34+00:00".to_string()));
}

#[test]
fn malformed_entry_is_an_err_item() {
    let items = parse_atom_feed(FEED).expect("feed");
    assert!(matches!(items[1], Err(Error::External(_))));

    let third = items[2].as_ref().expect("third entry");
    assert_eq!(third.primary_category, "cs.AI", "falls back to first category");
    assert!(third.pdf_url.is_none());
}

#[test]
fn api_error_entry_is_reported() {
    let feed = r#"<feed xmlns="http://www.w3.org/2005/Atom">
      <entry>
        <id>http://arxiv.org/api/errors#incorrect_id_format_for_1234</id>
        <title>Error</title>
        <summary>incorrect id format for 1234</summary>
      </entry>
    </feed>"#;
    let items = parse_atom_feed(feed).expect("feed");
    assert_eq!(items.len(), 1);
    assert!(matches!(&items[0], Err(Error::External(msg)) if msg.contains("incorrect id format")));
}

#[test]
fn empty_feed_has_no_items() {
    let items = parse_atom_feed(r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>q</title></feed>"#).unwrap();
    assert!(items.is_empty());
}
