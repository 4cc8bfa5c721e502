//! arXiv Atom API client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use scraper::{Html, Selector};
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use arxmap_core::config::CatalogSettings;
use arxmap_core::error::{Error, Result};
use arxmap_core::traits::CatalogClient;
use arxmap_core::types::{CatalogEntry, SortCriterion};

const USER_AGENT: &str = concat!("arxmap/", env!("CARGO_PKG_VERSION"));

pub struct ArxivClient {
    client: reqwest::Client,
    base_url: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl ArxivClient {
    pub fn new(settings: &CatalogSettings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::External(format!("cannot build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: settings.base_url.clone(),
            min_interval: Duration::from_millis(settings.request_interval_ms),
            last_request: Mutex::new(None),
        })
    }

    /// Keep at least `min_interval` between consecutive requests.
    async fn rate_limit(&self) {
        let wait = {
            let last = self.last_request.lock().unwrap_or_else(|p| p.into_inner());
            last.and_then(|at| self.min_interval.checked_sub(at.elapsed()))
        };
        if let Some(wait) = wait {
            tokio::time::sleep(wait).await;
        }
        let mut last = self.last_request.lock().unwrap_or_else(|p| p.into_inner());
        *last = Some(Instant::now());
    }

    async fn get_bytes(&self, url: &str, query: &[(&str, String)]) -> Result<Vec<u8>> {
        self.rate_limit().await;
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::External(format!("request to {url} failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::External(format!("{url} returned status {status}")));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::External(format!("reading body of {url} failed: {e}")))?;
        Ok(body.to_vec())
    }

    /// Category codes linked from the catalog's front page.
    pub async fn fetch_categories(&self, page_url: &str) -> Result<Vec<String>> {
        let body = self.get_bytes(page_url, &[]).await?;
        let codes = parse_category_page(&String::from_utf8_lossy(&body))?;
        tracing::info!(url = page_url, categories = codes.len(), "discovered catalog categories");
        Ok(codes)
    }
}

#[async_trait]
impl CatalogClient for ArxivClient {
    async fn search(
        &self,
        category: &str,
        max_results: usize,
        sort: SortCriterion,
    ) -> Result<Vec<Result<CatalogEntry>>> {
        let query = [
            ("search_query", category.to_string()),
            ("start", "0".to_string()),
            ("max_results", max_results.to_string()),
            ("sortBy", sort.as_api_str().to_string()),
            ("sortOrder", "descending".to_string()),
        ];
        tracing::debug!(category, max_results, "arxiv search");
        let body = self.get_bytes(&self.base_url, &query).await?;
        let xml = String::from_utf8_lossy(&body);
        parse_atom_feed(&xml)
    }

    async fn download_pdf(&self, entry: &CatalogEntry) -> Result<Vec<u8>> {
        let url = entry
            .pdf_url
            .as_deref()
            .ok_or_else(|| Error::NotFound(format!("no pdf link for {}", entry.entry_id)))?;
        self.get_bytes(url, &[]).await
    }
}

/// `http://arxiv.org/abs/2101.00001v2` -> `2101.00001v2`,
/// `http://arxiv.org/abs/hep-th/9901001v1` -> `hep-th/9901001v1`.
pub fn short_id(entry_id: &str) -> String {
    match entry_id.split_once("/abs/") {
        Some((_, rest)) => rest.to_string(),
        None => entry_id.rsplit('/').next().unwrap_or(entry_id).to_string(),
    }
}

/// Codes from `<a href="/list/<code>/...">` links, deduplicated and sorted.
/// The per-archive `new` and `recent` shortcut links are skipped.
pub fn parse_category_page(html: &str) -> Result<Vec<String>> {
    let selector = Selector::parse(r#"a[href^="/list/"]"#)
        .map_err(|e| Error::External(format!("bad category selector: {e}")))?;
    let document = Html::parse_document(html);

    let mut codes = BTreeSet::new();
    for link in document.select(&selector) {
        let text = link.text().collect::<String>();
        if matches!(text.trim(), "new" | "recent") {
            continue;
        }
        let Some(href) = link.value().attr("href") else { continue };
        let code = href.trim_start_matches("/list/").split(['/', '?', '#']).next().unwrap_or_default();
        if !code.is_empty() {
            codes.insert(code.to_string());
        }
    }
    Ok(codes.into_iter().collect())
}

#[derive(Default)]
struct EntryAccum {
    id: String,
    title: String,
    summary: String,
    published: String,
    updated: String,
    comment: String,
    journal_ref: String,
    doi: String,
    primary_category: String,
    categories: Vec<String>,
    authors: Vec<String>,
    links: Vec<String>,
    pdf_url: Option<String>,
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: &str) -> Option<String> {
    let s = collapse_whitespace(s);
    (!s.is_empty()).then_some(s)
}

fn parse_timestamp(raw: &str, field: &str, id: &str) -> Result<Option<DateTime<Utc>>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| Some(t.with_timezone(&Utc)))
        .map_err(|e| Error::External(format!("entry {id}: bad {field} timestamp '{raw}': {e}")))
}

impl EntryAccum {
    fn push_text(&mut self, tag: &str, text: &str, in_author: bool) {
        let target = match tag {
            "id" => &mut self.id,
            "title" => &mut self.title,
            "summary" => &mut self.summary,
            "published" => &mut self.published,
            "updated" => &mut self.updated,
            "comment" => &mut self.comment,
            "journal_ref" => &mut self.journal_ref,
            "doi" => &mut self.doi,
            "name" if in_author => {
                match self.authors.last_mut() {
                    Some(last) => last.push_str(text),
                    None => self.authors.push(text.to_string()),
                }
                return;
            }
            _ => return,
        };
        target.push_str(text);
    }

    fn take_attrs(&mut self, local: &str, e: &BytesStart<'_>) {
        match local {
            "link" => {
                let href = attr(e, "href");
                if let Some(href) = href {
                    if attr(e, "title").as_deref() == Some("pdf") {
                        self.pdf_url = Some(href.clone());
                    }
                    self.links.push(href);
                }
            }
            "category" => {
                if let Some(term) = attr(e, "term") {
                    if !self.categories.contains(&term) {
                        self.categories.push(term);
                    }
                }
            }
            "primary_category" => {
                if let Some(term) = attr(e, "term") {
                    self.primary_category = term;
                }
            }
            _ => {}
        }
    }

    fn finish(self) -> Result<CatalogEntry> {
        let entry_id = self.id.trim().to_string();
        if entry_id.is_empty() {
            return Err(Error::External("feed entry without an id".into()));
        }
        if entry_id.contains("/api/errors") {
            return Err(Error::External(format!("catalog error: {}", collapse_whitespace(&self.summary))));
        }
        let title = collapse_whitespace(&self.title);
        if title.is_empty() {
            return Err(Error::External(format!("entry {entry_id} has no title")));
        }
        let published = parse_timestamp(&self.published, "published", &entry_id)?;
        let updated = parse_timestamp(&self.updated, "updated", &entry_id)?;
        let primary_category = if self.primary_category.is_empty() {
            self.categories.first().cloned().unwrap_or_default()
        } else {
            self.primary_category
        };
        Ok(CatalogEntry {
            short_id: short_id(&entry_id),
            entry_id,
            title,
            authors: self.authors.iter().map(|a| collapse_whitespace(a)).filter(|a| !a.is_empty()).collect(),
            summary: self.summary.trim().replace('\n', " "),
            published,
            updated,
            primary_category,
            categories: self.categories,
            links: self.links,
            pdf_url: self.pdf_url,
            comment: non_empty(&self.comment),
            journal_ref: non_empty(&self.journal_ref),
            doi: non_empty(&self.doi),
        })
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn attr(e: &BytesStart<'_>, key: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key.as_bytes())
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Atom feed state machine. Each `<entry>` becomes one item; an entry that
/// cannot be turned into a `CatalogEntry` is an `Err` item.
struct AtomParser {
    entries: Vec<Result<CatalogEntry>>,
    accum: Option<EntryAccum>,
    current_tag: String,
    in_author: bool,
}

impl AtomParser {
    fn new() -> Self {
        Self { entries: Vec::new(), accum: None, current_tag: String::new(), in_author: false }
    }

    fn handle_start(&mut self, e: &BytesStart<'_>) {
        let tag = local_name(e);
        if tag == "entry" {
            self.accum = Some(EntryAccum::default());
            return;
        }
        let Some(accum) = self.accum.as_mut() else { return };
        match tag.as_str() {
            "author" => {
                self.in_author = true;
                accum.authors.push(String::new());
            }
            "link" | "category" | "primary_category" => accum.take_attrs(&tag, e),
            _ => self.current_tag = tag,
        }
    }

    fn handle_empty(&mut self, e: &BytesStart<'_>) {
        if let Some(accum) = self.accum.as_mut() {
            accum.take_attrs(&local_name(e), e);
        }
    }

    fn handle_text(&mut self, text: &str) {
        if let Some(accum) = self.accum.as_mut() {
            accum.push_text(&self.current_tag, text, self.in_author);
        }
    }

    fn handle_end(&mut self, local: &[u8]) {
        match local {
            b"entry" => {
                if let Some(accum) = self.accum.take() {
                    self.entries.push(accum.finish());
                }
                self.current_tag.clear();
            }
            b"author" => self.in_author = false,
            _ => self.current_tag.clear(),
        }
    }
}

/// Parse an arXiv Atom response.
///
/// Fails as a whole only when the document is unreadable before any entry
/// starts; a syntax error inside an entry ends the feed with an `Err` item.
pub fn parse_atom_feed(xml: &str) -> Result<Vec<Result<CatalogEntry>>> {
    let mut reader = Reader::from_str(xml);
    let mut parser = AtomParser::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => parser.handle_start(e),
            Ok(Event::Empty(ref e)) => parser.handle_empty(e),
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map(|t| t.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(e.as_ref()).into_owned());
                parser.handle_text(&text);
            }
            Ok(Event::CData(ref e)) => parser.handle_text(&String::from_utf8_lossy(e.as_ref())),
            Ok(Event::End(ref e)) => parser.handle_end(e.local_name().as_ref()),
            Ok(Event::Eof) => break,
            Err(e) => {
                let position = reader.buffer_position();
                if parser.accum.is_none() && parser.entries.is_empty() {
                    return Err(Error::External(format!("unreadable catalog feed at byte {position}: {e}")));
                }
                parser.entries.push(Err(Error::External(format!("feed truncated at byte {position}: {e}"))));
                break;
            }
            _ => {}
        }
    }

    Ok(parser.entries)
}
