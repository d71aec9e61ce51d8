//! arXiv Atom feed parser using quick-xml

use anyhow::{Context, Result};
use chrono::Datelike;
use paperdex_core::ids::strip_version;
use paperdex_core::record::parse_iso_date;
use paperdex_core::{Author, Paper, Source, dedup_ordered, normalize_doi};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// One `<entry>` as it appears in the feed
#[derive(Debug, Default, Clone)]
pub struct FeedEntry {
    pub id_url: String,
    pub title: String,
    pub summary: String,
    pub published: Option<String>,
    pub authors: Vec<(String, Option<String>)>,
    pub categories: Vec<String>,
    pub primary_category: Option<String>,
    pub pdf_url: Option<String>,
    pub doi: Option<String>,
    pub journal_ref: Option<String>,
}

/// Parsed feed: entries plus `opensearch:totalResults`
#[derive(Debug, Default)]
pub struct Feed {
    pub total_results: u64,
    pub entries: Vec<FeedEntry>,
}

/// External id from an entry id URL: the segment after `/abs/`, version stripped.
pub fn entry_id(id_url: &str) -> Option<String> {
    let url = id_url.trim();
    let start = url.find("/abs/")? + "/abs/".len();
    let id = strip_version(url[start..].trim_matches('/'));
    (!id.is_empty()).then(|| id.to_string())
}

fn normalize_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl FeedEntry {
    /// Convert to a canonical paper; `None` when no id can be resolved.
    pub fn into_paper(self) -> Option<Paper> {
        let id = entry_id(&self.id_url)?;
        let published_date = self.published.as_deref().and_then(parse_iso_date);
        let year = published_date.map(|d| d.year()).or_else(|| {
            self.published
                .as_deref()
                .and_then(|p| p.get(..4)?.parse().ok())
        });
        let categories =
            dedup_ordered(self.primary_category.iter().cloned().chain(self.categories));
        let primary_category = categories.first().cloned();
        let pdf_url = self
            .pdf_url
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| format!("https://arxiv.org/pdf/{id}"));

        Some(Paper {
            title: normalize_ws(&self.title),
            abstract_text: normalize_ws(&self.summary),
            authors: self
                .authors
                .into_iter()
                .filter(|(name, _)| !name.trim().is_empty())
                .map(|(name, aff)| Author::new(normalize_ws(&name)).with_affiliation(aff))
                .collect(),
            published_date,
            year,
            pdf_url: Some(pdf_url),
            primary_category,
            categories,
            doi: self.doi.as_deref().and_then(normalize_doi),
            journal: self
                .journal_ref
                .map(|j| normalize_ws(&j))
                .filter(|j| !j.is_empty()),
            is_open_access: true,
            url: format!("https://arxiv.org/abs/{id}"),
            ..Paper::new(Source::Arxiv, id, String::new())
        })
    }
}

/// Parse a complete Atom response.
pub fn parse_feed(xml: &str) -> Result<Feed> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut feed = Feed::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"entry" => feed.entries.push(parse_entry(&mut reader)?),
                b"opensearch:totalResults" => {
                    feed.total_results = read_text(&mut reader)?.trim().parse().unwrap_or(0)
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e).context("Atom parse error"),
            _ => {}
        }
        buf.clear();
    }

    Ok(feed)
}

fn parse_entry(reader: &mut Reader<&[u8]>) -> Result<FeedEntry> {
    let mut entry = FeedEntry::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"id" => entry.id_url = read_text(reader)?,
                b"title" => entry.title = read_text(reader)?,
                b"summary" => entry.summary = read_text(reader)?,
                b"published" => entry.published = Some(read_text(reader)?),
                b"author" => entry.authors.push(parse_author(reader)?),
                b"arxiv:doi" => entry.doi = Some(read_text(reader)?),
                b"arxiv:journal_ref" => entry.journal_ref = Some(read_text(reader)?),
                b"link" | b"category" | b"arxiv:primary_category" => {
                    apply_attrs(&e, &mut entry);
                }
                _ => {}
            },
            Event::Empty(e) => apply_attrs(&e, &mut entry),
            Event::End(e) if e.name().as_ref() == b"entry" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(entry)
}

/// Attribute-only elements: links, categories, primary category.
fn apply_attrs(e: &BytesStart<'_>, entry: &mut FeedEntry) {
    match e.name().as_ref() {
        b"link" => {
            let (mut href, mut title, mut mime) = (None, None, None);
            for attr in e.attributes().flatten() {
                let value = attr.unescape_value().map(|v| v.into_owned()).ok();
                match attr.key.as_ref() {
                    b"href" => href = value,
                    b"title" => title = value,
                    b"type" => mime = value,
                    _ => {}
                }
            }
            let is_pdf =
                title.as_deref() == Some("pdf") || mime.as_deref() == Some("application/pdf");
            if is_pdf && entry.pdf_url.is_none() {
                entry.pdf_url = href;
            }
        }
        b"category" => {
            if let Some(term) = term_attr(e) {
                entry.categories.push(term);
            }
        }
        b"arxiv:primary_category" => entry.primary_category = term_attr(e),
        _ => {}
    }
}

fn term_attr(e: &BytesStart<'_>) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"term")
        .and_then(|a| a.unescape_value().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Returns (name, affiliation)
fn parse_author(reader: &mut Reader<&[u8]>) -> Result<(String, Option<String>)> {
    let mut name = String::new();
    let mut affiliation = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"name" => name = read_text(reader)?,
                b"arxiv:affiliation" => affiliation = Some(read_text(reader)?),
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"author" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((name, affiliation))
}

/// Read text content until the matching end tag
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::Start(_) => depth += 1,
            Event::End(_) => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}
