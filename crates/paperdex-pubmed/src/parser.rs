//! PubMed efetch XML parser using quick-xml

use anyhow::{Context, Result};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// The subset of a `<PubmedArticle>` the canonical record needs
#[derive(Debug, Default)]
pub struct PubmedArticle {
    pub pmid: String,
    pub doi: Option<String>,
    pub pmc_id: Option<String>,
    /// `<ELocationID EIdType="doi">`, used when ArticleIdList has no DOI
    pub elocation_doi: Option<String>,

    pub title: Option<String>,
    pub abstract_text: Option<String>,
    pub journal_title: Option<String>,

    pub pub_year: Option<i32>,
    pub pub_month: Option<u32>,
    pub pub_day: Option<u32>,
    /// Free-form date such as `1998 Dec-1999 Jan`
    pub medline_date: Option<String>,

    pub authors: Vec<Author>,
    pub mesh_terms: Vec<String>,
    pub keywords: Vec<String>,
    pub publication_types: Vec<String>,
    pub reference_count: u32,
}

#[derive(Debug, Default, Clone)]
pub struct Author {
    pub last_name: Option<String>,
    pub fore_name: Option<String>,
    pub collective_name: Option<String>,
    pub affiliations: Vec<String>,
}

impl Author {
    /// "ForeName LastName", or the collective name for group authors
    pub fn display_name(&self) -> Option<String> {
        if let Some(name) = self.collective_name.as_deref().map(str::trim) {
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
        let parts: Vec<&str> = [self.fore_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

/// Parse an efetch `<PubmedArticleSet>` response.
///
/// Articles that fail to parse are logged and skipped.
pub fn parse_pubmed_xml(xml: &str) -> Result<Vec<PubmedArticle>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut articles = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.name().as_ref() == b"PubmedArticle" => {
                match parse_article(&mut reader) {
                    Ok(article) => articles.push(article),
                    Err(e) => log::debug!("Failed to parse article: {e}"),
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(e).context("XML parse error"),
            _ => {}
        }
        buf.clear();
    }

    Ok(articles)
}

fn parse_article(reader: &mut Reader<&[u8]>) -> Result<PubmedArticle> {
    let mut article = PubmedArticle::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"MedlineCitation" => parse_medline_citation(reader, &mut article)?,
                b"PubmedData" => parse_pubmed_data(reader, &mut article)?,
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"PubmedArticle" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(article)
}

fn parse_medline_citation(reader: &mut Reader<&[u8]>, article: &mut PubmedArticle) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                // The citation's own PMID precedes any linked ones
                b"PMID" if article.pmid.is_empty() => {
                    article.pmid = read_text(reader)?.trim().to_string()
                }
                b"CommentsCorrectionsList" => skip_element(reader, b"CommentsCorrectionsList")?,
                b"Article" => parse_article_element(reader, article)?,
                b"MeshHeadingList" => article.mesh_terms = parse_mesh_list(reader)?,
                b"KeywordList" => article
                    .keywords
                    .extend(parse_text_list(reader, b"Keyword", b"KeywordList")?),
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"MedlineCitation" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_article_element(reader: &mut Reader<&[u8]>, article: &mut PubmedArticle) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"Journal" => parse_journal(reader, article)?,
                b"ArticleTitle" => {
                    article.title = Some(read_text_content(reader, b"ArticleTitle")?)
                }
                b"Abstract" => article.abstract_text = Some(parse_abstract(reader)?),
                b"AuthorList" => article.authors = parse_author_list(reader)?,
                b"PublicationTypeList" => {
                    article.publication_types =
                        parse_text_list(reader, b"PublicationType", b"PublicationTypeList")?
                }
                b"ELocationID" => {
                    let is_doi = attr_value(&e, b"EIdType").as_deref() == Some("doi");
                    let value = read_text(reader)?;
                    if is_doi && article.elocation_doi.is_none() {
                        article.elocation_doi = Some(value.trim().to_string());
                    }
                }
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"Article" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_journal(reader: &mut Reader<&[u8]>, article: &mut PubmedArticle) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"Title" => article.journal_title = Some(read_text(reader)?),
                b"PubDate" => parse_pub_date(reader, article)?,
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"Journal" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_pub_date(reader: &mut Reader<&[u8]>, article: &mut PubmedArticle) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"Year" => article.pub_year = read_text(reader)?.trim().parse().ok(),
                b"Month" => article.pub_month = parse_month(&read_text(reader)?),
                b"Day" => article.pub_day = read_text(reader)?.trim().parse().ok(),
                b"MedlineDate" => article.medline_date = Some(read_text(reader)?),
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"PubDate" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

/// Numeric (`06`) or abbreviated/full English (`Jun`, `June`) month
pub fn parse_month(s: &str) -> Option<u32> {
    let s = s.trim();
    if let Ok(n) = s.parse::<u32>() {
        return (1..=12).contains(&n).then_some(n);
    }
    let prefix: String = s.chars().take(3).collect::<String>().to_lowercase();
    match prefix.as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}

/// Sections joined by a space; labeled sections become `LABEL: text`.
fn parse_abstract(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut buf = Vec::new();
    let mut sections = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"AbstractText" => {
                let label = attr_value(&e, b"Label").filter(|l| !l.trim().is_empty());
                let text = read_text_content(reader, b"AbstractText")?;
                let text = text.trim();
                if text.is_empty() {
                    continue;
                }
                sections.push(match label {
                    Some(label) => format!("{}: {text}", label.trim()),
                    None => text.to_string(),
                });
            }
            Event::End(e) if e.name().as_ref() == b"Abstract" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sections.join(" "))
}

fn parse_author_list(reader: &mut Reader<&[u8]>) -> Result<Vec<Author>> {
    let mut authors = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"Author" => {
                authors.push(parse_author(reader)?);
            }
            Event::End(e) if e.name().as_ref() == b"AuthorList" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(authors)
}

fn parse_author(reader: &mut Reader<&[u8]>) -> Result<Author> {
    let mut author = Author::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"LastName" => author.last_name = Some(read_text(reader)?),
                b"ForeName" => author.fore_name = Some(read_text(reader)?),
                b"CollectiveName" => author.collective_name = Some(read_text(reader)?),
                b"Affiliation" => author.affiliations.push(read_text(reader)?),
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"Author" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(author)
}

fn parse_mesh_list(reader: &mut Reader<&[u8]>) -> Result<Vec<String>> {
    let mut terms = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"DescriptorName" => {
                terms.push(read_text(reader)?);
            }
            Event::End(e) if e.name().as_ref() == b"MeshHeadingList" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(terms)
}

/// Text of every `item` element until `end`
fn parse_text_list(reader: &mut Reader<&[u8]>, item: &[u8], end: &[u8]) -> Result<Vec<String>> {
    let mut values = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == item => {
                values.push(read_text_content(reader, item)?);
            }
            Event::End(e) if e.name().as_ref() == end => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(values)
}

fn parse_pubmed_data(reader: &mut Reader<&[u8]>, article: &mut PubmedArticle) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.name().as_ref() {
                b"ArticleIdList" => parse_article_id_list(reader, article)?,
                b"ReferenceList" => article.reference_count += count_references(reader)?,
                _ => {}
            },
            Event::End(e) if e.name().as_ref() == b"PubmedData" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn parse_article_id_list(reader: &mut Reader<&[u8]>, article: &mut PubmedArticle) -> Result<()> {
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"ArticleId" => {
                let id_type = attr_value(&e, b"IdType").unwrap_or_default();
                let value = read_text(reader)?.trim().to_string();
                match id_type.as_str() {
                    "doi" => article.doi = Some(value),
                    "pmc" => article.pmc_id = Some(value),
                    _ => {}
                }
            }
            Event::End(e) if e.name().as_ref() == b"ArticleIdList" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn count_references(reader: &mut Reader<&[u8]>) -> Result<u32> {
    let mut count = 0;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.name().as_ref() == b"Reference" => {
                count += 1;
                skip_element(reader, b"Reference")?;
            }
            Event::End(e) if e.name().as_ref() == b"ReferenceList" => break,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(count)
}

fn skip_element(reader: &mut Reader<&[u8]>, end_tag: &[u8]) -> Result<()> {
    let mut buf = Vec::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(_) => depth += 1,
            Event::End(e) => {
                depth -= 1;
                if depth == 0 && e.name().as_ref() == end_tag {
                    break;
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(())
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

/// Read text content until next end tag
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::End(_) => break,
            Event::Start(_) => {
                // Inline markup like <i>, <sup>
                text.push_str(&read_text(reader)?);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

/// Text of a specific element, keeping text inside nested markup
fn read_text_content(reader: &mut Reader<&[u8]>, end_tag: &[u8]) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();
    let mut depth = 1;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => {
                if !text.is_empty() && !text.ends_with(' ') {
                    text.push(' ');
                }
                text.push_str(&e.unescape()?);
            }
            Event::Start(_) => depth += 1,
            Event::End(e) => {
                depth -= 1;
                if depth == 0 && e.name().as_ref() == end_tag {
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
