//! OpenAlex work JSON → canonical [`Paper`]

use chrono::Datelike;
use paperdex_core::{
    Author, Identity, Paper, Source, dedup_ordered, normalize_doi, parse_iso_date,
    resolve_arxiv_id,
};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

use crate::abstract_decode::decode_inverted_index;

/// Absent and `null` both become `T::default()`
fn null_as_default<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}

/// One element of `results` in a `/works` page
#[derive(Debug, Default, Deserialize)]
pub struct WorkRow {
    /// Full id URL, e.g. `https://openalex.org/W2741809807`
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default)]
    pub doi: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub publication_year: Option<i32>,
    #[serde(rename = "type", default)]
    pub work_type: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cited_by_count: i64,
    #[serde(default)]
    pub referenced_works_count: Option<i64>,
    #[serde(default)]
    pub open_access: Option<OpenAccess>,
    #[serde(default)]
    pub abstract_inverted_index: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authorships: Vec<Authorship>,
    #[serde(default)]
    pub primary_location: Option<Location>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locations: Vec<Location>,
    #[serde(default)]
    pub best_oa_location: Option<Location>,
    #[serde(default)]
    pub primary_topic: Option<Topic>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub topics: Vec<Topic>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OpenAccess {
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_oa: bool,
    #[serde(default)]
    pub oa_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Authorship {
    #[serde(default)]
    pub author: Option<AuthorRef>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub institutions: Vec<Named>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub raw_affiliation_strings: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AuthorRef {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Named {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub landing_page_url: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub source: Option<Named>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Topic {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub field: Option<Named>,
}

impl WorkRow {
    /// `W2741809807` from the full id URL
    pub fn short_id(&self) -> &str {
        self.id
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.id)
    }

    /// Every URL a location exposes: primary location, then all locations,
    /// then the best open-access location, landing page before PDF.
    pub fn location_urls(&self) -> Vec<&str> {
        self.primary_location
            .iter()
            .chain(self.locations.iter())
            .chain(self.best_oa_location.iter())
            .flat_map(|loc| [loc.landing_page_url.as_deref(), loc.pdf_url.as_deref()])
            .flatten()
            .filter(|url| !url.is_empty())
            .collect()
    }

    pub fn arxiv_id(&self) -> Option<String> {
        resolve_arxiv_id(&self.location_urls(), self.doi.as_deref())
    }

    pub fn identity(&self) -> Option<Identity> {
        let native = Some(self.short_id().to_string()).filter(|id| id.starts_with('W'));
        Identity::resolve(self.arxiv_id(), native.map(|id| (Source::OpenAlex, id)))
    }

    pub fn abstract_text(&self) -> String {
        self.abstract_inverted_index
            .as_ref()
            .map(decode_inverted_index)
            .unwrap_or_default()
    }

    fn title_text(&self) -> String {
        self.title
            .as_deref()
            .or(self.display_name.as_deref())
            .map(clean_text)
            .unwrap_or_default()
    }

    fn authors(&self) -> Vec<Author> {
        self.authorships
            .iter()
            .filter_map(|a| {
                let name = a.author.as_ref()?.display_name.as_deref()?.trim();
                if name.is_empty() {
                    return None;
                }
                let affiliation = a
                    .institutions
                    .iter()
                    .find_map(|i| i.display_name.clone())
                    .or_else(|| a.raw_affiliation_strings.first().cloned());
                Some(Author::new(name).with_affiliation(affiliation))
            })
            .collect()
    }

    fn categories(&self) -> Vec<String> {
        dedup_ordered(
            self.primary_topic
                .iter()
                .chain(self.topics.iter())
                .flat_map(|t| {
                    [
                        t.display_name.clone(),
                        t.field.as_ref().and_then(|f| f.display_name.clone()),
                    ]
                })
                .flatten(),
        )
    }

    fn pdf_url(&self) -> Option<String> {
        self.best_oa_location
            .iter()
            .chain(self.primary_location.iter())
            .find_map(|loc| loc.pdf_url.clone())
            .filter(|u| !u.is_empty())
    }

    fn journal(&self) -> Option<String> {
        self.primary_location
            .as_ref()
            .and_then(|loc| loc.source.as_ref())
            .and_then(|s| s.display_name.clone())
            .filter(|s| !s.trim().is_empty())
    }
}

fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp_count(n: i64) -> u32 {
    n.clamp(0, u32::MAX as i64) as u32
}

/// Convert one work.
///
/// Works without an arXiv id are dropped unless `all_works` is set, in which
/// case they keep their OpenAlex id.
pub fn work_to_paper(row: WorkRow, all_works: bool) -> Option<Paper> {
    let identity = row.identity()?;
    if identity.source != Source::Arxiv && !all_works {
        return None;
    }

    let published_date = row.publication_date.as_deref().and_then(parse_iso_date);
    let year = row
        .publication_year
        .or_else(|| published_date.map(|d| d.year()));
    let categories = row.categories();
    let (pdf_url, url) = match identity.source {
        Source::Arxiv => (
            Some(format!("https://arxiv.org/pdf/{}", identity.external_id)),
            format!("https://arxiv.org/abs/{}", identity.external_id),
        ),
        _ => (row.pdf_url(), row.id.clone()),
    };

    Some(Paper {
        abstract_text: row.abstract_text(),
        authors: row.authors(),
        published_date,
        year,
        pdf_url,
        primary_category: categories.first().cloned(),
        doi: row.doi.as_deref().and_then(normalize_doi),
        journal: row.journal(),
        citation_count: clamp_count(row.cited_by_count),
        reference_count: clamp_count(row.referenced_works_count.unwrap_or(0)),
        is_open_access: row.open_access.as_ref().is_some_and(|oa| oa.is_oa),
        publication_types: row.work_type.iter().cloned().collect(),
        url,
        categories,
        ..Paper::new(identity.source, identity.external_id, row.title_text())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WORK: &str = r#"{
        "id": "https://openalex.org/W2963403868",
        "doi": "https://doi.org/10.48550/arxiv.1706.03762",
        "title": "Attention Is All\n  You Need",
        "display_name": "Attention Is All You Need",
        "publication_date": "2017-06-12",
        "publication_year": 2017,
        "type": "preprint",
        "cited_by_count": 61234,
        "referenced_works_count": 40,
        "open_access": {"is_oa": true, "oa_url": "https://arxiv.org/pdf/1706.03762"},
        "abstract_inverted_index": {"The": [0], "dominant": [1], "models": [2]},
        "authorships": [
            {"author": {"display_name": "Ashish Vaswani"},
             "institutions": [{"display_name": "Google"}]},
            {"author": {"display_name": "Noam Shazeer"}, "institutions": [],
             "raw_affiliation_strings": ["Google Brain"]},
            {"author": null, "institutions": null}
        ],
        "primary_location": {
            "landing_page_url": "https://arxiv.org/abs/1706.03762v7",
            "pdf_url": null,
            "source": {"display_name": "arXiv (Cornell University)"}
        },
        "locations": null,
        "best_oa_location": null,
        "primary_topic": {"display_name": "Natural Language Processing Techniques",
                          "field": {"display_name": "Computer Science"}},
        "topics": [{"display_name": "Natural Language Processing Techniques"},
                   {"display_name": "Topic Modeling"}]
    }"#;

    fn row(json: &str) -> WorkRow {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn arxiv_work_converts() {
        let paper = work_to_paper(row(WORK), false).unwrap();
        assert_eq!(paper.source, Source::Arxiv);
        assert_eq!(paper.external_id, "1706.03762");
        assert_eq!(paper.title, "Attention Is All You Need");
        assert_eq!(paper.abstract_text, "The dominant models");
        assert_eq!(paper.year, Some(2017));
        assert_eq!(paper.doi.as_deref(), Some("10.48550/arxiv.1706.03762"));
        assert_eq!(paper.citation_count, 61234);
        assert_eq!(paper.reference_count, 40);
        assert!(paper.is_open_access);
        assert_eq!(paper.pdf_url.as_deref(), Some("https://arxiv.org/pdf/1706.03762"));
        assert_eq!(paper.url, "https://arxiv.org/abs/1706.03762");
        assert_eq!(paper.publication_types, ["preprint"]);
        assert_eq!(paper.journal.as_deref(), Some("arXiv (Cornell University)"));
        assert_eq!(
            paper.categories,
            [
                "Natural Language Processing Techniques",
                "Computer Science",
                "Topic Modeling"
            ]
        );
        assert_eq!(
            paper.primary_category.as_deref(),
            Some("Natural Language Processing Techniques")
        );
    }

    #[test]
    fn authors_take_institution_then_raw_affiliation() {
        let paper = work_to_paper(row(WORK), false).unwrap();
        assert_eq!(paper.authors.len(), 2);
        assert_eq!(paper.authors[0].affiliation.as_deref(), Some("Google"));
        assert_eq!(paper.authors[1].affiliation.as_deref(), Some("Google Brain"));
    }

    #[test]
    fn arxiv_id_from_doi_only() {
        let work = row(r#"{
            "id": "https://openalex.org/W1",
            "doi": "https://doi.org/10.48550/arXiv.1810.04805",
            "title": "BERT"
        }"#);
        assert_eq!(work.arxiv_id().as_deref(), Some("1810.04805"));
    }

    #[test]
    fn pdf_location_beats_doi_suffix() {
        let work = row(r#"{
            "id": "https://openalex.org/W1",
            "doi": "https://doi.org/10.48550/arxiv.1111.11111",
            "title": "t",
            "locations": [{"landing_page_url": "https://example.org/x",
                           "pdf_url": "https://arxiv.org/pdf/2005.14165v4"}]
        }"#);
        assert_eq!(work.arxiv_id().as_deref(), Some("2005.14165"));
    }

    #[test]
    fn old_style_id_in_location() {
        let work = row(r#"{
            "id": "https://openalex.org/W1",
            "title": "t",
            "best_oa_location": {"landing_page_url": "http://export.arxiv.org/abs/hep-ph/9901234v2"}
        }"#);
        assert_eq!(work.arxiv_id().as_deref(), Some("hep-ph/9901234"));
    }

    #[test]
    fn non_arxiv_work_dropped_by_default() {
        let json = r#"{
            "id": "https://openalex.org/W42",
            "doi": "https://doi.org/10.1038/nature14539",
            "title": "Deep learning",
            "primary_location": {"landing_page_url": "https://www.nature.com/articles/nature14539",
                                 "pdf_url": "https://www.nature.com/articles/nature14539.pdf"}
        }"#;
        assert!(work_to_paper(row(json), false).is_none());

        let paper = work_to_paper(row(json), true).unwrap();
        assert_eq!(paper.source, Source::OpenAlex);
        assert_eq!(paper.external_id, "W42");
        assert_eq!(paper.doi.as_deref(), Some("10.1038/nature14539"));
        assert_eq!(
            paper.pdf_url.as_deref(),
            Some("https://www.nature.com/articles/nature14539.pdf")
        );
        assert_eq!(paper.url, "https://openalex.org/W42");
    }

    #[test]
    fn missing_id_and_arxiv_is_dropped() {
        assert!(work_to_paper(row(r#"{"title": "orphan"}"#), true).is_none());
    }

    #[test]
    fn year_falls_back_to_date() {
        let json = r#"{
            "id": "https://openalex.org/W7",
            "title": "t",
            "publication_date": "2021-03-04",
            "publication_year": null
        }"#;
        let paper = work_to_paper(row(json), true).unwrap();
        assert_eq!(paper.year, Some(2021));
    }

    #[test]
    fn display_name_when_title_null() {
        let json = r#"{"id": "https://openalex.org/W8", "title": null, "display_name": "Shown"}"#;
        assert_eq!(work_to_paper(row(json), true).unwrap().title, "Shown");
    }
}
