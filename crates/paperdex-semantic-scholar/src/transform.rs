//! S2 JSON rows -> canonical Paper
//!
//! Two shapes arrive from S2: the lowercase bulk dataset rows and the
//! camelCase Graph API objects. Both carry an `externalIds` map whose values
//! may be strings, numbers or null depending on the key.

use chrono::Datelike;
use paperdex_core::{
    Author, Identity, Paper, Source, dedup_ordered, normalize_arxiv_id, normalize_doi,
    parse_iso_date, resolve_arxiv_id,
};
use rustc_hash::FxHashMap;
use serde::de::IgnoredAny;
use serde::{Deserialize, Deserializer};

// === Null-handling deserializers ===

/// Deserialize null as empty string
fn null_to_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(|opt| opt.unwrap_or_default())
}

/// Deserialize null as empty Vec
fn null_to_empty_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(|opt| opt.unwrap_or_default())
}

/// Deserialize null as 0 for counters
fn null_to_zero<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i64>::deserialize(deserializer)
        .map(|opt| opt.unwrap_or_default().clamp(0, u32::MAX as i64) as u32)
}

// === External ids ===

/// One value of the `externalIds` map.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ExternalIdValue {
    Text(String),
    Integer(i64),
    Float(f64),
    Null,
    /// Arrays or objects; kept so one odd key does not reject the row
    Other(IgnoredAny),
}

impl ExternalIdValue {
    /// String form of scalar values; blank strings count as absent.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Self::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Self::Integer(n) => Some(n.to_string()),
            Self::Float(f) if f.fract() == 0.0 => Some(format!("{f:.0}")),
            _ => None,
        }
    }
}

/// `externalIds` keyed by upstream name (`ArXiv`, `DOI`, `PubMed`, `CorpusId`...).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct ExternalIds(pub FxHashMap<String, ExternalIdValue>);

impl ExternalIds {
    pub fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).and_then(ExternalIdValue::as_text)
    }

    /// Normalized arXiv id, version stripped
    pub fn arxiv(&self) -> Option<String> {
        self.get("ArXiv").and_then(|raw| normalize_arxiv_id(&raw))
    }

    pub fn doi(&self) -> Option<String> {
        self.get("DOI").and_then(|raw| normalize_doi(&raw))
    }

    pub fn pubmed(&self) -> Option<String> {
        self.get("PubMed")
    }

    pub fn corpus_id(&self) -> Option<String> {
        self.get("CorpusId")
    }
}

/// `ExternalIds` that tolerates a null map
fn null_to_default_ids<'de, D>(deserializer: D) -> Result<ExternalIds, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<ExternalIds>::deserialize(deserializer).map(|opt| opt.unwrap_or_default())
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorEntry {
    #[serde(rename = "authorId", default)]
    pub author_id: Option<String>,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldEntry {
    #[serde(default, deserialize_with = "null_to_empty")]
    pub category: String,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub source: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JournalEntry {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenAccessPdf {
    #[serde(default)]
    pub url: Option<String>,
}

// === Bulk dataset row ===

/// One line of the `papers` dataset
#[derive(Debug, Clone, Deserialize)]
pub struct PaperRow {
    #[serde(default)]
    pub corpusid: Option<i64>,
    #[serde(default, deserialize_with = "null_to_default_ids")]
    pub externalids: ExternalIds,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub venue: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "null_to_zero")]
    pub referencecount: u32,
    #[serde(default, deserialize_with = "null_to_zero")]
    pub citationcount: u32,
    #[serde(default, deserialize_with = "null_to_zero")]
    pub influentialcitationcount: u32,
    #[serde(default)]
    pub isopenaccess: Option<bool>,
    #[serde(default)]
    pub publicationdate: Option<String>,
    #[serde(default, deserialize_with = "null_to_empty_vec")]
    pub publicationtypes: Vec<Option<String>>,
    #[serde(default, deserialize_with = "null_to_empty_vec")]
    pub authors: Vec<AuthorEntry>,
    #[serde(default, deserialize_with = "null_to_empty_vec")]
    pub s2fieldsofstudy: Vec<FieldEntry>,
    #[serde(default)]
    pub journal: Option<JournalEntry>,
}

impl PaperRow {
    pub fn has_title(&self) -> bool {
        !self.title.trim().is_empty()
    }

    /// arXiv id from `externalids`, then from the row URL/DOI
    pub fn arxiv_id(&self) -> Option<String> {
        self.externalids.arxiv().or_else(|| {
            let urls: Vec<&str> = [self.url.as_str()]
                .into_iter()
                .filter(|u| !u.is_empty())
                .collect();
            resolve_arxiv_id(&urls, self.externalids.doi().as_deref())
        })
    }

    /// Inclusion predicate for bulk imports.
    pub fn is_wanted(&self, arxiv_only: bool) -> bool {
        self.has_title() && (!arxiv_only || self.arxiv_id().is_some())
    }

    pub fn into_paper(self) -> Option<Paper> {
        let corpus_id = self
            .corpusid
            .map(|id| id.to_string())
            .or_else(|| self.externalids.corpus_id());
        let identity = Identity::resolve(
            self.arxiv_id(),
            corpus_id.map(|id| (Source::SemanticScholar, id)),
        )?;

        let doi = self.externalids.doi();
        let categories = dedup_ordered(self.s2fieldsofstudy.into_iter().map(|f| f.category));
        let journal = self
            .journal
            .and_then(|j| j.name)
            .or(Some(self.venue))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let published_date = self.publicationdate.as_deref().and_then(parse_iso_date);
        let pdf_url = constructed_pdf_url(&identity);

        Some(Paper {
            authors: convert_authors(self.authors),
            year: self.year.or_else(|| published_date.map(|d| d.year())),
            published_date,
            pdf_url,
            primary_category: categories.first().cloned(),
            categories,
            doi,
            journal,
            citation_count: self.citationcount,
            reference_count: self.referencecount,
            influential_citation_count: self.influentialcitationcount,
            is_open_access: self.isopenaccess.unwrap_or(false),
            publication_types: dedup_ordered(self.publicationtypes.into_iter().flatten()),
            url: self.url,
            ..Paper::new(identity.source, identity.external_id, self.title.trim())
        })
    }
}

// === Graph API paper ===

/// Graph API `fields` requested for search and lookup
pub const GRAPH_FIELDS: &str = "paperId,corpusId,externalIds,url,title,abstract,venue,year,\
referenceCount,citationCount,influentialCitationCount,isOpenAccess,openAccessPdf,\
s2FieldsOfStudy,publicationTypes,publicationDate,journal,authors";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphPaper {
    #[serde(default)]
    pub paper_id: Option<String>,
    #[serde(default)]
    pub corpus_id: Option<i64>,
    #[serde(default, deserialize_with = "null_to_default_ids")]
    pub external_ids: ExternalIds,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub title: String,
    #[serde(rename = "abstract", default, deserialize_with = "null_to_empty")]
    pub abstract_text: String,
    #[serde(default, deserialize_with = "null_to_empty")]
    pub venue: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "null_to_zero")]
    pub reference_count: u32,
    #[serde(default, deserialize_with = "null_to_zero")]
    pub citation_count: u32,
    #[serde(default, deserialize_with = "null_to_zero")]
    pub influential_citation_count: u32,
    #[serde(default)]
    pub is_open_access: Option<bool>,
    #[serde(default)]
    pub open_access_pdf: Option<OpenAccessPdf>,
    #[serde(rename = "s2FieldsOfStudy", default, deserialize_with = "null_to_empty_vec")]
    pub s2_fields_of_study: Vec<FieldEntry>,
    #[serde(default, deserialize_with = "null_to_empty_vec")]
    pub publication_types: Vec<Option<String>>,
    #[serde(default)]
    pub publication_date: Option<String>,
    #[serde(default)]
    pub journal: Option<JournalEntry>,
    #[serde(default, deserialize_with = "null_to_empty_vec")]
    pub authors: Vec<AuthorEntry>,
}

impl GraphPaper {
    /// arXiv id > DOI; papers with neither are dropped.
    pub fn identity(&self) -> Option<Identity> {
        Identity::resolve(
            self.external_ids.arxiv(),
            self.external_ids
                .doi()
                .map(|doi| (Source::SemanticScholar, doi)),
        )
    }

    pub fn into_paper(self) -> Option<Paper> {
        let identity = self.identity()?;

        let explicit_pdf = self
            .open_access_pdf
            .and_then(|p| p.url)
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        let pdf_url = explicit_pdf.or_else(|| constructed_pdf_url(&identity));

        let categories =
            dedup_ordered(self.s2_fields_of_study.into_iter().map(|f| f.category));
        let journal = self
            .journal
            .and_then(|j| j.name)
            .or(Some(self.venue))
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        let published_date = self.publication_date.as_deref().and_then(parse_iso_date);
        let url = if self.url.is_empty() {
            self.paper_id
                .as_deref()
                .map(|id| format!("https://www.semanticscholar.org/paper/{id}"))
                .unwrap_or_default()
        } else {
            self.url
        };

        Some(Paper {
            abstract_text: self.abstract_text.trim().to_string(),
            authors: convert_authors(self.authors),
            year: self.year.or_else(|| published_date.map(|d| d.year())),
            published_date,
            pdf_url,
            primary_category: categories.first().cloned(),
            categories,
            doi: self.external_ids.doi(),
            journal,
            citation_count: self.citation_count,
            reference_count: self.reference_count,
            influential_citation_count: self.influential_citation_count,
            is_open_access: self.is_open_access.unwrap_or(false),
            publication_types: dedup_ordered(self.publication_types.into_iter().flatten()),
            url,
            ..Paper::new(identity.source, identity.external_id, self.title.trim())
        })
    }
}

fn convert_authors(authors: Vec<AuthorEntry>) -> Vec<Author> {
    authors
        .into_iter()
        .map(|a| a.name.trim().to_string())
        .filter(|name| !name.is_empty())
        .map(Author::new)
        .collect()
}

fn constructed_pdf_url(identity: &Identity) -> Option<String> {
    (identity.source == Source::Arxiv)
        .then(|| format!("https://arxiv.org/pdf/{}", identity.external_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(json: &str) -> PaperRow {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn external_ids_accept_mixed_value_types() {
        let ids: ExternalIds = serde_json::from_str(
            r#"{"ArXiv":"1706.03762v5","DOI":"10.48550/arXiv.1706.03762","CorpusId":13756489,"MAG":null,"DBLP":["x"]}"#,
        )
        .unwrap();
        assert_eq!(ids.arxiv().as_deref(), Some("1706.03762"));
        assert_eq!(ids.doi().as_deref(), Some("10.48550/arxiv.1706.03762"));
        assert_eq!(ids.corpus_id().as_deref(), Some("13756489"));
        assert_eq!(ids.get("MAG"), None);
        assert_eq!(ids.get("DBLP"), None);
        assert_eq!(ids.pubmed(), None);
    }

    #[test]
    fn blank_arxiv_value_is_absent() {
        let ids: ExternalIds = serde_json::from_str(r#"{"ArXiv":"  "}"#).unwrap();
        assert_eq!(ids.arxiv(), None);
    }

    #[test]
    fn bulk_row_with_arxiv_id() {
        let r = row(
            r#"{"corpusid":13756489,"externalids":{"ArXiv":"1706.03762"},"title":"Attention Is All You Need",
            "authors":[{"authorId":"1","name":"Ashish Vaswani"},{"authorId":null,"name":null}],
            "year":2017,"citationcount":100000,"referencecount":40,"influentialcitationcount":9000,
            "isopenaccess":null,"publicationdate":"2017-06-12","publicationtypes":["JournalArticle",null],
            "s2fieldsofstudy":[{"category":"Computer Science","source":"external"},{"category":"Computer Science","source":"s2-fos-model"}],
            "journal":{"name":"ArXiv"},"venue":"NeurIPS","url":"https://www.semanticscholar.org/paper/204e"}"#,
        );
        assert!(r.is_wanted(true));
        let p = r.into_paper().unwrap();
        assert_eq!(p.source, Source::Arxiv);
        assert_eq!(p.external_id, "1706.03762");
        assert_eq!(p.authors.len(), 1);
        assert_eq!(p.categories, ["Computer Science"]);
        assert_eq!(p.primary_category.as_deref(), Some("Computer Science"));
        assert_eq!(p.journal.as_deref(), Some("ArXiv"));
        assert_eq!(p.pdf_url.as_deref(), Some("https://arxiv.org/pdf/1706.03762"));
        assert_eq!(p.citation_count, 100000);
        assert_eq!(p.publication_types, ["JournalArticle"]);
        assert!(!p.is_open_access);
    }

    #[test]
    fn bulk_row_falls_back_to_corpus_id() {
        let r = row(r#"{"corpusid":42,"externalids":{"DOI":"10.1/x"},"title":"T","venue":"V"}"#);
        assert!(!r.is_wanted(true));
        assert!(r.is_wanted(false));
        let p = r.into_paper().unwrap();
        assert_eq!(p.source, Source::SemanticScholar);
        assert_eq!(p.external_id, "42");
        assert_eq!(p.journal.as_deref(), Some("V"));
        assert_eq!(p.pdf_url, None);
    }

    #[test]
    fn bulk_row_arxiv_from_doi_suffix() {
        let r = row(r#"{"externalids":{"DOI":"10.48550/arXiv.hep-ph/9901234"},"title":"Old"}"#);
        assert_eq!(r.arxiv_id().as_deref(), Some("hep-ph/9901234"));
    }

    #[test]
    fn bulk_row_null_collections() {
        let r = row(r#"{"title":"T","externalids":null,"authors":null,"s2fieldsofstudy":null}"#);
        assert!(r.authors.is_empty());
        assert!(r.into_paper().is_none());
    }

    #[test]
    fn untitled_row_not_wanted() {
        let r = row(r#"{"title":"","externalids":{"ArXiv":"1810.04805"}}"#);
        assert!(!r.is_wanted(true));
        assert!(!r.is_wanted(false));
    }

    #[test]
    fn graph_paper_prefers_explicit_pdf() {
        let g: GraphPaper = serde_json::from_str(
            r#"{"paperId":"df2b","externalIds":{"ArXiv":"1810.04805","DOI":"10.18653/v1/N19-1423"},
            "title":"BERT","abstract":"  We introduce BERT. ","openAccessPdf":{"url":"https://aclanthology.org/N19-1423.pdf"},
            "isOpenAccess":true,"citationCount":80000,"publicationDate":"2018-10-11"}"#,
        )
        .unwrap();
        let p = g.into_paper().unwrap();
        assert_eq!(p.source, Source::Arxiv);
        assert_eq!(p.external_id, "1810.04805");
        assert_eq!(p.pdf_url.as_deref(), Some("https://aclanthology.org/N19-1423.pdf"));
        assert_eq!(p.abstract_text, "We introduce BERT.");
        assert_eq!(p.year, Some(2018));
        assert_eq!(p.url, "https://www.semanticscholar.org/paper/df2b");
    }

    #[test]
    fn graph_paper_constructs_arxiv_pdf() {
        let g: GraphPaper = serde_json::from_str(
            r#"{"externalIds":{"ArXiv":"1706.03762"},"title":"T","openAccessPdf":null}"#,
        )
        .unwrap();
        assert_eq!(
            g.into_paper().unwrap().pdf_url.as_deref(),
            Some("https://arxiv.org/pdf/1706.03762")
        );
    }

    #[test]
    fn graph_paper_identity_priority() {
        let doi_only: GraphPaper =
            serde_json::from_str(r#"{"externalIds":{"DOI":"10.1/ABC"},"title":"T"}"#).unwrap();
        let id = doi_only.identity().unwrap();
        assert_eq!(id.source, Source::SemanticScholar);
        assert_eq!(id.external_id, "10.1/abc");

        let none: GraphPaper =
            serde_json::from_str(r#"{"externalIds":{"CorpusId":1},"title":"T"}"#).unwrap();
        assert!(none.into_paper().is_none());
    }
}
