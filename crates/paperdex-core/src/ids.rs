//! External identifier resolution
//!
//! Sources spell arXiv ids in many ways: abstract pages, PDF links, the
//! export mirror, DataCite DOIs (`10.48550/arXiv.<id>`) and bare ids in
//! either the new (`1706.03762v5`) or the old category-prefixed style
//! (`hep-ph/9901234`). Every adapter resolves through this one grammar so
//! the same paper always yields the same id.

use std::sync::LazyLock;

use regex::Regex;

use crate::record::Source;

/// New-style `YYMM.NNNN(N)` or old-style `archive(.SC)/YYMMNNN`, optional version
const ARXIV_ID: &str = r"(\d{4}\.\d{4,5}|[a-z][a-z\-]*(?:\.[a-z]{2})?/\d{7})(?:v\d+)?";

/// Location URL patterns in priority order.
static LOCATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"arxiv\.org/abs/",
        r"arxiv\.org/pdf/",
        r"export\.arxiv\.org/(?:abs|pdf)/",
        r"doi\.org/10\.48550/arxiv\.",
    ]
    .iter()
    .map(|prefix| Regex::new(&format!("(?i){prefix}{ARXIV_ID}")).expect("invalid arXiv pattern"))
    .collect()
});

/// DataCite DOI suffix, matched anywhere in a DOI or URL
static DOI_SUFFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)10\.48550/arxiv\.{ARXIV_ID}")).expect("invalid DOI pattern")
});

/// Whole-string bare id, with optional `arXiv:` prefix
static BARE_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)^(?:arxiv:)?{ARXIV_ID}$")).expect("invalid bare id pattern")
});

/// Strip a trailing version suffix: `v` followed only by digits.
pub fn strip_version(id: &str) -> &str {
    match id.rfind('v') {
        Some(pos)
            if pos > 0
                && pos + 1 < id.len()
                && id[pos + 1..].bytes().all(|b| b.is_ascii_digit()) =>
        {
            &id[..pos]
        }
        _ => id,
    }
}

/// Normalize a bare arXiv id as found in `externalIds.ArXiv` or `id_list`.
///
/// Returns `None` when the value is not an arXiv id at all.
pub fn normalize_arxiv_id(raw: &str) -> Option<String> {
    let caps = BARE_ID.captures(raw.trim())?;
    Some(caps.get(1)?.as_str().to_string())
}

/// Try each location pattern against a single URL.
pub fn arxiv_id_from_url(url: &str) -> Option<String> {
    LOCATION_PATTERNS
        .iter()
        .find_map(|re| re.captures(url).and_then(|c| c.get(1)))
        .map(|m| m.as_str().to_string())
}

/// Resolve an arXiv id from a record's candidate URLs and DOI.
///
/// Patterns are tried in priority order; for each pattern every URL is
/// checked, so the first pattern that matches any URL wins. When no
/// pattern matches, the DataCite DOI suffix is tried on the DOI and then
/// on every URL.
pub fn resolve_arxiv_id(urls: &[&str], doi: Option<&str>) -> Option<String> {
    for re in LOCATION_PATTERNS.iter() {
        for url in urls {
            if let Some(m) = re.captures(url).and_then(|c| c.get(1)) {
                return Some(m.as_str().to_string());
            }
        }
    }
    doi.into_iter()
        .chain(urls.iter().copied())
        .find_map(|s| DOI_SUFFIX.captures(s).and_then(|c| c.get(1)))
        .map(|m| m.as_str().to_string())
}

/// Normalize a DOI: drop resolver host / `doi:` prefix, lowercase.
pub fn normalize_doi(raw: &str) -> Option<String> {
    let mut doi = raw.trim();
    for prefix in [
        "https://doi.org/",
        "http://doi.org/",
        "https://dx.doi.org/",
        "http://dx.doi.org/",
        "doi:",
    ] {
        if doi.len() >= prefix.len() && doi[..prefix.len()].eq_ignore_ascii_case(prefix) {
            doi = &doi[prefix.len()..];
            break;
        }
    }
    let doi = doi.trim();
    if doi.is_empty() {
        None
    } else {
        Some(doi.to_lowercase())
    }
}

/// Resolved `(source, external_id)` pair used as the dedup key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub source: Source,
    pub external_id: String,
}

impl Identity {
    /// An arXiv id always wins; otherwise fall back to the adapter's
    /// registry-native id. Blank ids count as absent.
    ///
    /// The arXiv id is checked first so the same preprint seen through
    /// PubMed, S2 or OpenAlex lands on the arXiv feed's document.
    pub fn resolve(arxiv_id: Option<String>, fallback: Option<(Source, String)>) -> Option<Self> {
        if let Some(id) = arxiv_id.filter(|s| !s.trim().is_empty()) {
            return Some(Self {
                source: Source::Arxiv,
                external_id: id,
            });
        }
        fallback
            .filter(|(_, id)| !id.trim().is_empty())
            .map(|(source, external_id)| Self {
                source,
                external_id,
            })
    }
}
