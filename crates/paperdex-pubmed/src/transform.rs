//! PubmedArticle -> canonical Paper conversion

use chrono::NaiveDate;
use paperdex_core::{Author, Identity, Paper, Source, dedup_ordered, normalize_doi, resolve_arxiv_id};

use crate::parser::PubmedArticle;

/// Convert a parsed article. Articles without a PMID are dropped.
pub fn article_to_paper(article: PubmedArticle) -> Option<Paper> {
    let pmid = article.pmid.trim().to_string();
    if pmid.is_empty() {
        return None;
    }

    let doi = article
        .doi
        .as_deref()
        .and_then(normalize_doi)
        .or_else(|| article.elocation_doi.as_deref().and_then(normalize_doi));
    let identity = Identity::resolve(
        resolve_arxiv_id(&[], doi.as_deref()),
        Some((Source::Pubmed, pmid.clone())),
    )?;

    let (published_date, year) = resolve_date(&article);

    let authors = article
        .authors
        .iter()
        .filter_map(|a| {
            let name = a.display_name()?;
            Some(Author::new(name).with_affiliation(a.affiliations.first().cloned()))
        })
        .collect();

    let categories = dedup_ordered(
        article
            .mesh_terms
            .into_iter()
            .chain(article.keywords),
    );

    let pdf_url = article
        .pmc_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| format!("https://www.ncbi.nlm.nih.gov/pmc/articles/{id}/pdf/"));

    let title = article.title.as_deref().map(clean_text).unwrap_or_default();

    Some(Paper {
        abstract_text: article.abstract_text.as_deref().map(clean_text).unwrap_or_default(),
        authors,
        published_date,
        year,
        is_open_access: pdf_url.is_some(),
        pdf_url,
        primary_category: categories.first().cloned(),
        categories,
        doi,
        journal: article
            .journal_title
            .map(|j| j.trim().to_string())
            .filter(|j| !j.is_empty()),
        reference_count: article.reference_count,
        publication_types: dedup_ordered(article.publication_types),
        url: format!("https://pubmed.ncbi.nlm.nih.gov/{pmid}/"),
        ..Paper::new(identity.source, identity.external_id, title)
    })
}

/// Year+Month+Day, Year+Month (1st of month) or Year alone (January 1st).
///
/// `MedlineDate` contributes only its leading year.
fn resolve_date(article: &PubmedArticle) -> (Option<NaiveDate>, Option<i32>) {
    let year = article
        .pub_year
        .or_else(|| article.medline_date.as_deref().and_then(leading_year));
    let Some(year) = year else {
        return (None, None);
    };

    let date = match (article.pub_month, article.pub_day) {
        (Some(m), Some(d)) => NaiveDate::from_ymd_opt(year, m, d)
            .or_else(|| NaiveDate::from_ymd_opt(year, m, 1)),
        (Some(m), None) => NaiveDate::from_ymd_opt(year, m, 1),
        (None, _) => None,
    }
    .or_else(|| NaiveDate::from_ymd_opt(year, 1, 1));

    (date, Some(year))
}

fn leading_year(s: &str) -> Option<i32> {
    let digits = s.trim().get(..4)?;
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

fn clean_text(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Author as XmlAuthor;

    fn article(pmid: &str) -> PubmedArticle {
        PubmedArticle {
            pmid: pmid.to_string(),
            title: Some("A  title\n spread out".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn missing_pmid_drops_record() {
        assert!(article_to_paper(article("")).is_none());
        assert!(article_to_paper(article("   ")).is_none());
    }

    #[test]
    fn pmid_identity_and_url() {
        let p = article_to_paper(article("31452104")).unwrap();
        assert_eq!(p.source, Source::Pubmed);
        assert_eq!(p.external_id, "31452104");
        assert_eq!(p.title, "A title spread out");
        assert_eq!(p.url, "https://pubmed.ncbi.nlm.nih.gov/31452104/");
        assert!(!p.is_open_access);
        assert_eq!(p.pdf_url, None);
    }

    #[test]
    fn arxiv_doi_takes_identity() {
        let mut a = article("1");
        a.doi = Some("10.48550/arXiv.1706.03762".to_string());
        let p = article_to_paper(a).unwrap();
        assert_eq!(p.source, Source::Arxiv);
        assert_eq!(p.external_id, "1706.03762");
        assert_eq!(p.doi.as_deref(), Some("10.48550/arxiv.1706.03762"));
    }

    #[test]
    fn elocation_doi_used_as_fallback() {
        let mut a = article("1");
        a.elocation_doi = Some("10.1038/S41592-019-0403-1".to_string());
        let p = article_to_paper(a).unwrap();
        assert_eq!(p.doi.as_deref(), Some("10.1038/s41592-019-0403-1"));
        assert_eq!(p.source, Source::Pubmed);
    }

    #[test]
    fn blank_article_id_doi_falls_through() {
        let mut a = article("1");
        a.doi = Some("  ".to_string());
        a.elocation_doi = Some("10.1038/s41592-019-0403-1".to_string());
        let p = article_to_paper(a).unwrap();
        assert_eq!(p.doi.as_deref(), Some("10.1038/s41592-019-0403-1"));
    }

    #[test]
    fn date_full() {
        let mut a = article("1");
        a.pub_year = Some(2019);
        a.pub_month = Some(9);
        a.pub_day = Some(14);
        let p = article_to_paper(a).unwrap();
        assert_eq!(p.published_date, NaiveDate::from_ymd_opt(2019, 9, 14));
        assert_eq!(p.year, Some(2019));
    }

    #[test]
    fn date_year_month() {
        let mut a = article("1");
        a.pub_year = Some(2019);
        a.pub_month = Some(9);
        let p = article_to_paper(a).unwrap();
        assert_eq!(p.published_date, NaiveDate::from_ymd_opt(2019, 9, 1));
    }

    #[test]
    fn date_year_only() {
        let mut a = article("1");
        a.pub_year = Some(2019);
        let p = article_to_paper(a).unwrap();
        assert_eq!(p.published_date, NaiveDate::from_ymd_opt(2019, 1, 1));
        assert_eq!(p.year, Some(2019));
    }

    #[test]
    fn date_from_medline_date() {
        let mut a = article("1");
        a.medline_date = Some("1998 Dec-1999 Jan".to_string());
        let p = article_to_paper(a).unwrap();
        assert_eq!(p.year, Some(1998));
        assert_eq!(p.published_date, NaiveDate::from_ymd_opt(1998, 1, 1));
    }

    #[test]
    fn no_date_at_all() {
        let p = article_to_paper(article("1")).unwrap();
        assert_eq!(p.published_date, None);
        assert_eq!(p.year, None);
    }

    #[test]
    fn invalid_day_degrades_to_month() {
        let mut a = article("1");
        a.pub_year = Some(2021);
        a.pub_month = Some(2);
        a.pub_day = Some(30);
        let p = article_to_paper(a).unwrap();
        assert_eq!(p.published_date, NaiveDate::from_ymd_opt(2021, 2, 1));
    }

    #[test]
    fn pmc_enables_open_access() {
        let mut a = article("1");
        a.pmc_id = Some("PMC7010575".to_string());
        let p = article_to_paper(a).unwrap();
        assert!(p.is_open_access);
        assert_eq!(
            p.pdf_url.as_deref(),
            Some("https://www.ncbi.nlm.nih.gov/pmc/articles/PMC7010575/pdf/")
        );
    }

    #[test]
    fn categories_from_mesh_then_keywords() {
        let mut a = article("1");
        a.mesh_terms = vec!["Deep Learning".into(), "Humans".into()];
        a.keywords = vec!["deep learning".into(), "Humans".into()];
        let p = article_to_paper(a).unwrap();
        assert_eq!(p.categories, ["Deep Learning", "Humans", "deep learning"]);
        assert_eq!(p.primary_category.as_deref(), Some("Deep Learning"));
    }

    #[test]
    fn authors_keep_first_affiliation() {
        let mut a = article("1");
        a.authors = vec![
            XmlAuthor {
                last_name: Some("Moen".into()),
                fore_name: Some("Erick".into()),
                affiliations: vec!["Caltech".into(), "Other".into()],
                ..Default::default()
            },
            XmlAuthor::default(),
        ];
        let p = article_to_paper(a).unwrap();
        assert_eq!(p.authors.len(), 1);
        assert_eq!(p.authors[0].name, "Erick Moen");
        assert_eq!(p.authors[0].affiliation.as_deref(), Some("Caltech"));
    }
}
