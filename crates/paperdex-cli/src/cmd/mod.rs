pub mod enrich;
pub mod fetch;
pub mod import;
pub mod index;
pub mod search;

use clap::ValueEnum;
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use paperdex_arxiv::ArxivClient;
use paperdex_core::PaperSource;
use paperdex_pubmed::PubmedClient;
use paperdex_semantic_scholar::{S2Client, SortMode};

use crate::config::Config;

/// Query-style sources
#[derive(Clone, Copy, ValueEnum, Debug, PartialEq, Eq)]
pub enum SourceArg {
    Arxiv,
    Pubmed,
    S2,
}

/// Result ordering; only Semantic Scholar honors anything but relevance
#[derive(Clone, Copy, ValueEnum, Debug, Default, PartialEq, Eq)]
pub enum SortArg {
    #[default]
    Relevance,
    Citations,
    Date,
}

impl From<SortArg> for SortMode {
    fn from(s: SortArg) -> Self {
        match s {
            SortArg::Relevance => SortMode::Relevance,
            SortArg::Citations => SortMode::CitationCount,
            SortArg::Date => SortMode::PublicationDate,
        }
    }
}

/// Build the adapter for a query-style source
pub fn source_client(source: SourceArg, sort: SortArg, config: &Config) -> Box<dyn PaperSource> {
    match source {
        SourceArg::Arxiv => Box::new(ArxivClient::new(config.arxiv_config())),
        SourceArg::Pubmed => Box::new(PubmedClient::new(config.pubmed_config())),
        SourceArg::S2 => Box::new(S2Client::new(config.s2_config()).with_sort(sort.into())),
    }
}

/// Key-value table with a cyan header
pub fn summary_table(title: &str, rows: &[(&str, String)]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new(title).fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    table
}

/// Print a key-value summary table on stderr
pub fn print_summary(title: &str, rows: &[(&str, String)]) {
    eprintln!("\n{}", summary_table(title, rows));
}

/// Shorten to at most `max` chars, marking the cut with an ellipsis
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("Größenordnung", 5), "Größ…");
    }

    #[test]
    fn summary_table_has_all_rows() {
        let table = summary_table("Import", &[("Files", "3/3".into()), ("Indexed", "10".into())]);
        let rendered = table.to_string();
        assert!(rendered.contains("Import"));
        assert!(rendered.contains("3/3"));
        assert!(rendered.contains("Indexed"));
    }

    #[test]
    fn sort_maps_to_s2_modes() {
        assert_eq!(SortMode::from(SortArg::Citations), SortMode::CitationCount);
        assert_eq!(SortMode::from(SortArg::Date), SortMode::PublicationDate);
        assert_eq!(SortMode::from(SortArg::default()), SortMode::Relevance);
    }
}
