//! Relational paper store and the citation-count operations enrichment needs

use std::path::Path;

use anyhow::{Context, Result};
use duckdb::{Connection, params};
use paperdex_core::{Paper, PaperSink, Source};

/// Citation count meaning "checked, nothing found".
///
/// Never a valid count; keeps a row from being selected again during one
/// run and is reset to 0 when the run completes.
pub const SENTINEL: i64 = -1;

/// Primary key of a stored paper
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub source: Source,
    pub external_id: String,
}

impl RecordKey {
    pub fn new(source: Source, external_id: impl Into<String>) -> Self {
        Self {
            source,
            external_id: external_id.into(),
        }
    }
}

/// Store operations used by the enrichment job.
pub trait CitationStore {
    /// Rows whose citation count is exactly 0
    fn count_unenriched(&self) -> Result<u64>;

    /// Up to `limit` keys of rows whose citation count is exactly 0
    fn select_unenriched(&self, limit: usize) -> Result<Vec<RecordKey>>;

    /// Write citation counts; a row is only touched while it still holds 0
    /// or the sentinel. Returns rows changed.
    fn apply_citations(&mut self, updates: &[(RecordKey, i64)]) -> Result<usize>;

    /// Turn every sentinel back into 0; returns rows changed.
    fn reset_sentinels(&mut self) -> Result<u64>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS papers (
    source VARCHAR NOT NULL,
    external_id VARCHAR NOT NULL,
    title VARCHAR NOT NULL,
    abstract VARCHAR,
    authors VARCHAR,
    published_date VARCHAR,
    year INTEGER,
    pdf_url VARCHAR,
    primary_category VARCHAR,
    categories VARCHAR,
    doi VARCHAR,
    journal VARCHAR,
    citation_count BIGINT NOT NULL DEFAULT 0,
    reference_count BIGINT NOT NULL DEFAULT 0,
    influential_citation_count BIGINT NOT NULL DEFAULT 0,
    is_open_access BOOLEAN NOT NULL DEFAULT false,
    publication_types VARCHAR,
    url VARCHAR,
    PRIMARY KEY (source, external_id)
);";

const UPSERT: &str = "
INSERT INTO papers (
    source, external_id, title, abstract, authors, published_date, year, pdf_url,
    primary_category, categories, doi, journal, citation_count, reference_count,
    influential_citation_count, is_open_access, publication_types, url
) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
ON CONFLICT (source, external_id) DO UPDATE SET
    title = excluded.title,
    abstract = excluded.abstract,
    authors = excluded.authors,
    published_date = excluded.published_date,
    year = excluded.year,
    pdf_url = excluded.pdf_url,
    primary_category = excluded.primary_category,
    categories = excluded.categories,
    doi = excluded.doi,
    journal = excluded.journal,
    citation_count = greatest(papers.citation_count, excluded.citation_count),
    reference_count = excluded.reference_count,
    influential_citation_count = excluded.influential_citation_count,
    is_open_access = excluded.is_open_access,
    publication_types = excluded.publication_types,
    url = excluded.url";

/// DuckDB-backed `papers` table keyed by `(source, external_id)`.
pub struct DuckDbStore {
    conn: Connection,
}

impl DuckDbStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {}", path.display()))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open DuckDB in-memory connection")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)
            .context("Failed to create papers table")?;
        Ok(Self { conn })
    }

    /// Insert or refresh papers; stored citation counts never decrease.
    pub fn upsert_papers(&mut self, papers: &[Paper]) -> Result<usize> {
        let tx = self.conn.transaction().context("Failed to begin upsert")?;
        let mut written = 0;
        {
            let mut stmt = tx.prepare(UPSERT).context("Failed to prepare upsert")?;
            for p in papers {
                let authors = serde_json::to_string(&p.authors)?;
                let categories = serde_json::to_string(&p.categories)?;
                let types = serde_json::to_string(&p.publication_types)?;
                written += stmt
                    .execute(params![
                        p.source.as_str(),
                        p.external_id,
                        p.title,
                        p.abstract_text,
                        authors,
                        p.published_date.map(|d| d.to_string()),
                        p.year,
                        p.pdf_url,
                        p.primary_category,
                        categories,
                        p.doi,
                        p.journal,
                        i64::from(p.citation_count),
                        i64::from(p.reference_count),
                        i64::from(p.influential_citation_count),
                        p.is_open_access,
                        types,
                        p.url,
                    ])
                    .with_context(|| format!("Failed to upsert {}:{}", p.source, p.external_id))?;
            }
        }
        tx.commit().context("Failed to commit upsert")?;
        Ok(written)
    }

    pub fn len(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row("SELECT count(*) FROM papers", [], |row| row.get(0))
            .context("Failed to count papers")?;
        Ok(n as u64)
    }

    pub fn citation_count(&self, key: &RecordKey) -> Result<Option<i64>> {
        let mut stmt = self.conn.prepare(
            "SELECT citation_count FROM papers WHERE source = ? AND external_id = ?",
        )?;
        let mut rows = stmt.query(params![key.source.as_str(), key.external_id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }
}

impl CitationStore for DuckDbStore {
    fn count_unenriched(&self) -> Result<u64> {
        let n: i64 = self
            .conn
            .query_row(
                "SELECT count(*) FROM papers WHERE citation_count = 0",
                [],
                |row| row.get(0),
            )
            .context("Failed to count unenriched papers")?;
        Ok(n as u64)
    }

    fn select_unenriched(&self, limit: usize) -> Result<Vec<RecordKey>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT source, external_id FROM papers WHERE citation_count = 0 \
                 ORDER BY source, external_id LIMIT ?",
            )
            .context("Failed to prepare unenriched selection")?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut keys = Vec::with_capacity(limit);
        for row in rows {
            let (source, external_id) = row?;
            match Source::from_name(&source) {
                Some(source) => keys.push(RecordKey {
                    source,
                    external_id,
                }),
                None => log::warn!("skipping row with unknown source '{source}'"),
            }
        }
        Ok(keys)
    }

    fn apply_citations(&mut self, updates: &[(RecordKey, i64)]) -> Result<usize> {
        let tx = self.conn.transaction().context("Failed to begin update")?;
        let mut changed = 0;
        {
            let mut stmt = tx
                .prepare(
                    "UPDATE papers SET citation_count = ? \
                     WHERE source = ? AND external_id = ? AND citation_count IN (0, ?)",
                )
                .context("Failed to prepare citation update")?;
            for (key, count) in updates {
                changed += stmt.execute(params![
                    count,
                    key.source.as_str(),
                    key.external_id,
                    SENTINEL
                ])?;
            }
        }
        tx.commit().context("Failed to commit citation update")?;
        Ok(changed)
    }

    fn reset_sentinels(&mut self) -> Result<u64> {
        let n = self
            .conn
            .execute(
                "UPDATE papers SET citation_count = 0 WHERE citation_count = ?",
                params![SENTINEL],
            )
            .context("Failed to reset sentinels")?;
        Ok(n as u64)
    }
}

/// Ingestion mirror: every batch is upserted.
impl PaperSink for DuckDbStore {
    fn write_batch(&mut self, papers: Vec<Paper>) -> anyhow::Result<usize> {
        self.upsert_papers(&papers)
    }
}
