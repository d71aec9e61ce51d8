//! Resumable cursor-paginated retrieval

use std::time::Duration;

use crate::error::ApiError;
use crate::progress::IngestProgress;
use crate::record::Paper;
use crate::retry::RetryPolicy;
use crate::shutdown::ShutdownFlag;
use crate::sink::{PaperSink, accepted_before_failure};

/// Initial cursor for APIs that use `*` to mean "from the beginning"
pub const START_CURSOR: &str = "*";

/// One page of upstream records
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// `None` (or empty) on the last page
    pub next_cursor: Option<String>,
    /// Upstream-reported total, if any
    pub total: Option<u64>,
}

/// A cursor-paginated listing.
pub trait PageSource {
    type Item;

    fn label(&self) -> &str;

    fn fetch_page(&mut self, cursor: &str) -> Result<Page<Self::Item>, ApiError>;
}

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub retry: RetryPolicy,
    /// Sleep after each successful page
    pub page_delay: Duration,
    /// Progress report cadence in pages
    pub report_every: u64,
    /// Always report the first N pages
    pub report_first: u64,
    /// Stop after this many pages
    pub max_pages: Option<u64>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::cursor_default(),
            page_delay: Duration::from_millis(150),
            report_every: 10,
            report_first: 3,
            max_pages: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    /// Upstream returned an empty page or no next cursor
    Completed,
    /// Shutdown requested between pages
    Cancelled,
    /// `max_pages` reached
    PageLimit,
    /// Retries exhausted or the sink failed
    Aborted { error: String },
}

/// Outcome of a driver run.
#[derive(Debug, Clone)]
pub struct CursorRun {
    pub status: RunStatus,
    pub progress: IngestProgress,
    /// Cursor of the first page not fully handled; `None` once complete
    pub resume_cursor: Option<String>,
}

impl CursorRun {
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Sequential page loop: fetch, convert, write, advance.
pub struct CursorDriver {
    pub config: DriverConfig,
    pub shutdown: ShutdownFlag,
}

impl CursorDriver {
    pub fn new(config: DriverConfig, shutdown: ShutdownFlag) -> Self {
        Self { config, shutdown }
    }

    /// Drive `source` from `start_cursor` until done, cancelled or aborted.
    ///
    /// `convert` maps upstream items to papers; `None` or a non-indexable
    /// paper counts as skipped. A sink shortfall is counted as errors.
    pub fn run<S, C, K>(
        &self,
        source: &mut S,
        start_cursor: &str,
        mut convert: C,
        sink: &mut K,
    ) -> CursorRun
    where
        S: PageSource,
        C: FnMut(S::Item) -> Option<Paper>,
        K: PaperSink + ?Sized,
    {
        let label = source.label().to_string();
        let mut progress = IngestProgress::new();
        let mut cursor = start_cursor.to_string();
        let mut fetched_pages = 0u64;

        log::info!("{label}: starting at cursor {cursor}");

        let status = loop {
            if self.shutdown.is_requested() {
                break RunStatus::Cancelled;
            }
            if self.config.max_pages.is_some_and(|max| fetched_pages >= max) {
                break RunStatus::PageLimit;
            }

            let mut failed_attempts = 0usize;
            let fetched = self.config.retry.run(&label, |_| {
                let result = source.fetch_page(&cursor);
                if result.is_err() {
                    failed_attempts += 1;
                }
                result
            });
            progress.errors += failed_attempts;
            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    break RunStatus::Aborted {
                        error: e.to_string(),
                    };
                }
            };
            fetched_pages += 1;
            progress.pages += 1;
            if page.total.is_some() {
                progress.total = page.total;
            }

            if page.items.is_empty() {
                cursor.clear();
                break RunStatus::Completed;
            }

            let mut batch = Vec::with_capacity(page.items.len());
            for item in page.items {
                match convert(item) {
                    Some(paper) if paper.is_indexable() => batch.push(paper),
                    _ => progress.skipped += 1,
                }
            }
            progress.converted += batch.len();

            if !batch.is_empty() {
                let submitted = batch.len();
                match sink.write_batch(batch) {
                    Ok(accepted) => {
                        progress.indexed += accepted;
                        progress.errors += submitted.saturating_sub(accepted);
                    }
                    Err(e) => {
                        let accepted = accepted_before_failure(&e).min(submitted);
                        progress.indexed += accepted;
                        progress.errors += submitted - accepted;
                        break RunStatus::Aborted {
                            error: format!("sink: {e:#}"),
                        };
                    }
                }
            }

            if progress.should_report(self.config.report_every, self.config.report_first) {
                log::info!("{label}: {}", progress.status_line());
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = next,
                _ => {
                    cursor.clear();
                    break RunStatus::Completed;
                }
            }

            if !self.config.page_delay.is_zero() {
                std::thread::sleep(self.config.page_delay);
            }
        };

        let status = match (status, sink.flush()) {
            (status, Ok(accepted)) => {
                progress.indexed += accepted;
                status
            }
            (RunStatus::Completed, Err(e)) => RunStatus::Aborted {
                error: format!("final flush: {e:#}"),
            },
            (status, Err(e)) => {
                log::error!("{label}: final flush failed: {e:#}");
                status
            }
        };

        let resume_cursor = match status {
            RunStatus::Completed => None,
            _ if cursor.is_empty() => Some(start_cursor.to_string()),
            _ => Some(cursor),
        };

        match (&status, &resume_cursor) {
            (RunStatus::Completed, _) => {
                log::info!("{label}: completed | {}", progress.status_line())
            }
            (RunStatus::Aborted { error }, Some(c)) => {
                log::error!("{label}: aborted: {error}");
                log::error!("{label}: resume with cursor {c}");
            }
            (_, Some(c)) => log::warn!("{label}: stopped early, resume with cursor {c}"),
            (_, None) => {}
        }

        CursorRun {
            status,
            progress,
            resume_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Source;
    use std::collections::VecDeque;

    /// Replays scripted responses and records the cursors it was asked for.
    struct Scripted {
        responses: VecDeque<Result<Page<&'static str>, ApiError>>,
        requested: Vec<String>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Page<&'static str>, ApiError>>) -> Self {
            Self {
                responses: responses.into(),
                requested: Vec::new(),
            }
        }
    }

    impl PageSource for Scripted {
        type Item = &'static str;

        fn label(&self) -> &str {
            "scripted"
        }

        fn fetch_page(&mut self, cursor: &str) -> Result<Page<&'static str>, ApiError> {
            self.requested.push(cursor.to_string());
            self.responses.pop_front().unwrap_or_else(|| {
                Ok(Page {
                    items: vec![],
                    next_cursor: None,
                    total: None,
                })
            })
        }
    }

    fn page(items: &[&'static str], next: Option<&str>) -> Result<Page<&'static str>, ApiError> {
        Ok(Page {
            items: items.to_vec(),
            next_cursor: next.map(String::from),
            total: Some(4),
        })
    }

    fn convert(id: &'static str) -> Option<Paper> {
        Some(Paper::new(Source::OpenAlex, id, format!("title {id}")))
    }

    fn driver() -> CursorDriver {
        CursorDriver::new(
            DriverConfig {
                retry: RetryPolicy::immediate(5),
                page_delay: Duration::ZERO,
                ..DriverConfig::default()
            },
            ShutdownFlag::new(),
        )
    }

    #[test]
    fn follows_cursors_until_last_page() {
        let mut source = Scripted::new(vec![
            page(&["W1", "W2"], Some("c2")),
            page(&["W3", "W4"], None),
        ]);
        let mut sink: Vec<Paper> = Vec::new();
        let run = driver().run(&mut source, START_CURSOR, convert, &mut sink);

        assert!(run.is_complete());
        assert_eq!(run.resume_cursor, None);
        assert_eq!(source.requested, ["*", "c2"]);
        assert_eq!(run.progress.pages, 2);
        assert_eq!(run.progress.indexed, 4);
        assert_eq!(run.progress.percent(), Some(100.0));
        assert_eq!(sink.len(), 4);
    }

    #[test]
    fn empty_page_ends_run() {
        let mut source = Scripted::new(vec![page(&["W1"], Some("c2")), page(&[], Some("c3"))]);
        let mut sink: Vec<Paper> = Vec::new();
        let run = driver().run(&mut source, START_CURSOR, convert, &mut sink);
        assert!(run.is_complete());
        assert_eq!(source.requested.len(), 2);
    }

    #[test]
    fn rate_limit_is_retried_on_same_cursor() {
        let mut source = Scripted::new(vec![
            page(&["W1"], Some("c2")),
            Err(ApiError::RateLimited { retry_after: None }),
            Err(ApiError::Http {
                status: Some(503),
                message: "busy".into(),
            }),
            page(&["W2"], None),
        ]);
        let mut sink: Vec<Paper> = Vec::new();
        let run = driver().run(&mut source, START_CURSOR, convert, &mut sink);
        assert!(run.is_complete());
        assert_eq!(source.requested, ["*", "c2", "c2", "c2"]);
        assert_eq!(run.progress.errors, 2);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn exhausted_retries_report_resume_cursor() {
        let mut responses = vec![page(&["W1"], Some("c2"))];
        responses.extend((0..5).map(|_| Err(ApiError::RateLimited { retry_after: None })));
        let mut source = Scripted::new(responses);
        let mut sink: Vec<Paper> = Vec::new();
        let run = driver().run(&mut source, START_CURSOR, convert, &mut sink);

        assert!(matches!(run.status, RunStatus::Aborted { .. }));
        assert_eq!(run.resume_cursor.as_deref(), Some("c2"));
        assert_eq!(source.requested.len(), 6);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn resumes_from_supplied_cursor() {
        let mut source = Scripted::new(vec![page(&["W3"], None)]);
        let mut sink: Vec<Paper> = Vec::new();
        driver().run(&mut source, "c2", convert, &mut sink);
        assert_eq!(source.requested, ["c2"]);
    }

    #[test]
    fn shutdown_stops_between_pages() {
        let d = driver();
        let flag = d.shutdown.clone();
        let mut source = Scripted::new(vec![page(&["W1"], Some("c2")), page(&["W2"], None)]);
        let mut sink = crate::sink::FnSink(|batch: Vec<Paper>| -> anyhow::Result<usize> {
            flag.request();
            Ok(batch.len())
        });
        let run = d.run(&mut source, START_CURSOR, convert, &mut sink);
        assert_eq!(run.status, RunStatus::Cancelled);
        assert_eq!(run.resume_cursor.as_deref(), Some("c2"));
        assert_eq!(source.requested, ["*"]);
    }

    #[test]
    fn partial_acceptance_counts_errors_without_abort() {
        let mut source = Scripted::new(vec![page(&["W1", "W2", "W3"], None)]);
        let mut sink = crate::sink::FnSink(|_: Vec<Paper>| -> anyhow::Result<usize> { Ok(2) });
        let run = driver().run(&mut source, START_CURSOR, convert, &mut sink);
        assert!(run.is_complete());
        assert_eq!(run.progress.indexed, 2);
        assert_eq!(run.progress.errors, 1);
    }

    #[test]
    fn sink_failure_aborts_at_current_cursor() {
        let mut source = Scripted::new(vec![page(&["W1"], Some("c2")), page(&["W2"], None)]);
        let mut calls = 0;
        let mut sink = crate::sink::FnSink(|b: Vec<Paper>| -> anyhow::Result<usize> {
            calls += 1;
            if calls == 2 {
                anyhow::bail!("index unavailable");
            }
            Ok(b.len())
        });
        let run = driver().run(&mut source, START_CURSOR, convert, &mut sink);
        assert!(matches!(run.status, RunStatus::Aborted { .. }));
        assert_eq!(run.resume_cursor.as_deref(), Some("c2"));
    }

    #[test]
    fn partially_written_page_keeps_accepted_count() {
        let mut source = Scripted::new(vec![page(&["W1", "W2", "W3"], Some("c2"))]);
        let mut sink = crate::sink::FnSink(|_: Vec<Paper>| -> anyhow::Result<usize> {
            Err(crate::sink::PartialWrite {
                accepted: 2,
                error: anyhow::anyhow!("bulk request failed"),
            }
            .into())
        });
        let run = driver().run(&mut source, START_CURSOR, convert, &mut sink);
        assert!(matches!(run.status, RunStatus::Aborted { .. }));
        assert_eq!(run.progress.indexed, 2);
        assert_eq!(run.progress.errors, 1);
        assert_eq!(run.resume_cursor.as_deref(), Some("*"));
    }

    #[test]
    fn unconvertible_items_are_skipped() {
        let mut source = Scripted::new(vec![page(&["W1", "", "W3"], None)]);
        let mut sink: Vec<Paper> = Vec::new();
        let run = driver().run(&mut source, START_CURSOR, convert, &mut sink);
        assert_eq!(run.progress.skipped, 1);
        assert_eq!(run.progress.converted, 2);
    }

    #[test]
    fn page_limit_reports_next_cursor() {
        let mut d = driver();
        d.config.max_pages = Some(1);
        let mut source = Scripted::new(vec![page(&["W1"], Some("c2")), page(&["W2"], None)]);
        let mut sink: Vec<Paper> = Vec::new();
        let run = d.run(&mut source, START_CURSOR, convert, &mut sink);
        assert_eq!(run.status, RunStatus::PageLimit);
        assert_eq!(run.resume_cursor.as_deref(), Some("c2"));
    }
}
