//! Citation enrichment job
//!
//! Repeatedly selects rows still at citation count 0, looks them up in one
//! batch request and writes either the count or [`SENTINEL`]. Sentinel rows
//! drop out of the selection, so each row is queried at most once per run.
//! A failed lookup leaves the batch untouched; after a cooldown the same
//! selection is tried again. Only a run that drains the selection resets
//! sentinels back to 0; an aborted or cancelled run keeps them so the next
//! run resumes where this one stopped.

use std::time::{Duration, Instant};

use anyhow::Result;
use paperdex_core::{ShutdownFlag, fmt_duration, fmt_num};

use crate::lookup::CitationLookup;
use crate::store::{CitationStore, SENTINEL};

#[derive(Debug, Clone)]
pub struct EnrichConfig {
    /// Rows selected per iteration (capped at the lookup's batch limit)
    pub batch_size: usize,
    /// Pause after each successful lookup
    pub delay: Duration,
    /// Pause after a failed lookup
    pub cooldown: Duration,
    /// Consecutive failed lookups before the run aborts
    pub max_consecutive_failures: u32,
    /// Stop after this many successful batches
    pub max_batches: Option<u64>,
    /// Progress log cadence in batches
    pub report_every: u64,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            batch_size: 500,
            delay: Duration::from_secs(1),
            cooldown: Duration::from_secs(30),
            max_consecutive_failures: 10,
            max_batches: None,
            report_every: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichStatus {
    /// No rows left at 0
    Completed,
    Cancelled,
    BatchLimit,
    /// Too many consecutive lookup failures, or a store error
    Aborted { error: String },
}

#[derive(Debug, Clone)]
pub struct EnrichSummary {
    pub status: EnrichStatus,
    /// Rows at 0 when the run started
    pub pending_at_start: u64,
    pub batches: u64,
    pub checked: u64,
    /// Rows given a positive count
    pub updated: u64,
    /// Rows marked with the sentinel
    pub not_found: u64,
    pub failed_lookups: u64,
    /// Sentinels reset to 0 at the end of a completed run
    pub reset: u64,
    pub elapsed: Duration,
}

impl EnrichSummary {
    pub fn is_complete(&self) -> bool {
        self.status == EnrichStatus::Completed
    }

    pub fn log(&self) {
        log::info!(
            "enrich: {} checked in {} batches, {} updated, {} without citations, {} failed lookups ({})",
            fmt_num(self.checked as usize),
            self.batches,
            fmt_num(self.updated as usize),
            fmt_num(self.not_found as usize),
            self.failed_lookups,
            fmt_duration(self.elapsed)
        );
        match &self.status {
            EnrichStatus::Completed => {
                log::info!("enrich: completed, {} sentinels reset", self.reset)
            }
            EnrichStatus::Aborted { error } => {
                log::error!("enrich: aborted: {error}; rerun to resume")
            }
            status => log::warn!("enrich: stopped early ({status:?}); rerun to resume"),
        }
    }
}

/// Value written for one lookup result
pub fn citation_value(count: Option<u32>) -> i64 {
    match count {
        Some(n) if n > 0 => i64::from(n),
        _ => SENTINEL,
    }
}

pub struct EnrichmentJob {
    pub config: EnrichConfig,
    pub shutdown: ShutdownFlag,
}

impl EnrichmentJob {
    pub fn new(config: EnrichConfig, shutdown: ShutdownFlag) -> Self {
        Self { config, shutdown }
    }

    /// Run until the selection is empty, a limit is hit, or the job aborts.
    ///
    /// Store errors surface as `Err`; lookup failures are handled inside.
    pub fn run<S, L>(&self, store: &mut S, lookup: &L) -> Result<EnrichSummary>
    where
        S: CitationStore + ?Sized,
        L: CitationLookup + ?Sized,
    {
        let started = Instant::now();
        let limit = self.config.batch_size.clamp(1, lookup.max_batch().max(1));
        let mut summary = EnrichSummary {
            status: EnrichStatus::Completed,
            pending_at_start: store.count_unenriched()?,
            batches: 0,
            checked: 0,
            updated: 0,
            not_found: 0,
            failed_lookups: 0,
            reset: 0,
            elapsed: Duration::ZERO,
        };
        log::info!(
            "enrich: {} papers without citation counts, batches of {limit}",
            fmt_num(summary.pending_at_start as usize)
        );

        let mut consecutive_failures = 0u32;
        summary.status = loop {
            if self.shutdown.is_requested() {
                break EnrichStatus::Cancelled;
            }
            if self.config.max_batches.is_some_and(|max| summary.batches >= max) {
                break EnrichStatus::BatchLimit;
            }

            let keys = store.select_unenriched(limit)?;
            if keys.is_empty() {
                break EnrichStatus::Completed;
            }

            let counts = match lookup.lookup(&keys) {
                Ok(counts) if counts.len() == keys.len() => counts,
                Ok(counts) => {
                    self.on_failure(
                        &mut summary,
                        &mut consecutive_failures,
                        &format!("{} results for {} ids", counts.len(), keys.len()),
                        None,
                    );
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        break self.give_up(consecutive_failures);
                    }
                    continue;
                }
                Err(e) => {
                    self.on_failure(
                        &mut summary,
                        &mut consecutive_failures,
                        &e.to_string(),
                        e.retry_after(),
                    );
                    if consecutive_failures >= self.config.max_consecutive_failures {
                        break self.give_up(consecutive_failures);
                    }
                    continue;
                }
            };
            consecutive_failures = 0;

            let updates: Vec<_> = keys
                .into_iter()
                .zip(counts)
                .map(|(key, count)| (key, citation_value(count)))
                .collect();
            let found = updates.iter().filter(|(_, v)| *v > 0).count() as u64;
            store.apply_citations(&updates)?;

            summary.batches += 1;
            summary.checked += updates.len() as u64;
            summary.updated += found;
            summary.not_found += updates.len() as u64 - found;

            let every = self.config.report_every.max(1);
            if summary.batches <= 3 || summary.batches.is_multiple_of(every) {
                log::info!(
                    "enrich: batch {} | {} checked, {} updated",
                    summary.batches,
                    fmt_num(summary.checked as usize),
                    fmt_num(summary.updated as usize)
                );
            }
            pause(self.config.delay);
        };

        if summary.status == EnrichStatus::Completed {
            summary.reset = store.reset_sentinels()?;
        }
        summary.elapsed = started.elapsed();
        Ok(summary)
    }

    fn on_failure(
        &self,
        summary: &mut EnrichSummary,
        consecutive: &mut u32,
        error: &str,
        retry_after: Option<Duration>,
    ) {
        summary.failed_lookups += 1;
        *consecutive += 1;
        if *consecutive >= self.config.max_consecutive_failures {
            return;
        }
        let wait = retry_after.map_or(self.config.cooldown, |hint| hint.max(self.config.cooldown));
        log::warn!(
            "enrich: lookup failed ({}/{}): {error}; retrying in {}",
            consecutive,
            self.config.max_consecutive_failures,
            fmt_duration(wait)
        );
        pause(wait);
    }

    fn give_up(&self, failures: u32) -> EnrichStatus {
        EnrichStatus::Aborted {
            error: format!("{failures} consecutive lookup failures"),
        }
    }
}

fn pause(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}
