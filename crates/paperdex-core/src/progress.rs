//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: indicatif byte bars per downloaded file and spinner lines.
//! Non-TTY mode: log-based output (no progress bars).
//!
//! Ingestion counters live in [`IngestProgress`], a plain value each driver
//! owns and returns, so runs never share progress state.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Per-file progress bar (uv-style: green bar, binary bytes)
fn bar_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<20.dim} {bar:30.green/dim} {binary_bytes:>7}/{binary_total_bytes:7} {eta:>4} {wide_msg:.dim}")
        .expect("invalid template")
        .progress_chars("--")
}

/// Pending style, shown before total bytes are known
fn pending_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template("{prefix:<20.dim} {wide_msg:.dim}")
        .expect("invalid template")
}

/// Upgrade a progress bar from pending to bytes bar.
///
/// Call this after `open_http_reader` returns `total_bytes`.
pub fn upgrade_to_bar(pb: &ProgressBar, total: u64) {
    pb.set_length(total);
    pb.set_style(bar_style());
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        let is_tty = std::io::stderr().is_terminal();
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Create a per-file progress bar.
    ///
    /// TTY: visible bar with pending style (no bytes yet).
    /// Non-TTY: hidden (no-op).
    pub fn file_bar(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }

        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(pending_style());
        // Truncate long names to keep bars aligned
        let display: String = name.chars().take(20).collect();
        pb.set_prefix(display);
        pb
    }

    /// Create a stage status line managed by MultiProgress.
    ///
    /// Returns a ProgressBar with a spinner for active status display.
    /// Update with `pb.set_message(...)` as the stage progresses.
    /// Call `pb.finish()` to stop the spinner.
    pub fn stage_line(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new(0));
        pb.set_style(
            ProgressStyle::with_template("{spinner:.green} {prefix:<10.cyan.bold} {wide_msg}")
                .expect("invalid template"),
        );
        pb.set_prefix(name.to_string());
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Whether running in TTY mode.
    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// Get reference to `MultiProgress` for log bridge.
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

/// Format a duration as `1h02m03s` / `4m05s` / `6s`.
pub fn fmt_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}h{m:02}m{s:02}s")
    } else if m > 0 {
        format!("{m}m{s:02}s")
    } else {
        format!("{s}s")
    }
}

/// Running counters for one ingestion run.
///
/// Threaded through the driver loop by value and handed back to the
/// caller in the run result.
#[derive(Debug, Clone)]
pub struct IngestProgress {
    pub pages: u64,
    /// Records converted into canonical papers
    pub converted: usize,
    /// Upstream records dropped during conversion
    pub skipped: usize,
    /// Records accepted by the sink
    pub indexed: usize,
    pub errors: usize,
    /// Upstream-reported total, when the API provides one
    pub total: Option<u64>,
    started: Instant,
}

impl Default for IngestProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl IngestProgress {
    pub fn new() -> Self {
        Self {
            pages: 0,
            converted: 0,
            skipped: 0,
            indexed: 0,
            errors: 0,
            total: None,
            started: Instant::now(),
        }
    }

    /// Test hook: pretend the run started `ago` in the past.
    pub fn started_ago(mut self, ago: Duration) -> Self {
        self.started = Instant::now().checked_sub(ago).unwrap_or(self.started);
        self
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Upstream records seen so far, kept or not
    pub fn seen(&self) -> usize {
        self.converted + self.skipped
    }

    /// Records per second over the whole run
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.seen() as f64 / secs
    }

    pub fn percent(&self) -> Option<f64> {
        match self.total {
            Some(0) | None => None,
            Some(total) => Some((self.seen() as f64 / total as f64 * 100.0).min(100.0)),
        }
    }

    pub fn eta(&self) -> Option<Duration> {
        let total = self.total? as f64;
        let rate = self.throughput();
        if rate <= 0.0 {
            return None;
        }
        let remaining = (total - self.seen() as f64).max(0.0);
        Some(Duration::from_secs_f64(remaining / rate))
    }

    /// Report on the first `first_n` pages, then every `every` pages.
    pub fn should_report(&self, every: u64, first_n: u64) -> bool {
        self.pages <= first_n || (every > 0 && self.pages.is_multiple_of(every))
    }

    /// One-line status: counts, percent, rate and ETA when known.
    pub fn status_line(&self) -> String {
        let mut line = format!(
            "page {} | {} converted, {} indexed, {} errors",
            self.pages,
            fmt_num(self.converted),
            fmt_num(self.indexed),
            fmt_num(self.errors)
        );
        if let Some(pct) = self.percent() {
            line.push_str(&format!(" | {pct:.1}%"));
        }
        line.push_str(&format!(" | {:.0} rec/s", self.throughput()));
        if let Some(eta) = self.eta() {
            line.push_str(&format!(" | ETA {}", fmt_duration(eta)));
        }
        line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fmt_num_zero() {
        assert_eq!(fmt_num(0), "0");
    }

    #[test]
    fn fmt_num_small() {
        assert_eq!(fmt_num(1), "1");
        assert_eq!(fmt_num(12), "12");
        assert_eq!(fmt_num(123), "123");
    }

    #[test]
    fn fmt_num_thousands() {
        assert_eq!(fmt_num(1_000), "1,000");
        assert_eq!(fmt_num(1_234), "1,234");
        assert_eq!(fmt_num(12_345), "12,345");
        assert_eq!(fmt_num(123_456), "123,456");
    }

    #[test]
    fn fmt_num_millions() {
        assert_eq!(fmt_num(1_000_000), "1,000,000");
        assert_eq!(fmt_num(1_234_567), "1,234,567");
    }

    #[test]
    fn fmt_num_large() {
        assert_eq!(fmt_num(1_234_567_890), "1,234,567,890");
    }

    #[test]
    fn fmt_duration_units() {
        assert_eq!(fmt_duration(Duration::from_secs(6)), "6s");
        assert_eq!(fmt_duration(Duration::from_secs(245)), "4m05s");
        assert_eq!(fmt_duration(Duration::from_secs(3723)), "1h02m03s");
    }

    #[test]
    fn percent_and_eta_need_total() {
        let mut p = IngestProgress::new().started_ago(Duration::from_secs(10));
        p.converted = 90;
        p.skipped = 10;
        assert_eq!(p.percent(), None);
        assert_eq!(p.eta(), None);

        p.total = Some(400);
        assert_eq!(p.percent(), Some(25.0));
        let eta = p.eta().unwrap().as_secs_f64();
        // 100 records in ~10s, 300 remaining
        assert!((25.0..=31.0).contains(&eta), "eta {eta}");
    }

    #[test]
    fn report_cadence() {
        let mut p = IngestProgress::new();
        let reported: Vec<u64> = (1..=25)
            .filter(|&page| {
                p.pages = page;
                p.should_report(10, 3)
            })
            .collect();
        assert_eq!(reported, [1, 2, 3, 10, 20]);
    }

    #[test]
    fn status_line_mentions_counts() {
        let mut p = IngestProgress::new();
        p.pages = 2;
        p.converted = 1500;
        p.total = Some(3000);
        let line = p.status_line();
        assert!(line.contains("page 2"));
        assert!(line.contains("1,500 converted"));
        assert!(line.contains("50.0%"));
    }
}
