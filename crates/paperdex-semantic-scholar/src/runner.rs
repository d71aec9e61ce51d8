//! Bulk dataset import: stream every file of a release through the decoder

use std::io::{self, Read};
use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::time::{Duration, Instant};

use indicatif::ProgressBar;
use paperdex_core::{
    ApiError, BatchDecoder, ByteCounter, CountingReader, DecodeError, DecodeStats, PaperSink,
    ProgressContext, RetryPolicy, Retryable, ShutdownFlag, fmt_duration, fmt_num,
    open_http_reader, upgrade_to_bar,
};

use crate::transform::PaperRow;

/// Operator-facing options for one bulk import.
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Release id, or `latest`
    pub release: String,
    pub dataset: String,
    /// Index of the first file to process (resume offset)
    pub start_file: usize,
    pub max_files: Option<usize>,
    /// Keep only rows with a resolvable arXiv id
    pub arxiv_only: bool,
    pub batch_size: usize,
    pub retry: RetryPolicy,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            release: "latest".to_string(),
            dataset: "papers".to_string(),
            start_file: 0,
            max_files: None,
            arxiv_only: true,
            batch_size: paperdex_core::decoder::DEFAULT_BATCH_SIZE,
            retry: RetryPolicy::bulk_default(),
        }
    }
}

/// Counters for one file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileCounts {
    pub decode: DecodeStats,
    /// Rows that produced a canonical record
    pub converted: usize,
    /// Records the sink accepted
    pub accepted: usize,
}

impl FileCounts {
    fn add(&mut self, other: &FileCounts) {
        self.decode.lines_scanned += other.decode.lines_scanned;
        self.decode.malformed += other.decode.malformed;
        self.decode.rejected += other.decode.rejected;
        self.decode.matched += other.decode.matched;
        self.decode.batches += other.decode.batches;
        self.converted += other.converted;
        self.accepted += other.accepted;
    }
}

/// Result of a whole import run
#[derive(Debug, Clone, Default)]
pub struct ImportSummary {
    pub files_selected: usize,
    pub files_done: usize,
    /// Absolute file indexes that failed permanently
    pub failed_files: Vec<usize>,
    pub totals: FileCounts,
    /// First file index not attempted when the run stopped early
    pub resume_file: Option<usize>,
    pub elapsed: Duration,
}

impl ImportSummary {
    pub fn is_complete(&self) -> bool {
        self.failed_files.is_empty() && self.resume_file.is_none()
    }

    pub fn log(&self) {
        let t = &self.totals;
        log::info!(
            "import: {}/{} files in {}, {} lines, {} matched, {} indexed, {} malformed",
            self.files_done,
            self.files_selected,
            fmt_duration(self.elapsed),
            fmt_num(t.decode.lines_scanned),
            fmt_num(t.decode.matched),
            fmt_num(t.accepted),
            fmt_num(t.decode.malformed),
        );
        if !self.failed_files.is_empty() {
            log::error!("import: failed files {:?}", self.failed_files);
        }
        if let Some(next) = self.resume_file {
            log::warn!("import: stopped early, resume with --start-file {next}");
        }
    }
}

/// Why one attempt at a file failed
#[derive(Debug)]
pub enum FileError {
    Open(ApiError),
    Stream(io::Error),
    /// The destination failed; retrying the download will not help
    Sink(anyhow::Error),
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(e) => write!(f, "open failed: {e}"),
            Self::Stream(e) => write!(f, "stream failed: {e}"),
            Self::Sink(e) => write!(f, "sink failed: {e:#}"),
        }
    }
}

impl std::error::Error for FileError {}

impl Retryable for FileError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Open(e) => e.is_retryable(),
            Self::Stream(_) => true,
            Self::Sink(_) => false,
        }
    }

    fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Open(e) if e.is_rate_limited())
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Open(e) => e.retry_after(),
            _ => None,
        }
    }
}

impl From<DecodeError<anyhow::Error>> for FileError {
    fn from(e: DecodeError<anyhow::Error>) -> Self {
        match e {
            DecodeError::Stream { source, .. } => Self::Stream(source),
            DecodeError::Sink { source, .. } => Self::Sink(source),
        }
    }
}

/// Files to process: `[start_file, start_file + max_files)`, with absolute indexes.
pub fn select_files(
    files: &[String],
    start_file: usize,
    max_files: Option<usize>,
) -> Vec<(usize, &str)> {
    files
        .iter()
        .enumerate()
        .skip(start_file)
        .take(max_files.unwrap_or(usize::MAX))
        .map(|(i, f)| (i, f.as_str()))
        .collect()
}

/// Decode one gzip JSONL stream of dataset rows into `sink`.
///
/// Matching rows are converted and written batch by batch; the sink's
/// accepted count is accumulated into the returned counts.
pub fn import_reader<R, K>(
    reader: R,
    counter: &ByteCounter,
    decoder: &BatchDecoder,
    arxiv_only: bool,
    sink: &mut K,
    pb: &ProgressBar,
) -> Result<FileCounts, FileError>
where
    R: Read,
    K: PaperSink + ?Sized,
{
    let mut converted = 0usize;
    let mut accepted = 0usize;
    let decode = decoder.decode_gzip(
        reader,
        counter,
        |row: &PaperRow| row.is_wanted(arxiv_only),
        |rows: Vec<PaperRow>| -> anyhow::Result<()> {
            let papers: Vec<_> = rows.into_iter().filter_map(PaperRow::into_paper).collect();
            converted += papers.len();
            accepted += sink.write_batch(papers)?;
            Ok(())
        },
        pb,
    )?;
    accepted += sink.flush().map_err(FileError::Sink)?;
    Ok(FileCounts {
        decode,
        converted,
        accepted,
    })
}

/// Sequential multi-file driver.
pub struct BulkImporter {
    config: ImportConfig,
    decoder: BatchDecoder,
    shutdown: ShutdownFlag,
}

impl BulkImporter {
    pub fn new(config: ImportConfig, shutdown: ShutdownFlag) -> Self {
        Self {
            decoder: BatchDecoder::with_batch_size(config.batch_size),
            config,
            shutdown,
        }
    }

    /// Import every selected remote file.
    ///
    /// A file that fails (after retries) is recorded and the run moves on.
    pub fn run<K>(
        &self,
        files: &[String],
        sink: &mut K,
        progress: &ProgressContext,
    ) -> ImportSummary
    where
        K: PaperSink + ?Sized,
    {
        self.run_with(files, sink, progress, |url| {
            let (reader, counter, total) = open_http_reader(url)?;
            Ok((Box::new(reader) as Box<dyn Read>, counter, total))
        })
    }

    /// Like [`run`](Self::run) with a custom opener (local files, tests).
    pub fn run_with<K, O>(
        &self,
        files: &[String],
        sink: &mut K,
        progress: &ProgressContext,
        mut open: O,
    ) -> ImportSummary
    where
        K: PaperSink + ?Sized,
        O: FnMut(&str) -> Result<(Box<dyn Read>, ByteCounter, Option<u64>), ApiError>,
    {
        let started = Instant::now();
        let selected = select_files(files, self.config.start_file, self.config.max_files);
        let mut summary = ImportSummary {
            files_selected: selected.len(),
            ..ImportSummary::default()
        };
        log::info!(
            "{}: importing {} of {} files from index {}",
            self.config.dataset,
            selected.len(),
            files.len(),
            self.config.start_file
        );

        for (index, url) in selected {
            if self.shutdown.is_requested() {
                summary.resume_file = Some(index);
                break;
            }
            let name = format!("{}_{index:04}", self.config.dataset);
            let pb = progress.file_bar(&name);
            pb.set_message("connecting...");

            let result = self.config.retry.run(&name, |attempt| {
                if attempt > 1 {
                    let max = self.config.retry.max_attempts;
                    pb.set_message(format!("retry {attempt}/{max}..."));
                }
                let (reader, counter, total) = open(url).map_err(FileError::Open)?;
                if let Some(total) = total {
                    upgrade_to_bar(&pb, total);
                }
                import_reader(
                    reader,
                    &counter,
                    &self.decoder,
                    self.config.arxiv_only,
                    &mut *sink,
                    &pb,
                )
            });
            pb.finish_and_clear();

            match result {
                Ok(counts) => {
                    log::info!(
                        "{name}: {} lines, {} matched, {} indexed",
                        fmt_num(counts.decode.lines_scanned),
                        fmt_num(counts.decode.matched),
                        fmt_num(counts.accepted)
                    );
                    summary.totals.add(&counts);
                    summary.files_done += 1;
                }
                Err(e) => {
                    log::error!("{name}: failed: {}", e.last);
                    summary.failed_files.push(index);
                }
            }
        }

        summary.elapsed = started.elapsed();
        summary
    }
}

/// Open a local `.gz` file with a byte counter, for `import_reader`.
pub fn open_local(
    path: &std::path::Path,
) -> io::Result<(CountingReader<std::fs::File>, ByteCounter, u64)> {
    let file = std::fs::File::open(path)?;
    let len = file.metadata()?.len();
    let counter: ByteCounter = Arc::new(AtomicU64::new(0));
    Ok((CountingReader::new(file, counter.clone()), counter, len))
}
