//! Streaming batch decoder for gzip-compressed JSON Lines

use std::io::{self, BufRead, BufReader, Read};
use std::sync::atomic::Ordering;

use flate2::read::MultiGzDecoder;
use indicatif::ProgressBar;
use serde::de::DeserializeOwned;

use crate::progress::fmt_num;
use crate::stream::ByteCounter;

/// Default number of accepted records per callback
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Longest line accepted; larger lines are skipped as malformed
pub const DEFAULT_MAX_LINE_BYTES: usize = 64 * 1024 * 1024;

/// Progress update interval in scanned lines
pub const DEFAULT_REPORT_EVERY: usize = 10_000;

/// Buffer size for the decompressed stream (256KB)
const GZIP_BUF_SIZE: usize = 256 * 1024;

/// Initial capacity for per-line read buffer
const LINE_BUF_CAPACITY: usize = 4096;

/// Counters from one decode pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeStats {
    pub lines_scanned: usize,
    /// Unparseable or oversized lines
    pub malformed: usize,
    /// Parsed but failed the predicate
    pub rejected: usize,
    pub matched: usize,
    pub batches: usize,
}

impl DecodeStats {
    /// Lines that parsed, whether or not the predicate kept them
    pub fn parsed(&self) -> usize {
        self.matched + self.rejected
    }
}

/// Decode failure, carrying the counters reached before it.
#[derive(Debug)]
pub enum DecodeError<E> {
    /// Reading or decompressing the stream failed
    Stream { source: io::Error, stats: DecodeStats },
    /// The batch callback failed; no further lines were read
    Sink { source: E, stats: DecodeStats },
}

impl<E> DecodeError<E> {
    pub fn stats(&self) -> &DecodeStats {
        match self {
            Self::Stream { stats, .. } | Self::Sink { stats, .. } => stats,
        }
    }
}

impl<E: std::fmt::Display> std::fmt::Display for DecodeError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stream { source, stats } => write!(
                f,
                "stream failed after {} lines: {source}",
                stats.lines_scanned
            ),
            Self::Sink { source, stats } => write!(
                f,
                "batch sink failed after {} records: {source}",
                stats.matched
            ),
        }
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for DecodeError<E> {}

enum LineRead {
    Eof,
    Line,
    Oversized,
}

/// Read one `\n`-terminated line into `buf`, never buffering more than `max` bytes.
///
/// An oversized line is consumed through its newline and reported without content.
fn read_bounded_line<R: BufRead>(
    reader: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
) -> io::Result<LineRead> {
    buf.clear();
    let mut oversized = false;
    let mut read_any = false;
    loop {
        let available = match reader.fill_buf() {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(match (read_any, oversized) {
                (false, _) => LineRead::Eof,
                (true, true) => LineRead::Oversized,
                (true, false) => LineRead::Line,
            });
        }
        read_any = true;
        let (chunk, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (&available[..i], true),
            None => (available, false),
        };
        if !oversized {
            if buf.len() + chunk.len() > max {
                oversized = true;
                buf.clear();
            } else {
                buf.extend_from_slice(chunk);
            }
        }
        let used = chunk.len() + usize::from(done);
        reader.consume(used);
        if done {
            return Ok(if oversized {
                LineRead::Oversized
            } else {
                LineRead::Line
            });
        }
    }
}

fn trim_ascii(mut line: &[u8]) -> &[u8] {
    while let [first, rest @ ..] = line {
        if first.is_ascii_whitespace() {
            line = rest;
        } else {
            break;
        }
    }
    while let [rest @ .., last] = line {
        if last.is_ascii_whitespace() {
            line = rest;
        } else {
            break;
        }
    }
    line
}

/// Line-scans JSON records into fixed-size batches.
#[derive(Debug, Clone)]
pub struct BatchDecoder {
    pub batch_size: usize,
    pub max_line_bytes: usize,
    pub report_every: usize,
}

impl Default for BatchDecoder {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            report_every: DEFAULT_REPORT_EVERY,
        }
    }
}

impl BatchDecoder {
    pub fn with_batch_size(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            ..Self::default()
        }
    }

    /// Decompress a gzip stream (concatenated members allowed) and decode it.
    pub fn decode_gzip<R, T, E>(
        &self,
        reader: R,
        counter: &ByteCounter,
        predicate: impl FnMut(&T) -> bool,
        on_batch: impl FnMut(Vec<T>) -> Result<(), E>,
        pb: &ProgressBar,
    ) -> Result<DecodeStats, DecodeError<E>>
    where
        R: Read,
        T: DeserializeOwned,
    {
        let gz = MultiGzDecoder::new(reader);
        let mut buf = BufReader::with_capacity(GZIP_BUF_SIZE, gz);
        self.decode_lines(&mut buf, counter, predicate, on_batch, pb)
    }

    /// Decode newline-delimited JSON from an uncompressed reader.
    ///
    /// Malformed lines are counted and skipped; blank lines are ignored.
    /// Accepted records are handed to `on_batch` in groups of `batch_size`,
    /// with the remainder flushed at end of stream.
    pub fn decode_lines<R, T, E>(
        &self,
        reader: &mut R,
        counter: &ByteCounter,
        mut predicate: impl FnMut(&T) -> bool,
        mut on_batch: impl FnMut(Vec<T>) -> Result<(), E>,
        pb: &ProgressBar,
    ) -> Result<DecodeStats, DecodeError<E>>
    where
        R: BufRead,
        T: DeserializeOwned,
    {
        let batch_size = self.batch_size.max(1);
        let report_every = self.report_every.max(1);
        let mut stats = DecodeStats::default();
        let mut line = Vec::with_capacity(LINE_BUF_CAPACITY);
        let mut batch: Vec<T> = Vec::with_capacity(batch_size);

        loop {
            let read = match read_bounded_line(reader, &mut line, self.max_line_bytes) {
                Ok(r) => r,
                Err(source) => return Err(DecodeError::Stream { source, stats }),
            };
            match read {
                LineRead::Eof => break,
                LineRead::Oversized => {
                    stats.lines_scanned += 1;
                    stats.malformed += 1;
                    log::debug!(
                        "skipping line {} over {} bytes",
                        stats.lines_scanned,
                        self.max_line_bytes
                    );
                }
                LineRead::Line => {
                    stats.lines_scanned += 1;
                    let trimmed = trim_ascii(&line);
                    if !trimmed.is_empty() {
                        match sonic_rs::from_slice::<T>(trimmed) {
                            Ok(record) if predicate(&record) => {
                                stats.matched += 1;
                                batch.push(record);
                            }
                            Ok(_) => stats.rejected += 1,
                            Err(_) => stats.malformed += 1,
                        }
                    }
                }
            }

            if batch.len() >= batch_size {
                let full = std::mem::replace(&mut batch, Vec::with_capacity(batch_size));
                stats.batches += 1;
                if let Err(source) = on_batch(full) {
                    return Err(DecodeError::Sink { source, stats });
                }
            }

            if stats.lines_scanned.is_multiple_of(report_every) {
                pb.set_position(counter.load(Ordering::Relaxed));
                let match_pct = stats.matched as f64 / stats.lines_scanned as f64 * 100.0;
                pb.set_message(format!(
                    "{} matched ({:.1}%)",
                    fmt_num(stats.matched),
                    match_pct
                ));
                log::debug!(
                    "scanned {} lines, {} matched, {} malformed",
                    fmt_num(stats.lines_scanned),
                    fmt_num(stats.matched),
                    fmt_num(stats.malformed)
                );
            }
        }

        if !batch.is_empty() {
            stats.batches += 1;
            if let Err(source) = on_batch(batch) {
                return Err(DecodeError::Sink { source, stats });
            }
        }
        pb.set_position(counter.load(Ordering::Relaxed));
        Ok(stats)
    }
}
