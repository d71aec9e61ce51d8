//! Paperdex Core - shared infrastructure for paper ingestion pipelines
//!
//! This crate provides the canonical paper record every source adapter
//! converges on, plus the reusable plumbing the drivers are built from:
//! HTTP streaming, retry policy, the gzip JSON-lines batch decoder,
//! the resumable cursor driver and progress/logging helpers.

pub mod cursor;
pub mod decoder;
pub mod error;
pub mod ids;
pub mod logging;
pub mod progress;
pub mod record;
pub mod retry;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod stream;
pub mod throttle;

// Re-exports for convenience
pub use cursor::{
    CursorDriver, CursorRun, DriverConfig, Page, PageSource, RunStatus, START_CURSOR,
};
pub use decoder::{BatchDecoder, DecodeError, DecodeStats};
pub use error::ApiError;
pub use ids::{
    Identity, arxiv_id_from_url, normalize_arxiv_id, normalize_doi, resolve_arxiv_id, strip_version,
};
pub use logging::{IndicatifLogger, init_logging};
pub use progress::{
    IngestProgress, ProgressContext, SharedProgress, fmt_duration, fmt_num, upgrade_to_bar,
};
pub use record::{Author, Paper, Source, dedup_ordered, document_id, parse_iso_date};
pub use retry::{Backoff, RetryError, RetryPolicy, Retryable};
pub use shutdown::{FORCED_EXIT_CODE, ShutdownFlag};
pub use sink::{FnSink, PaperSink, PartialWrite, Tee, accepted_before_failure};
pub use source::{PaperSource, SearchResults};
pub use stream::{
    ByteCounter, CountingReader, HttpConfig, HttpReader, RawResponse, SHARED_RUNTIME, http_client,
    http_config, open_http_reader, send, send_json, send_text, set_http_config,
};
pub use throttle::Throttle;
