//! HTTP plumbing: shared client, per-call timeouts and streamed bodies.
//!
//! Uses async reqwest internally with tokio::time::timeout, but presents a
//! sync interface since every driver is a sequential control loop.

use std::io::{self, Read};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, OnceLock};
use std::task::Context;
use std::time::Duration;

use futures_util::StreamExt;
use serde::de::DeserializeOwned;
use tokio::io::{AsyncRead, ReadBuf};

use crate::error::ApiError;

/// Connect timeout
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest body excerpt kept in an error message
const ERROR_BODY_LIMIT: usize = 300;

/// Per-call HTTP limits, set once at startup from config.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Whole-request timeout for API calls (not for streamed downloads)
    pub request_timeout: Duration,
    /// Streamed body stall timeout: no bytes for this long = failure
    pub read_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(60),
            read_timeout: Duration::from_secs(10),
        }
    }
}

static HTTP_CONFIG: OnceLock<HttpConfig> = OnceLock::new();

/// Install the process-wide HTTP limits. Later calls are ignored.
pub fn set_http_config(config: HttpConfig) {
    if HTTP_CONFIG.set(config).is_err() {
        log::debug!("HTTP config already set, keeping the first one");
    }
}

pub fn http_config() -> &'static HttpConfig {
    HTTP_CONFIG.get_or_init(HttpConfig::default)
}

/// Shared async HTTP client with connection pooling.
static SHARED_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .pool_max_idle_per_host(8)
        .user_agent(concat!("paperdex/", env!("CARGO_PKG_VERSION")))
        .build()
        .expect("failed to build HTTP client")
});

/// Get shared HTTP client.
pub fn http_client() -> &'static reqwest::Client {
    &SHARED_CLIENT
}

/// Shared tokio runtime for HTTP operations.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Status and body of a completed request, before success checking.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<Duration>,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of a 2xx response; 429 becomes `RateLimited`, anything else `Http`.
    pub fn into_success(self) -> Result<String, ApiError> {
        if self.is_success() {
            return Ok(self.body);
        }
        if self.status == 429 {
            return Err(ApiError::RateLimited {
                retry_after: self.retry_after,
            });
        }
        Err(ApiError::Http {
            status: Some(self.status),
            message: truncate(&self.body, ERROR_BODY_LIMIT).to_string(),
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// `Retry-After` in its delta-seconds form; HTTP-date values are ignored.
fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Send a request and read the whole body under the per-call timeout.
pub fn send(request: reqwest::RequestBuilder) -> Result<RawResponse, ApiError> {
    let timeout = http_config().request_timeout;
    SHARED_RUNTIME.handle().block_on(async move {
        let call = async {
            let response = request
                .send()
                .await
                .map_err(|e| ApiError::from_reqwest(&e))?;
            let status = response.status().as_u16();
            let retry_after = parse_retry_after(response.headers());
            let body = response
                .text()
                .await
                .map_err(|e| ApiError::from_reqwest(&e))?;
            Ok::<_, ApiError>(RawResponse {
                status,
                body,
                retry_after,
            })
        };
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ApiError::Timeout),
        }
    })
}

/// Send and return the body of a successful response.
pub fn send_text(request: reqwest::RequestBuilder) -> Result<String, ApiError> {
    send(request)?.into_success()
}

/// Send and decode a successful JSON response.
pub fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T, ApiError> {
    let body = send_text(request)?;
    serde_json::from_str(&body).map_err(ApiError::decode)
}

/// Shared byte counter for progress tracking
pub type ByteCounter = Arc<AtomicU64>;

/// Raw (still compressed) HTTP body as a sync reader with byte counting
pub type HttpReader = CountingReader<TimeoutReader>;

/// HTTP GET → sync reader over the raw body with byte counter.
///
/// Returns (reader, byte_counter, total_bytes). Decompression is left to
/// the caller so local files and remote files share one decode path.
pub fn open_http_reader(url: &str) -> Result<(HttpReader, ByteCounter, Option<u64>), ApiError> {
    let url = url.to_string();

    let (reader, total_bytes) = SHARED_RUNTIME.handle().block_on(async {
        let response = SHARED_CLIENT
            .get(&url)
            .send()
            .await
            .map_err(|e| ApiError::from_reqwest(&e))?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(ApiError::RateLimited {
                retry_after: parse_retry_after(response.headers()),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Http {
                status: Some(status.as_u16()),
                message: format!("GET {url}"),
            });
        }

        let total_bytes = response
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());

        // Convert response body stream to AsyncRead
        let stream = response.bytes_stream();
        let async_reader = tokio_util::io::StreamReader::new(
            stream.map(|result| result.map_err(io::Error::other)),
        );

        Ok::<_, ApiError>((
            TimeoutReader::new(Box::pin(async_reader), http_config().read_timeout),
            total_bytes,
        ))
    })?;

    let counter = Arc::new(AtomicU64::new(0));
    let counting_reader = CountingReader::new(reader, counter.clone());
    Ok((counting_reader, counter, total_bytes))
}

/// Reader wrapper that tracks bytes read
pub struct CountingReader<R> {
    inner: R,
    count: ByteCounter,
}

impl<R> CountingReader<R> {
    pub fn new(inner: R, count: ByteCounter) -> Self {
        Self { inner, count }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}

/// Async-to-sync bridge with read timeout.
///
/// Each read has its own deadline; a stalled body surfaces as
/// `ErrorKind::TimedOut`, which the retry policy treats as transient.
pub struct TimeoutReader {
    inner: Pin<Box<dyn AsyncRead + Send + Sync>>,
    timeout: Duration,
}

impl TimeoutReader {
    fn new(inner: Pin<Box<dyn AsyncRead + Send + Sync>>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl Read for TimeoutReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let timeout = self.timeout;
        SHARED_RUNTIME.handle().block_on(async {
            let read_future = async {
                let mut read_buf = ReadBuf::new(buf);
                std::future::poll_fn(|cx: &mut Context<'_>| {
                    Pin::as_mut(&mut self.inner).poll_read(cx, &mut read_buf)
                })
                .await?;
                Ok::<_, io::Error>(read_buf.filled().len())
            };

            match tokio::time::timeout(timeout, read_future).await {
                Ok(result) => result,
                Err(_) => Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("read timeout ({}s with no data)", timeout.as_secs()),
                )),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(status: u16, body: &str) -> RawResponse {
        RawResponse {
            status,
            body: body.to_string(),
            retry_after: None,
        }
    }

    #[test]
    fn success_returns_body() {
        assert_eq!(raw(200, "ok").into_success().unwrap(), "ok");
        assert_eq!(raw(204, "").into_success().unwrap(), "");
    }

    #[test]
    fn status_429_becomes_rate_limited() {
        let resp = RawResponse {
            status: 429,
            body: String::new(),
            retry_after: Some(Duration::from_secs(3)),
        };
        let err = resp.into_success().unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn error_body_is_truncated() {
        let body = "x".repeat(ERROR_BODY_LIMIT * 3);
        match raw(500, &body).into_success().unwrap_err() {
            ApiError::Http { status, message } => {
                assert_eq!(status, Some(500));
                assert_eq!(message.len(), ERROR_BODY_LIMIT);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn truncate_respects_char_boundary() {
        assert_eq!(truncate("héllo", 2), "h");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn retry_after_parses_seconds_only() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "12".parse().unwrap());
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));

        headers.insert(
            reqwest::header::RETRY_AFTER,
            "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap(),
        );
        assert_eq!(parse_retry_after(&headers), None);
    }

    #[test]
    fn counting_reader_counts() {
        let counter = Arc::new(AtomicU64::new(0));
        let mut reader = CountingReader::new(&b"hello world"[..], counter.clone());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(counter.load(Ordering::Relaxed), 11);
    }
}
