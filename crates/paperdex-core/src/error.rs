//! Error type for upstream API calls

use std::time::Duration;

/// Failure of a single call against an external API.
///
/// Shared by every adapter, the bulk dataset driver and the enrichment
/// lookup so one retry policy can classify them.
#[derive(Debug)]
pub enum ApiError {
    /// HTTP 429, with the server's `Retry-After` hint when present
    RateLimited { retry_after: Option<Duration> },
    /// Non-success status (or transport failure when `status` is `None`)
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Request exceeded its per-call timeout
    Timeout,
    /// Response arrived but could not be decoded
    Decode(String),
    /// Local or stream I/O failure
    Io(std::io::Error),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RateLimited {
                retry_after: Some(d),
            } => write!(f, "rate limited (retry after {}s)", d.as_secs()),
            Self::RateLimited { retry_after: None } => write!(f, "rate limited"),
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Timeout => write!(f, "request timed out"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn from_reqwest(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Timeout;
        }
        Self::Http {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        }
    }

    pub fn decode(e: impl std::fmt::Display) -> Self {
        Self::Decode(e.to_string())
    }

    /// Transient failures worth another attempt.
    ///
    /// Client errors other than 408/425/429 mean the request itself is
    /// wrong and will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout | Self::Decode(_) => true,
            Self::Http { status: None, .. } => true,
            Self::Http {
                status: Some(s), ..
            } => matches!(s, 408 | 425 | 429) || *s >= 500,
            Self::Io(e) => e.kind() != std::io::ErrorKind::StorageFull,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::Http {
                    status: Some(429),
                    ..
                }
        )
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }

    /// HTTP status, if the failure carried one
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Http { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::TimedOut {
            return Self::Timeout;
        }
        Self::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn http_err(status: u16) -> ApiError {
        ApiError::Http {
            status: Some(status),
            message: "test".to_string(),
        }
    }

    #[test]
    fn http_4xx_not_retryable() {
        assert!(!http_err(400).is_retryable());
        assert!(!http_err(403).is_retryable());
        assert!(!http_err(404).is_retryable());
    }

    #[test]
    fn http_5xx_retryable() {
        assert!(http_err(500).is_retryable());
        assert!(http_err(503).is_retryable());
    }

    #[test]
    fn http_429_is_rate_limit() {
        let err = http_err(429);
        assert!(err.is_retryable());
        assert!(err.is_rate_limited());
        assert!(!http_err(500).is_rate_limited());
    }

    #[test]
    fn rate_limited_carries_hint() {
        let err = ApiError::RateLimited {
            retry_after: Some(Duration::from_secs(7)),
        };
        assert!(err.is_rate_limited());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(err.status(), Some(429));
        assert_eq!(format!("{err}"), "rate limited (retry after 7s)");
    }

    #[test]
    fn network_error_without_status_retryable() {
        let err = ApiError::Http {
            status: None,
            message: "connection refused".to_string(),
        };
        assert!(err.is_retryable());
        assert_eq!(format!("{err}"), "HTTP error: connection refused");
    }

    #[test]
    fn io_timeout_maps_to_timeout() {
        let err: ApiError = io::Error::new(io::ErrorKind::TimedOut, "stall").into();
        assert!(matches!(err, ApiError::Timeout));
        assert!(err.is_retryable());
    }

    #[test]
    fn io_storage_full_not_retryable() {
        let err: ApiError = io::Error::new(io::ErrorKind::StorageFull, "disk full").into();
        assert!(!err.is_retryable());
    }

    #[test]
    fn display_with_status() {
        assert_eq!(format!("{}", http_err(404)), "HTTP 404: test");
    }
}
