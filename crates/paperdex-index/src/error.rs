//! Index error type

use paperdex_core::ApiError;

#[derive(Debug)]
pub enum IndexError {
    /// Transport or HTTP status failure talking to the index
    Api(ApiError),
    /// The index answered with something we could not interpret
    Response(String),
    /// Operation requires an index that does not exist
    MissingIndex(String),
}

impl IndexError {
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(e) => e.is_retryable(),
            Self::Response(_) | Self::MissingIndex(_) => false,
        }
    }
}

impl std::fmt::Display for IndexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api(e) => write!(f, "index request failed: {e}"),
            Self::Response(msg) => write!(f, "unexpected index response: {msg}"),
            Self::MissingIndex(name) => write!(f, "index '{name}' does not exist"),
        }
    }
}

impl std::error::Error for IndexError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ApiError> for IndexError {
    fn from(e: ApiError) -> Self {
        Self::Api(e)
    }
}
