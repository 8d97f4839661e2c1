use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failures from the sports-data API, split by whether retrying can help.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request succeeded but carried nothing usable.
    #[error("no data for {0}")]
    NoData(String),

    /// Timeouts, connection failures, 5xx and rate limiting after the retry.
    #[error("transient failure for {url}: {message}")]
    Transient { url: String, message: String },

    /// 4xx responses and API-level `errors` payloads.
    #[error("request rejected for {url} (status {status}): {message}")]
    Rejected {
        url: String,
        status: u16,
        message: String,
    },

    #[error("invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    /// Auto-fetch is disabled and the cache has no entry.
    #[error("{0} not cached and auto fetch is disabled")]
    NotCached(String),
}

impl ApiError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transient { .. })
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, ApiError::NoData(_) | ApiError::NotCached(_))
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("API_FOOTBALL_KEY is not set")]
    MissingApiKey,

    #[error("invalid thresholds: level1={level1}, level2={level2} (need 0 <= level1 < level2)")]
    InvalidThresholds { level1: f64, level2: f64 },

    #[error("invalid form length {0} (expected 3 or 5)")]
    InvalidFormLength(usize),

    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}
