//! Provider trait and structured error types.
//!
//! The SeriesProvider trait abstracts over the upstream sources (Yahoo Finance,
//! CoinGecko, FRED) so the pipeline can run against any of them, and tests can
//! substitute in-memory fakes.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::domain::{ProviderId, Series, SourceRequest};

/// Structured error types for data operations.
///
/// These are designed to be displayable in both log lines and the CLI report.
#[derive(Debug, Clone, Error)]
pub enum DataError {
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable { provider: ProviderId, reason: String },

    #[error("missing configuration '{key}': {hint}")]
    Configuration { key: String, hint: String },

    #[error("timed out fetching {label} after {attempts} attempt(s)")]
    FetchTimeout { label: String, attempts: u32 },

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    /// The instrument exists but has no observations inside the window.
    #[error("no observations for {instrument} in the requested range")]
    EmptyRange { instrument: String },

    #[error("HTTP {status} from {provider}")]
    Http { provider: ProviderId, status: u16 },

    #[error("invalid series: {0}")]
    InvalidSeries(String),

    #[error("no data available from any source; check provider status and retry")]
    NoDataAvailable,

    #[error("data error: {0}")]
    Other(String),
}

/// Coarse failure category used for reporting and the propagation policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ProviderUnavailable,
    FetchTimeout,
    FetchError,
    NoDataAvailable,
    ConfigurationError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::ProviderUnavailable => "provider_unavailable",
            ErrorKind::FetchTimeout => "fetch_timeout",
            ErrorKind::FetchError => "fetch_error",
            ErrorKind::NoDataAvailable => "no_data_available",
            ErrorKind::ConfigurationError => "configuration_error",
        };
        f.write_str(s)
    }
}

impl DataError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DataError::ProviderUnavailable { .. } => ErrorKind::ProviderUnavailable,
            DataError::Configuration { .. } => ErrorKind::ConfigurationError,
            DataError::FetchTimeout { .. } => ErrorKind::FetchTimeout,
            DataError::NoDataAvailable => ErrorKind::NoDataAvailable,
            DataError::NetworkUnreachable(_)
            | DataError::RateLimited { .. }
            | DataError::ResponseFormatChanged(_)
            | DataError::SymbolNotFound { .. }
            | DataError::EmptyRange { .. }
            | DataError::Http { .. }
            | DataError::InvalidSeries(_)
            | DataError::Other(_) => ErrorKind::FetchError,
        }
    }
}

/// Trait for series providers (Yahoo Finance, CoinGecko, FRED).
///
/// Implementations own a client handle built once per process and must be
/// safe to call from several fetch threads at the same time. The cache sits
/// above this trait; providers don't know about it. Requests are issued one
/// at a time by the pipeline, which also decides what a failure excludes.
pub trait SeriesProvider: Send + Sync {
    /// Which upstream this provider talks to.
    fn id(&self) -> ProviderId;

    /// Fetch one series. The returned series is named after `request.name()`.
    fn fetch(&self, request: &SourceRequest) -> Result<Series, DataError>;
}
