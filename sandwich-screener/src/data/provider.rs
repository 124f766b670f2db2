//! Source abstractions for ticker listings and daily price series.
//!
//! The screening core only talks to these traits; HTTP adapters and test
//! doubles implement them.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::fmt;

use super::{PriceSeries, TickerListing};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to external data sources.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    Network(String),
    /// Rate limit exceeded
    RateLimited { retry_after_secs: Option<u64> },
    /// Data not available for the requested symbol/date
    DataNotAvailable(String),
    /// Source is temporarily unavailable
    Unavailable(String),
    /// Invalid request parameters
    InvalidRequest(String),
    /// Unexpected payload or internal failure
    Internal(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network error: {}", msg),
            Self::RateLimited { retry_after_secs } => {
                write!(f, "Rate limited")?;
                if let Some(secs) = retry_after_secs {
                    write!(f, ", retry after {} seconds", secs)?;
                }
                Ok(())
            }
            Self::DataNotAvailable(msg) => write!(f, "Data not available: {}", msg),
            Self::Unavailable(msg) => write!(f, "Source unavailable: {}", msg),
            Self::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ProviderError {}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }

    /// Map a non-success HTTP status to a provider error.
    pub fn from_status(status: reqwest::StatusCode, context: &str) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            Self::RateLimited {
                retry_after_secs: None,
            }
        } else if status.is_server_error() {
            Self::Unavailable(format!("{}: HTTP {}", context, status))
        } else if status == reqwest::StatusCode::NOT_FOUND {
            Self::DataNotAvailable(format!("{}: HTTP {}", context, status))
        } else {
            Self::InvalidRequest(format!("{}: HTTP {}", context, status))
        }
    }

    /// Map a transport error to a provider error.
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Internal(format!("Failed to decode response: {}", err))
        } else {
            Self::Network(err.to_string())
        }
    }
}

// ============================================================================
// Source Traits
// ============================================================================

/// A source of exchange code ↔ display name listings.
///
/// Sources are tried in priority order by the ticker resolver until one
/// returns a non-empty listing.
#[async_trait]
pub trait TickerSource: Send + Sync {
    /// Source name (e.g. "krx_daily")
    fn name(&self) -> &'static str;

    /// Priority (lower = tried first)
    fn priority(&self) -> u8;

    /// Whether the listing depends on the requested trading date.
    ///
    /// Dated sources are walked back day by day; undated sources are asked
    /// once and their answer is tagged with today's date.
    fn is_dated(&self) -> bool;

    /// List all tickers for `date`. Undated sources ignore the date.
    ///
    /// An empty listing is a valid answer (market holiday, weekend).
    async fn list_tickers(&self, date: NaiveDate) -> Result<Vec<TickerListing>, ProviderError>;
}

/// A source of daily OHLCV series.
///
/// Implementations return whatever bars exist in `[start, end]` without
/// padding or resampling; callers decide whether the history is sufficient.
#[async_trait]
pub trait PriceSeriesProvider: Send + Sync {
    /// Provider name (e.g. "naver")
    fn name(&self) -> &'static str;

    /// Fetch daily bars for `ticker` between `start` and `end` inclusive.
    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================
