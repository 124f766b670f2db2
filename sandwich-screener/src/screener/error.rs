//! Screening outcomes that are not matches.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Conditions that abort a whole screening run.
#[derive(Debug, Error)]
pub enum ScreenError {
    /// The watchlist could not be read.
    #[error("Watchlist unreadable: {0}")]
    WatchlistUnreadable(String),

    /// Every ticker-listing source came back empty.
    #[error("No ticker listing available (tried: {})", .attempted.join(", "))]
    NoTickerListing { attempted: Vec<String> },
}

/// Why a single watchlist entry produced no classification.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The name is absent from the resolved ticker map.
    #[error("ticker not found")]
    TickerNotFound,

    /// The price fetch failed after retries.
    #[error("data unavailable: {message}")]
    DataUnavailable { message: String },

    /// Fewer bars than the long window.
    #[error("insufficient history: {bars} bars, {required} required")]
    InsufficientHistory { bars: usize, required: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = ScreenError::NoTickerListing {
            attempted: vec!["krx_daily".into(), "krx_snapshot".into()],
        };
        assert_eq!(
            err.to_string(),
            "No ticker listing available (tried: krx_daily, krx_snapshot)"
        );

        let reason = FailureReason::InsufficientHistory {
            bars: 200,
            required: 224,
        };
        assert_eq!(reason.to_string(), "insufficient history: 200 bars, 224 required");
    }

    #[test]
    fn test_reason_serializes_with_kind_tag() {
        let json = serde_json::to_value(FailureReason::TickerNotFound).unwrap();
        assert_eq!(json["kind"], "ticker_not_found");
    }
}
