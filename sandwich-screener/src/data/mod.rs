//! Market data module for KRX equities.
//!
//! Provides the daily price series model, the source traits the screening
//! core depends on, and the concrete HTTP adapters.
//!
//! # Data Sources
//! - **KRX daily listing** (primary): ticker listing for a given trading date
//! - **KRX snapshot listing** (fallback): current full listing, no date
//! - **Naver chart** (prices): daily OHLCV series for one ticker

mod krx;
mod naver;
mod pacing;
mod provider;

pub use krx::{KrxDailyListing, KrxSnapshotListing};
pub use naver::NaverDailyChart;
pub use pacing::PacedProvider;
pub use provider::{PriceSeriesProvider, ProviderError, TickerSource};

use anyhow::{bail, Result};
use chrono::NaiveDate;
use sandwich_common::config::Config;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

// ============================================================================
// Core Data Types
// ============================================================================

/// One daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Trading date
    pub date: NaiveDate,
    /// Open price
    #[serde(default)]
    pub open: Option<f64>,
    /// High price
    #[serde(default)]
    pub high: Option<f64>,
    /// Low price
    #[serde(default)]
    pub low: Option<f64>,
    /// Close price
    pub close: f64,
    /// Volume
    #[serde(default)]
    pub volume: Option<f64>,
}

impl Bar {
    /// A bar that only carries a close price.
    pub fn close_only(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: None,
            high: None,
            low: None,
            close,
            volume: None,
        }
    }
}

/// Daily bars ordered ascending by date with no duplicate dates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a series, sorting by date and keeping the first bar of any
    /// repeated date.
    pub fn new(mut bars: Vec<Bar>) -> Self {
        // Stable sort keeps the provider's first bar ahead of later duplicates.
        bars.sort_by_key(|b| b.date);
        let before = bars.len();
        bars.dedup_by_key(|b| b.date);
        if bars.len() != before {
            debug!(dropped = before - bars.len(), "Dropped duplicate-date bars");
        }
        Self { bars }
    }

    /// Number of bars.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the series has no bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// All bars, oldest first.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// The most recent bar.
    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    /// Close prices, oldest first.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }
}

/// One row of a ticker listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerListing {
    /// Exchange code (e.g. "005930")
    pub code: String,
    /// Display name (e.g. "삼성전자")
    pub name: String,
}

impl TickerListing {
    /// Create a listing row.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

// ============================================================================
// Construction from configuration
// ============================================================================

/// Shared HTTP client with the configured timeout.
pub(crate) fn http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7)")
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Build the enabled ticker-listing sources in priority order.
///
/// Unknown provider names are skipped with a warning.
pub fn build_ticker_sources(config: &Config) -> Vec<Arc<dyn TickerSource>> {
    let ds = &config.data_sources;
    let client = http_client(ds.timeout_secs);
    let mut sources: Vec<Arc<dyn TickerSource>> = Vec::new();

    for entry in ds.enabled_listing() {
        match entry.provider.as_str() {
            "krx_daily" => sources.push(Arc::new(KrxDailyListing::new(
                client.clone(),
                &ds.krx_base_url,
                entry.priority,
            ))),
            "krx_snapshot" => sources.push(Arc::new(KrxSnapshotListing::new(
                client.clone(),
                &ds.krx_base_url,
                entry.priority,
            ))),
            other => warn!(provider = other, "Unknown listing provider, skipping"),
        }
    }

    sources
}

/// Build the price provider, wrapped with the configured pacing delay.
pub fn build_price_provider(config: &Config) -> Result<Arc<dyn PriceSeriesProvider>> {
    let ds = &config.data_sources;
    let inner: Arc<dyn PriceSeriesProvider> = match ds.price_provider.as_str() {
        "naver" => Arc::new(NaverDailyChart::new(
            http_client(ds.timeout_secs),
            &ds.naver_base_url,
        )),
        other => bail!("Unknown price provider: {}", other),
    };

    Ok(Arc::new(PacedProvider::new(
        inner,
        Duration::from_millis(config.screener.pacing_ms),
    )))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_price_series_sorts_and_dedups() {
        let series = PriceSeries::new(vec![
            Bar::close_only(d(2024, 1, 3), 30.0),
            Bar::close_only(d(2024, 1, 2), 20.0),
            Bar::close_only(d(2024, 1, 3), 99.0),
            Bar::close_only(d(2024, 1, 1), 10.0),
        ]);

        assert_eq!(series.len(), 3);
        assert_eq!(series.closes(), vec![10.0, 20.0, 30.0]);
        assert_eq!(series.last().unwrap().date, d(2024, 1, 3));
    }

    #[test]
    fn test_empty_series() {
        let series = PriceSeries::new(vec![]);
        assert!(series.is_empty());
        assert!(series.last().is_none());
    }

    #[test]
    fn test_build_ticker_sources_respects_priority() {
        let mut config = Config::default();
        config.data_sources.listing[0].priority = 9;
        let sources = build_ticker_sources(&config);
        let names: Vec<_> = sources.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["krx_snapshot", "krx_daily"]);
    }

    #[test]
    fn test_build_price_provider_rejects_unknown() {
        let mut config = Config::default();
        config.data_sources.price_provider = "bloomberg".into();
        assert!(build_price_provider(&config).is_err());

        config.data_sources.price_provider = "naver".into();
        assert_eq!(build_price_provider(&config).unwrap().name(), "naver");
    }
}
