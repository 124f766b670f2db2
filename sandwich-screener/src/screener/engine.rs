//! Screening engine module.
//!
//! Walks the watchlist in order, one entry at a time: look up the ticker,
//! fetch the daily series, classify the last bar. Every per-entry problem
//! becomes a [`FailureLog`]; nothing short of a fatal precondition stops
//! the batch.

use chrono::{DateTime, Duration as DateSpan, NaiveDate, Utc};
use sandwich_common::config::ScreenerConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::data::{PriceSeries, PriceSeriesProvider, ProviderError};
use crate::watchlist::WatchlistEntry;

use super::classifier::{Classification, SandwichClassifier};
use super::error::FailureReason;
use super::resolver::TickerMap;

/// Base delay between fetch retries; multiplied by the attempt number.
const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_millis(500);

// ============================================================================
// Results
// ============================================================================

/// A watchlist entry whose last close sits between its two averages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// Display name
    pub name: String,
    /// Exchange code
    pub ticker: String,
    /// Primary theme
    pub theme1: String,
    /// Secondary theme
    pub theme2: String,
    /// Tertiary theme
    pub theme3: String,
    /// Last close
    pub close: f64,
    /// Short-window average
    pub ma_short: f64,
    /// Long-window average
    pub ma_long: f64,
}

impl MatchResult {
    fn new(entry: &WatchlistEntry, ticker: &str, c: Classification) -> Self {
        Self {
            name: entry.name.clone(),
            ticker: ticker.to_string(),
            theme1: entry.theme1.clone(),
            theme2: entry.theme2.clone(),
            theme3: entry.theme3.clone(),
            close: c.close,
            ma_short: c.ma_short,
            ma_long: c.ma_long,
        }
    }
}

/// One skipped watchlist entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureLog {
    /// Display name
    pub name: String,
    /// Exchange code, when resolution got that far
    pub ticker: Option<String>,
    /// What went wrong
    pub reason: FailureReason,
}

/// Everything one screening pass produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenOutcome {
    /// End date of every price query
    pub resolution_date: NaiveDate,
    /// Matches in watchlist order
    pub matches: Vec<MatchResult>,
    /// Skipped entries in watchlist order
    pub failures: Vec<FailureLog>,
    /// Watchlist size
    pub total_entries: usize,
    /// Start time
    pub started_at: DateTime<Utc>,
    /// End time
    pub completed_at: DateTime<Utc>,
}

impl ScreenOutcome {
    /// Wall-clock duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.completed_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Screened {} entries as of {} in {:.1}s: {} matched, {} skipped",
            self.total_entries,
            self.resolution_date,
            self.duration_secs(),
            self.matches.len(),
            self.failures.len()
        )
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Sequential screening over a watchlist.
pub struct ScreeningEngine {
    provider: Arc<dyn PriceSeriesProvider>,
    classifier: SandwichClassifier,
    lookback_days: u32,
    fetch_retries: u32,
    retry_backoff: Duration,
}

impl ScreeningEngine {
    /// Create an engine with default lookback and retry settings.
    pub fn new(provider: Arc<dyn PriceSeriesProvider>, classifier: SandwichClassifier) -> Self {
        let defaults = ScreenerConfig::default();
        Self {
            provider,
            classifier,
            lookback_days: defaults.lookback_days,
            fetch_retries: defaults.fetch_retries,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
        }
    }

    /// Build from the screener configuration.
    pub fn from_config(provider: Arc<dyn PriceSeriesProvider>, config: &ScreenerConfig) -> Self {
        Self::new(provider, SandwichClassifier::from_config(config))
            .with_lookback_days(config.lookback_days)
            .with_retries(config.fetch_retries, DEFAULT_RETRY_BACKOFF)
    }

    /// Calendar days of history requested before the resolution date.
    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// Retries after a recoverable fetch error, and the linear backoff step.
    pub fn with_retries(mut self, retries: u32, backoff: Duration) -> Self {
        self.fetch_retries = retries;
        self.retry_backoff = backoff;
        self
    }

    /// First date of every price query for the given resolution date.
    pub fn start_date(&self, resolution_date: NaiveDate) -> NaiveDate {
        resolution_date - DateSpan::days(i64::from(self.lookback_days))
    }

    /// Screen the whole watchlist.
    pub async fn screen(
        &self,
        watchlist: &[WatchlistEntry],
        tickers: &TickerMap,
        resolution_date: NaiveDate,
    ) -> ScreenOutcome {
        let started_at = Utc::now();
        let start = self.start_date(resolution_date);
        let mut matches = Vec::new();
        let mut failures = Vec::new();

        info!(
            entries = watchlist.len(),
            start = %start,
            end = %resolution_date,
            "Screening watchlist"
        );

        for entry in watchlist {
            match self.screen_entry(entry, tickers, start, resolution_date).await {
                Ok(Some(found)) => {
                    info!(
                        name = %found.name,
                        ticker = %found.ticker,
                        close = found.close,
                        ma_short = found.ma_short,
                        ma_long = found.ma_long,
                        "Sandwich match"
                    );
                    matches.push(found);
                }
                Ok(None) => {}
                Err(reason) => {
                    warn!(name = %entry.name, reason = %reason, "Entry skipped");
                    failures.push(FailureLog {
                        name: entry.name.clone(),
                        ticker: tickers.get(&entry.name).map(String::from),
                        reason,
                    });
                }
            }
        }

        let outcome = ScreenOutcome {
            resolution_date,
            matches,
            failures,
            total_entries: watchlist.len(),
            started_at,
            completed_at: Utc::now(),
        };
        info!("{}", outcome.summary());
        outcome
    }

    /// Screen one entry. `Ok(None)` means it was evaluated and did not match.
    pub async fn screen_entry(
        &self,
        entry: &WatchlistEntry,
        tickers: &TickerMap,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Option<MatchResult>, FailureReason> {
        let ticker = tickers
            .get(&entry.name)
            .ok_or(FailureReason::TickerNotFound)?;

        let series = self
            .fetch_with_retry(ticker, start, end)
            .await
            .map_err(|e| FailureReason::DataUnavailable {
                message: e.to_string(),
            })?;

        let required = self.classifier.required_bars();
        if series.len() < required {
            return Err(FailureReason::InsufficientHistory {
                bars: series.len(),
                required,
            });
        }

        let Some(classification) = self.classifier.evaluate(&series) else {
            return Ok(None);
        };
        debug!(
            name = %entry.name,
            ticker,
            bars = series.len(),
            close = classification.close,
            ma_short = classification.ma_short,
            ma_long = classification.ma_long,
            matched = classification.matched,
            "Classified"
        );

        Ok(classification
            .matched
            .then(|| MatchResult::new(entry, ticker, classification)))
    }

    async fn fetch_with_retry(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            match self.provider.fetch(ticker, start, end).await {
                Ok(series) => return Ok(series),
                Err(e) if e.is_recoverable() && attempt <= self.fetch_retries => {
                    let delay = match e {
                        ProviderError::RateLimited {
                            retry_after_secs: Some(secs),
                        } => Duration::from_secs(secs),
                        _ => self.retry_backoff * attempt,
                    };
                    warn!(
                        ticker,
                        attempt,
                        max_retries = self.fetch_retries,
                        error = %e,
                        "Price fetch failed, retrying..."
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Bar;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Serves canned results per ticker; a queue of errors is returned first.
    #[derive(Default)]
    struct ScriptedProvider {
        closes: HashMap<String, Vec<f64>>,
        errors: Mutex<HashMap<String, Vec<ProviderError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn with_series(mut self, ticker: &str, closes: Vec<f64>) -> Self {
            self.closes.insert(ticker.to_string(), closes);
            self
        }

        fn with_errors(self, ticker: &str, errors: Vec<ProviderError>) -> Self {
            self.errors.lock().unwrap().insert(ticker.to_string(), errors);
            self
        }
    }

    #[async_trait]
    impl PriceSeriesProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn fetch(
            &self,
            ticker: &str,
            _start: NaiveDate,
            end: NaiveDate,
        ) -> Result<PriceSeries, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(queue) = self.errors.lock().unwrap().get_mut(ticker) {
                if !queue.is_empty() {
                    return Err(queue.remove(0));
                }
            }
            let closes = self
                .closes
                .get(ticker)
                .ok_or_else(|| ProviderError::DataNotAvailable(ticker.to_string()))?;
            let n = closes.len() as i64;
            Ok(PriceSeries::new(
                closes
                    .iter()
                    .enumerate()
                    .map(|(i, c)| Bar::close_only(end - DateSpan::days(n - 1 - i as i64), *c))
                    .collect(),
            ))
        }
    }

    fn entry(name: &str, theme1: &str) -> WatchlistEntry {
        WatchlistEntry::new(name, theme1, "", "")
    }

    fn sandwiched() -> Vec<f64> {
        let mut closes = vec![50.0; 104];
        closes.extend(std::iter::repeat(120.0).take(119));
        closes.push(100.0);
        closes
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()
    }

    fn engine(provider: Arc<ScriptedProvider>) -> ScreeningEngine {
        ScreeningEngine::new(provider, SandwichClassifier::default())
            .with_retries(2, Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_screen_collects_matches_and_failures_in_order() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .with_series("000001", sandwiched())
                .with_series("000002", vec![100.0; 224])
                .with_series("000003", vec![100.0; 200]),
        );
        let mut tickers = TickerMap::new();
        tickers.insert("Acme", "000001");
        tickers.insert("Flat", "000002");
        tickers.insert("Young", "000003");

        let watchlist = vec![
            entry("Acme", "Tech"),
            entry("Ghost", "Bio"),
            entry("Flat", "Tech"),
            entry("Young", "Bio"),
        ];

        let outcome = engine(provider.clone()).screen(&watchlist, &tickers, date()).await;

        assert_eq!(outcome.total_entries, 4);
        assert_eq!(outcome.matches.len(), 1);
        assert_eq!(outcome.matches[0].name, "Acme");
        assert_eq!(outcome.matches[0].ticker, "000001");
        assert_eq!(outcome.matches[0].theme1, "Tech");

        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.failures[0].name, "Ghost");
        assert_eq!(outcome.failures[0].reason, FailureReason::TickerNotFound);
        assert!(outcome.failures[0].ticker.is_none());
        assert_eq!(outcome.failures[1].ticker.as_deref(), Some("000003"));
        assert_eq!(
            outcome.failures[1].reason,
            FailureReason::InsufficientHistory {
                bars: 200,
                required: 224
            }
        );
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recoverable_errors_are_retried() {
        let provider = Arc::new(
            ScriptedProvider::default()
                .with_series("000001", sandwiched())
                .with_errors(
                    "000001",
                    vec![
                        ProviderError::Network("reset".into()),
                        ProviderError::Unavailable("503".into()),
                    ],
                ),
        );
        let mut tickers = TickerMap::new();
        tickers.insert("Acme", "000001");

        let outcome = engine(provider.clone())
            .screen(&[entry("Acme", "Tech")], &tickers, date())
            .await;

        assert_eq!(outcome.matches.len(), 1);
        assert!(outcome.failures.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_exhausted_becomes_failure() {
        let provider = Arc::new(ScriptedProvider::default().with_errors(
            "000001",
            vec![
                ProviderError::Network("a".into()),
                ProviderError::Network("b".into()),
                ProviderError::Network("c".into()),
            ],
        ));
        let mut tickers = TickerMap::new();
        tickers.insert("Acme", "000001");

        let outcome = engine(provider.clone())
            .screen(&[entry("Acme", "Tech")], &tickers, date())
            .await;

        assert!(outcome.matches.is_empty());
        assert!(matches!(
            outcome.failures[0].reason,
            FailureReason::DataUnavailable { .. }
        ));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_recoverable_error_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::default().with_errors(
            "000001",
            vec![ProviderError::InvalidRequest("bad symbol".into())],
        ));
        let mut tickers = TickerMap::new();
        tickers.insert("Acme", "000001");

        let outcome = engine(provider.clone())
            .screen(&[entry("Acme", "Tech")], &tickers, date())
            .await;

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_start_date_uses_lookback() {
        let provider = Arc::new(ScriptedProvider::default());
        let engine = engine(provider).with_lookback_days(450);
        assert_eq!(
            engine.start_date(date()),
            NaiveDate::from_ymd_opt(2022, 10, 12).unwrap()
        );
    }

    #[test]
    fn test_outcome_summary() {
        let now = Utc::now();
        let outcome = ScreenOutcome {
            resolution_date: date(),
            matches: Vec::new(),
            failures: Vec::new(),
            total_entries: 3,
            started_at: now,
            completed_at: now,
        };
        assert_eq!(
            outcome.summary(),
            "Screened 3 entries as of 2024-01-05 in 0.0s: 0 matched, 0 skipped"
        );
    }
}
