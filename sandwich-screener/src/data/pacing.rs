//! Minimum-interval pacing for price fetches.
//!
//! The upstream chart endpoint is rate sensitive, so consecutive fetches are
//! spaced by at least a fixed interval. The first fetch never waits.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::provider::{PriceSeriesProvider, ProviderError};
use super::PriceSeries;

/// Wraps a provider and spaces its calls by `min_interval`.
pub struct PacedProvider {
    inner: Arc<dyn PriceSeriesProvider>,
    min_interval: Duration,
    /// Start time of the previous fetch
    last_call: Mutex<Option<Instant>>,
}

impl PacedProvider {
    /// Create a paced wrapper. A zero interval disables pacing.
    pub fn new(inner: Arc<dyn PriceSeriesProvider>, min_interval: Duration) -> Self {
        Self {
            inner,
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    /// Configured interval.
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until `min_interval` has passed since the previous call, then
    /// record this call.
    async fn wait_turn(&self) {
        let mut last = self.last_call.lock().await;

        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                debug!(
                    provider = self.inner.name(),
                    wait_ms = wait.as_millis() as u64,
                    "Pacing price fetch"
                );
                tokio::time::sleep(wait).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[async_trait]
impl PriceSeriesProvider for PacedProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        if !self.min_interval.is_zero() {
            self.wait_turn().await;
        }
        self.inner.fetch(ticker, start, end).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingProvider {
        calls: AtomicU32,
    }

    #[async_trait]
    impl PriceSeriesProvider for CountingProvider {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(
            &self,
            _ticker: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<PriceSeries, ProviderError> {
            self.calls.fetch_add(1, Ordering::Relaxed);
            Ok(PriceSeries::default())
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 3).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_consecutive_fetches_are_spaced() {
        let inner = Arc::new(CountingProvider { calls: AtomicU32::new(0) });
        let paced = PacedProvider::new(inner.clone(), Duration::from_millis(50));

        let started = Instant::now();
        for _ in 0..3 {
            paced.fetch("005930", day(), day()).await.unwrap();
        }

        assert_eq!(inner.calls.load(Ordering::Relaxed), 3);
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_never_waits() {
        let inner = Arc::new(CountingProvider { calls: AtomicU32::new(0) });
        let paced = PacedProvider::new(inner, Duration::ZERO);

        let started = Instant::now();
        paced.fetch("005930", day(), day()).await.unwrap();
        paced.fetch("005930", day(), day()).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(paced.name(), "counting");
    }
}
