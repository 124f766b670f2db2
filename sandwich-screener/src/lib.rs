//! Sandwich Screener Library
//!
//! Screens a watchlist of KRX equities for names whose latest close sits
//! strictly between the 120-day and 224-day simple moving averages, and
//! reports the matches ordered by how often their theme tags recur.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                    sandwich-screener (one pass)                     │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────┐     │
//! │  │  Watchlist      │  │  Market Data    │  │  Notification   │     │
//! │  │  (Sheets / CSV) │  │  (KRX / Naver)  │  │  (Telegram)     │     │
//! │  └────────┬────────┘  └────────┬────────┘  └────────▲────────┘     │
//! │           └──────────▶  screener core  ─────────────┘              │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! ## Sandwich condition
//! - The last close is strictly between the short and long averages
//! - Either average may be the larger one
//! - Touching an average is not a match
//!
//! ## Resolution date
//! - The most recent day with a ticker listing, found by walking back from today
//! - Used as the end date of every price query in the run

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod notification;
pub mod screener;
pub mod watchlist;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use sandwich_common::config::Config;
use sandwich_common::logging::generate_run_id;
use std::sync::Arc;
use tracing::Instrument;

use crate::data::{PriceSeriesProvider, TickerSource};
use crate::notification::{NoopNotifier, Notifier, TelegramNotifier};
use crate::screener::{
    FrequencyRanker, RankedMatch, ReportFormat, ReportFormatter, Resolution, ScreenError,
    ScreenOutcome, ScreeningEngine, TickerResolver,
};
use crate::watchlist::{parse_rows, WatchlistEntry, WatchlistSource};

/// Everything one run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Run identifier attached to every log line of the run
    pub run_id: String,
    /// Source that produced the ticker listing
    pub listing_source: &'static str,
    /// Rendered report
    pub text: String,
    /// Matches in report order
    pub ranked: Vec<RankedMatch>,
    /// Raw engine outcome
    pub outcome: ScreenOutcome,
    /// Whether the report was delivered
    pub delivered: bool,
}

/// Screening service wiring the collaborators of one pass together.
///
/// Holds no state between runs.
pub struct ScreeningService {
    watchlist: Arc<dyn WatchlistSource>,
    resolver: TickerResolver,
    engine: ScreeningEngine,
    ranker: FrequencyRanker,
    formatter: ReportFormatter,
    notifier: Arc<dyn Notifier>,
}

impl ScreeningService {
    /// Build every collaborator from configuration.
    pub fn new(config: &Config, format: ReportFormat) -> Result<Self> {
        let watchlist = watchlist::build_watchlist_source(config)?;
        let sources = data::build_ticker_sources(config);
        let provider = data::build_price_provider(config)?;
        let notifier: Arc<dyn Notifier> = match TelegramNotifier::from_config(&config.telegram) {
            Some(telegram) => Arc::new(telegram),
            None => Arc::new(NoopNotifier),
        };

        Ok(Self::with_components(
            config, watchlist, sources, provider, notifier, format,
        ))
    }

    /// Build from explicit collaborators.
    pub fn with_components(
        config: &Config,
        watchlist: Arc<dyn WatchlistSource>,
        sources: Vec<Arc<dyn TickerSource>>,
        provider: Arc<dyn PriceSeriesProvider>,
        notifier: Arc<dyn Notifier>,
        format: ReportFormat,
    ) -> Self {
        let screener = &config.screener;
        Self {
            watchlist,
            resolver: TickerResolver::new(sources, screener.resolver_max_days),
            engine: ScreeningEngine::from_config(provider, screener),
            ranker: FrequencyRanker::new(),
            formatter: ReportFormatter::new(format, screener.max_report_chars),
            notifier,
        }
    }

    /// Replace the screening engine.
    pub fn with_engine(mut self, engine: ScreeningEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Read and parse the watchlist.
    pub async fn load_watchlist(&self) -> Result<Vec<WatchlistEntry>, ScreenError> {
        let rows = self.watchlist.get_rows().await.map_err(|e| {
            ScreenError::WatchlistUnreadable(format!("{}: {}", self.watchlist.name(), e))
        })?;
        Ok(parse_rows(rows))
    }

    /// Resolve the given watchlist against today's listing.
    pub async fn resolve(
        &self,
        watchlist: &[WatchlistEntry],
        today: NaiveDate,
    ) -> Result<Resolution, ScreenError> {
        self.resolver
            .resolve_as_of(watchlist.iter().map(|e| e.name.as_str()), today)
            .await
    }

    /// One screening pass as of the current local date.
    pub async fn run(&self, notify: bool) -> Result<RunReport, ScreenError> {
        self.run_as_of(notify, Local::now().date_naive()).await
    }

    /// One screening pass as if `today` were the current date.
    ///
    /// Fails only when the watchlist is unreadable or no ticker listing is
    /// available. A failed delivery is logged and reported through
    /// [`RunReport::delivered`].
    pub async fn run_as_of(&self, notify: bool, today: NaiveDate) -> Result<RunReport, ScreenError> {
        let run_id = generate_run_id();
        let span = sandwich_common::screening_run_span!(run_id, today = %today, notify);

        async {
            let watchlist = self.load_watchlist().await?;
            tracing::info!(entries = watchlist.len(), source = self.watchlist.name(), "Watchlist loaded");

            let resolution = self.resolve(&watchlist, today).await?;
            let outcome = self
                .engine
                .screen(&watchlist, &resolution.tickers, resolution.date)
                .await;

            let ranked = self.ranker.rank(&outcome.matches);
            let text = self.formatter.format(&ranked, resolution.date);

            let delivered = if notify && !self.notifier.delivers() {
                tracing::warn!(
                    notifier = self.notifier.name(),
                    "Notification requested but no delivery channel is configured"
                );
                false
            } else if notify {
                match self.notifier.send(&text).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::warn!(
                            notifier = self.notifier.name(),
                            error = %e,
                            "Report delivery failed"
                        );
                        false
                    }
                }
            } else {
                false
            };

            Ok::<_, ScreenError>(RunReport {
                run_id: run_id.clone(),
                listing_source: resolution.source,
                text,
                ranked,
                outcome,
                delivered,
            })
        }
        .instrument(span)
        .await
    }
}
