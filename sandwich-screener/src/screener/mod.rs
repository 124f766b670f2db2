//! Sandwich Screening Module.
//!
//! Finds watchlist names whose latest close sits strictly between their
//! short and long simple moving averages, then orders the matches by how
//! often their themes recur.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                     Sandwich screening pass                          │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │                                                                     │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐           │
//! │  │  Watchlist  │────▶│   Ticker    │────▶│  Screening  │           │
//! │  │   Source    │     │  Resolver   │     │   Engine    │           │
//! │  └─────────────┘     └─────────────┘     └──────┬──────┘           │
//! │                                                 │                   │
//! │  ┌─────────────┐     ┌─────────────┐     ┌──────▼──────┐           │
//! │  │  Notifier   │◀────│   Report    │◀────│  Frequency  │           │
//! │  │             │     │  Formatter  │     │   Ranker    │           │
//! │  └─────────────┘     └─────────────┘     └─────────────┘           │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use sandwich_screener::screener::{FrequencyRanker, ScreeningEngine, TickerResolver};
//!
//! let resolution = resolver.resolve(names).await?;
//! let outcome = engine.screen(&watchlist, &resolution.tickers, resolution.date).await;
//! let ranked = FrequencyRanker::new().rank(&outcome.matches);
//! ```

pub mod classifier;
pub mod engine;
pub mod error;
pub mod ranking;
pub mod report;
pub mod resolver;

pub use classifier::{Classification, SandwichClassifier};
pub use engine::{FailureLog, MatchResult, ScreenOutcome, ScreeningEngine};
pub use error::{FailureReason, ScreenError};
pub use ranking::{FrequencyRanker, RankedMatch};
pub use report::{ReportFormat, ReportFormatter};
pub use resolver::{Resolution, TickerMap, TickerResolver};
