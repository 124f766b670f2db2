//! Moving-average "sandwich" classification.
//!
//! Only the latest observation is evaluated: the trailing simple averages
//! over the short and long windows are computed from the last bar backwards
//! and the last close must lie strictly between them.

use sandwich_common::config::ScreenerConfig;
use serde::{Deserialize, Serialize};

use crate::data::PriceSeries;

/// Numeric outputs for the last bar of a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Last close
    pub close: f64,
    /// Trailing mean over the short window
    pub ma_short: f64,
    /// Trailing mean over the long window
    pub ma_long: f64,
    /// Whether the close is strictly between the two averages
    pub matched: bool,
}

/// Evaluates the sandwich predicate over a price series.
#[derive(Debug, Clone)]
pub struct SandwichClassifier {
    short_window: usize,
    long_window: usize,
    round_before_compare: bool,
}

impl Default for SandwichClassifier {
    fn default() -> Self {
        Self::new(120, 224)
    }
}

impl SandwichClassifier {
    /// Create a classifier with the given windows and unrounded comparison.
    pub fn new(short_window: usize, long_window: usize) -> Self {
        Self {
            short_window,
            long_window,
            round_before_compare: false,
        }
    }

    /// Build from the screener configuration.
    pub fn from_config(config: &ScreenerConfig) -> Self {
        Self::new(config.short_window, config.long_window)
            .with_rounding(config.round_before_compare)
    }

    /// Round both averages to two decimals before comparing.
    pub fn with_rounding(mut self, enabled: bool) -> Self {
        self.round_before_compare = enabled;
        self
    }

    /// Minimum number of bars needed to evaluate a series.
    pub fn required_bars(&self) -> usize {
        self.short_window.max(self.long_window)
    }

    /// Compute the averages for the last bar.
    ///
    /// Returns `None` when the series is shorter than [`required_bars`](Self::required_bars).
    pub fn evaluate(&self, series: &PriceSeries) -> Option<Classification> {
        if self.short_window == 0 || series.len() < self.required_bars() {
            return None;
        }

        let closes = series.closes();
        let close = *closes.last()?;
        let mut ma_short = trailing_mean(&closes, self.short_window)?;
        let mut ma_long = trailing_mean(&closes, self.long_window)?;

        if self.round_before_compare {
            ma_short = round2(ma_short);
            ma_long = round2(ma_long);
        }

        Some(Classification {
            close,
            ma_short,
            ma_long,
            matched: is_sandwiched(close, ma_short, ma_long),
        })
    }

    /// Classification of a matching series; `None` for short or non-matching series.
    pub fn classify(&self, series: &PriceSeries) -> Option<Classification> {
        self.evaluate(series).filter(|c| c.matched)
    }
}

/// Arithmetic mean of the last `window` values.
pub fn trailing_mean(values: &[f64], window: usize) -> Option<f64> {
    if window == 0 || values.len() < window {
        return None;
    }
    let tail = &values[values.len() - window..];
    Some(tail.iter().sum::<f64>() / window as f64)
}

/// `close` lies strictly between `a` and `b`, whichever is larger.
pub fn is_sandwiched(close: f64, a: f64, b: f64) -> bool {
    (a < close && close < b) || (b < close && close < a)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Tests
// ============================================================================
