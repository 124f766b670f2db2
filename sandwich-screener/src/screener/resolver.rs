//! Ticker resolution with source fallback.
//!
//! Sources are consulted in priority order. A dated source is asked for
//! each of the most recent `max_days` calendar days, newest first, which
//! steps over weekends and market holidays without a calendar. An undated
//! source answers once and its listing is tagged with today's date. The
//! first non-empty listing wins.

use chrono::{Duration, Local, NaiveDate};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::data::{TickerListing, TickerSource};

use super::error::ScreenError;

// ============================================================================
// Ticker Map
// ============================================================================

/// Display name to exchange code.
///
/// At most one code per name; the first insertion of a name wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerMap {
    codes: HashMap<String, String>,
}

impl TickerMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a mapping unless the name is already present.
    ///
    /// Returns `false` when an existing entry was kept.
    pub fn insert(&mut self, name: impl Into<String>, code: impl Into<String>) -> bool {
        let name = name.into();
        if self.codes.contains_key(&name) {
            return false;
        }
        self.codes.insert(name, code.into());
        true
    }

    /// Look up the code for a name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.codes.get(name).map(String::as_str)
    }

    /// Number of names.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Build from a listing, keeping the first code of a repeated name.
    pub fn from_listings(listings: Vec<TickerListing>) -> Self {
        let mut map = Self::new();
        let mut duplicates = 0usize;
        for listing in listings {
            if !map.insert(listing.name, listing.code) {
                duplicates += 1;
            }
        }
        if duplicates > 0 {
            debug!(duplicates, "Listing repeated names, kept first code");
        }
        map
    }

    /// Keep only the given names.
    pub fn retain_names<'a>(&mut self, names: impl IntoIterator<Item = &'a str>) {
        let wanted: std::collections::HashSet<&str> = names.into_iter().collect();
        self.codes.retain(|name, _| wanted.contains(name.as_str()));
    }
}

/// Result of a successful resolution.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Date the listing is valid for; end date of all price queries
    pub date: NaiveDate,
    /// Source that produced the listing
    pub source: &'static str,
    /// Size of the full listing before narrowing to the watchlist
    pub listing_size: usize,
    /// Resolved names
    pub tickers: TickerMap,
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves display names through a prioritised list of ticker sources.
pub struct TickerResolver {
    sources: Vec<Arc<dyn TickerSource>>,
    max_days: u32,
}

impl TickerResolver {
    /// Create a resolver. Sources are ordered by ascending priority.
    pub fn new(mut sources: Vec<Arc<dyn TickerSource>>, max_days: u32) -> Self {
        sources.sort_by_key(|s| s.priority());
        Self {
            sources,
            max_days: max_days.max(1),
        }
    }

    /// Names of the configured sources, in query order.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Resolve against the current local date.
    pub async fn resolve<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Resolution, ScreenError> {
        self.resolve_as_of(names, Local::now().date_naive()).await
    }

    /// Resolve as if `today` were the current date.
    ///
    /// The returned map only holds names from `names`; names missing from the
    /// listing are simply absent.
    pub async fn resolve_as_of<'a>(
        &self,
        names: impl IntoIterator<Item = &'a str>,
        today: NaiveDate,
    ) -> Result<Resolution, ScreenError> {
        let wanted: Vec<&str> = names.into_iter().collect();
        let (date, source, listings) = self.first_listing(today).await?;
        let listing_size = listings.len();

        let mut tickers = TickerMap::from_listings(listings);
        tickers.retain_names(wanted);

        info!(
            source,
            date = %date,
            listing_size,
            resolved = tickers.len(),
            "Ticker listing resolved"
        );

        Ok(Resolution {
            date,
            source,
            listing_size,
            tickers,
        })
    }

    async fn first_listing(
        &self,
        today: NaiveDate,
    ) -> Result<(NaiveDate, &'static str, Vec<TickerListing>), ScreenError> {
        for source in &self.sources {
            if source.is_dated() {
                for offset in 0..self.max_days {
                    let date = today - Duration::days(i64::from(offset));
                    let listings = self.query(source.as_ref(), date).await;
                    if !listings.is_empty() {
                        return Ok((date, source.name(), listings));
                    }
                }
                warn!(
                    source = source.name(),
                    days = self.max_days,
                    "No listing in recent days, falling back"
                );
            } else {
                let listings = self.query(source.as_ref(), today).await;
                if !listings.is_empty() {
                    return Ok((today, source.name(), listings));
                }
                warn!(source = source.name(), "Snapshot listing empty, falling back");
            }
        }

        Err(ScreenError::NoTickerListing {
            attempted: self.source_names().into_iter().map(String::from).collect(),
        })
    }

    /// A failed query counts as an empty listing.
    async fn query(&self, source: &dyn TickerSource, date: NaiveDate) -> Vec<TickerListing> {
        match source.list_tickers(date).await {
            Ok(listings) => {
                debug!(source = source.name(), date = %date, count = listings.len(), "Listing queried");
                listings
            }
            Err(e) => {
                warn!(source = source.name(), date = %date, error = %e, "Listing query failed");
                Vec::new()
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
