//! Watchlist sources.
//!
//! A watchlist is an ordered table whose first row is a header and whose
//! remaining rows are `[name, theme1, theme2, theme3, ...]`. Sources only
//! return raw rows; [`parse_rows`] turns them into entries.

mod file;
mod google_auth;
mod sheets;

pub use file::FileWatchlist;
pub use google_auth::{ServiceAccountAuth, ServiceAccountKey, SHEETS_READONLY_SCOPE};
pub use sheets::{GoogleSheetsWatchlist, SheetsAuth};

use anyhow::{bail, Result};
use async_trait::async_trait;
use sandwich_common::config::{Config, WatchlistKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::data::ProviderError;

/// One watchlist row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistEntry {
    /// Display name, trimmed
    pub name: String,
    /// Primary theme, empty when absent
    #[serde(default)]
    pub theme1: String,
    /// Secondary theme
    #[serde(default)]
    pub theme2: String,
    /// Tertiary theme
    #[serde(default)]
    pub theme3: String,
}

impl WatchlistEntry {
    /// Create an entry, trimming every field.
    pub fn new(
        name: impl AsRef<str>,
        theme1: impl AsRef<str>,
        theme2: impl AsRef<str>,
        theme3: impl AsRef<str>,
    ) -> Self {
        Self {
            name: name.as_ref().trim().to_string(),
            theme1: theme1.as_ref().trim().to_string(),
            theme2: theme2.as_ref().trim().to_string(),
            theme3: theme3.as_ref().trim().to_string(),
        }
    }
}

/// Read access to a watchlist table.
#[async_trait]
pub trait WatchlistSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &'static str;

    /// All rows including the header row.
    async fn get_rows(&self) -> Result<Vec<Vec<String>>, ProviderError>;
}

/// Convert raw rows into entries.
///
/// The first row is a header and is skipped. Rows with an empty name are
/// skipped. A repeated name keeps its first row.
pub fn parse_rows(rows: Vec<Vec<String>>) -> Vec<WatchlistEntry> {
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    for row in rows.into_iter().skip(1) {
        let cell = |idx: usize| row.get(idx).map(String::as_str).unwrap_or("");
        let entry = WatchlistEntry::new(cell(0), cell(1), cell(2), cell(3));

        if entry.name.is_empty() {
            continue;
        }
        if !seen.insert(entry.name.clone()) {
            warn!(name = %entry.name, "Duplicate watchlist row dropped");
            continue;
        }
        entries.push(entry);
    }

    debug!(entries = entries.len(), "Watchlist parsed");
    entries
}

/// Build the configured watchlist source.
pub fn build_watchlist_source(config: &Config) -> Result<Arc<dyn WatchlistSource>> {
    let wl = &config.watchlist;
    match wl.kind {
        WatchlistKind::GoogleSheets => {
            let Some(spreadsheet_id) = wl.spreadsheet_id.as_deref() else {
                bail!("watchlist.spreadsheet_id is not set");
            };
            let client = crate::data::http_client(config.data_sources.timeout_secs);
            let auth = match (
                wl.service_account.as_deref(),
                wl.access_token.as_deref(),
                wl.api_key.as_deref(),
            ) {
                (Some(account), _, _) => {
                    let account = ServiceAccountAuth::from_json(client.clone(), account)?;
                    debug!(client_email = account.client_email(), "Using service-account credentials");
                    SheetsAuth::ServiceAccount(Arc::new(account))
                }
                (None, Some(token), _) => SheetsAuth::Bearer(token.to_string()),
                (None, None, Some(key)) => SheetsAuth::ApiKey(key.to_string()),
                (None, None, None) => {
                    bail!("watchlist needs a service_account, access_token or api_key")
                }
            };
            Ok(Arc::new(GoogleSheetsWatchlist::new(
                client,
                &wl.sheets_base_url,
                spreadsheet_id,
                &wl.range,
                auth,
            )))
        }
        WatchlistKind::File => {
            let Some(path) = wl.path.as_ref() else {
                bail!("watchlist.path is not set");
            };
            Ok(Arc::new(FileWatchlist::new(path)))
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
