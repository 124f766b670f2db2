//! Google Sheets watchlist through the Sheets v4 values endpoint.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use super::google_auth::ServiceAccountAuth;
use super::WatchlistSource;
use crate::data::ProviderError;

/// Credentials for the values endpoint.
#[derive(Debug, Clone)]
pub enum SheetsAuth {
    /// `key=` query parameter; the sheet must be link-readable
    ApiKey(String),
    /// OAuth bearer token
    Bearer(String),
    /// Tokens issued for a service account, refreshed on expiry
    ServiceAccount(Arc<ServiceAccountAuth>),
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

/// Reads a worksheet range as rows of strings.
pub struct GoogleSheetsWatchlist {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    range: String,
    auth: SheetsAuth,
}

impl GoogleSheetsWatchlist {
    /// Create the source.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        spreadsheet_id: &str,
        range: &str,
        auth: SheetsAuth,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            range: range.to_string(),
            auth,
        }
    }

    fn values_url(&self) -> String {
        format!(
            "{}/v4/spreadsheets/{}/values/{}",
            self.base_url, self.spreadsheet_id, self.range
        )
    }
}

#[async_trait]
impl WatchlistSource for GoogleSheetsWatchlist {
    fn name(&self) -> &'static str {
        "google_sheets"
    }

    async fn get_rows(&self) -> Result<Vec<Vec<String>>, ProviderError> {
        let request = self.client.get(self.values_url());
        let request = match &self.auth {
            SheetsAuth::ApiKey(key) => request.query(&[("key", key.as_str())]),
            SheetsAuth::Bearer(token) => request.bearer_auth(token),
            SheetsAuth::ServiceAccount(account) => request.bearer_auth(account.access_token().await?),
        };

        let response = request
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status(), "google_sheets"));
        }

        let body: ValueRange = response
            .json()
            .await
            .map_err(|e| ProviderError::Internal(format!("Failed to parse values: {}", e)))?;

        debug!(rows = body.values.len(), range = %self.range, "Watchlist rows fetched");

        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_to_string).collect())
            .collect())
    }
}

fn cell_to_string(value: Value) -> String {
    match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
