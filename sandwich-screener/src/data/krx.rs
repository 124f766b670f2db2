//! KRX data portal adapters for ticker listings.
//!
//! Both adapters post to the portal's JSON endpoint with a report id (`bld`):
//! - `MDCSTAT01501`: all-market prices for one trading date (dated listing)
//! - `MDCSTAT01901`: current basic information of all listed equities
//!
//! On a non-trading date the dated report comes back empty or with every
//! close price blank; both cases are reported as an empty listing.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::debug;

use super::provider::{ProviderError, TickerSource};
use super::TickerListing;

// ============================================================================
// Constants
// ============================================================================

/// JSON endpoint path on the data portal
const KRX_JSON_PATH: &str = "/comm/bldAttendant/getJsonData.cmd";

/// All-market daily prices report
const BLD_DAILY_PRICES: &str = "dbms/MDC/STAT/standard/MDCSTAT01501";

/// All listed equities report
const BLD_LISTED_EQUITIES: &str = "dbms/MDC/STAT/standard/MDCSTAT01901";

/// The portal rejects requests without a portal referer
const KRX_REFERER: &str = "http://data.krx.co.kr/contents/MDC/MDI/mdiLoader";

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct KrxResponse {
    #[serde(rename = "OutBlock_1", default)]
    out_block: Vec<KrxRow>,
}

#[derive(Debug, Deserialize)]
struct KrxRow {
    #[serde(rename = "ISU_SRT_CD", default)]
    short_code: String,
    #[serde(rename = "ISU_ABBRV", default)]
    abbrev: String,
    /// Close price as formatted text ("71,200"), blank or "-" when not traded
    #[serde(rename = "TDD_CLSPRC", default)]
    close: Option<String>,
}

impl KrxRow {
    fn has_close(&self) -> bool {
        self.close
            .as_deref()
            .map(|c| {
                let c = c.trim();
                !c.is_empty() && c != "-"
            })
            .unwrap_or(false)
    }

    fn into_listing(self) -> Option<TickerListing> {
        let code = self.short_code.trim();
        let name = self.abbrev.trim();
        if code.is_empty() || name.is_empty() {
            return None;
        }
        Some(TickerListing::new(code, name))
    }
}

// ============================================================================
// Shared request
// ============================================================================

async fn post_report(
    client: &reqwest::Client,
    base_url: &str,
    form: &[(&str, &str)],
) -> Result<Vec<KrxRow>, ProviderError> {
    let url = format!("{}{}", base_url.trim_end_matches('/'), KRX_JSON_PATH);

    let response = client
        .post(&url)
        .header(reqwest::header::REFERER, KRX_REFERER)
        .form(form)
        .send()
        .await
        .map_err(|e| ProviderError::from_transport(&e))?;

    if !response.status().is_success() {
        return Err(ProviderError::from_status(response.status(), "krx"));
    }

    let body: KrxResponse = response
        .json()
        .await
        .map_err(|e| ProviderError::Internal(format!("Failed to parse KRX response: {}", e)))?;

    Ok(body.out_block)
}

// ============================================================================
// Dated listing
// ============================================================================

/// Ticker listing for one trading date (KOSPI, KOSDAQ, KONEX).
pub struct KrxDailyListing {
    client: reqwest::Client,
    base_url: String,
    priority: u8,
}

impl KrxDailyListing {
    /// Create the adapter.
    pub fn new(client: reqwest::Client, base_url: &str, priority: u8) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            priority,
        }
    }
}

#[async_trait]
impl TickerSource for KrxDailyListing {
    fn name(&self) -> &'static str {
        "krx_daily"
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn is_dated(&self) -> bool {
        true
    }

    async fn list_tickers(&self, date: NaiveDate) -> Result<Vec<TickerListing>, ProviderError> {
        let trd_dd = date.format("%Y%m%d").to_string();
        let rows = post_report(
            &self.client,
            &self.base_url,
            &[
                ("bld", BLD_DAILY_PRICES),
                ("mktId", "ALL"),
                ("trdDd", trd_dd.as_str()),
                ("share", "1"),
                ("money", "1"),
                ("csvxls_isNo", "false"),
            ],
        )
        .await?;

        if !rows.iter().any(KrxRow::has_close) {
            debug!(date = %date, rows = rows.len(), "No trading on date");
            return Ok(Vec::new());
        }

        Ok(rows.into_iter().filter_map(KrxRow::into_listing).collect())
    }
}

// ============================================================================
// Snapshot listing
// ============================================================================

/// Current listing of all equities, without a date parameter.
pub struct KrxSnapshotListing {
    client: reqwest::Client,
    base_url: String,
    priority: u8,
}

impl KrxSnapshotListing {
    /// Create the adapter.
    pub fn new(client: reqwest::Client, base_url: &str, priority: u8) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
            priority,
        }
    }
}

#[async_trait]
impl TickerSource for KrxSnapshotListing {
    fn name(&self) -> &'static str {
        "krx_snapshot"
    }

    fn priority(&self) -> u8 {
        self.priority
    }

    fn is_dated(&self) -> bool {
        false
    }

    async fn list_tickers(&self, _date: NaiveDate) -> Result<Vec<TickerListing>, ProviderError> {
        let rows = post_report(
            &self.client,
            &self.base_url,
            &[
                ("bld", BLD_LISTED_EQUITIES),
                ("mktId", "ALL"),
                ("share", "1"),
                ("csvxls_isNo", "false"),
            ],
        )
        .await?;

        Ok(rows.into_iter().filter_map(KrxRow::into_listing).collect())
    }
}

// ============================================================================
// Tests
// ============================================================================
