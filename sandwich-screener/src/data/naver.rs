//! Naver chart adapter for daily OHLCV series.
//!
//! The `siseJson` endpoint answers with a JavaScript-style array of arrays:
//!
//! ```text
//! [['날짜', '시가', '고가', '저가', '종가', '거래량', '외국인소진율'],
//! ["20240102", 78200, 79800, 78200, 79600, 17142847, 53.3],
//! ...
//! ]
//! ```
//!
//! The first row is a header. Single quotes are normalised to double quotes
//! before JSON parsing.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use super::provider::{PriceSeriesProvider, ProviderError};
use super::{Bar, PriceSeries};

/// Chart endpoint path
const SISE_JSON_PATH: &str = "/siseJson.naver";

/// Daily OHLCV series from the Naver finance chart API.
pub struct NaverDailyChart {
    client: reqwest::Client,
    base_url: String,
}

impl NaverDailyChart {
    /// Create the adapter.
    pub fn new(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PriceSeriesProvider for NaverDailyChart {
    fn name(&self) -> &'static str {
        "naver"
    }

    async fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, ProviderError> {
        if ticker.is_empty() {
            return Err(ProviderError::InvalidRequest("empty ticker".into()));
        }

        let url = format!("{}{}", self.base_url, SISE_JSON_PATH);
        let start_time = start.format("%Y%m%d").to_string();
        let end_time = end.format("%Y%m%d").to_string();

        debug!(ticker, start = %start, end = %end, "Fetching daily chart");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", ticker),
                ("requestType", "1"),
                ("startTime", start_time.as_str()),
                ("endTime", end_time.as_str()),
                ("timeframe", "day"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        if !response.status().is_success() {
            return Err(ProviderError::from_status(response.status(), "naver"));
        }

        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        parse_sise_json(&text)
    }
}

/// Parse a `siseJson` body into a price series.
///
/// Rows with an unparseable date or close are skipped.
fn parse_sise_json(body: &str) -> Result<PriceSeries, ProviderError> {
    let normalised = body.trim().replace('\'', "\"");
    if normalised.is_empty() {
        return Ok(PriceSeries::default());
    }

    let rows: Vec<Vec<Value>> = serde_json::from_str(&normalised)
        .map_err(|e| ProviderError::Internal(format!("Failed to parse chart body: {}", e)))?;

    let mut bars = Vec::with_capacity(rows.len().saturating_sub(1));
    let mut skipped = 0usize;

    for row in rows.iter().skip(1) {
        match parse_row(row) {
            Some(bar) => bars.push(bar),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        debug!(skipped, "Skipped malformed chart rows");
    }

    Ok(PriceSeries::new(bars))
}

fn parse_row(row: &[Value]) -> Option<Bar> {
    let date = NaiveDate::parse_from_str(row.first()?.as_str()?.trim(), "%Y%m%d").ok()?;
    let number = |idx: usize| row.get(idx).and_then(Value::as_f64);

    Some(Bar {
        date,
        open: number(1),
        high: number(2),
        low: number(3),
        close: number(4)?,
        volume: number(5),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAMPLE: &str = r#"
 [['날짜', '시가', '고가', '저가', '종가', '거래량', '외국인소진율'],
["20240103", 78500, 78800, 77000, 77000, 21753644, 53.28],
["20240102", 78200, 79800, 78200, 79600, 17142847, 53.3],
["garbage", 1, 2, 3, 4, 5, 6]
]
"#;

    #[test]
    fn test_parse_sise_json() {
        let series = parse_sise_json(SAMPLE).unwrap();
        assert_eq!(series.len(), 2);

        let first = &series.bars()[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
        assert_eq!(first.close, 79600.0);
        assert_eq!(first.open, Some(78200.0));
        assert_eq!(first.volume, Some(17142847.0));

        assert_eq!(series.last().unwrap().close, 77000.0);
    }

    #[test]
    fn test_parse_header_only_is_empty() {
        let series = parse_sise_json("[['날짜', '시가', '고가', '저가', '종가', '거래량']]").unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_parse_garbage_is_internal_error() {
        let err = parse_sise_json("<html>blocked</html>").unwrap_err();
        assert!(matches!(err, ProviderError::Internal(_)));
        assert!(!err.is_recoverable());
    }

    #[tokio::test]
    async fn test_fetch_sends_range_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(SISE_JSON_PATH))
            .and(query_param("symbol", "005930"))
            .and(query_param("startTime", "20231001"))
            .and(query_param("endTime", "20240105"))
            .and(query_param("timeframe", "day"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAMPLE))
            .mount(&server)
            .await;

        let provider = NaverDailyChart::new(reqwest::Client::new(), &server.uri());
        let series = provider
            .fetch(
                "005930",
                NaiveDate::from_ymd_opt(2023, 10, 1).unwrap(),
                NaiveDate::from_ymd_opt(2024, 1, 5).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(series.len(), 2);
    }
}
