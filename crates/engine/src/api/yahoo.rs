//! Yahoo Finance chart API client for daily price history (no authentication required)

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use super::PriceHistoryProvider;
use crate::types::PriceBar;

const DEFAULT_BASE_URL: &str = "https://query1.finance.yahoo.com";
/// Extra calendar days requested so weekends and holidays still leave `days` of history
const FETCH_BUFFER_DAYS: i64 = 30;

/// Yahoo Finance public chart client
#[derive(Clone)]
pub struct YahooFinanceClient {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartMeta {
    #[serde(rename = "gmtoffset", default)]
    gmt_offset: i64,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    #[serde(default)]
    quote: Vec<Quote>,
    #[serde(default)]
    adjclose: Vec<AdjClose>,
}

#[derive(Debug, Default, Deserialize)]
struct Quote {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct AdjClose {
    #[serde(default)]
    adjclose: Vec<Option<f64>>,
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

impl YahooFinanceClient {
    /// Create a new client with the public base URL
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (compatible; momentum-screener)")
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Fetch daily bars between two dates (inclusive of `start`)
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>> {
        let period1 = start.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc().timestamp());
        let period2 = end.and_hms_opt(23, 59, 59).map(|dt| dt.and_utc().timestamp());
        let (Some(period1), Some(period2)) = (period1, period2) else {
            anyhow::bail!("invalid date range {start}..{end}");
        };

        let url = format!(
            "{}/v8/finance/chart/{}?period1={}&period2={}&interval=1d&events=history",
            self.base_url,
            encode_symbol(symbol),
            period1,
            period2
        );

        debug!(symbol, %start, %end, "Fetching daily bars from Yahoo Finance");

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Yahoo Finance API error {}: {}", status, body);
        }

        let body = response.text().await?;
        let bars = parse_chart(symbol, &body)?;

        info!(symbol, bars = bars.len(), "Fetched daily bars");
        Ok(bars)
    }
}

#[async_trait]
impl PriceHistoryProvider for YahooFinanceClient {
    async fn fetch_history(&self, symbol: &str, days: u32) -> Result<Vec<PriceBar>> {
        let end = Utc::now().date_naive();
        let start = end - Duration::days(i64::from(days) + FETCH_BUFFER_DAYS);
        self.get_daily_bars(symbol, start, end).await
    }
}

/// Percent-encode the characters index symbols use (`^NSEI`)
fn encode_symbol(symbol: &str) -> String {
    symbol.replace('^', "%5E").replace('&', "%26")
}

/// Parse a chart response body into ascending daily bars.
///
/// Rows without a close are skipped. Missing open/high/low fall back to the close,
/// missing adjusted close falls back to the close and missing volume is zero.
/// Duplicate dates keep the last row.
fn parse_chart(symbol: &str, body: &str) -> Result<Vec<PriceBar>> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;

    if let Some(err) = envelope.chart.error {
        anyhow::bail!(
            "Yahoo Finance error for {}: {} {}",
            symbol,
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        );
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        anyhow::bail!("Yahoo Finance returned no chart data for {}", symbol);
    };

    let offset = result.meta.map(|m| m.gmt_offset).unwrap_or(0);
    let quote = result.indicators.quote.into_iter().next().unwrap_or_default();
    let adj = result
        .indicators
        .adjclose
        .into_iter()
        .next()
        .map(|a| a.adjclose)
        .unwrap_or_default();

    let at = |v: &Vec<Option<f64>>, i: usize| v.get(i).copied().flatten();

    let mut by_date: BTreeMap<NaiveDate, PriceBar> = BTreeMap::new();
    let mut skipped = 0usize;

    for (i, ts) in result.timestamp.iter().enumerate() {
        let Some(close) = at(&quote.close, i).filter(|c| c.is_finite()) else {
            skipped += 1;
            continue;
        };
        let Some(date) = DateTime::<Utc>::from_timestamp(ts + offset, 0).map(|d| d.date_naive())
        else {
            skipped += 1;
            continue;
        };

        by_date.insert(
            date,
            PriceBar {
                date,
                open: at(&quote.open, i).unwrap_or(close),
                high: at(&quote.high, i).unwrap_or(close),
                low: at(&quote.low, i).unwrap_or(close),
                close,
                adjusted_close: at(&adj, i).unwrap_or(close),
                volume: at(&quote.volume, i).unwrap_or(0.0),
            },
        );
    }

    if skipped > 0 {
        warn!(symbol, skipped, "Skipped incomplete rows");
    }

    Ok(by_date.into_values().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "symbol": "RELIANCE.NS", "gmtoffset": 19800 },
                "timestamp": [1704080700, 1704167100, 1704253500, 1704339900],
                "indicators": {
                    "quote": [{
                        "open":   [100.0, 101.0, null, 103.0],
                        "high":   [102.0, 103.0, null, 104.0],
                        "low":    [ 99.0, 100.5, null, 102.0],
                        "close":  [101.0, 102.5, null, 103.5],
                        "volume": [1000,  null,  null, 1500]
                    }],
                    "adjclose": [{ "adjclose": [100.5, 102.0, null, null] }]
                }
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_skips_null_rows_and_falls_back() {
        let bars = parse_chart("RELIANCE.NS", SAMPLE).unwrap();
        assert_eq!(bars.len(), 3);

        assert_eq!(bars[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(bars[0].adjusted_close, 100.5);
        assert_eq!(bars[0].volume, 1000.0);

        // Missing volume is zero
        assert_eq!(bars[1].volume, 0.0);

        // Missing adjusted close falls back to close
        assert_eq!(bars[2].adjusted_close, 103.5);
        assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
    }

    #[test]
    fn test_parse_chart_reports_api_error() {
        let body = r#"{"chart":{"result":null,"error":{"code":"Not Found","description":"No data found, symbol may be delisted"}}}"#;
        let err = parse_chart("GONE.NS", body).unwrap_err();
        assert!(err.to_string().contains("GONE.NS"));
    }

    #[test]
    fn test_encode_index_symbol() {
        assert_eq!(encode_symbol("^NSEI"), "%5ENSEI");
        assert_eq!(encode_symbol("M&M.NS"), "M%26M.NS");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_an_error() {
        let client = YahooFinanceClient::with_base_url("http://127.0.0.1:9");
        assert!(client.fetch_history("INFY.NS", 30).await.is_err());
    }
}
