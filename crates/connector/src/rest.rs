//! Polygon REST collaborator.
//!
//! Thin parameterized GET wrappers for reference data (crypto ticker
//! listing) and OHLCV aggregate history. No retry logic, no state; this
//! sits outside the streaming path.

use serde::Deserialize;
use thiserror::Error;

pub const POLYGON_REST_URL: &str = "https://api.polygon.io";

#[derive(Debug, Error)]
pub enum RestError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unknown interval: {0}")]
    UnknownInterval(String),
}

/// Map an interval string to (multiplier, timespan) for the aggregates
/// endpoint: 1m/5m/15m -> minute, 1h -> hour, 1d -> day.
fn interval_to_range(interval: &str) -> Result<(u32, &'static str), RestError> {
    match interval {
        "1m" => Ok((1, "minute")),
        "5m" => Ok((5, "minute")),
        "15m" => Ok((15, "minute")),
        "1h" => Ok((1, "hour")),
        "1d" => Ok((1, "day")),
        other => Err(RestError::UnknownInterval(other.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct TickersResponse {
    #[serde(default)]
    results: Vec<TickerInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TickerInfo {
    pub ticker: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub market: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct AggsResponse {
    #[serde(default)]
    results: Vec<AggregateBar>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregateBar {
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v")]
    pub volume: f64,
    #[serde(default, rename = "vw")]
    pub vwap: Option<f64>,
    #[serde(rename = "t")]
    pub start_ms: i64,
    #[serde(default, rename = "n")]
    pub trade_count: Option<u64>,
}

pub struct PolygonRestClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl PolygonRestClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, POLYGON_REST_URL)
    }

    /// Override the base URL (tests point this at a mock server).
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// List active crypto tickers, most significant markets first.
    pub async fn list_crypto_tickers(&self) -> Result<Vec<TickerInfo>, RestError> {
        let url = format!("{}/v3/reference/tickers", self.base_url);
        let response: TickersResponse = self
            .http
            .get(&url)
            .query(&[
                ("market", "crypto"),
                ("active", "true"),
                ("order", "desc"),
                ("sort", "market"),
                ("limit", "100"),
                ("apiKey", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.results)
    }

    /// OHLCV aggregate history for one ticker over a date range.
    pub async fn aggregates(
        &self,
        ticker: &str,
        interval: &str,
        from: &str,
        to: &str,
        limit: u32,
    ) -> Result<Vec<AggregateBar>, RestError> {
        let (multiplier, timespan) = interval_to_range(interval)?;
        let url = format!(
            "{}/v2/aggs/ticker/{}/range/{}/{}/{}/{}",
            self.base_url, ticker, multiplier, timespan, from, to
        );
        let response: AggsResponse = self
            .http
            .get(&url)
            .query(&[("limit", limit.to_string()), ("apiKey", self.api_key.clone())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.results)
    }
}
