//! Yahoo Finance price source.
//!
//! Uses the public v8 chart endpoint, which needs no API key. The latest price
//! is `meta.regularMarketPrice`, falling back to the last daily close.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::market_data::{PriceError, PriceQuote, PriceSource};
use crate::models::Ticker;

const BASE_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart";
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct YahooPriceSource {
    client: Client,
    base_url: String,
}

impl YahooPriceSource {
    /// Create a source with a default client that sends a browser user agent.
    pub fn new() -> Self {
        Self::with_client(default_client())
    }

    /// Create a source with a caller-provided client (timeouts, proxies).
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    /// Point the source at a different host, e.g. a mock server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn chart_url(&self, ticker: &Ticker) -> String {
        format!(
            "{}/{}?interval=1d&range=1d",
            self.base_url,
            urlencoding::encode(ticker.as_str())
        )
    }

    fn parse_chart(&self, ticker: &Ticker, chart: ChartResponse) -> Result<PriceQuote, PriceError> {
        if let Some(error) = chart.chart.error {
            let code = error.code.unwrap_or_default();
            let description = error.description.unwrap_or_default();
            if code.eq_ignore_ascii_case("Not Found") {
                return Err(PriceError::TickerNotFound(ticker.to_string()));
            }
            return Err(PriceError::SourceUnavailable(format!(
                "yahoo error {code}: {description}"
            )));
        }

        let result = chart
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| PriceError::TickerNotFound(ticker.to_string()))?;

        let last_close = result
            .indicators
            .and_then(|i| i.quote.into_iter().next())
            .and_then(|q| q.close.into_iter().rev().flatten().next());

        let price = result
            .meta
            .regular_market_price
            .or(last_close)
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| PriceError::TickerNotFound(ticker.to_string()))?;

        Ok(PriceQuote {
            ticker: ticker.clone(),
            price,
            currency: result.meta.currency,
            market_time: result
                .meta
                .regular_market_time
                .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
            source: self.name().to_string(),
        })
    }
}

impl Default for YahooPriceSource {
    fn default() -> Self {
        Self::new()
    }
}

fn default_client() -> Client {
    Client::builder()
        .default_headers(default_headers())
        .build()
        .unwrap_or_default()
}

/// Headers Yahoo expects; attach them when building a custom client.
pub fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers
}

#[async_trait::async_trait]
impl PriceSource for YahooPriceSource {
    async fn fetch_quote(&self, ticker: &Ticker) -> Result<PriceQuote, PriceError> {
        let response = self
            .client
            .get(self.chart_url(ticker))
            .send()
            .await
            .map_err(|e| PriceError::SourceUnavailable(format!("yahoo request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            // Yahoo still sends a chart.error body with 404; the status is enough.
            return Err(PriceError::TickerNotFound(ticker.to_string()));
        }
        if !status.is_success() {
            return Err(PriceError::SourceUnavailable(format!(
                "yahoo returned status {status}"
            )));
        }

        let chart: ChartResponse = response
            .json()
            .await
            .map_err(|e| PriceError::SourceUnavailable(format!("yahoo response invalid: {e}")))?;

        self.parse_chart(ticker, chart)
    }

    fn name(&self) -> &str {
        "yahoo"
    }
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
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
    meta: ChartMeta,
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    currency: Option<String>,
    regular_market_price: Option<f64>,
    regular_market_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Deserialize)]
struct QuoteSeries {
    #[serde(default)]
    close: Vec<Option<f64>>,
}
