//! Alpha Vantage price source.
//!
//! Uses the GLOBAL_QUOTE endpoint for the latest traded price.
//! Note: the free tier allows 25 requests per day.

use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::market_data::{PriceError, PriceQuote, PriceSource};
use crate::models::Ticker;

const BASE_URL: &str = "https://www.alphavantage.co/query";

pub struct AlphaVantagePriceSource {
    api_key: SecretString,
    client: Client,
    base_url: String,
}

impl AlphaVantagePriceSource {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_client(api_key, Client::new())
    }

    pub fn with_client(api_key: impl Into<String>, client: Client) -> Self {
        Self {
            api_key: SecretString::from(api_key.into()),
            client,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Build from an environment variable holding the key.
    pub fn from_env(var: &str, client: Client) -> Option<Self> {
        std::env::var(var)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .map(|key| Self::with_client(key, client))
    }

    fn parse_response(&self, ticker: &Ticker, body: &str) -> Result<PriceQuote, PriceError> {
        let response: GlobalQuoteResponse = serde_json::from_str(body).map_err(|e| {
            PriceError::SourceUnavailable(format!("alpha vantage response invalid: {e}"))
        })?;

        // Rate limits and key problems come back as 200 with a message field.
        if let Some(message) = response
            .note
            .or(response.information)
            .or(response.error_message)
        {
            return Err(PriceError::SourceUnavailable(format!(
                "alpha vantage: {message}"
            )));
        }

        let price = response
            .global_quote
            .and_then(|q| q.price)
            .and_then(|p| p.trim().parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p > 0.0)
            .ok_or_else(|| PriceError::TickerNotFound(ticker.to_string()))?;

        Ok(PriceQuote {
            ticker: ticker.clone(),
            price,
            // GLOBAL_QUOTE reports prices in the listing currency without naming it.
            currency: None,
            market_time: None,
            source: self.name().to_string(),
        })
    }
}

#[async_trait::async_trait]
impl PriceSource for AlphaVantagePriceSource {
    async fn fetch_quote(&self, ticker: &Ticker) -> Result<PriceQuote, PriceError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("function", "GLOBAL_QUOTE"),
                ("symbol", ticker.as_str()),
                ("apikey", self.api_key.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| {
                PriceError::SourceUnavailable(format!("alpha vantage request failed: {}", e.without_url()))
            })?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PriceError::TickerNotFound(ticker.to_string()));
        }
        if !status.is_success() {
            return Err(PriceError::SourceUnavailable(format!(
                "alpha vantage returned status {status}"
            )));
        }

        let body = response.text().await.map_err(|e| {
            PriceError::SourceUnavailable(format!("alpha vantage body unreadable: {}", e.without_url()))
        })?;
        self.parse_response(ticker, &body)
    }

    fn name(&self) -> &str {
        "alpha_vantage"
    }
}

#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,

    #[serde(rename = "Note")]
    note: Option<String>,

    #[serde(rename = "Information")]
    information: Option<String>,

    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
}
