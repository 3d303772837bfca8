use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Ticker;

/// Why a price could not be fetched for one ticker.
///
/// Always scoped to a single ticker, so a batch can carry one per failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// The provider does not know the symbol.
    #[error("{0} not found")]
    TickerNotFound(String),
    /// Network failure, timeout, rate limit or provider outage.
    #[error("price source unavailable: {0}")]
    SourceUnavailable(String),
}

impl PriceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PriceError::TickerNotFound(_))
    }
}

/// A quote as a provider returned it.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub ticker: Ticker,
    pub price: f64,
    pub currency: Option<String>,
    /// Exchange time of the quote, when the provider reports one.
    pub market_time: Option<DateTime<Utc>>,
    pub source: String,
}

/// A price the service accepted and cached, stamped with fetch time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub ticker: Ticker,
    pub price: f64,
    pub fetched_at: DateTime<Utc>,
    pub source: String,
}

/// Result of a best-effort batch fetch.
#[derive(Debug, Clone, Default)]
pub struct BatchPrices {
    pub prices: HashMap<Ticker, PricePoint>,
    /// One entry per ticker that failed, in request order.
    pub failures: Vec<(Ticker, PriceError)>,
    /// Last known good price for failed tickers that have one cached.
    pub fallbacks: HashMap<Ticker, PricePoint>,
}

impl BatchPrices {
    pub fn requested(&self) -> usize {
        self.prices.len() + self.failures.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn all_failed(&self) -> bool {
        self.prices.is_empty() && !self.failures.is_empty()
    }
}
