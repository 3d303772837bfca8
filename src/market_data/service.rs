use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{BatchPrices, PriceCache, PriceError, PricePoint, PriceSource};
use crate::clock::{Clock, SystemClock};
use crate::models::Ticker;

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Fetches prices through a [`PriceSource`] and remembers the last good one.
pub struct PriceService {
    source: Arc<dyn PriceSource>,
    cache: PriceCache,
    clock: Arc<dyn Clock>,
    concurrency: usize,
    last_refresh: Mutex<Option<DateTime<Utc>>>,
}

impl PriceService {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self {
            source,
            cache: PriceCache::new(),
            clock: Arc::new(SystemClock),
            concurrency: DEFAULT_CONCURRENCY,
            last_refresh: Mutex::new(None),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Maximum number of fetches in flight during a batch (at least 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    /// Fetch one price. Successes are cached; failures leave the cache alone.
    pub async fn get_price(&self, ticker: &Ticker) -> Result<PricePoint, PriceError> {
        debug!(ticker = %ticker, source = self.source.name(), "fetching price");

        let quote = match self.source.fetch_quote(ticker).await {
            Ok(quote) => quote,
            Err(err) => {
                warn!(ticker = %ticker, error = %err, "price fetch failed");
                return Err(err);
            }
        };

        if !quote.price.is_finite() || quote.price <= 0.0 {
            warn!(ticker = %ticker, price = quote.price, "provider returned unusable price");
            return Err(PriceError::TickerNotFound(ticker.to_string()));
        }

        let point = PricePoint {
            ticker: ticker.clone(),
            price: quote.price,
            fetched_at: self.clock.now(),
            source: quote.source,
        };
        info!(ticker = %ticker, price = point.price, source = %point.source, "fetched price");
        self.cache.put(point.clone()).await;
        Ok(point)
    }

    /// Fetch every ticker, isolating failures per ticker.
    ///
    /// Duplicates are fetched once. Failed tickers get their cached price,
    /// if any, in [`BatchPrices::fallbacks`].
    pub async fn get_prices(&self, tickers: &[Ticker]) -> BatchPrices {
        let mut seen = HashSet::new();
        let unique: Vec<Ticker> = tickers
            .iter()
            .filter(|t| seen.insert(*t))
            .cloned()
            .collect();

        let results: Vec<(Ticker, Result<PricePoint, PriceError>)> = stream::iter(unique)
            .map(|ticker: Ticker| async move {
                let result = self.get_price(&ticker).await;
                (ticker, result)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut batch = BatchPrices::default();
        for (ticker, result) in results {
            match result {
                Ok(point) => {
                    batch.prices.insert(ticker, point);
                }
                Err(err) => {
                    if let Some(cached) = self.cache.get(&ticker).await {
                        batch.fallbacks.insert(ticker.clone(), cached);
                    }
                    batch.failures.push((ticker, err));
                }
            }
        }

        // buffer_unordered yields in completion order; report failures in request order.
        batch.failures.sort_by_key(|(ticker, _)| {
            tickers.iter().position(|t| t == ticker).unwrap_or(usize::MAX)
        });

        *self.last_refresh.lock().await = Some(self.clock.now());
        info!(
            fetched = batch.prices.len(),
            failed = batch.failures.len(),
            "price batch finished"
        );
        batch
    }

    /// Whether the provider knows this symbol.
    ///
    /// A symbol that cannot be a ticker is rejected without a network call.
    pub async fn validate_ticker(&self, raw: &str) -> bool {
        match Ticker::parse(raw) {
            Ok(ticker) => self.get_price(&ticker).await.is_ok(),
            Err(err) => {
                debug!(ticker = raw, error = %err, "rejected ticker without lookup");
                false
            }
        }
    }

    pub async fn cached_price(&self, ticker: &Ticker) -> Option<PricePoint> {
        self.cache.get(ticker).await
    }

    /// Prime the cache with a price loaded from disk.
    pub async fn seed_cache(&self, ticker: Ticker, price: f64, at: DateTime<Utc>) {
        if !price.is_finite() || price <= 0.0 {
            return;
        }
        self.cache
            .seed(PricePoint {
                ticker,
                price,
                fetched_at: at,
                source: "saved".to_string(),
            })
            .await;
    }

    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// When the last batch finished.
    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        *self.last_refresh.lock().await
    }
}
