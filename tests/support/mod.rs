#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use stockalloc::market_data::{PriceError, PriceQuote, PriceService, PriceSource};
use stockalloc::models::Ticker;

pub fn ticker(symbol: &str) -> Ticker {
    Ticker::parse(symbol).expect("valid ticker")
}

/// Scripted price source. Unscripted tickers are reported as not found.
#[derive(Default)]
pub struct MockPriceSource {
    results: Mutex<HashMap<String, Result<f64, PriceError>>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockPriceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(self, symbol: &str, price: f64) -> Self {
        self.set_price(symbol, price);
        self
    }

    pub fn with_error(self, symbol: &str, error: PriceError) -> Self {
        self.set_error(symbol, error);
        self
    }

    /// Sleep (on the tokio clock) before answering each request.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_price(&self, symbol: &str, price: f64) {
        self.results
            .lock()
            .unwrap()
            .insert(symbol.to_string(), Ok(price));
    }

    pub fn set_error(&self, symbol: &str, error: PriceError) {
        self.results
            .lock()
            .unwrap()
            .insert(symbol.to_string(), Err(error));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for MockPriceSource {
    async fn fetch_quote(&self, ticker: &Ticker) -> Result<PriceQuote, PriceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let result = self
            .results
            .lock()
            .unwrap()
            .get(ticker.as_str())
            .cloned()
            .unwrap_or_else(|| Err(PriceError::TickerNotFound(ticker.to_string())));

        result.map(|price| PriceQuote {
            ticker: ticker.clone(),
            price,
            currency: Some("USD".to_string()),
            market_time: None,
            source: "mock".to_string(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

pub fn price_service(source: &Arc<MockPriceSource>) -> Arc<PriceService> {
    Arc::new(PriceService::new(Arc::clone(source) as Arc<dyn PriceSource>))
}

pub fn unavailable() -> PriceError {
    PriceError::SourceUnavailable("connection refused".to_string())
}
