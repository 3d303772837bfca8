use std::sync::Arc;

use tracing::debug;

use super::{PriceError, PriceQuote};
use crate::models::Ticker;

/// A provider of current prices keyed by ticker symbol.
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    async fn fetch_quote(&self, ticker: &Ticker) -> Result<PriceQuote, PriceError>;

    fn name(&self) -> &str;
}

/// Tries each source in order; the first quote wins.
///
/// When every source fails the error is `SourceUnavailable` if any of them
/// was unavailable, since the ticker may well exist on that source.
/// Otherwise every source agreed the ticker is unknown.
pub struct PriceSourceRouter {
    sources: Vec<Arc<dyn PriceSource>>,
}

impl PriceSourceRouter {
    pub fn new(sources: Vec<Arc<dyn PriceSource>>) -> Self {
        Self { sources }
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

#[async_trait::async_trait]
impl PriceSource for PriceSourceRouter {
    async fn fetch_quote(&self, ticker: &Ticker) -> Result<PriceQuote, PriceError> {
        let mut unavailable: Option<PriceError> = None;
        let mut not_found: Option<PriceError> = None;

        for source in &self.sources {
            match source.fetch_quote(ticker).await {
                Ok(quote) => return Ok(quote),
                Err(err) => {
                    debug!(ticker = %ticker, source = source.name(), error = %err, "source failed");
                    match err {
                        PriceError::SourceUnavailable(_) => {
                            unavailable.get_or_insert(err);
                        }
                        PriceError::TickerNotFound(_) => {
                            not_found.get_or_insert(err);
                        }
                    }
                }
            }
        }

        Err(unavailable
            .or(not_found)
            .unwrap_or_else(|| PriceError::SourceUnavailable("no price sources configured".into())))
    }

    fn name(&self) -> &str {
        "router"
    }
}
