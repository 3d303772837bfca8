use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::{MarketDataConfig, ProviderKind};
use crate::market_data::providers::{yahoo, AlphaVantagePriceSource, YahooPriceSource};
use crate::market_data::{PriceService, PriceSource, PriceSourceRouter};

/// Builds a [`PriceService`] from the `[market_data]` config section.
///
/// Providers are routed in configured order. A provider that cannot be set up
/// (e.g. a missing API key) is skipped with a warning.
pub struct PriceServiceBuilder {
    config: MarketDataConfig,
    clock: Arc<dyn Clock>,
    extra_sources: Vec<Arc<dyn PriceSource>>,
}

impl PriceServiceBuilder {
    pub fn new(config: MarketDataConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            extra_sources: Vec::new(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Append a source after the configured providers.
    pub fn with_source(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.extra_sources.push(source);
        self
    }

    fn http_client(&self, kind: ProviderKind) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder().timeout(self.config.request_timeout);
        if kind == ProviderKind::Yahoo {
            builder = builder.default_headers(yahoo::default_headers());
        }
        builder.build().context("Failed to build HTTP client")
    }

    fn sources(&self) -> Result<Vec<Arc<dyn PriceSource>>> {
        let mut sources: Vec<Arc<dyn PriceSource>> = Vec::new();
        for kind in &self.config.providers {
            match kind {
                ProviderKind::Yahoo => {
                    let client = self.http_client(*kind)?;
                    sources.push(Arc::new(YahooPriceSource::with_client(client)));
                }
                ProviderKind::AlphaVantage => {
                    let client = self.http_client(*kind)?;
                    let env_var = &self.config.alpha_vantage_api_key_env;
                    match AlphaVantagePriceSource::from_env(env_var, client) {
                        Some(source) => sources.push(Arc::new(source)),
                        None => warn!(
                            env_var = %env_var,
                            "alpha vantage configured but no api key set; skipping"
                        ),
                    }
                }
            }
        }
        sources.extend(self.extra_sources.iter().cloned());
        Ok(sources)
    }

    pub fn build(self) -> Result<PriceService> {
        let router = PriceSourceRouter::new(self.sources()?);
        if router.is_empty() {
            warn!("no price sources available; every fetch will fail");
        } else {
            info!(sources = ?router.source_names(), "price sources configured");
        }

        Ok(PriceService::new(Arc::new(router))
            .with_clock(self.clock)
            .with_concurrency(self.config.max_concurrent_requests))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_default_yahoo_service() -> Result<()> {
        let service = PriceServiceBuilder::new(MarketDataConfig::default()).build()?;
        assert_eq!(service.source_name(), "router");
        Ok(())
    }

    #[test]
    fn skips_alpha_vantage_without_key() -> Result<()> {
        let config = MarketDataConfig {
            providers: vec![ProviderKind::AlphaVantage],
            alpha_vantage_api_key_env: "STOCKALLOC_TEST_UNSET_KEY".to_string(),
            ..Default::default()
        };
        let builder = PriceServiceBuilder::new(config);
        assert!(builder.sources()?.is_empty());
        Ok(())
    }
}
