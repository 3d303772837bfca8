use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::market_data::{PriceError, PriceService};
use crate::models::Ticker;
use crate::portfolio::{Portfolio, PortfolioError};
use crate::storage::PortfolioStorage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Manual,
    Auto,
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshTrigger::Manual => f.write_str("manual"),
            RefreshTrigger::Auto => f.write_str("auto"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    /// Every ticker was fetched.
    Completed { updated: Vec<Ticker> },
    /// Some tickers failed; they keep their previous prices.
    Partial {
        updated: Vec<Ticker>,
        failures: Vec<(Ticker, PriceError)>,
    },
    /// Every ticker failed; all previous prices are kept.
    Failed { failures: Vec<(Ticker, PriceError)> },
    /// No holdings, or every fetched holding was removed before its price landed.
    NothingToRefresh,
    /// Another refresh was in flight, so this request was dropped.
    AlreadyRefreshing,
}

impl RefreshOutcome {
    pub fn updated(&self) -> &[Ticker] {
        match self {
            RefreshOutcome::Completed { updated } | RefreshOutcome::Partial { updated, .. } => {
                updated
            }
            _ => &[],
        }
    }

    pub fn failures(&self) -> &[(Ticker, PriceError)] {
        match self {
            RefreshOutcome::Partial { failures, .. } | RefreshOutcome::Failed { failures } => {
                failures
            }
            _ => &[],
        }
    }
}

#[derive(Debug, Clone)]
pub struct RefreshReport {
    pub trigger: RefreshTrigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: RefreshOutcome,
    /// Set when the refreshed portfolio could not be saved.
    pub persist_error: Option<String>,
}

/// Releases the in-flight flag when dropped, however the refresh ends.
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Fetches prices for every holding and writes them back into the portfolio.
pub struct RefreshOrchestrator {
    portfolio: Arc<RwLock<Portfolio>>,
    prices: Arc<PriceService>,
    storage: Option<Arc<dyn PortfolioStorage>>,
    clock: Arc<dyn Clock>,
    in_flight: AtomicBool,
}

impl RefreshOrchestrator {
    pub fn new(portfolio: Arc<RwLock<Portfolio>>, prices: Arc<PriceService>) -> Self {
        Self {
            portfolio,
            prices,
            storage: None,
            clock: Arc::new(SystemClock),
            in_flight: AtomicBool::new(false),
        }
    }

    /// Save the portfolio after every refresh that changed a price.
    pub fn with_storage(mut self, storage: Arc<dyn PortfolioStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn state(&self) -> RefreshState {
        if self.in_flight.load(Ordering::Acquire) {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    pub fn prices(&self) -> &Arc<PriceService> {
        &self.prices
    }

    pub async fn refresh(&self, trigger: RefreshTrigger) -> RefreshReport {
        let started_at = self.clock.now();
        let report = |outcome, persist_error| RefreshReport {
            trigger,
            started_at,
            finished_at: self.clock.now(),
            outcome,
            persist_error,
        };

        let Some(_guard) = FlightGuard::acquire(&self.in_flight) else {
            debug!(trigger = %trigger, "refresh already in flight; dropping request");
            return report(RefreshOutcome::AlreadyRefreshing, None);
        };

        // Snapshot the keys; the lock is not held across the network fetch.
        let tickers = self.portfolio.read().await.tickers();
        if tickers.is_empty() {
            debug!(trigger = %trigger, "nothing to refresh");
            return report(RefreshOutcome::NothingToRefresh, None);
        }

        info!(trigger = %trigger, tickers = tickers.len(), "refreshing prices");
        let batch = self.prices.get_prices(&tickers).await;

        let mut updated = Vec::new();
        let mut persist_error = None;
        {
            let mut portfolio = self.portfolio.write().await;
            for ticker in &tickers {
                let Some(point) = batch.prices.get(ticker) else {
                    continue;
                };
                match portfolio.record_price(ticker, point.price, point.fetched_at) {
                    Ok(()) => updated.push(ticker.clone()),
                    Err(PortfolioError::NotFound(_)) => {
                        debug!(ticker = %ticker, "holding removed during refresh; skipping");
                    }
                    Err(e) => warn!(ticker = %ticker, error = %e, "could not record price"),
                }
            }

            if !updated.is_empty() {
                if let Some(storage) = &self.storage {
                    let portfolio = portfolio.downgrade();
                    if let Err(e) = storage.save(&portfolio).await {
                        warn!(error = %e, "failed to save refreshed portfolio");
                        persist_error = Some(e.to_string());
                    }
                }
            }
        }

        // Judged by what was applied: fetched prices for removed holdings don't count.
        let failures = batch.failures;
        let outcome = match (updated.is_empty(), failures.is_empty()) {
            (true, true) => RefreshOutcome::NothingToRefresh,
            (false, true) => RefreshOutcome::Completed { updated },
            (true, false) => RefreshOutcome::Failed { failures },
            (false, false) => RefreshOutcome::Partial { updated, failures },
        };

        match &outcome {
            RefreshOutcome::Failed { failures } => {
                warn!(trigger = %trigger, failed = failures.len(), "refresh failed for every ticker")
            }
            other => info!(
                trigger = %trigger,
                updated = other.updated().len(),
                failed = other.failures().len(),
                "refresh finished"
            ),
        }

        report(outcome, persist_error)
    }
}
