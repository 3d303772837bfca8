// src/portfolio/holdings.rs
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::models::{AllocationStatus, HoldingSummary, PortfolioSnapshot};
use crate::models::{Holding, InputError, RebalanceAction, Ticker};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PortfolioError {
    #[error(transparent)]
    InvalidInput(#[from] InputError),
    #[error("{0} is not in the portfolio")]
    NotFound(Ticker),
    #[error("{0} is already in the portfolio")]
    DuplicateKey(Ticker),
}

/// The user's holdings, keyed by ticker and kept in display order.
///
/// Pure data: every derived figure is computed on read from the current
/// holdings, so a mutation is visible to the very next query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    holdings: Vec<Holding>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a portfolio from holdings, rejecting repeated tickers.
    pub fn from_holdings(
        holdings: impl IntoIterator<Item = Holding>,
    ) -> Result<Self, PortfolioError> {
        let mut portfolio = Self::new();
        for holding in holdings {
            portfolio.insert(holding)?;
        }
        Ok(portfolio)
    }

    /// Add a new holding with a 0% target.
    pub fn add(&mut self, ticker: Ticker, quantity: f64) -> Result<&Holding, PortfolioError> {
        if self.contains(&ticker) {
            return Err(PortfolioError::DuplicateKey(ticker));
        }
        let holding = Holding::new(ticker, quantity)?;
        self.holdings.push(holding);
        Ok(&self.holdings[self.holdings.len() - 1])
    }

    /// Insert a fully built holding.
    pub fn insert(&mut self, holding: Holding) -> Result<(), PortfolioError> {
        if self.contains(holding.ticker()) {
            return Err(PortfolioError::DuplicateKey(holding.ticker().clone()));
        }
        self.holdings.push(holding);
        Ok(())
    }

    pub fn update_quantity(&mut self, ticker: &Ticker, quantity: f64) -> Result<(), PortfolioError> {
        Ok(self.get_mut(ticker)?.set_quantity(quantity)?)
    }

    pub fn update_target_allocation(
        &mut self,
        ticker: &Ticker,
        pct: f64,
    ) -> Result<(), PortfolioError> {
        Ok(self.get_mut(ticker)?.set_target_allocation(pct)?)
    }

    pub fn record_price(
        &mut self,
        ticker: &Ticker,
        price: f64,
        at: DateTime<Utc>,
    ) -> Result<(), PortfolioError> {
        Ok(self.get_mut(ticker)?.record_price(price, at)?)
    }

    /// Remove a holding. Other holdings' targets are left alone.
    pub fn remove(&mut self, ticker: &Ticker) -> Result<Holding, PortfolioError> {
        let index = self
            .position(ticker)
            .ok_or_else(|| PortfolioError::NotFound(ticker.clone()))?;
        Ok(self.holdings.remove(index))
    }

    pub fn clear(&mut self) {
        self.holdings.clear();
    }

    pub fn get(&self, ticker: &Ticker) -> Option<&Holding> {
        self.holdings.iter().find(|h| h.ticker() == ticker)
    }

    pub fn contains(&self, ticker: &Ticker) -> bool {
        self.position(ticker).is_some()
    }

    pub fn holdings(&self) -> impl Iterator<Item = &Holding> {
        self.holdings.iter()
    }

    pub fn tickers(&self) -> Vec<Ticker> {
        self.holdings.iter().map(|h| h.ticker().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }

    pub fn total_value(&self) -> f64 {
        self.holdings.iter().map(Holding::current_value).sum()
    }

    pub fn allocation_total(&self) -> f64 {
        self.holdings.iter().map(Holding::target_allocation).sum()
    }

    pub fn allocation_status(&self) -> AllocationStatus {
        AllocationStatus::classify(self.allocation_total())
    }

    /// Current allocation percentage per ticker.
    pub fn allocation_summary(&self) -> HashMap<Ticker, f64> {
        let total = self.total_value();
        self.holdings
            .iter()
            .map(|h| (h.ticker().clone(), h.current_allocation(total)))
            .collect()
    }

    pub fn rebalance_actions(&self, rounding: bool) -> HashMap<Ticker, RebalanceAction> {
        let total = self.total_value();
        self.holdings
            .iter()
            .map(|h| (h.ticker().clone(), h.rebalance_action(total, rounding)))
            .collect()
    }

    /// All derived figures in display order, computed against one total.
    pub fn snapshot(&self, rounding: bool) -> PortfolioSnapshot {
        let total = self.total_value();
        let allocation_total = self.allocation_total();
        let rows = self
            .holdings
            .iter()
            .map(|h| HoldingSummary {
                ticker: h.ticker().clone(),
                price: h.current_price(),
                quantity: h.quantity(),
                target_allocation: h.target_allocation(),
                current_allocation: h.current_allocation(total),
                current_value: h.current_value(),
                target_value: h.target_value(total),
                difference: h.difference(total),
                action: h.rebalance_action(total, rounding),
                last_updated: h.last_updated(),
            })
            .collect();

        PortfolioSnapshot {
            total_value: total,
            allocation_total,
            allocation_status: AllocationStatus::classify(allocation_total),
            rows,
        }
    }

    fn position(&self, ticker: &Ticker) -> Option<usize> {
        self.holdings.iter().position(|h| h.ticker() == ticker)
    }

    fn get_mut(&mut self, ticker: &Ticker) -> Result<&mut Holding, PortfolioError> {
        self.holdings
            .iter_mut()
            .find(|h| h.ticker() == ticker)
            .ok_or_else(|| PortfolioError::NotFound(ticker.clone()))
    }
}
