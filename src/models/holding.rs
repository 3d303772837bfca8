use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{validate_allocation, validate_price, validate_quantity, InputError, Ticker};

/// Recommended trade for one holding.
///
/// Positive share counts are buys, negative are sells, zero is hold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "shares", rename_all = "snake_case")]
pub enum RebalanceAction {
    Shares(f64),
    /// No price has been fetched yet, so a share count cannot be computed.
    PriceUnavailable,
}

impl RebalanceAction {
    pub fn shares(&self) -> Option<f64> {
        match self {
            RebalanceAction::Shares(n) => Some(*n),
            RebalanceAction::PriceUnavailable => None,
        }
    }

    pub fn is_hold(&self) -> bool {
        matches!(self, RebalanceAction::Shares(n) if *n == 0.0)
    }
}

impl fmt::Display for RebalanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebalanceAction::Shares(n) if *n > 0.0 => write!(f, "Buy {n:.3}"),
            RebalanceAction::Shares(n) if *n < 0.0 => write!(f, "Sell {:.3}", n.abs()),
            RebalanceAction::Shares(_) => f.write_str("Hold"),
            RebalanceAction::PriceUnavailable => f.write_str("Price unavailable"),
        }
    }
}

/// One ticker's position.
///
/// The ticker is fixed at construction; quantity, target and price go through
/// validating setters so a rejected value never lands in the struct.
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    ticker: Ticker,
    quantity: f64,
    target_allocation: f64,
    current_price: f64,
    last_updated: Option<DateTime<Utc>>,
}

impl Holding {
    pub fn new(ticker: Ticker, quantity: f64) -> Result<Self, InputError> {
        Ok(Self {
            ticker,
            quantity: validate_quantity(quantity)?,
            target_allocation: 0.0,
            current_price: 0.0,
            last_updated: None,
        })
    }

    pub fn with_target_allocation(mut self, pct: f64) -> Result<Self, InputError> {
        self.set_target_allocation(pct)?;
        Ok(self)
    }

    pub fn with_price(mut self, price: f64, at: Option<DateTime<Utc>>) -> Result<Self, InputError> {
        self.current_price = validate_price(price)?;
        self.last_updated = at;
        Ok(self)
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn target_allocation(&self) -> f64 {
        self.target_allocation
    }

    /// Last known price; `0.0` means never fetched.
    pub fn current_price(&self) -> f64 {
        self.current_price
    }

    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    pub fn has_price(&self) -> bool {
        self.current_price > 0.0
    }

    pub fn set_quantity(&mut self, quantity: f64) -> Result<(), InputError> {
        self.quantity = validate_quantity(quantity)?;
        Ok(())
    }

    pub fn set_target_allocation(&mut self, pct: f64) -> Result<(), InputError> {
        self.target_allocation = validate_allocation(pct)?;
        Ok(())
    }

    pub fn record_price(&mut self, price: f64, at: DateTime<Utc>) -> Result<(), InputError> {
        self.current_price = validate_price(price)?;
        self.last_updated = Some(at);
        Ok(())
    }

    pub fn current_value(&self) -> f64 {
        self.quantity * self.current_price
    }

    /// Percentage of `total` this holding currently makes up.
    pub fn current_allocation(&self, total: f64) -> f64 {
        if total <= 0.0 {
            return 0.0;
        }
        self.current_value() / total * 100.0
    }

    pub fn target_value(&self, total: f64) -> f64 {
        self.target_allocation / 100.0 * total
    }

    /// Dollar amount to buy (positive) or sell (negative) to hit the target.
    pub fn difference(&self, total: f64) -> f64 {
        self.target_value(total) - self.current_value()
    }

    /// Shares to trade to reach the target allocation.
    ///
    /// A zero target always liquidates the whole position, exactly and
    /// unrounded, whatever the price. Otherwise a missing price yields
    /// [`RebalanceAction::PriceUnavailable`]. Rounding is to the nearest
    /// whole share, halves away from zero.
    pub fn rebalance_action(&self, total: f64, rounding: bool) -> RebalanceAction {
        if self.target_allocation == 0.0 {
            // -0.0 would otherwise print as "Sell 0.000".
            let sell_all = if self.quantity == 0.0 { 0.0 } else { -self.quantity };
            return RebalanceAction::Shares(sell_all);
        }
        if !self.has_price() {
            return RebalanceAction::PriceUnavailable;
        }

        let raw = self.difference(total) / self.current_price;
        let shares = if rounding { raw.round() } else { raw };
        RebalanceAction::Shares(if shares == 0.0 { 0.0 } else { shares })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn holding(symbol: &str, quantity: f64, target: f64, price: f64) -> Holding {
        Holding::new(Ticker::parse(symbol).unwrap(), quantity)
            .unwrap()
            .with_target_allocation(target)
            .unwrap()
            .with_price(price, None)
            .unwrap()
    }

    #[test]
    fn derived_values() {
        let aapl = holding("AAPL", 10.0, 50.0, 100.0);
        assert_eq!(aapl.current_value(), 1000.0);
        assert_eq!(aapl.current_allocation(2500.0), 40.0);
        assert_eq!(aapl.target_value(2500.0), 1250.0);
        assert_eq!(aapl.difference(2500.0), 250.0);
    }

    #[test]
    fn zero_total_yields_zero_allocation() {
        let h = holding("AAPL", 10.0, 50.0, 0.0);
        assert_eq!(h.current_value(), 0.0);
        assert_eq!(h.current_allocation(0.0), 0.0);
        assert_eq!(h.current_allocation(-5.0), 0.0);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        // difference 250 at price 100 => 2.5 shares
        let buy = holding("AAA", 0.0, 50.0, 100.0);
        assert_eq!(buy.rebalance_action(500.0, true), RebalanceAction::Shares(3.0));
        assert_eq!(buy.rebalance_action(500.0, false), RebalanceAction::Shares(2.5));

        // difference -250 at price 100 => -2.5 shares
        let sell = holding("BBB", 5.0, 50.0, 100.0);
        assert_eq!(sell.rebalance_action(500.0, true), RebalanceAction::Shares(-3.0));
    }

    #[test]
    fn zero_target_sells_everything() {
        let h = holding("XYZ", 7.25, 0.0, 13.0);
        assert_eq!(h.rebalance_action(1000.0, true), RebalanceAction::Shares(-7.25));
        assert_eq!(h.rebalance_action(1000.0, false), RebalanceAction::Shares(-7.25));

        let unpriced = holding("XYZ", 4.0, 0.0, 0.0);
        assert_eq!(unpriced.rebalance_action(0.0, true), RebalanceAction::Shares(-4.0));

        let empty = holding("XYZ", 0.0, 0.0, 13.0);
        assert!(empty.rebalance_action(1000.0, true).is_hold());
    }

    #[test]
    fn missing_price_is_reported() {
        let h = holding("NEW", 3.0, 25.0, 0.0);
        assert_eq!(h.rebalance_action(1000.0, true), RebalanceAction::PriceUnavailable);
    }

    #[test]
    fn action_display() {
        assert_eq!(RebalanceAction::Shares(3.0).to_string(), "Buy 3.000");
        assert_eq!(RebalanceAction::Shares(-1.0).to_string(), "Sell 1.000");
        assert_eq!(RebalanceAction::Shares(0.0).to_string(), "Hold");
        assert_eq!(RebalanceAction::PriceUnavailable.to_string(), "Price unavailable");
    }

    #[test]
    fn setters_reject_without_mutating() {
        let mut h = holding("AAPL", 10.0, 50.0, 100.0);
        assert!(h.set_quantity(-1.0).is_err());
        assert!(h.set_target_allocation(101.0).is_err());
        assert!(h.record_price(f64::NAN, Utc::now()).is_err());
        assert_eq!(h.quantity(), 10.0);
        assert_eq!(h.target_allocation(), 50.0);
        assert_eq!(h.current_price(), 100.0);
    }

    #[test]
    fn record_price_stamps_time() {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap();
        let mut h = holding("AAPL", 1.0, 10.0, 0.0);
        h.record_price(187.5, at).unwrap();
        assert_eq!(h.current_price(), 187.5);
        assert_eq!(h.last_updated(), Some(at));
    }
}
