use anyhow::Result;
use chrono::{TimeZone, Utc};
use stockalloc::models::{Holding, RebalanceAction, Ticker};
use stockalloc::portfolio::{AllocationStatus, Portfolio};

fn t(symbol: &str) -> Ticker {
    Ticker::parse(symbol).unwrap()
}

fn two_stock_portfolio() -> Result<Portfolio> {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 16, 0, 0).unwrap();
    let mut portfolio = Portfolio::new();
    portfolio.insert(Holding::new(t("AAPL"), 10.0)?.with_price(100.0, Some(at))?)?;
    portfolio.insert(Holding::new(t("GOOG"), 5.0)?.with_price(300.0, Some(at))?)?;
    portfolio.update_target_allocation(&t("AAPL"), 50.0)?;
    portfolio.update_target_allocation(&t("GOOG"), 50.0)?;
    Ok(portfolio)
}

#[test]
fn rebalance_two_stocks_to_even_split() -> Result<()> {
    let portfolio = two_stock_portfolio()?;

    assert_eq!(portfolio.total_value(), 2500.0);
    let allocations = portfolio.allocation_summary();
    assert!((allocations[&t("AAPL")] - 40.0).abs() < 1e-9);
    assert!((allocations[&t("GOOG")] - 60.0).abs() < 1e-9);
    assert_eq!(portfolio.allocation_status(), AllocationStatus::Balanced);

    let rounded = portfolio.rebalance_actions(true);
    assert_eq!(rounded[&t("AAPL")], RebalanceAction::Shares(3.0));
    assert_eq!(rounded[&t("GOOG")], RebalanceAction::Shares(-1.0));

    let exact = portfolio.rebalance_actions(false);
    assert_eq!(exact[&t("AAPL")], RebalanceAction::Shares(2.5));
    let goog = exact[&t("GOOG")].shares().unwrap();
    assert!((goog + 250.0 / 300.0).abs() < 1e-9);

    let snapshot = portfolio.snapshot(true);
    let aapl = snapshot.row(&t("AAPL")).unwrap();
    assert_eq!(aapl.target_value, 1250.0);
    assert_eq!(aapl.difference, 250.0);
    assert_eq!(aapl.action.to_string(), "Buy 3.000");
    assert_eq!(snapshot.row(&t("GOOG")).unwrap().action.to_string(), "Sell 1.000");

    Ok(())
}

#[test]
fn zero_target_sells_everything_unrounded() -> Result<()> {
    let mut portfolio = two_stock_portfolio()?;
    portfolio.update_quantity(&t("AAPL"), 10.4)?;
    portfolio.update_target_allocation(&t("AAPL"), 0.0)?;

    let actions = portfolio.rebalance_actions(true);
    assert_eq!(actions[&t("AAPL")], RebalanceAction::Shares(-10.4));
    assert_eq!(portfolio.allocation_status(), AllocationStatus::Below);

    Ok(())
}

#[test]
fn quantity_change_is_visible_to_next_read() -> Result<()> {
    let mut portfolio = two_stock_portfolio()?;
    portfolio.update_quantity(&t("GOOG"), 0.0)?;

    assert_eq!(portfolio.total_value(), 1000.0);
    let snapshot = portfolio.snapshot(true);
    assert!((snapshot.row(&t("AAPL")).unwrap().current_allocation - 100.0).abs() < 1e-9);
    assert_eq!(snapshot.row(&t("GOOG")).unwrap().current_allocation, 0.0);
    // 500 to sell of AAPL at 100, 500 to buy of GOOG at 300.
    assert_eq!(snapshot.row(&t("AAPL")).unwrap().action, RebalanceAction::Shares(-5.0));
    assert_eq!(snapshot.row(&t("GOOG")).unwrap().action, RebalanceAction::Shares(2.0));

    Ok(())
}

#[test]
fn allocation_over_one_hundred_is_flagged() -> Result<()> {
    let mut portfolio = two_stock_portfolio()?;
    portfolio.update_target_allocation(&t("GOOG"), 60.0)?;

    assert!((portfolio.allocation_total() - 110.0).abs() < 1e-9);
    assert_eq!(portfolio.allocation_status(), AllocationStatus::Above);
    assert_eq!(portfolio.allocation_status().label(), "Over 100%");

    Ok(())
}
