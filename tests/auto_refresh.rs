mod support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use stockalloc::models::Holding;
use stockalloc::portfolio::Portfolio;
use stockalloc::refresh::{AutoRefresh, RefreshOrchestrator, RefreshOutcome, RefreshTrigger};
use tokio::sync::{mpsc, RwLock};
use support::{ticker, MockPriceSource};

fn orchestrator(source: &Arc<MockPriceSource>) -> Result<(Arc<RwLock<Portfolio>>, Arc<RefreshOrchestrator>)> {
    let mut portfolio = Portfolio::new();
    portfolio.insert(Holding::new(ticker("AAPL"), 2.0)?.with_price(190.0, None)?)?;
    let portfolio = Arc::new(RwLock::new(portfolio));
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        Arc::clone(&portfolio),
        support::price_service(source),
    ));
    Ok((portfolio, orchestrator))
}

#[tokio::test(start_paused = true)]
async fn ticks_once_per_interval_after_enabling() -> Result<()> {
    let source = Arc::new(MockPriceSource::new().with_price("AAPL", 200.0));
    let (_portfolio, orchestrator) = orchestrator(&source)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let auto = AutoRefresh::new(orchestrator)
        .with_interval(Duration::from_secs(60))
        .with_reports(tx);

    auto.enable();
    assert!(auto.is_enabled());

    tokio::time::sleep(Duration::from_secs(59)).await;
    assert_eq!(source.calls(), 0);

    let report = rx.recv().await.expect("report");
    assert_eq!(report.trigger, RefreshTrigger::Auto);
    assert!(matches!(report.outcome, RefreshOutcome::Completed { .. }));

    let _ = rx.recv().await.expect("second report");
    assert_eq!(source.calls(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn disabling_before_first_tick_prevents_refresh() -> Result<()> {
    let source = Arc::new(MockPriceSource::new().with_price("AAPL", 200.0));
    let (_portfolio, orchestrator) = orchestrator(&source)?;
    let auto = AutoRefresh::new(orchestrator).with_interval(Duration::from_secs(60));

    auto.enable();
    tokio::time::sleep(Duration::from_secs(30)).await;
    auto.disable();
    assert!(!auto.is_enabled());

    tokio::time::sleep(Duration::from_secs(300)).await;
    assert_eq!(source.calls(), 0);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn disabling_lets_inflight_refresh_finish() -> Result<()> {
    let source = Arc::new(
        MockPriceSource::new()
            .with_price("AAPL", 200.0)
            .with_delay(Duration::from_secs(10)),
    );
    let (portfolio, orchestrator) = orchestrator(&source)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    let auto = AutoRefresh::new(orchestrator)
        .with_interval(Duration::from_secs(60))
        .with_reports(tx);

    auto.enable();
    // First tick at 60s; the fetch is still sleeping at 65s.
    tokio::time::sleep(Duration::from_secs(65)).await;
    assert_eq!(source.calls(), 1);
    auto.disable();

    let report = rx.recv().await.expect("in-flight report");
    assert!(matches!(report.outcome, RefreshOutcome::Completed { .. }));
    assert_eq!(
        portfolio.read().await.get(&ticker("AAPL")).unwrap().current_price(),
        200.0
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn enabling_twice_keeps_one_timer() -> Result<()> {
    let source = Arc::new(MockPriceSource::new().with_price("AAPL", 200.0));
    let (_portfolio, orchestrator) = orchestrator(&source)?;
    let auto = AutoRefresh::new(orchestrator).with_interval(Duration::from_secs(60));

    auto.set_enabled(true);
    auto.set_enabled(true);
    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(source.calls(), 1);
    Ok(())
}
