use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::{info, warn};

use super::Notice;
use crate::clock::{Clock, SystemClock};
use crate::config::{ResolvedConfig, SessionSettings, Theme};
use crate::export::CsvExporter;
use crate::format::MoneyFormat;
use crate::market_data::{PriceService, PriceServiceBuilder};
use crate::models::{validate_allocation, validate_quantity, Holding, Ticker};
use crate::portfolio::{Portfolio, PortfolioError, PortfolioSnapshot};
use crate::refresh::{
    AutoRefresh, RefreshOrchestrator, RefreshReport, RefreshState, RefreshTrigger,
    DEFAULT_INTERVAL,
};
use crate::storage::{JsonFileStorage, PortfolioStorage};

/// Assembles a [`Session`] from its collaborators.
pub struct SessionBuilder {
    storage: Arc<dyn PortfolioStorage>,
    prices: Arc<PriceService>,
    exporter: CsvExporter,
    settings: SessionSettings,
    refresh_interval: Duration,
    reports: Option<UnboundedSender<RefreshReport>>,
    clock: Arc<dyn Clock>,
}

impl SessionBuilder {
    pub fn new(storage: Arc<dyn PortfolioStorage>, prices: Arc<PriceService>) -> Self {
        Self {
            storage,
            prices,
            exporter: CsvExporter::new("exports"),
            settings: SessionSettings::default(),
            refresh_interval: DEFAULT_INTERVAL,
            reports: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Wire every collaborator from a loaded config file.
    pub fn from_config(config: &ResolvedConfig) -> Result<Self> {
        let prices = PriceServiceBuilder::new(config.market_data.clone()).build()?;
        let storage = JsonFileStorage::new(&config.portfolio_path);
        let exporter = CsvExporter::new(&config.export_dir).with_money_format(MoneyFormat::new(
            config.display.currency_symbol.clone(),
            config.display.currency_grouping,
        ));

        Ok(Self::new(Arc::new(storage), Arc::new(prices))
            .with_exporter(exporter)
            .with_settings(config.session)
            .with_refresh_interval(config.refresh.interval))
    }

    pub fn with_exporter(mut self, exporter: CsvExporter) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Receive reports from timer-driven refreshes.
    pub fn with_reports(mut self, reports: UnboundedSender<RefreshReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build(self) -> Session {
        let portfolio = Arc::new(RwLock::new(Portfolio::new()));
        let orchestrator = Arc::new(
            RefreshOrchestrator::new(Arc::clone(&portfolio), Arc::clone(&self.prices))
                .with_storage(Arc::clone(&self.storage))
                .with_clock(Arc::clone(&self.clock)),
        );

        let mut auto_refresh =
            AutoRefresh::new(Arc::clone(&orchestrator)).with_interval(self.refresh_interval);
        if let Some(reports) = self.reports {
            auto_refresh = auto_refresh.with_reports(reports);
        }

        Session {
            portfolio,
            storage: self.storage,
            prices: self.prices,
            orchestrator,
            auto_refresh,
            exporter: self.exporter,
            settings: self.settings,
            dirty: AtomicBool::new(false),
        }
    }

    /// Build, load saved state and start auto-refresh if the settings ask for it.
    ///
    /// A load failure still yields a usable, empty session plus the notice.
    pub async fn open(self) -> (Session, Option<Notice>) {
        let session = self.build();
        let notice = session.load().await.err();
        if session.settings.auto_refresh {
            session.auto_refresh.enable();
        }
        (session, notice)
    }
}

/// Controller for one portfolio.
///
/// Every mutation is validated first, applied, then saved. A failed save is
/// reported as a notice but the in-memory change stays.
pub struct Session {
    portfolio: Arc<RwLock<Portfolio>>,
    storage: Arc<dyn PortfolioStorage>,
    prices: Arc<PriceService>,
    orchestrator: Arc<RefreshOrchestrator>,
    auto_refresh: AutoRefresh,
    exporter: CsvExporter,
    settings: SessionSettings,
    /// Set by every applied mutation; shutdown only saves when set.
    dirty: AtomicBool,
}

impl Session {
    /// Replace the in-memory portfolio with the saved one.
    ///
    /// On failure the in-memory portfolio is left as it was.
    pub async fn load(&self) -> Result<usize, Notice> {
        let loaded = match self.storage.load().await {
            Ok(portfolio) => portfolio,
            Err(e) => {
                warn!(error = %e, "could not load portfolio");
                return Err(Notice::from_load_error(e));
            }
        };

        for holding in loaded.holdings() {
            if let Some(at) = holding.last_updated() {
                self.prices
                    .seed_cache(holding.ticker().clone(), holding.current_price(), at)
                    .await;
            }
        }

        let count = loaded.len();
        *self.portfolio.write().await = loaded;
        self.dirty.store(false, Ordering::Release);
        Ok(count)
    }

    /// Save after a mutation that was already applied in memory.
    async fn persist(&self, portfolio: &Portfolio) -> Result<(), Notice> {
        self.dirty.store(true, Ordering::Release);
        self.storage.save(portfolio).await.map_err(|e| {
            warn!(error = %e, "failed to save portfolio");
            Notice::from(e)
        })
    }

    /// Validate, price and add a new holding.
    ///
    /// The price is fetched before anything is added, so an unknown ticker or
    /// an unreachable provider leaves the portfolio untouched.
    pub async fn add_holding(&self, ticker: &str, quantity: f64) -> Result<Holding, Notice> {
        let ticker = Ticker::parse(ticker)?;
        let quantity = validate_quantity(quantity)?;
        if self.portfolio.read().await.contains(&ticker) {
            return Err(PortfolioError::DuplicateKey(ticker).into());
        }

        let point = self.prices.get_price(&ticker).await?;
        let holding =
            Holding::new(ticker, quantity)?.with_price(point.price, Some(point.fetched_at))?;

        let mut portfolio = self.portfolio.write().await;
        portfolio.insert(holding.clone())?;
        info!(ticker = %holding.ticker(), quantity, price = point.price, "added holding");
        self.persist(&portfolio.downgrade()).await?;
        Ok(holding)
    }

    pub async fn validate_ticker(&self, ticker: &str) -> bool {
        self.prices.validate_ticker(ticker).await
    }

    pub async fn remove_holding(&self, ticker: &str) -> Result<Holding, Notice> {
        let ticker = Ticker::parse(ticker)?;
        let mut portfolio = self.portfolio.write().await;
        let removed = portfolio.remove(&ticker)?;
        info!(ticker = %ticker, "removed holding");
        self.persist(&portfolio.downgrade()).await?;
        Ok(removed)
    }

    pub async fn update_quantity(&self, ticker: &str, quantity: f64) -> Result<(), Notice> {
        let ticker = Ticker::parse(ticker)?;
        let quantity = validate_quantity(quantity)?;
        let mut portfolio = self.portfolio.write().await;
        portfolio.update_quantity(&ticker, quantity)?;
        info!(ticker = %ticker, quantity, "updated quantity");
        self.persist(&portfolio.downgrade()).await
    }

    pub async fn update_target_allocation(&self, ticker: &str, pct: f64) -> Result<(), Notice> {
        let ticker = Ticker::parse(ticker)?;
        let pct = validate_allocation(pct)?;
        let mut portfolio = self.portfolio.write().await;
        portfolio.update_target_allocation(&ticker, pct)?;
        info!(ticker = %ticker, target = pct, "updated target allocation");
        self.persist(&portfolio.downgrade()).await
    }

    /// Refresh every price now. Dropped if a refresh is already running.
    pub async fn refresh_now(&self) -> RefreshReport {
        self.orchestrator.refresh(RefreshTrigger::Manual).await
    }

    pub fn refresh_notice(&self, report: &RefreshReport) -> Option<Notice> {
        Notice::from_refresh(report)
    }

    pub fn refresh_state(&self) -> RefreshState {
        self.orchestrator.state()
    }

    pub async fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.prices.last_refresh().await
    }

    pub fn set_auto_refresh(&mut self, enabled: bool) {
        self.settings.auto_refresh = enabled;
        self.auto_refresh.set_enabled(enabled);
    }

    pub fn auto_refresh_enabled(&self) -> bool {
        self.auto_refresh.is_enabled()
    }

    pub fn set_share_rounding(&mut self, enabled: bool) {
        self.settings.share_rounding = enabled;
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.settings.theme = theme;
    }

    pub fn settings(&self) -> SessionSettings {
        self.settings
    }

    /// Derived figures for every holding under the session's rounding policy.
    pub async fn snapshot(&self) -> PortfolioSnapshot {
        self.portfolio
            .read()
            .await
            .snapshot(self.settings.share_rounding)
    }

    pub async fn portfolio(&self) -> Portfolio {
        self.portfolio.read().await.clone()
    }

    /// Status line such as `Target allocations: 100.0% (Balanced)`.
    pub async fn allocation_message(&self) -> String {
        let portfolio = self.portfolio.read().await;
        format!(
            "Target allocations: {:.1}% ({})",
            portfolio.allocation_total(),
            portfolio.allocation_status().label()
        )
    }

    /// Write a CSV of the current portfolio.
    ///
    /// The portfolio is copied under the lock; the file is written on the
    /// blocking pool so refreshes can keep applying prices meanwhile.
    pub async fn export_csv(&self) -> Result<PathBuf, Notice> {
        let portfolio = self.portfolio.read().await.clone();
        let exporter = self.exporter.clone();
        let rounding = self.settings.share_rounding;

        let written = tokio::task::spawn_blocking(move || exporter.export(&portfolio, rounding))
            .await
            .map_err(|e| {
                warn!(error = %e, "export task failed");
                Notice::generic(e)
            })?;
        Ok(written?)
    }

    /// Whether this session changed the portfolio since it was loaded.
    pub fn has_changes(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Stop the timer and save one last time, if anything changed.
    ///
    /// An unchanged session never writes, so a file that failed to load is
    /// left exactly as it was found.
    pub async fn shutdown(&self) -> Result<(), Notice> {
        self.auto_refresh.disable();
        if !self.has_changes() {
            return Ok(());
        }
        let portfolio = self.portfolio.read().await;
        self.storage.save(&portfolio).await.map_err(|e| {
            warn!(error = %e, "failed to save portfolio on shutdown");
            Notice::from(e)
        })
    }
}
