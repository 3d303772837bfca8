use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use super::{RefreshOrchestrator, RefreshOutcome, RefreshReport, RefreshTrigger};
use crate::duration::format_duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Repeating timer that feeds the orchestrator.
///
/// The first tick fires one interval after enabling. Each tick runs its
/// refresh as a separate task, so disabling the timer cancels future ticks
/// but never a fetch that has already started. Ticks that land while a
/// refresh is running are dropped.
pub struct AutoRefresh {
    orchestrator: Arc<RefreshOrchestrator>,
    interval: Duration,
    reports: Option<UnboundedSender<RefreshReport>>,
    timer: Mutex<Option<JoinHandle<()>>>,
}

impl AutoRefresh {
    pub fn new(orchestrator: Arc<RefreshOrchestrator>) -> Self {
        Self {
            orchestrator,
            interval: DEFAULT_INTERVAL,
            reports: None,
            timer: Mutex::new(None),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Deliver reports from timer-driven refreshes to this channel.
    pub fn with_reports(mut self, reports: UnboundedSender<RefreshReport>) -> Self {
        self.reports = Some(reports);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    fn timer(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.timer.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_enabled(&self) -> bool {
        self.timer().as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Start the timer. Must be called from within a tokio runtime.
    pub fn enable(&self) {
        let mut timer = self.timer();
        if timer.as_ref().is_some_and(|t| !t.is_finished()) {
            return;
        }

        let orchestrator = Arc::clone(&self.orchestrator);
        let reports = self.reports.clone();
        let period = self.interval;

        *timer = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                let orchestrator = Arc::clone(&orchestrator);
                let reports = reports.clone();
                tokio::spawn(async move {
                    let report = orchestrator.refresh(RefreshTrigger::Auto).await;
                    if report.outcome == RefreshOutcome::AlreadyRefreshing {
                        debug!("auto-refresh tick dropped; refresh already running");
                        return;
                    }
                    if let Some(reports) = reports {
                        let _ = reports.send(report);
                    }
                });
            }
        }));
        info!(interval = %format_duration(period), "auto-refresh enabled");
    }

    /// Stop the timer. A refresh already running is left to finish.
    pub fn disable(&self) {
        if let Some(timer) = self.timer().take() {
            timer.abort();
            info!("auto-refresh disabled");
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        if enabled {
            self.enable();
        } else {
            self.disable();
        }
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        if let Some(timer) = self.timer().take() {
            timer.abort();
        }
    }
}
