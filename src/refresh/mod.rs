//! Price refresh: the single-flight orchestrator and the auto-refresh timer.
//!
//! Manual refreshes and timer ticks both go through
//! [`RefreshOrchestrator::refresh`], so at most one batch is ever in flight.

mod auto;
mod orchestrator;

pub use auto::{AutoRefresh, DEFAULT_INTERVAL};
pub use orchestrator::{
    RefreshOrchestrator, RefreshOutcome, RefreshReport, RefreshState, RefreshTrigger,
};
