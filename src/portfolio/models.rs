// src/portfolio/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{RebalanceAction, Ticker};

/// Tolerance used when deciding whether targets add up to 100%.
pub const ALLOCATION_TOLERANCE: f64 = 0.01;

/// How the sum of target allocations compares to 100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStatus {
    Below,
    Balanced,
    Above,
}

impl AllocationStatus {
    pub fn classify(allocation_total: f64) -> Self {
        if (allocation_total - 100.0).abs() < ALLOCATION_TOLERANCE {
            AllocationStatus::Balanced
        } else if allocation_total > 100.0 {
            AllocationStatus::Above
        } else {
            AllocationStatus::Below
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            AllocationStatus::Below => "Under 100%",
            AllocationStatus::Balanced => "Balanced",
            AllocationStatus::Above => "Over 100%",
        }
    }
}

/// Every derived field for one holding, computed against one total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingSummary {
    pub ticker: Ticker,
    pub price: f64,
    pub quantity: f64,
    pub target_allocation: f64,
    pub current_allocation: f64,
    pub current_value: f64,
    pub target_value: f64,
    pub difference: f64,
    pub action: RebalanceAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub total_value: f64,
    pub allocation_total: f64,
    pub allocation_status: AllocationStatus,
    /// Holdings in display order.
    pub rows: Vec<HoldingSummary>,
}

impl PortfolioSnapshot {
    pub fn row(&self, ticker: &Ticker) -> Option<&HoldingSummary> {
        self.rows.iter().find(|row| &row.ticker == ticker)
    }
}
