use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::StorageError;
use crate::models::{Holding, Ticker};
use crate::portfolio::Portfolio;

pub const DOCUMENT_VERSION: &str = "1.0";

fn default_version() -> String {
    DOCUMENT_VERSION.to_string()
}

/// On-disk form of a portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioDocument {
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_saved: Option<DateTime<Utc>>,
    pub holdings: Vec<HoldingRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HoldingRecord {
    pub ticker: String,
    pub quantity: f64,
    pub target_allocation: f64,
    /// `0` or missing means the price was never fetched.
    #[serde(default)]
    pub last_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Accepts RFC 3339, or a naive ISO timestamp taken as UTC. Anything else
/// reads as absent instead of failing the whole document.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(serde_json::Value::as_str).and_then(parse_timestamp))
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

impl PortfolioDocument {
    pub fn from_portfolio(portfolio: &Portfolio, saved_at: DateTime<Utc>) -> Self {
        let holdings = portfolio
            .holdings()
            .map(|h| HoldingRecord {
                ticker: h.ticker().to_string(),
                quantity: h.quantity(),
                target_allocation: h.target_allocation(),
                last_price: Some(h.current_price()),
                last_updated: h.last_updated(),
            })
            .collect();

        Self {
            version: DOCUMENT_VERSION.to_string(),
            last_saved: Some(saved_at),
            holdings,
        }
    }

    /// Validate every record and build the portfolio.
    pub fn into_portfolio(self) -> Result<Portfolio, StorageError> {
        let mut portfolio = Portfolio::new();
        for (index, record) in self.holdings.into_iter().enumerate() {
            let holding = record
                .into_holding()
                .map_err(|e| StorageError::Corrupt(format!("holding {index}: {e}")))?;
            portfolio
                .insert(holding)
                .map_err(|e| StorageError::Corrupt(format!("holding {index}: {e}")))?;
        }
        Ok(portfolio)
    }
}

impl HoldingRecord {
    fn into_holding(self) -> Result<Holding, crate::models::InputError> {
        let ticker = Ticker::parse(&self.ticker)?;
        Holding::new(ticker, self.quantity)?
            .with_target_allocation(self.target_allocation)?
            .with_price(self.last_price.unwrap_or(0.0), self.last_updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reads_naive_and_invalid_timestamps() {
        let json = r#"{
            "version": "1.0",
            "last_saved": "2024-03-01T10:15:30.123456",
            "holdings": [
                {"ticker": "aapl", "quantity": 10, "target_allocation": 50,
                 "last_price": 180.5, "last_updated": "2024-03-01T10:15:00"},
                {"ticker": "MSFT", "quantity": 2.5, "target_allocation": 50,
                 "last_price": null, "last_updated": "yesterday"}
            ]
        }"#;

        let doc: PortfolioDocument = serde_json::from_str(json).unwrap();
        assert_eq!(
            doc.holdings[0].last_updated,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 15, 0).unwrap())
        );
        assert_eq!(doc.holdings[1].last_updated, None);
        assert!(doc.last_saved.is_some());

        let portfolio = doc.into_portfolio().unwrap();
        assert_eq!(portfolio.len(), 2);
        let aapl = portfolio.get(&Ticker::parse("AAPL").unwrap()).unwrap();
        assert_eq!(aapl.current_price(), 180.5);
        let msft = portfolio.get(&Ticker::parse("MSFT").unwrap()).unwrap();
        assert_eq!(msft.current_price(), 0.0);
    }

    #[test]
    fn missing_required_field_fails_to_parse() {
        let json = r#"{"holdings": [{"ticker": "AAPL", "quantity": 1}]}"#;
        assert!(serde_json::from_str::<PortfolioDocument>(json).is_err());
    }

    #[test]
    fn invalid_values_are_corrupt() {
        let json = r#"{"holdings": [{"ticker": "AAPL", "quantity": -1, "target_allocation": 10}]}"#;
        let doc: PortfolioDocument = serde_json::from_str(json).unwrap();
        assert!(matches!(doc.into_portfolio(), Err(StorageError::Corrupt(_))));
    }

    #[test]
    fn duplicate_tickers_are_corrupt() {
        let json = r#"{"holdings": [
            {"ticker": "AAPL", "quantity": 1, "target_allocation": 10},
            {"ticker": "aapl", "quantity": 2, "target_allocation": 10}
        ]}"#;
        let doc: PortfolioDocument = serde_json::from_str(json).unwrap();
        assert!(matches!(doc.into_portfolio(), Err(StorageError::Corrupt(_))));
    }
}
