use std::collections::HashMap;

use tokio::sync::Mutex;

use super::PricePoint;
use crate::models::Ticker;

/// Last known good price per ticker.
#[derive(Debug, Default)]
pub struct PriceCache {
    entries: Mutex<HashMap<Ticker, PricePoint>>,
}

impl PriceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, ticker: &Ticker) -> Option<PricePoint> {
        self.entries.lock().await.get(ticker).cloned()
    }

    /// Record a freshly fetched price.
    pub async fn put(&self, point: PricePoint) {
        self.entries.lock().await.insert(point.ticker.clone(), point);
    }

    /// Prime from persisted state. Never replaces a newer entry.
    pub async fn seed(&self, point: PricePoint) {
        let mut entries = self.entries.lock().await;
        let keep_existing = entries
            .get(&point.ticker)
            .is_some_and(|existing| existing.fetched_at >= point.fetched_at);
        if !keep_existing {
            entries.insert(point.ticker.clone(), point);
        }
    }

    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}
