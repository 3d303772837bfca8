// src/storage/memory.rs
//! In-memory storage for tests and embedding.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tokio::sync::Mutex;

use super::{PortfolioStorage, StorageError};
use crate::portfolio::Portfolio;

#[derive(Default)]
pub struct MemoryStorage {
    saved: Mutex<Option<Portfolio>>,
    fail_saves: AtomicBool,
    corrupt: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_portfolio(portfolio: Portfolio) -> Self {
        Self {
            saved: Mutex::new(Some(portfolio)),
            ..Self::default()
        }
    }

    /// Make every following save fail with an I/O error.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make loads report corrupt data.
    pub fn set_corrupt(&self, corrupt: bool) {
        self.corrupt.store(corrupt, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub async fn saved(&self) -> Option<Portfolio> {
        self.saved.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl PortfolioStorage for MemoryStorage {
    async fn load(&self) -> Result<Portfolio, StorageError> {
        if self.corrupt.load(Ordering::SeqCst) {
            return Err(StorageError::Corrupt("memory storage marked corrupt".to_string()));
        }
        Ok(self.saved.lock().await.clone().unwrap_or_default())
    }

    async fn save(&self, portfolio: &Portfolio) -> Result<(), StorageError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(StorageError::io(
                "memory",
                std::io::Error::new(std::io::ErrorKind::PermissionDenied, "saves disabled"),
            ));
        }
        *self.saved.lock().await = Some(portfolio.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
