mod document;
mod json_file;
mod memory;

use std::path::PathBuf;

pub use document::{HoldingRecord, PortfolioDocument, DOCUMENT_VERSION};
pub use json_file::JsonFileStorage;
pub use memory::MemoryStorage;

use crate::portfolio::Portfolio;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The saved state could not be understood.
    #[error("portfolio data corrupted: {0}")]
    Corrupt(String),
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Whole-portfolio persistence. Each save replaces the previous state.
#[async_trait::async_trait]
pub trait PortfolioStorage: Send + Sync {
    /// Load the saved portfolio; an absent store yields an empty one.
    async fn load(&self) -> Result<Portfolio, StorageError>;

    async fn save(&self, portfolio: &Portfolio) -> Result<(), StorageError>;
}
