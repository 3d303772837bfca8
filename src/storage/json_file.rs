use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, info, warn};

use super::{PortfolioDocument, PortfolioStorage, StorageError};
use crate::clock::{Clock, SystemClock};
use crate::portfolio::Portfolio;

/// Portfolio stored as one pretty-printed JSON document.
///
/// Files next to the document:
/// ```text
/// portfolio.json          current state
/// portfolio.json.backup   state before the last save
/// portfolio.json.tmp      in-progress write, renamed over the document
/// ```
pub struct JsonFileStorage {
    path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl JsonFileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "backup")
    }

    fn temp_path(&self) -> PathBuf {
        sibling(&self.path, "tmp")
    }

    async fn ensure_dir(&self) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::io(parent, e))?;
        }
        Ok(())
    }

    /// `Ok(None)` when the file does not exist.
    async fn read_portfolio(path: &Path) -> Result<Option<Portfolio>, StorageError> {
        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StorageError::io(path, e)),
        };

        Self::decode(path, &content).map(Some)
    }

    /// Any bytes that are not a valid document, invalid UTF-8 included, are `Corrupt`.
    fn decode(path: &Path, content: &[u8]) -> Result<Portfolio, StorageError> {
        let document: PortfolioDocument = serde_json::from_slice(content)
            .map_err(|e| StorageError::Corrupt(format!("{}: {e}", path.display())))?;
        document.into_portfolio()
    }

    /// Copy the current document to the backup. A file that does not decode
    /// is never copied, so the backup always holds the last good state.
    async fn backup_current(&self) -> Result<(), StorageError> {
        let content = match fs::read(&self.path).await {
            Ok(content) if content.is_empty() => return Ok(()),
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StorageError::io(&self.path, e)),
        };

        if let Err(e) = Self::decode(&self.path, &content) {
            warn!(path = %self.path.display(), error = %e, "current file unreadable; keeping existing backup");
            return Ok(());
        }

        let backup = self.backup_path();
        fs::write(&backup, content)
            .await
            .map_err(|e| StorageError::io(backup, e))
    }

    async fn recover_from_backup(&self, reason: &str) -> Result<Portfolio, StorageError> {
        let backup = self.backup_path();
        warn!(path = %self.path.display(), error = reason, "portfolio file corrupt; trying backup");

        match Self::read_portfolio(&backup).await {
            Ok(Some(portfolio)) => {
                if let Err(e) = fs::copy(&backup, &self.path).await {
                    warn!(path = %self.path.display(), error = %e, "could not restore backup over portfolio file");
                } else {
                    info!(path = %self.path.display(), holdings = portfolio.len(), "restored portfolio from backup");
                }
                Ok(portfolio)
            }
            Ok(None) => Err(StorageError::Corrupt(reason.to_string())),
            Err(e) => {
                warn!(path = %backup.display(), error = %e, "backup unusable");
                Err(StorageError::Corrupt(reason.to_string()))
            }
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

#[async_trait::async_trait]
impl PortfolioStorage for JsonFileStorage {
    async fn load(&self) -> Result<Portfolio, StorageError> {
        debug!(path = %self.path.display(), "loading portfolio");
        match Self::read_portfolio(&self.path).await {
            Ok(Some(portfolio)) => {
                info!(path = %self.path.display(), holdings = portfolio.len(), "loaded portfolio");
                Ok(portfolio)
            }
            Ok(None) => {
                debug!(path = %self.path.display(), "no portfolio file; starting empty");
                Ok(Portfolio::new())
            }
            Err(StorageError::Corrupt(reason)) => self.recover_from_backup(&reason).await,
            Err(e) => Err(e),
        }
    }

    async fn save(&self, portfolio: &Portfolio) -> Result<(), StorageError> {
        self.ensure_dir().await?;
        self.backup_current().await?;

        let document = PortfolioDocument::from_portfolio(portfolio, self.clock.now());
        let content = serde_json::to_string_pretty(&document)
            .map_err(|e| StorageError::io(&self.path, std::io::Error::other(e)))?;

        let temp = self.temp_path();
        if let Err(e) = fs::write(&temp, content).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::io(&temp, e));
        }
        if let Err(e) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(StorageError::io(&self.path, e));
        }

        info!(path = %self.path.display(), holdings = portfolio.len(), "saved portfolio");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sibling_paths() {
        let storage = JsonFileStorage::new("/data/portfolio.json");
        assert_eq!(
            storage.backup_path(),
            PathBuf::from("/data/portfolio.json.backup")
        );
        assert_eq!(storage.temp_path(), PathBuf::from("/data/portfolio.json.tmp"));
    }
}
