use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use super::ExportError;
use crate::clock::{Clock, SystemClock};
use crate::format::{format_percent, format_quantity, MoneyFormat};
use crate::portfolio::{HoldingSummary, Portfolio};

pub const CSV_HEADERS: [&str; 9] = [
    "Ticker",
    "Price",
    "Quantity",
    "Target Allocation",
    "Current Allocation",
    "Current Value",
    "Target Value",
    "Difference",
    "Rebalance Action",
];

/// Writes portfolio snapshots to timestamped CSV files.
///
/// Files are named `portfolio_<YYYY-MM-DD>_<HH-MM-SS>.csv` in local time.
/// An existing file is never replaced: a second export in the same second
/// gets `_2`, then `_3`, and so on.
#[derive(Clone)]
pub struct CsvExporter {
    directory: PathBuf,
    clock: Arc<dyn Clock>,
    money: MoneyFormat,
}

impl CsvExporter {
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
            clock: Arc::new(SystemClock),
            money: MoneyFormat::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_money_format(mut self, money: MoneyFormat) -> Self {
        self.money = money;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn base_filename(&self) -> String {
        format!(
            "portfolio_{}",
            self.clock.now_local().format("%Y-%m-%d_%H-%M-%S")
        )
    }

    /// Export every holding with the given rounding policy; returns the new file.
    pub fn export(&self, portfolio: &Portfolio, rounding: bool) -> Result<PathBuf, ExportError> {
        if portfolio.is_empty() {
            return Err(ExportError::EmptyPortfolio);
        }

        fs::create_dir_all(&self.directory).map_err(|source| ExportError::Io {
            path: self.directory.clone(),
            source,
        })?;

        let (path, file) = self.create_unique_file()?;
        let snapshot = portfolio.snapshot(rounding);

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(CSV_HEADERS)?;
        for row in &snapshot.rows {
            writer.write_record(self.record(row))?;
        }
        writer.flush().map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

        info!(path = %path.display(), rows = snapshot.rows.len(), "exported portfolio");
        Ok(path)
    }

    fn record(&self, row: &HoldingSummary) -> [String; 9] {
        [
            row.ticker.to_string(),
            self.money.format(row.price),
            format_quantity(row.quantity),
            format_percent(row.target_allocation),
            format_percent(row.current_allocation),
            self.money.format(row.current_value),
            self.money.format(row.target_value),
            self.money.format(row.difference),
            row.action.to_string(),
        ]
    }

    fn create_unique_file(&self) -> Result<(PathBuf, File), ExportError> {
        let base = self.base_filename();
        let mut attempt = 1u32;
        loop {
            let name = if attempt == 1 {
                format!("{base}.csv")
            } else {
                format!("{base}_{attempt}.csv")
            };
            let path = self.directory.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(source) => return Err(ExportError::Io { path, source }),
            }
        }
    }
}
