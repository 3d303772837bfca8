use std::fmt;

use serde::Serialize;

use crate::export::ExportError;
use crate::market_data::PriceError;
use crate::models::{InputError, Ticker};
use crate::portfolio::PortfolioError;
use crate::refresh::{RefreshOutcome, RefreshReport};
use crate::storage::StorageError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    InvalidTicker,
    InvalidInput,
    ApiError,
    NetworkError,
    FileError,
    DataCorruption,
    Generic,
}

impl NoticeKind {
    pub fn title(&self) -> &'static str {
        match self {
            NoticeKind::InvalidTicker => "Invalid Ticker",
            NoticeKind::InvalidInput => "Invalid Input",
            NoticeKind::ApiError => "API Error",
            NoticeKind::NetworkError => "Network Error",
            NoticeKind::FileError => "File Error",
            NoticeKind::DataCorruption => "Data Corruption",
            NoticeKind::Generic => "Error",
        }
    }
}

/// A dismissable message for the user, built from a typed error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub title: String,
    pub message: String,
}

pub(crate) const PRICE_SERVICE_DOWN: &str = "Price service isn't working, try again later";
pub(crate) const CANNOT_SAVE: &str = "Cannot save portfolio, check file permissions";
pub(crate) const DATA_CORRUPTED: &str = "Portfolio data corrupted, starting fresh";
pub(crate) const CANNOT_READ: &str = "Cannot read portfolio, check file permissions";

impl Notice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: kind.title().to_string(),
            message: message.into(),
        }
    }

    pub fn generic(details: impl fmt::Display) -> Self {
        Self::new(
            NoticeKind::Generic,
            format!("An unexpected error occurred: {details}"),
        )
    }

    pub fn ticker_not_found(ticker: &str) -> Self {
        Self::new(NoticeKind::InvalidTicker, format!("{ticker} not found"))
    }

    /// Notice for a failed load. Unlike a failed save, an I/O error here is a read problem.
    pub fn from_load_error(err: StorageError) -> Self {
        match err {
            StorageError::Io { .. } => Self::new(NoticeKind::FileError, CANNOT_READ),
            other => other.into(),
        }
    }

    /// Notice for a refresh that did not fully succeed, if any.
    pub fn from_refresh(report: &RefreshReport) -> Option<Self> {
        if report.persist_error.is_some() {
            return Some(Self::new(NoticeKind::FileError, CANNOT_SAVE));
        }

        match &report.outcome {
            RefreshOutcome::Partial { failures, .. } => Some(partial_failure(failures)),
            RefreshOutcome::Failed { failures } => Some(total_failure(failures)),
            _ => None,
        }
    }
}

fn join_tickers<'a>(tickers: impl Iterator<Item = &'a Ticker>) -> String {
    tickers.map(Ticker::as_str).collect::<Vec<_>>().join(", ")
}

fn partial_failure(failures: &[(Ticker, PriceError)]) -> Notice {
    if failures.iter().all(|(_, e)| e.is_not_found()) {
        return Notice::ticker_not_found(&join_tickers(failures.iter().map(|(t, _)| t)));
    }
    Notice::new(
        NoticeKind::NetworkError,
        format!(
            "Network error, using cached prices for {}",
            join_tickers(failures.iter().map(|(t, _)| t))
        ),
    )
}

fn total_failure(failures: &[(Ticker, PriceError)]) -> Notice {
    if failures.iter().all(|(_, e)| e.is_not_found()) {
        return Notice::ticker_not_found(&join_tickers(failures.iter().map(|(t, _)| t)));
    }
    Notice::new(NoticeKind::ApiError, PRICE_SERVICE_DOWN)
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.title, self.message)
    }
}

impl std::error::Error for Notice {}

impl From<InputError> for Notice {
    fn from(err: InputError) -> Self {
        match err {
            InputError::EmptyTicker => Notice::new(NoticeKind::InvalidTicker, "Enter a ticker symbol"),
            InputError::MalformedTicker(raw) => {
                Notice::new(NoticeKind::InvalidTicker, format!("{raw:?} is not a valid ticker"))
            }
            InputError::InvalidQuantity(_) => Notice::new(
                NoticeKind::InvalidInput,
                "Quantity must be zero or a positive number",
            ),
            InputError::InvalidAllocation(_) => Notice::new(
                NoticeKind::InvalidInput,
                "Target allocation must be between 0% and 100%",
            ),
            InputError::InvalidPrice(price) => Notice::generic(format!("invalid price {price}")),
        }
    }
}

impl From<PortfolioError> for Notice {
    fn from(err: PortfolioError) -> Self {
        match err {
            PortfolioError::InvalidInput(e) => e.into(),
            PortfolioError::NotFound(ticker) => Notice::new(
                NoticeKind::InvalidTicker,
                format!("{ticker} is not in your portfolio"),
            ),
            PortfolioError::DuplicateKey(ticker) => Notice::new(
                NoticeKind::InvalidTicker,
                format!("{ticker} is already in your portfolio"),
            ),
        }
    }
}

impl From<PriceError> for Notice {
    fn from(err: PriceError) -> Self {
        match err {
            PriceError::TickerNotFound(ticker) => Notice::ticker_not_found(&ticker),
            PriceError::SourceUnavailable(_) => Notice::new(NoticeKind::ApiError, PRICE_SERVICE_DOWN),
        }
    }
}

impl From<StorageError> for Notice {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corrupt(_) => Notice::new(NoticeKind::DataCorruption, DATA_CORRUPTED),
            StorageError::Io { .. } => Notice::new(NoticeKind::FileError, CANNOT_SAVE),
        }
    }
}

impl From<ExportError> for Notice {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::EmptyPortfolio => {
                Notice::new(NoticeKind::InvalidInput, "Cannot export an empty portfolio")
            }
            ExportError::Io { .. } | ExportError::Csv(_) => Notice::new(
                NoticeKind::FileError,
                "Cannot save CSV file, check file permissions",
            ),
        }
    }
}
