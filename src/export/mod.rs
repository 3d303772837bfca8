mod csv_file;

use std::path::PathBuf;

pub use csv_file::{CsvExporter, CSV_HEADERS};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("cannot export an empty portfolio")]
    EmptyPortfolio,
    #[error("cannot write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("csv write failed: {0}")]
    Csv(#[from] csv::Error),
}
