use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RefineryError>;

#[derive(Error, Debug)]
pub enum RefineryError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Store error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("Timestamp parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),

    #[error("Station roster is empty: {}", .0.display())]
    EmptyRoster(PathBuf),

    #[error(
        "Residual duplicate keys after {stage} for station {station_id} \
         ({count} keys affected, rows dumped to {})", .dump.display()
    )]
    ResidualDuplicates {
        stage: &'static str,
        station_id: String,
        count: usize,
        dump: PathBuf,
    },

    #[error(
        "Duplicate keys inside upsert batch for station {station_id} \
         ({count} keys affected, rows dumped to {})", .dump.display()
    )]
    DuplicateKeysInBatch {
        station_id: String,
        count: usize,
        dump: PathBuf,
    },
}

impl RefineryError {
    /// Consistency violations indicate a broken resolver, not bad input.
    /// They abort the run instead of skipping the station.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(
            self,
            RefineryError::ResidualDuplicates { .. } | RefineryError::DuplicateKeysInBatch { .. }
        )
    }
}
