// src/error.rs
// Error type shared by the catalog, data layer and runner

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Configuration mistakes: fail fast.
    #[error("Unknown fund: {0}")]
    UnknownFund(String),

    #[error("Unknown benchmark: {0}")]
    UnknownBenchmark(String),

    #[error("Unknown rebalance policy: {0} (expected \"Annual\" or \"None\")")]
    InvalidRebalance(String),

    #[error("Start date {start} must be before end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    // Data availability: the runner's rendering of empty/NaN sentinels.
    #[error("No price data returned. Try a later start date or check the price source.")]
    NoPriceData,

    #[error("None of the fund's tickers have data for the selected range.")]
    NoViableTickers,

    #[error("No positive weights remain after filtering to available tickers.")]
    NoViableAllocation,

    #[error("Not enough overlapping data for the selected dates ({rows} aligned rows). Try a later start date.")]
    InsufficientHistory { rows: usize },

    #[error("Portfolio series is empty after alignment. Try different dates.")]
    EmptyPortfolio,

    // Infrastructure
    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read parquet: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Failed to decode arrow data: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to load configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Malformed price data: {0}")]
    MalformedData(String),
}

impl Error {
    /// True when the request was well formed but the data could not support it.
    pub fn is_data_availability(&self) -> bool {
        matches!(
            self,
            Error::NoPriceData
                | Error::NoViableTickers
                | Error::NoViableAllocation
                | Error::InsufficientHistory { .. }
                | Error::EmptyPortfolio
        )
    }

    /// True for unknown identifiers and malformed request parameters.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownFund(_)
                | Error::UnknownBenchmark(_)
                | Error::InvalidRebalance(_)
                | Error::InvalidDateRange { .. }
        )
    }

    /// Caused by the request or the data rather than the service itself.
    pub fn is_expected(&self) -> bool {
        self.is_configuration() || self.is_data_availability()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
