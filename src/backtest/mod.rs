// src/backtest/mod.rs
// Fund backtest engine module

pub mod types;
pub mod prices;
pub mod weighting;
pub mod simulation;
pub mod benchmark;
pub mod metrics;
pub mod catalog;
pub mod data;
pub mod format;
pub mod runner;

// Re-export main types and functions
pub use types::*;
pub use prices::{AlignedReturns, PriceTable, ReturnsTable};
pub use weighting::renormalize;
pub use simulation::{iterate_path, simulate, TRADING_DAYS};
pub use benchmark::{align_to, mix_benchmark};
pub use metrics::{
    compute_kpis, distribution_stats, monthly_returns, rolling_12m, value_at_risk, yearly_returns,
};
pub use catalog::Catalog;
pub use data::{CachedPriceSource, MemoryPriceSource, ParquetPriceSource, PriceSource};
pub use format::FormattedKpis;
pub use runner::{preview_request, BacktestDefaults, Backtester};
