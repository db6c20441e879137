//! # Fund Backtester
//!
//! Model-portfolio backtesting: drifted, fee-adjusted equity curves with
//! annual rebalancing, benchmark blends and performance statistics.
//!
//! ## Features
//! - Day-by-day portfolio path with weight drift and fee drag
//! - Single-ticker and fixed-weight blended benchmarks
//! - CAGR, volatility, Sharpe, drawdown, monthly/yearly/rolling returns, VaR/CVaR
//! - Parquet price files with a TTL cache
//! - Compiles to native and WASM
//!
//! ## Example
//! ```
//! use fund_backtester::{iterate_path, Rebalance};
//!
//! let rows = vec![vec![0.10, 0.02], vec![-0.10, -0.0196]];
//! let equity = iterate_path(&rows, &[2024, 2024], &[0.5, 0.5], Rebalance::Never, 0.0);
//!
//! assert!((equity[0] - 1.06).abs() < 1e-12);
//! ```

pub mod common;
pub mod config;
pub mod error;
pub mod backtest;

// Re-export commonly used items at crate root
pub use backtest::{
    compute_kpis, iterate_path, mix_benchmark, renormalize, simulate, Backtester, BacktestReport,
    BacktestRequest, BenchmarkDefinition, Catalog, EquityCurve, KpiBundle, PriceSource, PriceTable,
    Rebalance, ReturnsTable,
};
pub use config::{load_settings, Settings};
pub use error::{Error, Result};

#[cfg(feature = "wasm")]
use wasm_bindgen::prelude::*;

/// WASM bindings for browser/Node.js use
#[cfg(feature = "wasm")]
#[wasm_bindgen]
pub struct Backtest;

#[cfg(feature = "wasm")]
#[wasm_bindgen]
impl Backtest {
    /// Equity path over a row-major return matrix of `target.len()` columns.
    /// `years[i]` is the calendar year of row `i`.
    #[wasm_bindgen]
    pub fn simulate_path(
        returns: &[f64],
        years: &[i32],
        target: &[f64],
        annual_rebalance: bool,
        fee_annual: f64,
    ) -> Vec<f64> {
        if target.is_empty() {
            return Vec::new();
        }
        let rows: Vec<&[f64]> = returns.chunks_exact(target.len()).collect();
        let rebalance = if annual_rebalance { Rebalance::Annual } else { Rebalance::Never };
        backtest::simulation::iterate_path(&rows, years, target, rebalance, fee_annual)
    }

    #[wasm_bindgen]
    pub fn rolling_returns(values: &[f64], window: usize) -> Vec<f64> {
        backtest::metrics::rolling_returns(values, window)
    }

    /// `[VaR95, CVaR95]`
    #[wasm_bindgen]
    pub fn value_at_risk(returns: &[f64]) -> Vec<f64> {
        let (var, cvar) = backtest::metrics::value_at_risk(returns);
        vec![var, cvar]
    }

    #[wasm_bindgen]
    pub fn max_drawdown(equity: &[f64]) -> f64 {
        backtest::metrics::max_drawdown(equity)
    }
}
