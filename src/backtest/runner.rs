// src/backtest/runner.rs
// Main backtest runner - orchestrates a fund backtest end to end

use chrono::{Duration, Local, NaiveDate};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::backtest::benchmark::{align_to, mix_benchmark};
use crate::backtest::catalog::Catalog;
use crate::backtest::data::PriceSource;
use crate::backtest::metrics::{
    compute_kpis, distribution_stats, monthly_returns, rolling_12m, yearly_returns,
};
use crate::backtest::prices::ReturnsTable;
use crate::backtest::simulation::simulate;
use crate::backtest::types::*;
use crate::backtest::weighting::renormalize;
use crate::config::Settings;
use crate::error::{Error, Result};

/// Preview window length in days
pub const PREVIEW_DAYS: i64 = 365 * 3;

/// Benchmarks shown on a preview
pub const PREVIEW_BENCHMARKS: [&str; 2] = ["SPY", "60/40"];

/// Values used when a request leaves a field unset
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestDefaults {
    pub start_amount: f64,
    pub benchmarks: Vec<String>,
    pub risk_free_rate: f64,
}

impl Default for BacktestDefaults {
    fn default() -> Self {
        BacktestDefaults::from(&Settings::default())
    }
}

impl From<&Settings> for BacktestDefaults {
    fn from(s: &Settings) -> Self {
        BacktestDefaults {
            start_amount: s.start_amount,
            benchmarks: s.benchmarks.clone(),
            risk_free_rate: s.risk_free_rate,
        }
    }
}

/// Runs backtests for catalog funds against a price source.
///
/// Holds no per-run state, so one instance can serve concurrent requests.
pub struct Backtester<S> {
    source: S,
    catalog: Catalog,
    defaults: BacktestDefaults,
}

impl<S: PriceSource> Backtester<S> {
    pub fn new(source: S, catalog: Catalog) -> Self {
        Backtester {
            source,
            catalog,
            defaults: BacktestDefaults::default(),
        }
    }

    pub fn with_defaults(mut self, defaults: BacktestDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn defaults(&self) -> &BacktestDefaults {
        &self.defaults
    }

    /// Run a backtest, clamping the end date to today
    pub fn run(&self, req: &BacktestRequest) -> Result<BacktestReport> {
        self.run_as_of(req, Local::now().date_naive())
    }

    /// Three-year preview of a fund against SPY and 60/40
    pub fn preview(&self, fund_id: &str) -> Result<BacktestReport> {
        let today = Local::now().date_naive();
        self.run_as_of(&preview_request(fund_id, today), today)
    }

    /// Run a backtest as if today were `today`
    pub fn run_as_of(&self, req: &BacktestRequest, today: NaiveDate) -> Result<BacktestReport> {
        // Parameters
        let start = req.start_date;
        let end = req.end_date.min(today);
        if start >= end {
            return Err(Error::InvalidDateRange { start, end });
        }

        let fund = self.catalog.fund(&req.fund_id)?;
        let bench_ids = req.benchmarks.as_ref().unwrap_or(&self.defaults.benchmarks);
        let benchmarks = self.catalog.resolve_benchmarks(bench_ids)?;

        let settings = BacktestSettings {
            start_amount: req.start_amount.unwrap_or(self.defaults.start_amount),
            rebalance: req.rebalance.unwrap_or(fund.default_rebalance),
            fee_annual: req.fee_annual.unwrap_or(fund.default_fee),
            risk_free_rate: req.risk_free_rate.unwrap_or(self.defaults.risk_free_rate),
        };

        // Prices for the fund and every benchmark constituent
        let needed: BTreeSet<&str> = fund
            .tickers()
            .chain(benchmarks.iter().flat_map(|b| b.definition.tickers()))
            .collect();
        let needed: Vec<String> = needed.into_iter().map(String::from).collect();

        let prices = self.source.fetch_prices(&needed, start, end)?;
        if prices.is_empty() {
            return Err(Error::NoPriceData);
        }
        debug!(tickers = prices.tickers().count(), rows = prices.len(), "prices loaded");

        // Restrict the fund to what the source could provide
        let present: Vec<&str> = fund.tickers().filter(|t| prices.has_ticker(t)).collect();
        let missing: Vec<String> = fund
            .tickers()
            .filter(|t| !prices.has_ticker(t))
            .map(String::from)
            .collect();

        if present.is_empty() {
            return Err(Error::NoViableTickers);
        }
        if !missing.is_empty() {
            warn!(fund = %fund.id, missing = ?missing, "fund tickers without data");
        }

        let weights = renormalize(&fund.allocations, &present);
        if weights.is_empty() {
            return Err(Error::NoViableAllocation);
        }

        let returns = ReturnsTable::from_prices(&prices);
        let rows = returns.restrict(&present).len();
        if rows < 2 {
            return Err(Error::InsufficientHistory { rows });
        }

        // Portfolio path
        let eq = simulate(&returns, &weights, settings.rebalance, settings.fee_annual).normalized();
        let (effective_start, effective_end) = match (eq.first_date(), eq.last_date()) {
            (Some(s), Some(e)) => (s, e),
            _ => return Err(Error::EmptyPortfolio),
        };

        // Statistics
        let kpis = compute_kpis(
            &eq,
            settings.start_amount,
            effective_start,
            effective_end,
            settings.risk_free_rate,
        );
        let monthly = monthly_returns(&eq);
        let distribution = distribution_stats(&monthly);

        // Benchmarks on the portfolio's dates
        let mut bench_series = Vec::with_capacity(benchmarks.len());
        for b in &benchmarks {
            let curve = align_to(&mix_benchmark(&returns, &b.definition), &eq.dates);
            if curve.is_empty() {
                warn!(benchmark = %b.id, "benchmark has no data over the portfolio's dates");
                continue;
            }
            bench_series.push(BenchmarkSeries {
                id: b.id.clone(),
                name: b.name.clone(),
                curve: curve.points(),
            });
        }

        info!(
            fund = %fund.id,
            start = %effective_start,
            end = %effective_end,
            days = eq.len(),
            total_return = eq.last_value().map(|v| v - 1.0).unwrap_or(f64::NAN),
            "backtest complete"
        );

        Ok(BacktestReport {
            fund_id: fund.id.clone(),
            fund_name: fund.name.clone(),
            effective_start,
            effective_end,
            missing_tickers: missing,
            weights,
            kpis,
            equity_curve: eq.points(),
            benchmarks: bench_series,
            yearly: yearly_returns(&eq),
            monthly,
            rolling_12m: rolling_12m(&eq),
            distribution,
            settings,
        })
    }
}

/// Last three years to `today`, benchmarks SPY and 60/40, 100,000 start
pub fn preview_request(fund_id: &str, today: NaiveDate) -> BacktestRequest {
    BacktestRequest {
        start_amount: Some(100_000.0),
        benchmarks: Some(PREVIEW_BENCHMARKS.iter().map(|s| s.to_string()).collect()),
        ..BacktestRequest::new(fund_id, today - Duration::days(PREVIEW_DAYS), today)
    }
}
