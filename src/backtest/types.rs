// src/backtest/types.rs
// Core value types for the backtest engine and its JSON API

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::Error;

// ============================================================================
// Allocation
// ============================================================================

/// Ticker -> weight. Ordered so that every fold over it is deterministic.
pub type Allocation = BTreeMap<String, f64>;

/// Rebalancing policy applied by the path simulator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
pub enum Rebalance {
    /// Reset to target weights on the first trading row of each new year
    #[default]
    #[serde(alias = "annual")]
    Annual,
    /// Let weights drift for the whole horizon
    #[serde(rename = "None", alias = "none", alias = "Never", alias = "never")]
    Never,
}

impl FromStr for Rebalance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "annual" => Ok(Rebalance::Annual),
            "none" | "never" => Ok(Rebalance::Never),
            _ => Err(Error::InvalidRebalance(s.to_string())),
        }
    }
}

impl fmt::Display for Rebalance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rebalance::Annual => write!(f, "Annual"),
            Rebalance::Never => write!(f, "None"),
        }
    }
}

/// Display currency. Only changes the symbol, never the numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Usd,
    Inr,
}

impl Currency {
    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Inr => "₹",
        }
    }
}

// ============================================================================
// Catalog entries
// ============================================================================

/// A model fund: target allocation plus its default simulation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundDefinition {
    pub id: String,
    pub name: String,
    pub allocations: Allocation,
    /// Annual fee as a fraction (0.002 = 20 bps)
    pub default_fee: f64,
    #[serde(default)]
    pub default_rebalance: Rebalance,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default)]
    pub description: String,
}

impl FundDefinition {
    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.allocations.keys().map(String::as_str)
    }
}

/// How a benchmark curve is built from returns
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BenchmarkDefinition {
    /// Cumulative return of one ticker
    Single { ticker: String },
    /// Static, fixed-weight blend of daily returns
    Mix { weights: Allocation },
}

impl BenchmarkDefinition {
    pub fn tickers(&self) -> Vec<&str> {
        match self {
            BenchmarkDefinition::Single { ticker } => vec![ticker.as_str()],
            BenchmarkDefinition::Mix { weights } => weights.keys().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Benchmark {
    pub id: String,
    pub name: String,
    pub definition: BenchmarkDefinition,
}

// ============================================================================
// Series
// ============================================================================

/// A point on an equity curve (or any dated series)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Dated growth-factor series. Dates ascend strictly.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EquityCurve {
    pub name: String,
    pub dates: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl EquityCurve {
    pub fn new(name: impl Into<String>, dates: Vec<NaiveDate>, values: Vec<f64>) -> Self {
        debug_assert_eq!(dates.len(), values.len());
        EquityCurve { name: name.into(), dates, values }
    }

    pub fn empty(name: impl Into<String>) -> Self {
        EquityCurve { name: name.into(), dates: Vec::new(), values: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn first_value(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn last_value(&self) -> Option<f64> {
        self.values.last().copied()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Rescale so the first value is 1.0
    pub fn normalized(&self) -> EquityCurve {
        let base = match self.first_value() {
            Some(v) => v,
            None => return self.clone(),
        };
        EquityCurve {
            name: self.name.clone(),
            dates: self.dates.clone(),
            values: self.values.iter().map(|v| v / base).collect(),
        }
    }

    pub fn points(&self) -> Vec<EquityPoint> {
        self.dates
            .iter()
            .zip(&self.values)
            .map(|(&date, &value)| EquityPoint { date, value })
            .collect()
    }
}

/// Return over one calendar month
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MonthlyReturn {
    pub year: i32,
    pub month: u32,
    pub value: f64,
}

impl MonthlyReturn {
    /// `YYYY-MM`
    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }

    pub(crate) fn period_of(date: NaiveDate) -> (i32, u32) {
        (date.year(), date.month())
    }
}

/// Return over one calendar year
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct YearlyReturn {
    pub year: i32,
    pub value: f64,
}

// ============================================================================
// Statistics
// ============================================================================

/// Summary performance statistics.
///
/// Undefined statistics are `NaN` (serialized as `null`), never zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KpiBundle {
    pub final_value: f64,
    pub abs_return: f64,
    /// NaN when no time elapsed between start and end
    pub cagr: f64,
    /// NaN with fewer than two daily returns
    pub vol: f64,
    /// NaN when daily returns have zero (or undefined) deviation
    pub sharpe: f64,
    /// NaN when there are no monthly returns
    pub pct_positive_months: f64,
    /// Largest peak-to-trough decline, as a negative fraction
    pub max_drawdown: f64,
}

/// Historical monthly distribution statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionStats {
    pub var95: f64,
    pub cvar95: f64,
    pub avg_monthly: f64,
    pub monthly_returns: Vec<f64>,
}

// ============================================================================
// API Request/Response Types
// ============================================================================

/// Request to backtest one fund. Unset fields fall back to the fund's and
/// the service's defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRequest {
    pub fund_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub start_amount: Option<f64>,
    pub benchmarks: Option<Vec<String>>,
    pub rebalance: Option<Rebalance>,
    pub fee_annual: Option<f64>,
    pub risk_free_rate: Option<f64>,
}

impl BacktestRequest {
    pub fn new(fund_id: impl Into<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        BacktestRequest {
            fund_id: fund_id.into(),
            start_date,
            end_date,
            start_amount: None,
            benchmarks: None,
            rebalance: None,
            fee_annual: None,
            risk_free_rate: None,
        }
    }
}

/// A benchmark curve aligned onto the portfolio's dates
#[derive(Debug, Clone, Serialize)]
pub struct BenchmarkSeries {
    pub id: String,
    pub name: String,
    pub curve: Vec<EquityPoint>,
}

/// Settings actually used for the run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestSettings {
    pub start_amount: f64,
    pub rebalance: Rebalance,
    pub fee_annual: f64,
    pub risk_free_rate: f64,
}

/// Full backtest response
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestReport {
    pub fund_id: String,
    pub fund_name: String,
    pub effective_start: NaiveDate,
    pub effective_end: NaiveDate,
    pub missing_tickers: Vec<String>,
    pub weights: Allocation,
    pub kpis: Option<KpiBundle>,
    pub equity_curve: Vec<EquityPoint>,
    pub benchmarks: Vec<BenchmarkSeries>,
    pub yearly: Vec<YearlyReturn>,
    pub monthly: Vec<MonthlyReturn>,
    pub rolling_12m: Vec<EquityPoint>,
    pub distribution: DistributionStats,
    pub settings: BacktestSettings,
}
