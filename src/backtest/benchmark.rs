// src/backtest/benchmark.rs
// Benchmark curves: single tickers and static fixed-weight blends

use chrono::NaiveDate;

use crate::backtest::prices::ReturnsTable;
use crate::backtest::types::{BenchmarkDefinition, EquityCurve};
use crate::common::{cumulative_growth, dot};

/// Series name of a blended benchmark curve
pub const MIX: &str = "mix";

/// Build a benchmark growth curve from `returns`.
///
/// A blend is rebalanced to its fixed weights every day by construction: it
/// is the cumulative product of the weighted daily return, with no drift.
/// Missing tickers or no complete rows give an empty curve.
pub fn mix_benchmark(returns: &ReturnsTable, definition: &BenchmarkDefinition) -> EquityCurve {
    match definition {
        BenchmarkDefinition::Single { ticker } => {
            if !returns.has_ticker(ticker) {
                return EquityCurve::empty(ticker.as_str());
            }
            let aligned = returns.restrict(&[ticker.as_str()]);
            let daily: Vec<f64> = aligned.rows.iter().map(|row| row[0]).collect();
            EquityCurve::new(ticker.as_str(), aligned.dates, cumulative_growth(&daily))
        }
        BenchmarkDefinition::Mix { weights } => {
            let cols: Vec<&str> = returns.tickers().filter(|t| weights.contains_key(*t)).collect();
            if cols.is_empty() {
                return EquityCurve::empty(MIX);
            }

            let raw: Vec<f64> = cols.iter().map(|t| weights[*t]).collect();
            let total: f64 = raw.iter().sum();
            if total <= 0.0 || !total.is_finite() {
                return EquityCurve::empty(MIX);
            }
            let w: Vec<f64> = raw.iter().map(|v| v / total).collect();

            let aligned = returns.restrict(&cols);
            let daily: Vec<f64> = aligned.rows.iter().map(|row| dot(&w, row)).collect();
            EquityCurve::new(MIX, aligned.dates, cumulative_growth(&daily))
        }
    }
}

/// Put a benchmark curve on the portfolio's date index for comparison.
///
/// Exact date matches are taken, gaps are forward-filled from the previous
/// index position, leading gaps are dropped and the result is rescaled to
/// start at 1.0.
pub fn align_to(curve: &EquityCurve, index: &[NaiveDate]) -> EquityCurve {
    let mut dates = Vec::new();
    let mut values = Vec::new();
    let mut last = f64::NAN;
    let mut j = 0;

    for &date in index {
        while j < curve.dates.len() && curve.dates[j] < date {
            j += 1;
        }
        if j < curve.dates.len() && curve.dates[j] == date && !curve.values[j].is_nan() {
            last = curve.values[j];
        }
        if !last.is_nan() {
            dates.push(date);
            values.push(last);
        }
    }

    EquityCurve::new(curve.name.clone(), dates, values).normalized()
}
