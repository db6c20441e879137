// src/backtest/simulation.rs
// Day-by-day portfolio path: weight drift, annual rebalancing and fee drag

use chrono::Datelike;

use crate::backtest::prices::ReturnsTable;
use crate::backtest::types::{Allocation, EquityCurve, Rebalance};
use crate::backtest::weighting::split_allocation;
use crate::common::dot;

/// Assumed trading days per year, used for fee accrual and annualization
pub const TRADING_DAYS: f64 = 252.0;

/// Series name of a simulated fund curve
pub const PORTFOLIO: &str = "Portfolio";

/// Annual fee spread evenly over `TRADING_DAYS`, regardless of how many rows
/// a real year contains.
#[inline]
pub fn daily_fee(fee_annual: f64) -> f64 {
    if fee_annual > 0.0 {
        fee_annual / TRADING_DAYS
    } else {
        0.0
    }
}

/// Simulate the equity curve of `weights` over `returns`.
///
/// Only rows where every weighted ticker has a return are used, so the output
/// dates are exactly those rows. Empty weights, or no complete rows, give an
/// empty curve. The curve starts from a base of 1.0 before the first day's
/// return; normalizing it is left to the caller.
pub fn simulate(
    returns: &ReturnsTable,
    weights: &Allocation,
    rebalance: Rebalance,
    fee_annual: f64,
) -> EquityCurve {
    if weights.is_empty() {
        return EquityCurve::empty(PORTFOLIO);
    }

    let (tickers, target) = split_allocation(weights);
    let aligned = returns.restrict(&tickers);
    if aligned.is_empty() {
        return EquityCurve::empty(PORTFOLIO);
    }

    let years: Vec<i32> = aligned.dates.iter().map(|d| d.year()).collect();
    let values = iterate_path(&aligned.rows, &years, &target, rebalance, fee_annual);

    EquityCurve::new(PORTFOLIO, aligned.dates, values)
}

/// The path kernel over a row-major return matrix.
///
/// `years[i]` is the calendar year of row `i`. Weights drift with the
/// previous row's returns and are rescaled to the simplex (or reset to
/// `target` if they collapse to zero). Under `Rebalance::Annual` they are also
/// reset whenever the year differs from the previous row's year. The fee is
/// charged on every row.
pub fn iterate_path<R: AsRef<[f64]>>(
    rows: &[R],
    years: &[i32],
    target: &[f64],
    rebalance: Rebalance,
    fee_annual: f64,
) -> Vec<f64> {
    let n = rows.len().min(years.len());
    if n == 0 || target.is_empty() {
        return Vec::new();
    }

    let fee = daily_fee(fee_annual);
    let mut equity = vec![0.0; n];
    let mut w_curr = target.to_vec();

    equity[0] = (1.0 - fee) * (1.0 + dot(&w_curr, rows[0].as_ref()));

    for i in 1..n {
        let prev = rows[i - 1].as_ref();
        for (w, r) in w_curr.iter_mut().zip(prev) {
            *w *= 1.0 + r;
        }
        let s: f64 = w_curr.iter().sum();
        if s != 0.0 {
            for w in w_curr.iter_mut() {
                *w /= s;
            }
        } else {
            w_curr.copy_from_slice(target);
        }

        if rebalance == Rebalance::Annual && years[i - 1] != years[i] {
            w_curr.copy_from_slice(target);
        }

        let day_ret = dot(&w_curr, rows[i].as_ref());
        equity[i] = equity[i - 1] * (1.0 - fee) * (1.0 + day_ret);
    }

    equity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::prices::PriceTable;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn alloc(pairs: &[(&str, f64)]) -> Allocation {
        pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect()
    }

    /// X = [100, 110, 99], Y = [50, 51, 50]
    fn three_day_returns() -> ReturnsTable {
        let prices = PriceTable::from_rows(vec![
            (d(2024, 3, 4), "X", 100.0),
            (d(2024, 3, 5), "X", 110.0),
            (d(2024, 3, 6), "X", 99.0),
            (d(2024, 3, 4), "Y", 50.0),
            (d(2024, 3, 5), "Y", 51.0),
            (d(2024, 3, 6), "Y", 50.0),
        ]);
        ReturnsTable::from_prices(&prices)
    }

    #[test]
    fn test_three_day_scenario() {
        let eq = simulate(&three_day_returns(), &alloc(&[("X", 0.5), ("Y", 0.5)]), Rebalance::Never, 0.0);
        assert_eq!(eq.name, PORTFOLIO);
        assert_eq!(eq.dates, vec![d(2024, 3, 5), d(2024, 3, 6)]);
        assert!((eq.values[0] - 1.06).abs() < 1e-12);
        assert!((eq.values[1] - 0.9950).abs() < 1e-4);
    }

    #[test]
    fn test_no_fee_day_zero_identity() {
        let rows = vec![vec![0.03, -0.01]];
        let eq = iterate_path(&rows, &[2024], &[0.25, 0.75], Rebalance::Annual, 0.0);
        assert_eq!(eq, vec![1.0 + (0.25 * 0.03 + 0.75 * -0.01)]);
    }

    #[test]
    fn test_fee_applied_every_day() {
        let rows = vec![vec![0.0], vec![0.0], vec![0.0]];
        let eq = iterate_path(&rows, &[2024, 2024, 2024], &[1.0], Rebalance::Never, 0.252);
        let keep = 1.0 - 0.001;
        assert!((eq[0] - keep).abs() < 1e-12);
        assert!((eq[2] - keep.powi(3)).abs() < 1e-12);
    }

    #[test]
    fn test_negative_fee_is_ignored() {
        let rows = vec![vec![0.01]];
        let eq = iterate_path(&rows, &[2024], &[1.0], Rebalance::Never, -0.5);
        assert!((eq[0] - 1.01).abs() < 1e-12);
    }

    #[test]
    fn test_collapsed_weights_reset_to_target() {
        // Both assets lose everything on day 0, so drifted weights sum to zero
        let rows = vec![vec![-1.0, -1.0], vec![0.1, 0.3]];
        let eq = iterate_path(&rows, &[2024, 2024], &[0.5, 0.5], Rebalance::Never, 0.0);
        assert_eq!(eq[0], 0.0);
        assert_eq!(eq[1], 0.0);
    }

    #[test]
    fn test_rebalance_triggers_on_row_year_change() {
        // Same returns, the year boundary only moves the reset point
        let rows = vec![vec![0.2, 0.0], vec![0.1, -0.1]];
        let target = [0.5, 0.5];
        let across = iterate_path(&rows, &[2023, 2024], &target, Rebalance::Annual, 0.0);
        let within = iterate_path(&rows, &[2024, 2024], &target, Rebalance::Annual, 0.0);

        // Reset: 0.5 * 0.1 + 0.5 * -0.1 = 0
        assert!((across[1] / across[0] - 1.0).abs() < 1e-12);
        // Drifted: (0.6 * 0.1 - 0.5 * 0.1) / 1.1
        assert!((within[1] / within[0] - 1.0 - 0.01 / 1.1).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inputs_give_empty_curve() {
        let r = three_day_returns();
        assert!(simulate(&r, &Allocation::new(), Rebalance::Annual, 0.0).is_empty());
        assert!(simulate(&r, &alloc(&[("NOPE", 1.0)]), Rebalance::Annual, 0.0).is_empty());
        let rows: Vec<Vec<f64>> = Vec::new();
        assert!(iterate_path(&rows, &[], &[1.0], Rebalance::Never, 0.0).is_empty());
    }
}
