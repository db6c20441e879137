// src/backtest/metrics.rs
// Performance metrics calculation

use chrono::{Datelike, NaiveDate};

use crate::backtest::simulation::TRADING_DAYS;
use crate::backtest::types::{
    DistributionStats, EquityCurve, EquityPoint, KpiBundle, MonthlyReturn, YearlyReturn,
};
use crate::common::{has_enough_data, mean, nan_vec, pct_change, percentile, sample_std};

/// Days per year used for CAGR's elapsed-time denominator
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Percentile used for the historical monthly VaR
pub const VAR_PERCENTILE: f64 = 5.0;

/// Calculate the KPI bundle of an equity curve.
///
/// `None` for curves with fewer than two points. Statistics that cannot be
/// defined (no elapsed time, zero deviation, no full months) come back NaN.
pub fn compute_kpis(
    eq: &EquityCurve,
    start_amount: f64,
    start_date: NaiveDate,
    end_date: NaiveDate,
    rf_annual: f64,
) -> Option<KpiBundle> {
    if eq.len() < 2 {
        return None;
    }
    let first = eq.first_value()?;
    let last = eq.last_value()?;

    let daily = daily_returns(&eq.values);
    let growth = last / first;

    let years = years_between(start_date, end_date);
    let cagr = if years > 0.0 {
        growth.powf(1.0 / years) - 1.0
    } else {
        f64::NAN
    };

    let std = sample_std(&daily);
    let vol = if daily.len() > 1 {
        std * TRADING_DAYS.sqrt()
    } else {
        f64::NAN
    };

    let rf_daily = rf_annual / TRADING_DAYS;
    let sharpe = if std > 0.0 {
        (mean(&daily) - rf_daily) / std * TRADING_DAYS.sqrt()
    } else {
        f64::NAN
    };

    let monthly = monthly_returns(eq);

    Some(KpiBundle {
        final_value: start_amount * last,
        abs_return: growth - 1.0,
        cagr,
        vol,
        sharpe,
        pct_positive_months: pct_positive_months(&monthly),
        max_drawdown: max_drawdown(&eq.values),
    })
}

/// Fractional years between two dates, floored at zero
pub fn years_between(start: NaiveDate, end: NaiveDate) -> f64 {
    (end - start).num_days().max(0) as f64 / DAYS_PER_YEAR
}

/// Period-over-period returns with undefined entries removed
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    pct_change(values).into_iter().skip(1).filter(|r| !r.is_nan()).collect()
}

/// Returns between the last values of consecutive calendar months.
/// The first month has nothing to compare against and is dropped. A month
/// with no rows carries the previous close, so it reports 0.0 and the next
/// month is measured from the close before the gap.
pub fn monthly_returns(eq: &EquityCurve) -> Vec<MonthlyReturn> {
    period_returns(eq, MonthlyReturn::period_of, |(y, m)| {
        if m == 12 {
            (y + 1, 1)
        } else {
            (y, m + 1)
        }
    })
        .into_iter()
        .map(|((year, month), value)| MonthlyReturn { year, month, value })
        .collect()
}

/// Returns between the last values of consecutive calendar years, gaps
/// padded the same way as months.
pub fn yearly_returns(eq: &EquityCurve) -> Vec<YearlyReturn> {
    period_returns(eq, |d| d.year(), |y| y + 1)
        .into_iter()
        .map(|(year, value)| YearlyReturn { year, value })
        .collect()
}

/// Resample to last-value-per-period, forward-filling empty periods, then
/// take period-over-period change
fn period_returns<K, F, N>(eq: &EquityCurve, key: F, next: N) -> Vec<(K, f64)>
where
    K: PartialOrd + Copy,
    F: Fn(NaiveDate) -> K,
    N: Fn(K) -> K,
{
    let mut closes: Vec<(K, f64)> = Vec::new();
    for (&date, &value) in eq.dates.iter().zip(&eq.values) {
        let k = key(date);
        match closes.last_mut() {
            Some((last_key, last_value)) if *last_key == k => *last_value = value,
            Some(&mut (last_key, last_value)) => {
                let mut gap = next(last_key);
                while gap < k {
                    closes.push((gap, last_value));
                    gap = next(gap);
                }
                closes.push((k, value));
            }
            None => closes.push((k, value)),
        }
    }

    closes
        .windows(2)
        .map(|w| (w[1].0, w[1].1 / w[0].1 - 1.0))
        .filter(|(_, r)| !r.is_nan())
        .collect()
}

/// `values[i] / values[i - window] - 1`, NaN where the lookback is short
pub fn rolling_returns(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = nan_vec(n);
    if !has_enough_data(n, window + 1) {
        return result;
    }
    for i in window..n {
        result[i] = values[i] / values[i - window] - 1.0;
    }
    result
}

/// Trailing 252-row return at every point that has a full year behind it
pub fn rolling_12m(eq: &EquityCurve) -> Vec<EquityPoint> {
    let window = TRADING_DAYS as usize;
    rolling_returns(&eq.values, window)
        .into_iter()
        .zip(&eq.dates)
        .filter(|(v, _)| !v.is_nan())
        .map(|(value, &date)| EquityPoint { date, value })
        .collect()
}

/// Fraction of months with a strictly positive return; NaN if there are none
pub fn pct_positive_months(monthly: &[MonthlyReturn]) -> f64 {
    if monthly.is_empty() {
        return f64::NAN;
    }
    monthly.iter().filter(|m| m.value > 0.0).count() as f64 / monthly.len() as f64
}

/// Historical VaR95 and CVaR95 of a return sample.
///
/// VaR is the linearly interpolated 5th percentile. CVaR is the mean of the
/// returns at or below it, falling back to VaR when none qualify.
pub fn value_at_risk(returns: &[f64]) -> (f64, f64) {
    if returns.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let var = percentile(returns, VAR_PERCENTILE);
    let tail: Vec<f64> = returns.iter().copied().filter(|r| *r <= var).collect();
    let cvar = if tail.is_empty() { var } else { mean(&tail) };
    (var, cvar)
}

/// Distribution statistics over monthly returns
pub fn distribution_stats(monthly: &[MonthlyReturn]) -> DistributionStats {
    let values: Vec<f64> = monthly.iter().map(|m| m.value).collect();
    let (var95, cvar95) = value_at_risk(&values);
    DistributionStats {
        var95,
        cvar95,
        avg_monthly: mean(&values),
        monthly_returns: values,
    }
}

/// Calculate maximum drawdown
pub fn max_drawdown(equity: &[f64]) -> f64 {
    if equity.is_empty() {
        return 0.0;
    }

    let mut peak = equity[0];
    let mut max_dd = 0.0;

    for &value in equity {
        if value > peak {
            peak = value;
        }
        let dd = (peak - value) / peak;
        if dd > max_dd {
            max_dd = dd;
        }
    }

    -max_dd // Return as negative
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn curve(points: &[(NaiveDate, f64)]) -> EquityCurve {
        EquityCurve::new(
            "Portfolio",
            points.iter().map(|p| p.0).collect(),
            points.iter().map(|p| p.1).collect(),
        )
    }

    #[test]
    fn test_kpis_need_two_points() {
        let eq = curve(&[(d(2024, 1, 2), 1.0)]);
        assert!(compute_kpis(&eq, 100.0, d(2024, 1, 2), d(2024, 1, 2), 0.0).is_none());
        assert!(compute_kpis(&EquityCurve::empty("x"), 100.0, d(2024, 1, 2), d(2024, 1, 3), 0.0).is_none());
    }

    #[test]
    fn test_constant_curve_has_nan_sharpe() {
        let eq = curve(&[(d(2024, 1, 2), 1.0), (d(2024, 1, 3), 1.0), (d(2024, 1, 4), 1.0)]);
        let k = compute_kpis(&eq, 1000.0, d(2024, 1, 2), d(2024, 1, 4), 0.0).unwrap();
        assert!(k.sharpe.is_nan());
        assert_eq!(k.vol, 0.0);
        assert_eq!(k.abs_return, 0.0);
        assert_eq!(k.final_value, 1000.0);
        assert_eq!(k.max_drawdown, 0.0);
    }

    #[test]
    fn test_single_daily_return_has_nan_vol() {
        let eq = curve(&[(d(2024, 1, 2), 1.0), (d(2024, 1, 3), 1.1)]);
        let k = compute_kpis(&eq, 1.0, d(2024, 1, 2), d(2024, 1, 3), 0.0).unwrap();
        assert!(k.vol.is_nan());
        assert!(k.sharpe.is_nan());
        assert!((k.abs_return - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_zero_elapsed_time_has_nan_cagr() {
        let eq = curve(&[(d(2024, 1, 2), 1.0), (d(2024, 1, 3), 1.1)]);
        let k = compute_kpis(&eq, 1.0, d(2024, 1, 3), d(2024, 1, 2), 0.0).unwrap();
        assert!(k.cagr.is_nan());
    }

    #[test]
    fn test_cagr_over_two_years() {
        let start = d(2020, 1, 1);
        let end = start + chrono::Duration::days(731); // 2.0014 years
        let eq = curve(&[(start, 1.0), (end, 1.21)]);
        let k = compute_kpis(&eq, 1.0, start, end, 0.0).unwrap();
        let years = 731.0 / 365.25;
        assert!((k.cagr - (1.21f64.powf(1.0 / years) - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_sharpe_uses_sample_std() {
        let eq = curve(&[
            (d(2024, 1, 2), 1.0),
            (d(2024, 1, 3), 1.01),
            (d(2024, 1, 4), 1.0),
            (d(2024, 1, 5), 1.02),
        ]);
        let daily = daily_returns(&eq.values);
        let expected = mean(&daily) / sample_std(&daily) * 252f64.sqrt();
        let k = compute_kpis(&eq, 1.0, d(2024, 1, 2), d(2024, 1, 5), 0.0).unwrap();
        assert!((k.sharpe - expected).abs() < 1e-12);

        let with_rf = compute_kpis(&eq, 1.0, d(2024, 1, 2), d(2024, 1, 5), 0.0252).unwrap();
        let expected_rf = (mean(&daily) - 0.0001) / sample_std(&daily) * 252f64.sqrt();
        assert!((with_rf.sharpe - expected_rf).abs() < 1e-12);
    }

    #[test]
    fn test_monthly_returns_use_last_value_per_month() {
        let eq = curve(&[
            (d(2024, 1, 30), 1.0),
            (d(2024, 1, 31), 1.1),
            (d(2024, 2, 1), 1.3),
            (d(2024, 2, 29), 1.21),
            (d(2024, 3, 28), 1.089),
        ]);
        let m = monthly_returns(&eq);
        assert_eq!(m.len(), 2);
        assert_eq!((m[0].year, m[0].month), (2024, 2));
        assert!((m[0].value - 0.1).abs() < 1e-12);
        assert!((m[1].value + 0.1).abs() < 1e-12);
        assert_eq!(m[1].label(), "2024-03");
        assert!((pct_positive_months(&m) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_month_carries_previous_close() {
        let eq = curve(&[
            (d(2024, 1, 31), 1.0),
            (d(2024, 3, 28), 1.1),
            (d(2024, 4, 30), 1.21),
        ]);
        let m = monthly_returns(&eq);
        let labels: Vec<String> = m.iter().map(|r| r.label()).collect();
        assert_eq!(labels, vec!["2024-02", "2024-03", "2024-04"]);
        assert_eq!(m[0].value, 0.0);
        assert!((m[1].value - 0.1).abs() < 1e-12);
        assert!((m[2].value - 0.1).abs() < 1e-12);
        assert!((pct_positive_months(&m) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_gap_across_year_end() {
        let eq = curve(&[(d(2023, 11, 30), 1.0), (d(2024, 1, 31), 1.05)]);
        let m = monthly_returns(&eq);
        assert_eq!(m.iter().map(|r| (r.year, r.month)).collect::<Vec<_>>(), vec![(2023, 12), (2024, 1)]);
        assert_eq!(m[0].value, 0.0);

        let y = yearly_returns(&curve(&[(d(2021, 12, 31), 1.0), (d(2023, 12, 29), 1.2)]));
        assert_eq!(y.iter().map(|r| r.year).collect::<Vec<_>>(), vec![2022, 2023]);
        assert_eq!(y[0].value, 0.0);
        assert!((y[1].value - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_yearly_returns() {
        let eq = curve(&[
            (d(2022, 12, 30), 1.0),
            (d(2023, 6, 1), 0.7),
            (d(2023, 12, 29), 1.2),
            (d(2024, 3, 1), 1.5),
        ]);
        let y = yearly_returns(&eq);
        assert_eq!(y.len(), 2);
        assert_eq!(y[0].year, 2023);
        assert!((y[0].value - 0.2).abs() < 1e-12);
        assert!((y[1].value - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_single_period_has_no_returns() {
        let eq = curve(&[(d(2024, 1, 2), 1.0), (d(2024, 1, 3), 1.1)]);
        assert!(monthly_returns(&eq).is_empty());
        assert!(yearly_returns(&eq).is_empty());
        assert!(pct_positive_months(&[]).is_nan());
    }

    #[test]
    fn test_rolling_returns() {
        let r = rolling_returns(&[1.0, 2.0, 3.0, 6.0], 2);
        assert!(r[0].is_nan() && r[1].is_nan());
        assert_eq!(r[2], 2.0);
        assert_eq!(r[3], 2.0);
        assert!(rolling_returns(&[1.0, 2.0], 2).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_rolling_12m_drops_short_lookback() {
        let start = d(2020, 1, 1);
        let dates: Vec<NaiveDate> = (0..260).map(|i| start + chrono::Duration::days(i)).collect();
        let values: Vec<f64> = (0..260).map(|i| 1.0 + i as f64 * 0.01).collect();
        let eq = EquityCurve::new("Portfolio", dates.clone(), values);
        let r = rolling_12m(&eq);
        assert_eq!(r.len(), 8);
        assert_eq!(r[0].date, dates[252]);
        assert!((r[0].value - (3.52 / 1.0 - 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_value_at_risk() {
        let returns = [0.05, -0.02, 0.01, -0.08, 0.03];
        let (var, cvar) = value_at_risk(&returns);
        // sorted: -0.08, -0.02, ... idx 0.2 -> -0.08 + 0.2 * 0.06
        assert!((var - (-0.068)).abs() < 1e-12);
        assert!((cvar - (-0.08)).abs() < 1e-12);
        assert!(cvar <= var);

        let (v, c) = value_at_risk(&[]);
        assert!(v.is_nan() && c.is_nan());
    }

    #[test]
    fn test_distribution_stats() {
        let monthly = vec![
            MonthlyReturn { year: 2024, month: 2, value: 0.02 },
            MonthlyReturn { year: 2024, month: 3, value: -0.04 },
        ];
        let stats = distribution_stats(&monthly);
        assert_eq!(stats.monthly_returns, vec![0.02, -0.04]);
        assert!((stats.avg_monthly + 0.01).abs() < 1e-12);
        assert!(stats.cvar95 <= stats.var95);
    }

    #[test]
    fn test_max_drawdown() {
        let equity = vec![1.0, 1.1, 1.2, 1.0, 0.8, 1.0, 1.1];
        let dd = max_drawdown(&equity);
        // Max DD is from 1.2 to 0.8 = -33.3%
        assert!((dd - (-0.333)).abs() < 0.01);
    }

    proptest::proptest! {
        #[test]
        fn prop_cvar_never_above_var(returns in proptest::collection::vec(-0.5f64..0.5, 1..60)) {
            let (var, cvar) = value_at_risk(&returns);
            proptest::prop_assert!(cvar <= var + 1e-12);
        }
    }
}
