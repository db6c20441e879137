// src/backtest/format.rs
// Display formatting for KPI output

use serde::Serialize;

use crate::backtest::types::{Currency, KpiBundle};

/// Shown in place of any undefined number
pub const UNDEFINED: &str = "—";

/// `$1,234,568`: whole units with thousands separators
pub fn money(x: f64, currency: Currency) -> String {
    if !x.is_finite() {
        return UNDEFINED.to_string();
    }
    let rounded = format!("{:.0}", x);
    let (sign, digits) = match rounded.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rounded.as_str()),
    };
    format!("{}{}{}", currency.symbol(), sign, group_thousands(digits))
}

/// `0.1234` -> `12.34%`
pub fn percent(x: f64) -> String {
    if !x.is_finite() {
        return UNDEFINED.to_string();
    }
    format!("{:.2}%", x * 100.0)
}

/// Two-decimal plain number, used for Sharpe
pub fn ratio(x: f64) -> String {
    if !x.is_finite() {
        return UNDEFINED.to_string();
    }
    format!("{:.2}", x)
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// KPI bundle rendered for display
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedKpis {
    pub final_value: String,
    pub abs_return: String,
    pub cagr: String,
    pub vol: String,
    pub sharpe: String,
    pub pct_positive_months: String,
    pub max_drawdown: String,
}

impl FormattedKpis {
    pub fn from_kpis(k: &KpiBundle, currency: Currency) -> Self {
        FormattedKpis {
            final_value: money(k.final_value, currency),
            abs_return: percent(k.abs_return),
            cagr: percent(k.cagr),
            vol: percent(k.vol),
            sharpe: ratio(k.sharpe),
            pct_positive_months: percent(k.pct_positive_months),
            max_drawdown: percent(k.max_drawdown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money() {
        assert_eq!(money(1234567.89, Currency::Usd), "$1,234,568");
        assert_eq!(money(999.4, Currency::Usd), "$999");
        assert_eq!(money(100000.0, Currency::Inr), "₹100,000");
        assert_eq!(money(-1500.0, Currency::Usd), "$-1,500");
        assert_eq!(money(f64::NAN, Currency::Usd), UNDEFINED);
    }

    #[test]
    fn test_percent_and_ratio() {
        assert_eq!(percent(0.1234), "12.34%");
        assert_eq!(percent(-0.05), "-5.00%");
        assert_eq!(percent(f64::INFINITY), UNDEFINED);
        assert_eq!(ratio(1.2345), "1.23");
        assert_eq!(ratio(f64::NAN), UNDEFINED);
    }

    #[test]
    fn test_formatted_kpis_keep_undefined_marker() {
        let k = KpiBundle {
            final_value: 110000.0,
            abs_return: 0.1,
            cagr: f64::NAN,
            vol: 0.15,
            sharpe: f64::NAN,
            pct_positive_months: 0.5,
            max_drawdown: -0.2,
        };
        let f = FormattedKpis::from_kpis(&k, Currency::Usd);
        assert_eq!(f.final_value, "$110,000");
        assert_eq!(f.cagr, UNDEFINED);
        assert_eq!(f.sharpe, UNDEFINED);
        assert_eq!(f.max_drawdown, "-20.00%");
    }
}
