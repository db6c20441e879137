// src/backtest/prices.rs
// Date-aligned price and return tables

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use crate::common::pct_change;
use crate::error::{Error, Result};

// ============================================================================
// Price Table
// ============================================================================

/// Adjusted closing prices, all tickers aligned to one ascending date index.
/// Missing observations are NaN.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl PriceTable {
    /// Build from an aligned date index and per-ticker columns.
    pub fn new(dates: Vec<NaiveDate>, columns: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        validate_shape(&dates, &columns)?;
        Ok(PriceTable { dates, columns })
    }

    /// Build from long-format (date, ticker, price) rows.
    ///
    /// Dates are unioned and sorted; a repeated (date, ticker) keeps the last
    /// row seen. Tickers absent on a date get NaN.
    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, S, f64)>,
        S: Into<String>,
    {
        let mut by_ticker: BTreeMap<String, BTreeMap<NaiveDate, f64>> = BTreeMap::new();
        let mut all_dates: BTreeSet<NaiveDate> = BTreeSet::new();

        for (date, ticker, price) in rows {
            all_dates.insert(date);
            by_ticker.entry(ticker.into()).or_default().insert(date, price);
        }

        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
        let columns = by_ticker
            .into_iter()
            .map(|(ticker, series)| {
                let values = dates
                    .iter()
                    .map(|d| series.get(d).copied().unwrap_or(f64::NAN))
                    .collect();
                (ticker, values)
            })
            .collect();

        PriceTable { dates, columns }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.columns.get(ticker).map(Vec::as_slice)
    }

    pub fn has_ticker(&self, ticker: &str) -> bool {
        self.columns.contains_key(ticker)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// No dates or no tickers
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty() || self.columns.is_empty()
    }

    /// Carry the last known price forward over gaps. Leading gaps stay NaN.
    pub fn forward_fill(&self) -> PriceTable {
        let columns = self
            .columns
            .iter()
            .map(|(ticker, values)| {
                let mut last = f64::NAN;
                let filled = values
                    .iter()
                    .map(|&v| {
                        if !v.is_nan() {
                            last = v;
                        }
                        last
                    })
                    .collect();
                (ticker.clone(), filled)
            })
            .collect();
        PriceTable { dates: self.dates.clone(), columns }
    }

    /// Keep the listed tickers that have at least one price, dropping dates
    /// on which none of them has a price.
    pub fn select<S: AsRef<str>>(&self, tickers: &[S]) -> PriceTable {
        let columns: BTreeMap<String, Vec<f64>> = tickers
            .iter()
            .filter_map(|t| {
                let t = t.as_ref();
                self.columns
                    .get(t)
                    .filter(|v| v.iter().any(|p| p.is_finite()))
                    .map(|v| (t.to_string(), v.clone()))
            })
            .collect();

        let keep: Vec<usize> = (0..self.dates.len())
            .filter(|&i| columns.values().any(|v| !v[i].is_nan()))
            .collect();

        PriceTable {
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            columns: columns
                .into_iter()
                .map(|(t, v)| (t, keep.iter().map(|&i| v[i]).collect()))
                .collect(),
        }
    }

    /// Rows with `start <= date <= end`
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> PriceTable {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end);
        let hi = hi.max(lo);
        PriceTable {
            dates: self.dates[lo..hi].to_vec(),
            columns: self
                .columns
                .iter()
                .map(|(t, v)| (t.clone(), v[lo..hi].to_vec()))
                .collect(),
        }
    }
}

// ============================================================================
// Returns Table
// ============================================================================

/// Period-over-period fractional returns per ticker.
/// Row 0 is always NaN (no prior price).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReturnsTable {
    dates: Vec<NaiveDate>,
    columns: BTreeMap<String, Vec<f64>>,
}

impl ReturnsTable {
    /// Build directly from return columns.
    pub fn new(dates: Vec<NaiveDate>, columns: BTreeMap<String, Vec<f64>>) -> Result<Self> {
        validate_shape(&dates, &columns)?;
        Ok(ReturnsTable { dates, columns })
    }

    /// `returns[t] = price[t] / price[t-1] - 1` for every ticker
    pub fn from_prices(prices: &PriceTable) -> Self {
        let columns = prices
            .columns
            .iter()
            .map(|(ticker, values)| (ticker.clone(), pct_change(values)))
            .collect();
        ReturnsTable { dates: prices.dates.clone(), columns }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_ticker(&self, ticker: &str) -> bool {
        self.columns.contains_key(ticker)
    }

    pub fn column(&self, ticker: &str) -> Option<&[f64]> {
        self.columns.get(ticker).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Restrict to `tickers` (in the given order) and drop every row where
    /// any of them is missing. A ticker with no column leaves nothing.
    pub fn restrict<S: AsRef<str>>(&self, tickers: &[S]) -> AlignedReturns {
        let names: Vec<String> = tickers.iter().map(|t| t.as_ref().to_string()).collect();

        let cols: Option<Vec<&Vec<f64>>> = names.iter().map(|t| self.columns.get(t)).collect();
        let cols = match cols {
            Some(c) if !c.is_empty() => c,
            _ => return AlignedReturns { tickers: names, ..Default::default() },
        };

        let mut dates = Vec::new();
        let mut rows = Vec::new();
        for (i, date) in self.dates.iter().enumerate() {
            let row: Vec<f64> = cols.iter().map(|c| c[i]).collect();
            if row.iter().any(|v| v.is_nan()) {
                continue;
            }
            dates.push(*date);
            rows.push(row);
        }

        AlignedReturns { dates, tickers: names, rows }
    }
}

/// Returns for a fixed ticker set with no missing values, stored row-major.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AlignedReturns {
    pub dates: Vec<NaiveDate>,
    pub tickers: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl AlignedReturns {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn validate_shape(dates: &[NaiveDate], columns: &BTreeMap<String, Vec<f64>>) -> Result<()> {
    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
        return Err(Error::MalformedData(format!(
            "dates must be strictly ascending ({} then {})",
            w[0], w[1]
        )));
    }
    for (ticker, values) in columns {
        if values.len() != dates.len() {
            return Err(Error::MalformedData(format!(
                "column {} has {} values for {} dates",
                ticker,
                values.len(),
                dates.len()
            )));
        }
    }
    Ok(())
}
