// src/backtest/data.rs
// Price sources: in-memory, parquet directory and a TTL read-through cache

use arrow::array::{
    Array, ArrayRef, Date32Array, Float64Array, LargeStringArray, StringArray,
    TimestampNanosecondArray,
};
use chrono::NaiveDate;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::backtest::prices::PriceTable;
use crate::error::{Error, Result};

/// Anything that can produce a forward-filled price table for a set of
/// tickers over an inclusive date range.
///
/// Tickers with no data are left out of the table rather than failing the
/// whole fetch; callers compare the table's tickers against what they asked
/// for.
pub trait PriceSource: Send + Sync {
    fn fetch_prices(&self, tickers: &[String], start: NaiveDate, end: NaiveDate) -> Result<PriceTable>;
}

// ============================================================================
// In-memory source
// ============================================================================

/// Serves prices from a table held in memory. Used by tests and for callers
/// that load data themselves.
#[derive(Debug, Clone, Default)]
pub struct MemoryPriceSource {
    table: PriceTable,
}

impl MemoryPriceSource {
    pub fn new(table: PriceTable) -> Self {
        MemoryPriceSource { table }
    }

    pub fn from_rows<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, S, f64)>,
        S: Into<String>,
    {
        MemoryPriceSource { table: PriceTable::from_rows(rows) }
    }
}

impl PriceSource for MemoryPriceSource {
    fn fetch_prices(&self, tickers: &[String], start: NaiveDate, end: NaiveDate) -> Result<PriceTable> {
        Ok(self.table.between(start, end).select(tickers).forward_fill())
    }
}

// ============================================================================
// Parquet directory source
// ============================================================================

/// Reads one `<TICKER>.parquet` file per ticker from a directory.
///
/// Each file needs a `Date` column (string, Date32 or nanosecond timestamp)
/// and an `Adj Close` or `Close` Float64 column.
#[derive(Debug, Clone)]
pub struct ParquetPriceSource {
    dir: PathBuf,
}

impl ParquetPriceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ParquetPriceSource { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Sorted tickers that have a `.parquet` file. An unreadable directory
    /// lists nothing.
    pub fn available_tickers(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "cannot list price directory");
                return Vec::new();
            }
        };

        let mut tickers: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|path| path.extension().map_or(false, |ext| ext == "parquet"))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        tickers.sort();
        tickers
    }

    fn ticker_path(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.parquet", ticker))
    }
}

impl PriceSource for ParquetPriceSource {
    fn fetch_prices(&self, tickers: &[String], start: NaiveDate, end: NaiveDate) -> Result<PriceTable> {
        let mut rows: Vec<(NaiveDate, String, f64)> = Vec::new();

        for ticker in tickers {
            let path = self.ticker_path(ticker);
            if !path.exists() {
                warn!(ticker = %ticker, path = %path.display(), "no price file");
                continue;
            }

            let series = match read_price_file(&path) {
                Ok(s) => s,
                Err(e) => {
                    warn!(ticker = %ticker, error = %e, "failed to read price file");
                    continue;
                }
            };

            let before = rows.len();
            rows.extend(
                series
                    .into_iter()
                    .filter(|(d, p)| *d >= start && *d <= end && !p.is_nan())
                    .map(|(d, p)| (d, ticker.clone(), p)),
            );

            let loaded = rows.len() - before;
            if loaded == 0 {
                warn!(ticker = %ticker, %start, %end, "no prices in range");
            } else {
                debug!(ticker = %ticker, rows = loaded, "loaded prices");
            }
        }

        Ok(PriceTable::from_rows(rows).forward_fill())
    }
}

/// Read (date, price) pairs from a single ticker file
pub fn read_price_file(path: &Path) -> Result<Vec<(NaiveDate, f64)>> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)?;
    let reader = builder.build()?;

    let mut out = Vec::new();

    for batch in reader {
        let batch = batch?;

        let date_col = batch
            .column_by_name("Date")
            .ok_or_else(|| Error::MalformedData(format!("{}: no Date column", path.display())))?;
        let price_col = batch
            .column_by_name("Adj Close")
            .or_else(|| batch.column_by_name("Close"))
            .ok_or_else(|| {
                Error::MalformedData(format!("{}: no Adj Close or Close column", path.display()))
            })?;

        let dates = extract_dates(date_col)?;
        let prices = price_col
            .as_any()
            .downcast_ref::<Float64Array>()
            .ok_or_else(|| {
                Error::MalformedData(format!(
                    "{}: price column is {}, expected Float64",
                    path.display(),
                    price_col.data_type()
                ))
            })?;

        for (i, date) in dates.into_iter().enumerate() {
            let Some(date) = date else { continue };
            let price = if prices.is_null(i) { f64::NAN } else { prices.value(i) };
            out.push((date, price));
        }
    }

    Ok(out)
}

fn extract_dates(col: &ArrayRef) -> Result<Vec<Option<NaiveDate>>> {
    let any = col.as_any();

    if let Some(arr) = any.downcast_ref::<StringArray>() {
        return Ok((0..arr.len())
            .map(|i| if arr.is_null(i) { None } else { parse_date(arr.value(i)) })
            .collect());
    }
    if let Some(arr) = any.downcast_ref::<LargeStringArray>() {
        return Ok((0..arr.len())
            .map(|i| if arr.is_null(i) { None } else { parse_date(arr.value(i)) })
            .collect());
    }
    if let Some(arr) = any.downcast_ref::<Date32Array>() {
        return Ok((0..arr.len())
            .map(|i| if arr.is_null(i) { None } else { arr.value_as_date(i) })
            .collect());
    }
    if let Some(arr) = any.downcast_ref::<TimestampNanosecondArray>() {
        return Ok((0..arr.len())
            .map(|i| {
                if arr.is_null(i) {
                    None
                } else {
                    arr.value_as_datetime(i).map(|dt| dt.date())
                }
            })
            .collect());
    }

    Err(Error::MalformedData(format!("unsupported Date column type {}", col.data_type())))
}

/// `YYYY-MM-DD`, ignoring any time suffix
fn parse_date(s: &str) -> Option<NaiveDate> {
    let day = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

// ============================================================================
// TTL cache
// ============================================================================

type CacheKey = (Vec<String>, NaiveDate, NaiveDate);

struct CacheEntry {
    table: PriceTable,
    fetched_at: Instant,
}

type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// Read-through cache in front of another source.
///
/// Keyed by the sorted ticker list and the date range. Each key has its own
/// lock, so concurrent requests for the same key wait for a single fetch while
/// other keys proceed. Failed fetches are not cached, and expired entries are
/// released whenever a slot is looked up.
pub struct CachedPriceSource<S> {
    inner: S,
    ttl: Duration,
    slots: Mutex<HashMap<CacheKey, Slot>>,
}

impl<S: PriceSource> CachedPriceSource<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        CachedPriceSource {
            inner,
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Drop every cached table
    pub fn clear(&self) {
        lock(&self.slots).clear();
    }

    fn slot(&self, key: &CacheKey) -> Slot {
        let mut slots = lock(&self.slots);
        let before = slots.len();
        slots.retain(|_, slot| self.is_live(slot));
        if slots.len() < before {
            debug!(evicted = before - slots.len(), "price cache sweep");
        }
        slots.entry(key.clone()).or_default().clone()
    }

    /// In use by another request, or holding a fresh table. A busy slot is
    /// never waited on here.
    fn is_live(&self, slot: &Slot) -> bool {
        if Arc::strong_count(slot) > 1 {
            return true;
        }
        match slot.try_lock() {
            Ok(entry) => entry.as_ref().map_or(false, |e| e.fetched_at.elapsed() < self.ttl),
            Err(_) => true,
        }
    }
}

impl<S: PriceSource> PriceSource for CachedPriceSource<S> {
    fn fetch_prices(&self, tickers: &[String], start: NaiveDate, end: NaiveDate) -> Result<PriceTable> {
        let mut sorted = tickers.to_vec();
        sorted.sort();
        sorted.dedup();
        let key: CacheKey = (sorted, start, end);

        let slot = self.slot(&key);
        let mut entry = lock(&slot);

        if let Some(cached) = entry.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                debug!(tickers = key.0.len(), %start, %end, "price cache hit");
                return Ok(cached.table.clone());
            }
        }

        debug!(tickers = key.0.len(), %start, %end, "price cache miss");
        let table = self.inner.fetch_prices(&key.0, start, end)?;
        *entry = Some(CacheEntry {
            table: table.clone(),
            fetched_at: Instant::now(),
        });
        Ok(table)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}
