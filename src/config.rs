// src/config.rs
// Layered service settings: defaults, optional TOML file, BACKTEST__* env vars

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::backtest::catalog::Catalog;
use crate::backtest::types::Currency;
use crate::error::Result;

/// Default settings file, without extension
pub const DEFAULT_CONFIG_FILE: &str = "config/backtest";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding one `<TICKER>.parquet` file per ticker
    pub parquet_dir: PathBuf,
    pub bind_addr: String,
    /// Price cache lifetime
    pub cache_ttl_secs: u64,
    pub start_amount: f64,
    /// Benchmark ids used when a request names none
    pub benchmarks: Vec<String>,
    pub risk_free_rate: f64,
    /// Display label only
    pub currency: Currency,
    /// JSON catalog replacing the built-in funds and benchmarks
    pub catalog_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            parquet_dir: PathBuf::from("data/parquet"),
            bind_addr: "127.0.0.1:3030".to_string(),
            cache_ttl_secs: 2 * 60 * 60,
            start_amount: 100_000.0,
            benchmarks: vec!["SPY".into(), "60/40".into(), "GLD".into()],
            risk_free_rate: 0.0,
            currency: Currency::Usd,
            catalog_path: None,
        }
    }
}

impl Settings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// The configured catalog file, or the built-in catalog
    pub fn load_catalog(&self) -> Result<Catalog> {
        match &self.catalog_path {
            Some(path) => Catalog::from_json_file(path),
            None => Ok(Catalog::builtin()),
        }
    }
}

/// Load settings from `config/backtest.toml` (if present) and the environment
/// (e.g. `BACKTEST__PARQUET_DIR=...`, `BACKTEST__BENCHMARKS=SPY,GLD`).
pub fn load_settings() -> Result<Settings> {
    load_settings_from(Path::new(DEFAULT_CONFIG_FILE))
}

/// Same as [`load_settings`] with an explicit settings file
pub fn load_settings_from(file: &Path) -> Result<Settings> {
    let settings = Config::builder()
        .add_source(File::from(file).required(false))
        .add_source(
            Environment::with_prefix("BACKTEST")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("benchmarks")
                .try_parsing(true),
        )
        .build()?;

    let settings: Settings = settings.try_deserialize()?;
    Ok(settings)
}
