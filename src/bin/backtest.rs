//! Native fund backtest CLI
//!
//! Usage: backtest --fund F2 --start 2015-01-01 --end 2024-12-31 [--benchmark SPY --benchmark 60/40] [--json]

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use fund_backtester::backtest::format::{money, percent, FormattedKpis};
use fund_backtester::backtest::{BacktestDefaults, Backtester, ParquetPriceSource};
use fund_backtester::{load_settings, BacktestReport, BacktestRequest, Rebalance};

#[derive(Parser, Debug)]
#[command(author, version, about = "Backtest a model fund against its benchmarks")]
struct Cli {
    /// Fund id (e.g. "F1")
    #[arg(short, long)]
    fund: String,

    /// Start date, YYYY-MM-DD
    #[arg(long)]
    start: NaiveDate,

    /// End date, YYYY-MM-DD (clamped to today)
    #[arg(long)]
    end: NaiveDate,

    /// Starting amount
    #[arg(long)]
    amount: Option<f64>,

    /// Benchmark id, repeatable (default from settings)
    #[arg(short, long = "benchmark")]
    benchmarks: Vec<String>,

    /// "Annual" or "None" (default: the fund's)
    #[arg(long)]
    rebalance: Option<Rebalance>,

    /// Annual fee as a fraction (default: the fund's)
    #[arg(long)]
    fee: Option<f64>,

    /// Directory of <TICKER>.parquet files (overrides settings)
    #[arg(long)]
    parquet_dir: Option<PathBuf>,

    /// Print the full report as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings().context("loading settings")?;
    let catalog = settings.load_catalog().context("loading catalog")?;

    let parquet_dir = cli.parquet_dir.clone().unwrap_or_else(|| settings.parquet_dir.clone());
    let backtester = Backtester::new(ParquetPriceSource::new(&parquet_dir), catalog)
        .with_defaults(BacktestDefaults::from(&settings));

    let request = BacktestRequest {
        start_amount: cli.amount,
        benchmarks: if cli.benchmarks.is_empty() { None } else { Some(cli.benchmarks.clone()) },
        rebalance: cli.rebalance,
        fee_annual: cli.fee,
        ..BacktestRequest::new(&cli.fund, cli.start, cli.end)
    };

    let t = Instant::now();
    let report = backtester.run(&request)?;
    tracing::debug!(elapsed_ms = t.elapsed().as_secs_f64() * 1000.0, "backtest finished");

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report, settings.currency);
    }

    Ok(())
}

fn print_summary(report: &BacktestReport, currency: fund_backtester::backtest::Currency) {
    println!("{} ({})", report.fund_name, report.fund_id);
    println!("Period: {} to {}", report.effective_start, report.effective_end);
    if !report.missing_tickers.is_empty() {
        println!("Missing tickers (weights renormalized): {}", report.missing_tickers.join(", "));
    }
    println!(
        "Start {}  |  rebalance {}  |  fee {}",
        money(report.settings.start_amount, currency),
        report.settings.rebalance,
        percent(report.settings.fee_annual),
    );
    println!();

    match &report.kpis {
        Some(k) => {
            let f = FormattedKpis::from_kpis(k, currency);
            println!("  Final value      {:>14}", f.final_value);
            println!("  Total return     {:>14}", f.abs_return);
            println!("  CAGR             {:>14}", f.cagr);
            println!("  Volatility       {:>14}", f.vol);
            println!("  Sharpe           {:>14}", f.sharpe);
            println!("  Positive months  {:>14}", f.pct_positive_months);
            println!("  Max drawdown     {:>14}", f.max_drawdown);
        }
        None => println!("  Not enough data for KPIs"),
    }
    println!(
        "  VaR95 / CVaR95   {:>14}",
        format!("{} / {}", percent(report.distribution.var95), percent(report.distribution.cvar95))
    );

    if !report.yearly.is_empty() {
        println!();
        println!("Calendar years:");
        for y in &report.yearly {
            println!("  {}  {:>9}", y.year, percent(y.value));
        }
    }

    if !report.benchmarks.is_empty() {
        println!();
        println!("Benchmarks (growth of 1):");
        for b in &report.benchmarks {
            let last = b.curve.last().map(|p| p.value).unwrap_or(f64::NAN);
            println!("  {:<45} {:>9}", b.name, percent(last - 1.0));
        }
    }
}
