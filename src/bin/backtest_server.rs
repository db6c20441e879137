//! Fund backtest HTTP server
//!
//! Serves the fund catalog and runs backtests over a directory of parquet
//! price files.
//!
//! Run: BACKTEST__PARQUET_DIR=data/parquet cargo run --release --bin backtest_server

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use fund_backtester::backtest::{
    Benchmark, BacktestDefaults, Backtester, CachedPriceSource, FundDefinition, ParquetPriceSource,
};
use fund_backtester::{load_settings, BacktestReport, BacktestRequest, Error};

// ============================================================================
// State & Config
// ============================================================================

type Engine = Backtester<CachedPriceSource<ParquetPriceSource>>;

struct AppState {
    backtester: Arc<Engine>,
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

struct ApiError(StatusCode, String);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        let status = match &e {
            Error::UnknownFund(_) => StatusCode::NOT_FOUND,
            e if e.is_configuration() => StatusCode::BAD_REQUEST,
            e if e.is_data_availability() => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        ApiError(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ErrorBody { error: self.1 })).into_response()
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
struct TickerListResponse {
    tickers: Vec<String>,
    count: usize,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_funds(State(state): State<Arc<AppState>>) -> Json<Vec<FundDefinition>> {
    Json(state.backtester.catalog().funds.clone())
}

async fn list_benchmarks(State(state): State<Arc<AppState>>) -> Json<Vec<Benchmark>> {
    Json(state.backtester.catalog().benchmarks.clone())
}

async fn list_tickers(State(state): State<Arc<AppState>>) -> Result<Json<TickerListResponse>, ApiError> {
    let backtester = Arc::clone(&state.backtester);
    let tickers = tokio::task::spawn_blocking(move || backtester.source().inner().available_tickers())
        .await
        .map_err(|e| {
            error!(error = %e, "ticker listing task failed");
            ApiError(StatusCode::INTERNAL_SERVER_ERROR, "ticker listing failed".to_string())
        })?;

    let count = tickers.len();
    Ok(Json(TickerListResponse { tickers, count }))
}

async fn run_backtest(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BacktestRequest>,
) -> Result<Json<BacktestReport>, ApiError> {
    let backtester = Arc::clone(&state.backtester);
    execute(move || backtester.run(&req)).await
}

async fn preview(
    State(state): State<Arc<AppState>>,
    Path(fund_id): Path<String>,
) -> Result<Json<BacktestReport>, ApiError> {
    let backtester = Arc::clone(&state.backtester);
    execute(move || backtester.preview(&fund_id)).await
}

/// Run a backtest on the blocking pool and time it
async fn execute<F>(job: F) -> Result<Json<BacktestReport>, ApiError>
where
    F: FnOnce() -> fund_backtester::Result<BacktestReport> + Send + 'static,
{
    let start = Instant::now();
    let result = tokio::task::spawn_blocking(job).await.map_err(|e| {
        error!(error = %e, "backtest task failed");
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, "backtest task failed".to_string())
    })?;

    match result {
        Ok(report) => {
            let elapsed = start.elapsed().as_secs_f64() * 1000.0;
            info!(fund = %report.fund_id, elapsed_ms = elapsed, "backtest served");
            Ok(Json(report))
        }
        Err(e) if e.is_expected() => {
            warn!(error = %e, "backtest rejected");
            Err(e.into())
        }
        Err(e) => {
            error!(error = %e, "backtest error");
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let catalog = settings.load_catalog()?;

    let source = CachedPriceSource::new(ParquetPriceSource::new(&settings.parquet_dir), settings.cache_ttl());
    let backtester = Backtester::new(source, catalog).with_defaults(BacktestDefaults::from(&settings));

    let state = Arc::new(AppState {
        backtester: Arc::new(backtester),
    });

    info!(parquet_dir = %settings.parquet_dir.display(), "price directory");

    let app = Router::new()
        .route("/funds", get(list_funds))
        .route("/benchmarks", get(list_benchmarks))
        .route("/tickers", get(list_tickers))
        .route("/api/backtest", post(run_backtest))
        .route("/preview/{fund_id}", get(preview))
        .with_state(state);

    let addr: SocketAddr = settings.bind_addr.parse()?;
    println!("Fund backtest server on http://{}", addr);
    println!("  GET  /funds                - model funds");
    println!("  GET  /benchmarks           - benchmark definitions");
    println!("  GET  /tickers              - tickers with price files");
    println!("  POST /api/backtest         - run a fund backtest");
    println!("  GET  /preview/:fund_id     - three-year preview");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
