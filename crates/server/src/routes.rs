//! JSON API handlers
//!
//! Screener, signal and gem views are recomputed from the latest stored
//! snapshots on every request.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use chrono::Utc;
use engine::{
    classify_signal, detect_gems, forecast_prices, gem_summary, gems_by_sector, generate_signals,
    market_breadth, score_breakdown, sector_analysis, signal_summary, top_signals, trend_forecast,
    volatility_analysis, EngineConfig, ForecastError, ForecastSettings, PriceBar, RiskLevel,
    ScoredSnapshot, SignalType, StockSignal, StockSnapshot,
};
use persistence::repository::{
    AnalysisRepository, BenchmarkRecord, PriceRepository, StockRepository,
};
use persistence::Database;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use crate::convert;
use crate::universe;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Rows loaded when recomputing universe-wide views
const UNIVERSE_LIMIT: i64 = 500;
/// Bars of history fed to the forecast endpoints
const FORECAST_HISTORY_DAYS: i64 = 120;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub config: Arc<EngineConfig>,
}

type ApiResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({ "success": false, "error": message.into() })),
    )
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, Json<Value>) {
    error!("API error: {}", e);
    api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn forecast_error(e: ForecastError) -> (StatusCode, Json<Value>) {
    let status = match e {
        ForecastError::InvalidParameters(_) => StatusCode::BAD_REQUEST,
        ForecastError::InsufficientData { .. } | ForecastError::DegenerateInput(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    };
    api_error(status, e.to_string())
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(api_health))
        .route("/screener", get(api_screener))
        .route("/stock/:symbol", get(api_stock_detail))
        .route("/signals", get(api_signals))
        .route("/gems", get(api_gems))
        .route("/forecast/:symbol", get(api_forecast))
        .route("/trend/:symbol", get(api_trend))
        .route("/volatility/:symbol", get(api_volatility))
        .route("/sectors", get(api_sectors))
        .route("/top-movers", get(api_top_movers))
        .route("/search", get(api_search))
        .route("/benchmark", get(api_benchmark))
        .route("/market-overview", get(api_market_overview))
        .with_state(state)
}

// ============================================================================
// Shared loaders
// ============================================================================

async fn load_snapshots(db: &Database) -> Result<Vec<StockSnapshot>, (StatusCode, Json<Value>)> {
    let rows = AnalysisRepository::new(db.pool())
        .latest_indicators(UNIVERSE_LIMIT)
        .await
        .map_err(internal)?;
    Ok(rows.iter().map(convert::stock_snapshot).collect())
}

async fn load_signals(state: &AppState) -> Result<Vec<StockSignal>, (StatusCode, Json<Value>)> {
    let snapshots = load_snapshots(&state.db).await?;
    Ok(generate_signals(
        &snapshots,
        &state.config.weights,
        &state.config.thresholds,
    ))
}

async fn load_bars(
    db: &Database,
    symbol: &str,
    days: i64,
) -> Result<Vec<PriceBar>, (StatusCode, Json<Value>)> {
    let records = PriceRepository::new(db.pool())
        .get_prices(symbol, days)
        .await
        .map_err(internal)?;
    if records.is_empty() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No data found for {symbol}"),
        ));
    }
    convert::price_bars(&records).map_err(internal)
}

fn parse_signal_filter(raw: Option<&str>) -> Result<Option<SignalType>, (StatusCode, Json<Value>)> {
    match raw {
        None | Some("") => Ok(None),
        Some(s) => SignalType::parse(s).map(Some).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, format!("Unknown signal type: {s}"))
        }),
    }
}

/// Latest close, one-day change and 5/20-bar returns; `history` is oldest first
fn benchmark_summary(history: &[BenchmarkRecord]) -> Value {
    let Some(latest) = history.last() else {
        return Value::Null;
    };
    let back = |n: usize| {
        history
            .len()
            .checked_sub(n + 1)
            .map(|i| history[i].close)
            .unwrap_or(latest.close)
    };
    let pct = |from: f64| {
        if from > 0.0 {
            ((latest.close - from) / from * 10_000.0).round() / 100.0
        } else {
            0.0
        }
    };
    let prev = back(1);

    json!({
        "value": latest.close,
        "date": latest.date,
        "change": ((latest.close - prev) * 100.0).round() / 100.0,
        "change_pct": pct(prev),
        "week_return": pct(back(4)),
        "month_return": pct(back(19)),
    })
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/health
async fn api_health(State(state): State<AppState>) -> ApiResult {
    let stocks = StockRepository::new(state.db.pool())
        .count()
        .await
        .map_err(internal)?;
    let last_update = AnalysisRepository::new(state.db.pool())
        .latest_indicator_date()
        .await
        .map_err(internal)?;

    Ok(Json(json!({
        "status": "ok",
        "service": "momentum-screener",
        "version": APP_VERSION,
        "stocks": stocks,
        "last_update": last_update,
        "timestamp": Utc::now().to_rfc3339(),
    })))
}

#[derive(Deserialize)]
struct ScreenerParams {
    #[serde(default = "default_screener_limit")]
    limit: usize,
    sector: Option<String>,
    #[serde(default)]
    min_score: f64,
    signal: Option<String>,
}

fn default_screener_limit() -> usize {
    200
}

/// GET /api/screener — universe ranked by momentum score
async fn api_screener(
    State(state): State<AppState>,
    Query(params): Query<ScreenerParams>,
) -> ApiResult {
    let filter = parse_signal_filter(params.signal.as_deref())?;
    let signals = load_signals(&state).await?;

    if signals.is_empty() {
        return Ok(Json(json!({
            "message": "No data available. Run the update command first.",
            "count": 0,
            "stocks": [],
        })));
    }

    let stocks: Vec<&StockSignal> = signals
        .iter()
        .filter(|s| params.sector.as_deref().map_or(true, |sec| s.sector() == sec))
        .filter(|s| s.score() >= params.min_score)
        .filter(|s| filter.map_or(true, |t| s.signal_type == t))
        .take(params.limit)
        .collect();

    Ok(Json(json!({
        "timestamp": Utc::now().to_rfc3339(),
        "count": stocks.len(),
        "stocks": stocks,
    })))
}

/// GET /api/stock/:symbol — indicators, breakdown and history for one stock
async fn api_stock_detail(State(state): State<AppState>, Path(symbol): Path<String>) -> ApiResult {
    let symbol = universe::normalize_symbol(&symbol);
    let price_repo = PriceRepository::new(state.db.pool());
    let analysis = AnalysisRepository::new(state.db.pool());

    let Some(last_bar) = price_repo.latest_price(&symbol).await.map_err(internal)? else {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No data found for {symbol}"),
        ));
    };

    let Some(latest) = analysis.latest_for_symbol(&symbol).await.map_err(internal)? else {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            format!("No indicators calculated for {symbol}"),
        ));
    };

    let history = analysis
        .indicator_history(&symbol, 30)
        .await
        .map_err(internal)?;
    let prices = price_repo.get_prices(&symbol, 30).await.map_err(internal)?;

    let snapshot = convert::snapshot(&latest.indicators);
    let breakdown = score_breakdown(&snapshot, &state.config.weights);
    let scored = ScoredSnapshot {
        momentum_score: breakdown.total_score,
        snapshot,
    };
    let classification = classify_signal(&scored, &state.config.thresholds);

    let name = latest
        .name
        .clone()
        .unwrap_or_else(|| universe::display_name(&symbol));
    let sector = latest
        .sector
        .clone()
        .or_else(|| universe::sector_for(&symbol).map(str::to_string));

    let recent_prices: Vec<_> = prices.iter().rev().collect();

    Ok(Json(json!({
        "symbol": symbol,
        "name": name,
        "sector": sector,
        "current": {
            "price": scored.snapshot.close,
            "last_close": last_bar.close,
            "last_close_date": last_bar.date,
            "date": latest.indicators.date,
            "signal": classification.signal,
            "signal_rationale": classification.rationale,
            "momentum_score": scored.momentum_score,
        },
        "indicators": scored.snapshot,
        "score_breakdown": breakdown,
        "price_history": recent_prices,
        "indicator_history": history,
    })))
}

#[derive(Deserialize)]
struct SignalsParams {
    #[serde(rename = "type")]
    signal_type: Option<String>,
    #[serde(default = "default_signals_limit")]
    limit: usize,
}

fn default_signals_limit() -> usize {
    50
}

/// GET /api/signals — today's recommendations with summary and breadth
async fn api_signals(
    State(state): State<AppState>,
    Query(params): Query<SignalsParams>,
) -> ApiResult {
    let filter = parse_signal_filter(params.signal_type.as_deref())?;
    let signals = load_signals(&state).await?;

    let summary = signal_summary(&signals);
    let breadth = market_breadth(&signals);
    let date = signals
        .iter()
        .filter_map(|s| s.stock.snapshot().date)
        .max()
        .map(|d| d.to_string())
        .unwrap_or_else(|| Utc::now().format("%Y-%m-%d").to_string());

    let types: Option<Vec<SignalType>> = filter.map(|t| vec![t]);
    let selected = top_signals(&signals, params.limit, types.as_deref());

    Ok(Json(json!({
        "date": date,
        "summary": summary,
        "market_breadth": breadth,
        "signals": selected,
    })))
}

#[derive(Deserialize)]
struct GemsParams {
    #[serde(default = "default_gems_limit")]
    limit: usize,
    risk: Option<String>,
}

fn default_gems_limit() -> usize {
    20
}

/// GET /api/gems — oversold candidates with summary and sector grouping
async fn api_gems(State(state): State<AppState>, Query(params): Query<GemsParams>) -> ApiResult {
    let risk = match params.risk.as_deref() {
        None | Some("") => None,
        Some(r) => Some(RiskLevel::parse(r).ok_or_else(|| {
            api_error(StatusCode::BAD_REQUEST, format!("Unknown risk level: {r}"))
        })?),
    };

    let signals = load_signals(&state).await?;
    let scored: Vec<_> = signals.into_iter().map(|s| s.stock).collect();

    let mut gems = detect_gems(&scored);
    if let Some(risk) = risk {
        gems.retain(|g| g.risk_level == risk);
    }
    let summary = gem_summary(&gems);
    gems.truncate(params.limit);
    let by_sector = gems_by_sector(&gems);

    Ok(Json(json!({
        "timestamp": Utc::now().to_rfc3339(),
        "summary": summary,
        "gems": gems,
        "by_sector": by_sector,
    })))
}

#[derive(Deserialize)]
struct ForecastParams {
    days: Option<usize>,
    simulations: Option<usize>,
    seed: Option<u64>,
}

/// Request overrides applied to the configured forecast settings.
/// Out-of-range values are rejected before any work is scheduled.
fn forecast_settings(
    base: &ForecastSettings,
    params: &ForecastParams,
) -> Result<ForecastSettings, (StatusCode, Json<Value>)> {
    let mut settings = base.clone();
    if let Some(days) = params.days {
        settings.days_forward = days;
    }
    if let Some(simulations) = params.simulations {
        settings.num_simulations = simulations;
    }
    if let Some(seed) = params.seed {
        settings.seed = seed;
    }
    settings
        .validate()
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    Ok(settings)
}

/// GET /api/forecast/:symbol — Monte Carlo price forecast
async fn api_forecast(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<ForecastParams>,
) -> ApiResult {
    let symbol = universe::normalize_symbol(&symbol);
    let settings = forecast_settings(&state.config.forecast, &params)?;
    let bars = load_bars(&state.db, &symbol, FORECAST_HISTORY_DAYS).await?;

    let result = tokio::task::spawn_blocking(move || forecast_prices(&bars, &settings))
        .await
        .map_err(internal)?
        .map_err(forecast_error)?;

    Ok(Json(json!({
        "symbol": symbol,
        "forecast": result,
    })))
}

/// GET /api/trend/:symbol — linear trend projection
async fn api_trend(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let symbol = universe::normalize_symbol(&symbol);
    let days = params
        .get("days")
        .and_then(|d| d.parse().ok())
        .unwrap_or(state.config.forecast.days_forward);
    let bars = load_bars(&state.db, &symbol, FORECAST_HISTORY_DAYS).await?;
    let trend = trend_forecast(&bars, days).map_err(forecast_error)?;

    Ok(Json(json!({ "symbol": symbol, "trend": trend })))
}

/// GET /api/volatility/:symbol — volatility regime analysis
async fn api_volatility(State(state): State<AppState>, Path(symbol): Path<String>) -> ApiResult {
    let symbol = universe::normalize_symbol(&symbol);
    let bars = load_bars(&state.db, &symbol, FORECAST_HISTORY_DAYS).await?;
    let analysis = volatility_analysis(&bars).map_err(forecast_error)?;

    Ok(Json(json!({ "symbol": symbol, "volatility": analysis })))
}

/// GET /api/sectors — sector-wise momentum
async fn api_sectors(State(state): State<AppState>) -> ApiResult {
    let signals = load_signals(&state).await?;

    Ok(Json(json!({
        "timestamp": Utc::now().to_rfc3339(),
        "sectors": sector_analysis(&signals),
    })))
}

#[derive(Deserialize)]
struct LimitParams {
    #[serde(default = "default_movers_limit")]
    limit: usize,
}

fn default_movers_limit() -> usize {
    10
}

/// GET /api/top-movers — biggest 5-day gainers and losers
async fn api_top_movers(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> ApiResult {
    let snapshots = load_snapshots(&state.db).await?;

    let mut movers: Vec<(f64, &StockSnapshot)> = snapshots
        .iter()
        .filter_map(|s| s.snapshot.roc_5.map(|roc| (roc, s)))
        .collect();
    movers.sort_by(|a, b| b.0.total_cmp(&a.0));

    let gainers: Vec<&StockSnapshot> = movers.iter().take(params.limit).map(|(_, s)| *s).collect();
    let losers: Vec<&StockSnapshot> = movers
        .iter()
        .rev()
        .take(params.limit)
        .map(|(_, s)| *s)
        .collect();

    Ok(Json(json!({
        "timestamp": Utc::now().to_rfc3339(),
        "gainers": gainers,
        "losers": losers,
    })))
}

/// GET /api/search?q= — match symbol or name
async fn api_search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult {
    let query = params.get("q").map(|q| q.trim()).unwrap_or_default();
    if query.len() < 2 {
        return Ok(Json(json!({ "results": [] })));
    }

    let results = StockRepository::new(state.db.pool())
        .search(query, 20)
        .await
        .map_err(internal)?;

    Ok(Json(json!({ "results": results })))
}

/// GET /api/benchmark — benchmark index level and returns
async fn api_benchmark(State(state): State<AppState>) -> ApiResult {
    let history = PriceRepository::new(state.db.pool())
        .get_benchmark(60)
        .await
        .map_err(internal)?;
    if history.is_empty() {
        return Err(api_error(
            StatusCode::NOT_FOUND,
            "No benchmark data available",
        ));
    }

    let recent: Vec<&BenchmarkRecord> = history.iter().rev().take(30).collect();

    Ok(Json(json!({
        "symbol": universe::BENCHMARK_SYMBOL,
        "summary": benchmark_summary(&history),
        "history": recent,
    })))
}

/// GET /api/market-overview — dashboard summary
async fn api_market_overview(State(state): State<AppState>) -> ApiResult {
    let history = PriceRepository::new(state.db.pool())
        .get_benchmark(30)
        .await
        .map_err(internal)?;
    let signals = load_signals(&state).await?;

    let bullish = [SignalType::StrongBuy, SignalType::Buy];
    let top_momentum = top_signals(&signals, 5, Some(&bullish[..]));
    let top_sectors: Vec<_> = sector_analysis(&signals).into_iter().take(5).collect();

    Ok(Json(json!({
        "timestamp": Utc::now().to_rfc3339(),
        "benchmark": benchmark_summary(&history),
        "signal_summary": signal_summary(&signals),
        "market_breadth": market_breadth(&signals),
        "top_momentum": top_momentum,
        "top_sectors": top_sectors,
        "stock_count": signals.len(),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(date: &str, close: f64) -> BenchmarkRecord {
        BenchmarkRecord {
            date: date.into(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 0.0,
        }
    }

    #[test]
    fn test_benchmark_summary_returns() {
        let history: Vec<BenchmarkRecord> = (1..=25)
            .map(|d| record(&format!("2024-01-{d:02}"), 100.0 + d as f64))
            .collect();
        let summary = benchmark_summary(&history);

        assert_eq!(summary["value"], 125.0);
        assert_eq!(summary["date"], "2024-01-25");
        assert_eq!(summary["change"], 1.0);
        // 125 vs 121 four bars back
        assert_eq!(summary["week_return"], 3.31);
    }

    #[test]
    fn test_benchmark_summary_short_history() {
        assert_eq!(benchmark_summary(&[]), Value::Null);
        let summary = benchmark_summary(&[record("2024-01-01", 100.0)]);
        assert_eq!(summary["change"], 0.0);
        assert_eq!(summary["month_return"], 0.0);
    }

    #[test]
    fn test_parse_signal_filter() {
        assert_eq!(parse_signal_filter(None).unwrap(), None);
        assert_eq!(
            parse_signal_filter(Some("strong_buy")).unwrap(),
            Some(SignalType::StrongBuy)
        );
        assert!(parse_signal_filter(Some("moon")).is_err());
    }

    #[test]
    fn test_oversized_forecast_request_is_rejected() {
        let base = ForecastSettings::default();
        let params = ForecastParams {
            days: Some(10_000),
            simulations: Some(1_000_000_000),
            seed: None,
        };
        let (status, body) = forecast_settings(&base, &params).unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.0["error"].as_str().unwrap().contains("days_forward"));

        let params = ForecastParams {
            days: Some(30),
            simulations: Some(500),
            seed: Some(7),
        };
        let settings = forecast_settings(&base, &params).unwrap();
        assert_eq!(settings.days_forward, 30);
        assert_eq!(settings.num_simulations, 500);
        assert_eq!(settings.seed, 7);
    }
}
