//! Momentum Screener Engine — indicators, scoring, signals and forecasts
//!
//! Pure analysis over daily price history.
//! Provides:
//! - Technical indicators (RSI, ROC, ATR, SMA, MACD, Bollinger, relative volume/strength)
//! - Composite 0-100 momentum score and signal classification
//! - Oversold "gem" detection
//! - Monte Carlo price forecast, linear trend and volatility analysis
//! - Parallel universe screening
//! - Yahoo Finance client for daily price history

pub mod api;
pub mod config;
pub mod error;
pub mod forecast;
pub mod gems;
pub mod indicators;
pub mod momentum;
pub mod screener;
pub mod signals;
pub mod types;

// Re-exports for convenience
pub use api::{PriceHistoryProvider, YahooFinanceClient};
pub use config::{
    EngineConfig, ForecastSettings, IndicatorPeriods, ScoreWeights, ScreenerSettings,
    SignalThresholds, MAX_FORECAST_DAYS, MAX_SIMULATIONS,
};
pub use error::{ConfigError, EngineError, EngineResult, ForecastError};
pub use forecast::{
    forecast_prices, trend_forecast, volatility_analysis, ForecastResult, TrendForecast,
    VolatilityAnalysis,
};
pub use gems::{detect_gems, gem_summary, gems_by_sector, Gem, GemSummary, GemType, RiskLevel};
pub use indicators::{compute_indicators, latest_snapshot};
pub use momentum::{
    rank_by_momentum, score_breakdown, score_momentum, score_stock, RankedStock, ScoreBreakdown,
};
pub use screener::{screen_universe, ScreenFailure, ScreenReport, SymbolHistory};
pub use signals::{
    classify_signal, generate_signals, market_breadth, sector_analysis, signal_summary,
    top_signals, Classification, MarketBreadth, SectorStats, SignalSummary, StockSignal,
};
pub use types::*;
