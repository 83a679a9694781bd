//! Daily update job: fetch prices, recompute indicators, store signals

use anyhow::Result;
use engine::{
    screen_universe, EngineConfig, EngineError, PriceHistoryProvider, ScreenFailure, ScreenReport,
    StockInfo, SymbolHistory,
};
use persistence::repository::{AnalysisRepository, PriceRepository, StockRepository};
use persistence::Database;
use tracing::{info, warn};

use crate::convert;
use crate::universe::{self, BENCHMARK_SYMBOL};

/// Outcome of one update run
#[derive(Debug, Default, Clone, PartialEq)]
pub struct UpdateSummary {
    pub requested: usize,
    pub fetched: usize,
    pub fetch_failures: Vec<String>,
    pub benchmark_bars: usize,
    pub screened: usize,
    pub analysis_errors: usize,
}

/// Fetch → store → analyze → store for the given symbols.
///
/// Failures for individual symbols are logged and counted; only storage
/// errors abort the run.
pub async fn run_update(
    db: &Database,
    provider: &dyn PriceHistoryProvider,
    config: &EngineConfig,
    symbols: &[String],
) -> Result<UpdateSummary> {
    let mut summary = UpdateSummary {
        requested: symbols.len(),
        ..Default::default()
    };

    let stocks = StockRepository::new(db.pool());
    stocks.upsert_many(&universe::stock_records(symbols)).await?;

    let prices = PriceRepository::new(db.pool());
    let fetch_days = config.screener.fetch_days;

    match provider.fetch_history(BENCHMARK_SYMBOL, fetch_days).await {
        Ok(bars) => {
            let records: Vec<_> = bars.iter().map(convert::benchmark_record).collect();
            summary.benchmark_bars = prices.upsert_benchmark(&records).await?;
        }
        Err(e) => warn!(symbol = BENCHMARK_SYMBOL, error = %e, "Benchmark fetch failed"),
    }

    for symbol in symbols {
        match provider.fetch_history(symbol, fetch_days).await {
            Ok(bars) if !bars.is_empty() => {
                let records: Vec<_> = bars
                    .iter()
                    .map(|b| convert::price_record(symbol, b))
                    .collect();
                prices.upsert_prices(&records).await?;
                summary.fetched += 1;
            }
            Ok(_) => {
                warn!(symbol = %symbol, "No price data returned");
                summary.fetch_failures.push(symbol.clone());
            }
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Price fetch failed");
                summary.fetch_failures.push(symbol.clone());
            }
        }
    }

    info!(
        fetched = summary.fetched,
        failed = summary.fetch_failures.len(),
        benchmark_bars = summary.benchmark_bars,
        "Price data updated"
    );

    let report = analyze_and_store(db, config, symbols).await?;
    summary.screened = report.stocks.len();
    summary.analysis_errors = report.errors.len();

    info!(
        screened = summary.screened,
        errors = summary.analysis_errors,
        "Daily update complete"
    );

    Ok(summary)
}

/// Recompute indicators and signals from stored prices and persist them.
///
/// A symbol whose stored rows cannot be read is reported in the report's
/// error list. An unreadable benchmark is dropped and screening continues
/// without relative strength.
pub async fn analyze_and_store(
    db: &Database,
    config: &EngineConfig,
    symbols: &[String],
) -> Result<ScreenReport> {
    let stocks = StockRepository::new(db.pool());
    let prices = PriceRepository::new(db.pool());
    let analysis = AnalysisRepository::new(db.pool());
    let window = config.screener.history_days as i64;

    let benchmark = match convert::benchmark_bars(&prices.get_benchmark(window).await?) {
        Ok(bars) => bars,
        Err(e) => {
            warn!(
                symbol = BENCHMARK_SYMBOL,
                error = %e,
                "Ignoring unreadable benchmark history"
            );
            Vec::new()
        }
    };

    let mut inputs = Vec::with_capacity(symbols.len());
    let mut unreadable = Vec::new();
    for symbol in symbols {
        let records = prices.get_prices(symbol, window).await?;
        let bars = match convert::price_bars(&records) {
            Ok(bars) => bars,
            Err(e) => {
                warn!(symbol = %symbol, error = %e, "Unreadable price history");
                unreadable.push(ScreenFailure {
                    symbol: symbol.clone(),
                    error: EngineError::invalid(symbol, format!("{e:#}")),
                });
                continue;
            }
        };
        let info = match stocks.get(symbol).await? {
            Some(record) => StockInfo {
                symbol: record.symbol,
                name: record.name,
                sector: record.sector,
            },
            None => StockInfo::new(symbol.clone()),
        };
        inputs.push(SymbolHistory::new(info, bars));
    }

    let benchmark = (!benchmark.is_empty()).then_some(benchmark.as_slice());
    let mut report = screen_universe(&inputs, benchmark, config)?;

    if !unreadable.is_empty() {
        report.errors.extend(unreadable);
        report
            .errors
            .sort_by_key(|f| symbols.iter().position(|s| *s == f.symbol));
    }

    for signal in &report.stocks {
        if let Some(record) = convert::indicator_record(signal.symbol(), &signal.stock.scored) {
            analysis.upsert_indicators(&record).await?;
        }
        if let Some(record) = convert::signal_record(signal) {
            analysis.upsert_signal(&record).await?;
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use engine::PriceBar;

    /// Deterministic provider: a gentle trend per symbol, `FAIL.NS` always errors
    struct FakeProvider;

    #[async_trait]
    impl PriceHistoryProvider for FakeProvider {
        async fn fetch_history(&self, symbol: &str, days: u32) -> Result<Vec<PriceBar>> {
            if symbol == "FAIL.NS" {
                anyhow::bail!("connection reset");
            }
            let step = if symbol == "DOWN.NS" { -0.5 } else { 0.5 };
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            Ok((0..days as i64)
                .map(|i| {
                    let close = 200.0 + step * i as f64;
                    PriceBar {
                        date: start + chrono::Duration::days(i),
                        open: close,
                        high: close + 1.0,
                        low: close - 1.0,
                        close,
                        adjusted_close: close,
                        volume: 10_000.0 + (i % 5) as f64 * 500.0,
                    }
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_update_fetches_analyzes_and_stores() {
        let db = Database::in_memory().await.unwrap();
        let config = EngineConfig::default();
        let symbols: Vec<String> = ["UP.NS", "DOWN.NS", "FAIL.NS"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let summary = run_update(&db, &FakeProvider, &config, &symbols)
            .await
            .unwrap();

        assert_eq!(summary.requested, 3);
        assert_eq!(summary.fetched, 2);
        assert_eq!(summary.fetch_failures, vec!["FAIL.NS".to_string()]);
        assert_eq!(summary.benchmark_bars, 90);
        assert_eq!(summary.screened, 2);
        // FAIL.NS has no stored prices
        assert_eq!(summary.analysis_errors, 1);

        let analysis = AnalysisRepository::new(db.pool());
        let latest = analysis.latest_indicators(10).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].indicators.symbol, "UP.NS");
        assert!(latest[0].indicators.relative_strength_5.is_some());

        let signals = analysis.latest_signals(None).await.unwrap();
        assert_eq!(signals.len(), 2);
    }

    #[tokio::test]
    async fn test_rerun_overwrites_same_day() {
        let db = Database::in_memory().await.unwrap();
        let config = EngineConfig::default();
        let symbols = vec!["UP.NS".to_string()];

        run_update(&db, &FakeProvider, &config, &symbols)
            .await
            .unwrap();
        run_update(&db, &FakeProvider, &config, &symbols)
            .await
            .unwrap();

        let prices = PriceRepository::new(db.pool());
        assert_eq!(prices.count_bars("UP.NS").await.unwrap(), 90);
        let history = AnalysisRepository::new(db.pool())
            .indicator_history("UP.NS", 10)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_history_is_counted_as_an_error() {
        let db = Database::in_memory().await.unwrap();
        let config = EngineConfig::default();
        let symbols: Vec<String> = ["UP.NS", "DOWN.NS"].iter().map(|s| s.to_string()).collect();

        run_update(&db, &FakeProvider, &config, &symbols)
            .await
            .unwrap();

        // Sorts after every ISO date, so it lands in the loaded window
        sqlx::query(
            "INSERT INTO prices (symbol, date, open, high, low, close, adj_close, volume)
             VALUES ('UP.NS', '2099-13-45', 1, 1, 1, 1, 1, 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let report = analyze_and_store(&db, &config, &symbols).await.unwrap();
        assert_eq!(report.stocks.len(), 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].symbol, "UP.NS");
        assert!(matches!(
            report.errors[0].error,
            EngineError::InvalidInput { .. }
        ));

        let summary = run_update(&db, &FakeProvider, &config, &symbols)
            .await
            .unwrap();
        assert_eq!(summary.analysis_errors, 1);
    }

    #[tokio::test]
    async fn test_unreadable_benchmark_is_ignored() {
        let db = Database::in_memory().await.unwrap();
        let config = EngineConfig::default();
        let symbols = vec!["UP.NS".to_string()];

        run_update(&db, &FakeProvider, &config, &symbols)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO benchmark_history (date, open, high, low, close, volume)
             VALUES ('2099-13-45', 1, 1, 1, 1, 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let report = analyze_and_store(&db, &config, &symbols).await.unwrap();
        assert_eq!(report.stocks.len(), 1);
        assert!(report.errors.is_empty());
        assert_eq!(report.stocks[0].stock.snapshot().relative_strength_5, None);
    }
}
