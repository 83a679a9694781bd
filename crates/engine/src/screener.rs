//! Universe-wide screening
//!
//! Each symbol runs through validate → indicators → score → classify on its
//! own; a failure is recorded against that symbol and the rest carry on.
//! Symbols are processed in parallel and the result is re-sorted, so the
//! output does not depend on thread scheduling.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::{ConfigError, EngineError, EngineResult};
use crate::indicators::{latest_snapshot, validate_series};
use crate::momentum::score_stock;
use crate::signals::{signal_for, StockSignal};
use crate::types::{PriceBar, ScoredStock, StockInfo, StockSnapshot};

/// Price history for one symbol of the universe
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolHistory {
    pub info: StockInfo,
    /// Daily bars, oldest first
    pub bars: Vec<PriceBar>,
}

impl SymbolHistory {
    pub fn new(info: StockInfo, bars: Vec<PriceBar>) -> Self {
        Self { info, bars }
    }
}

/// A symbol that could not be screened
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenFailure {
    pub symbol: String,
    pub error: EngineError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScreenReport {
    /// Highest momentum score first
    pub stocks: Vec<StockSignal>,
    /// In input order
    pub errors: Vec<ScreenFailure>,
}

impl ScreenReport {
    pub fn scored(&self) -> Vec<ScoredStock> {
        self.stocks.iter().map(|s| s.stock.clone()).collect()
    }
}

/// Run the full pipeline for a single symbol
pub fn screen_symbol(
    input: &SymbolHistory,
    benchmark: Option<&[PriceBar]>,
    config: &EngineConfig,
) -> EngineResult<StockSignal> {
    let symbol = input.info.symbol.as_str();
    validate_series(symbol, &input.bars)?;

    let required = config.screener.min_history_bars;
    if input.bars.len() < required {
        return Err(EngineError::InsufficientData {
            symbol: symbol.to_string(),
            required,
            actual: input.bars.len(),
        });
    }

    let start = input.bars.len().saturating_sub(config.screener.history_days);
    let window = &input.bars[start..];

    let snapshot = latest_snapshot(symbol, window, benchmark, &config.indicators)?;
    let stock = StockSnapshot {
        info: input.info.clone(),
        snapshot,
    };
    let scored = score_stock(&stock, &config.weights);
    Ok(signal_for(&scored, &config.thresholds))
}

/// Screen every symbol of the universe.
///
/// Fails only on an invalid configuration. A benchmark that does not pass
/// validation is ignored, leaving relative strength unavailable for everyone.
pub fn screen_universe(
    inputs: &[SymbolHistory],
    benchmark: Option<&[PriceBar]>,
    config: &EngineConfig,
) -> Result<ScreenReport, ConfigError> {
    config.validate()?;

    let benchmark = match benchmark {
        Some(bench) => match validate_series("benchmark", bench) {
            Ok(()) => Some(bench),
            Err(e) => {
                warn!(error = %e, "Ignoring benchmark history");
                None
            }
        },
        None => None,
    };

    let results: Vec<(String, EngineResult<StockSignal>)> = inputs
        .par_iter()
        .map(|input| {
            (
                input.info.symbol.clone(),
                screen_symbol(input, benchmark, config),
            )
        })
        .collect();

    let mut report = ScreenReport::default();
    for (symbol, result) in results {
        match result {
            Ok(signal) => report.stocks.push(signal),
            Err(error) => {
                warn!(symbol = %symbol, error = %error, "Skipping symbol");
                report.errors.push(ScreenFailure { symbol, error });
            }
        }
    }

    report.stocks.sort_by(|a, b| {
        b.score()
            .total_cmp(&a.score())
            .then_with(|| a.symbol().cmp(b.symbol()))
    });

    info!(
        symbols = inputs.len(),
        screened = report.stocks.len(),
        errors = report.errors.len(),
        benchmark = benchmark.is_some(),
        "Universe screened"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
    }

    fn make_bars(closes: &[f64]) -> Vec<PriceBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PriceBar {
                date: day(i),
                open: c,
                high: c * 1.01,
                low: c * 0.99,
                close: c,
                adjusted_close: c,
                volume: 1_000.0 + (i % 7) as f64 * 100.0,
            })
            .collect()
    }

    fn history(symbol: &str, closes: &[f64]) -> SymbolHistory {
        let mut info = StockInfo::new(symbol);
        info.sector = Some("Energy".into());
        SymbolHistory::new(info, make_bars(closes))
    }

    fn trending(n: usize, start: f64, step: f64) -> Vec<f64> {
        (0..n).map(|i| start + step * i as f64).collect()
    }

    #[test]
    fn test_failures_are_isolated_per_symbol() {
        let mut bad = history("BAD", &trending(40, 100.0, 1.0));
        bad.bars[10].close = f64::NAN;

        let inputs = vec![
            history("UP", &trending(60, 100.0, 1.0)),
            bad,
            history("SHORT", &trending(10, 100.0, 1.0)),
            history("DOWN", &trending(60, 200.0, -1.0)),
        ];

        let report = screen_universe(&inputs, None, &EngineConfig::default()).unwrap();

        assert_eq!(report.stocks.len(), 2);
        assert_eq!(report.errors.len(), 2);
        assert_eq!(report.errors[0].symbol, "BAD");
        assert!(matches!(
            report.errors[0].error,
            EngineError::InvalidInput { .. }
        ));
        assert_eq!(
            report.errors[1].error,
            EngineError::InsufficientData {
                symbol: "SHORT".into(),
                required: 30,
                actual: 10,
            }
        );
    }

    #[test]
    fn test_output_sorted_by_score() {
        let inputs = vec![
            history("DOWN", &trending(60, 200.0, -1.0)),
            history("UP", &trending(60, 100.0, 1.0)),
            history("FLAT", &[100.0; 60]),
        ];
        let report = screen_universe(&inputs, None, &EngineConfig::default()).unwrap();

        let scores: Vec<f64> = report.stocks.iter().map(|s| s.score()).collect();
        assert!(scores.windows(2).all(|w| w[0] >= w[1]));
        assert_eq!(report.stocks[0].symbol(), "UP");
        assert_eq!(report.stocks[0].sector(), "Energy");
    }

    #[test]
    fn test_matches_single_symbol_pipeline() {
        let inputs: Vec<SymbolHistory> = (0..8)
            .map(|k| history(&format!("S{k}"), &trending(60, 100.0, k as f64 - 3.5)))
            .collect();
        let config = EngineConfig::default();
        let report = screen_universe(&inputs, None, &config).unwrap();

        for input in &inputs {
            let single = screen_symbol(input, None, &config).unwrap();
            let found = report
                .stocks
                .iter()
                .find(|s| s.symbol() == input.info.symbol)
                .unwrap();
            assert_eq!(found, &single);
        }
    }

    #[test]
    fn test_invalid_benchmark_is_ignored() {
        let inputs = vec![history("UP", &trending(60, 100.0, 1.0))];
        let mut bench = make_bars(&trending(60, 100.0, 0.5));
        bench.swap(3, 4);

        let report = screen_universe(&inputs, Some(&bench), &EngineConfig::default()).unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(report.stocks[0].stock.snapshot().relative_strength_5, None);
    }

    #[test]
    fn test_benchmark_populates_relative_strength() {
        let inputs = vec![history("UP", &trending(60, 100.0, 1.0))];
        let bench = make_bars(&trending(60, 100.0, 0.1));

        let report = screen_universe(&inputs, Some(&bench), &EngineConfig::default()).unwrap();
        let snap = report.stocks[0].stock.snapshot();
        assert!(snap.relative_strength_5.unwrap() > 0.0);
        assert!(snap.relative_strength_20.unwrap() > 0.0);
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let mut config = EngineConfig::default();
        config.weights.roc_5 = 0.9;
        let inputs = vec![history("UP", &trending(60, 100.0, 1.0))];
        assert!(matches!(
            screen_universe(&inputs, None, &config),
            Err(ConfigError::WeightSum { .. })
        ));
    }
}
