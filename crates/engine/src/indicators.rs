//! Indicator engine
//!
//! Derives the full set of technical indicators from one symbol's ascending
//! daily history (and optionally a benchmark index series). Every indicator
//! stays `None` until its lookback window is filled; short histories are a
//! partial result, never an error.
//!
//! Moving averages come from the `ta` crate. Both `ta` EMAs and pandas-style
//! unadjusted EMAs use `k = 2 / (n + 1)` seeded with the first input, so the
//! streaming indicators produce the same recursion. `ta`'s SMA reports
//! partial-window averages while warming up, so every rolling value here is
//! gated on the bar count.

use std::collections::HashMap;

use chrono::NaiveDate;
use ta::indicators::{ExponentialMovingAverage, SimpleMovingAverage};
use ta::Next;
use tracing::debug;

use crate::config::IndicatorPeriods;
use crate::error::{ConfigError, EngineError, EngineResult};
use crate::types::{IndicatorSnapshot, PriceBar};

const BENCHMARK_LABEL: &str = "benchmark";

// ============================================================================
// Entry points
// ============================================================================

/// Compute one snapshot per input bar.
///
/// `bars` must be strictly ascending by date with positive, finite prices.
/// Relative strength is only populated when `benchmark` has a bar on the
/// same calendar date with enough history of its own.
pub fn compute_indicators(
    symbol: &str,
    bars: &[PriceBar],
    benchmark: Option<&[PriceBar]>,
    periods: &IndicatorPeriods,
) -> EngineResult<Vec<IndicatorSnapshot>> {
    periods.validate()?;
    validate_series(symbol, bars)?;
    if let Some(bench) = benchmark {
        validate_series(BENCHMARK_LABEL, bench)?;
    }

    let prices = analysis_prices(bars, periods.use_adjusted_close);
    let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();

    let rsi = rsi_series(&prices, periods.rsi)?;
    let roc_5 = roc_series(&prices, periods.roc_short);
    let roc_10 = roc_series(&prices, periods.roc_medium);
    let roc_20 = roc_series(&prices, periods.roc_long);
    let atr = atr_series(bars, periods.atr, periods.use_adjusted_close)?;
    let sma_20 = sma_series(&prices, periods.sma_short)?;
    let sma_50 = sma_series(&prices, periods.sma_long)?;
    let macd = macd_series(
        &prices,
        periods.macd_fast,
        periods.macd_slow,
        periods.macd_signal,
    )?;
    let bands = bollinger_series(&prices, periods.bollinger_period, periods.bollinger_std)?;
    let relative_volume = relative_volume_series(&volumes, periods.volume_avg_period)?;

    let dates: Vec<NaiveDate> = bars.iter().map(|b| b.date).collect();
    let (rs_5, rs_10, rs_20) = match benchmark {
        Some(bench) if !bench.is_empty() => {
            let bench_prices = analysis_prices(bench, periods.use_adjusted_close);
            let bench_index: HashMap<NaiveDate, usize> = bench
                .iter()
                .enumerate()
                .map(|(i, b)| (b.date, i))
                .collect();
            let rs = |stock_roc: &[Option<f64>], period: usize| {
                relative_strength_series(
                    &dates,
                    stock_roc,
                    &roc_series(&bench_prices, period),
                    &bench_index,
                )
            };
            (
                rs(&roc_5[..], periods.roc_short),
                rs(&roc_10[..], periods.roc_medium),
                rs(&roc_20[..], periods.roc_long),
            )
        }
        _ => {
            let none = vec![None; bars.len()];
            (none.clone(), none.clone(), none)
        }
    };

    let snapshots: Vec<IndicatorSnapshot> = (0..bars.len())
        .map(|i| {
            let band = bands[i];
            IndicatorSnapshot {
                date: Some(bars[i].date),
                close: Some(prices[i]),
                rsi: rsi[i],
                roc_5: roc_5[i],
                roc_10: roc_10[i],
                roc_20: roc_20[i],
                atr: atr[i],
                sma_20: sma_20[i],
                sma_50: sma_50[i],
                macd: macd.line[i],
                macd_signal: macd.signal[i],
                macd_hist: macd.histogram[i],
                bb_upper: band.map(|b| b.upper),
                bb_middle: band.map(|b| b.middle),
                bb_lower: band.map(|b| b.lower),
                relative_volume: relative_volume[i],
                relative_strength_5: rs_5[i],
                relative_strength_10: rs_10[i],
                relative_strength_20: rs_20[i],
            }
        })
        .collect();

    debug!(
        symbol = %symbol,
        bars = bars.len(),
        benchmark = benchmark.is_some(),
        "Computed indicators"
    );

    Ok(snapshots)
}

/// Snapshot for the most recent bar only
pub fn latest_snapshot(
    symbol: &str,
    bars: &[PriceBar],
    benchmark: Option<&[PriceBar]>,
    periods: &IndicatorPeriods,
) -> EngineResult<IndicatorSnapshot> {
    let mut snapshots = compute_indicators(symbol, bars, benchmark, periods)?;
    snapshots
        .pop()
        .ok_or_else(|| EngineError::invalid(symbol, "empty price history"))
}

/// Reject series the indicator math cannot be trusted on
pub fn validate_series(symbol: &str, bars: &[PriceBar]) -> EngineResult<()> {
    if bars.is_empty() {
        return Err(EngineError::invalid(symbol, "empty price history"));
    }

    for (i, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close, bar.adjusted_close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(EngineError::invalid(
                symbol,
                format!("non-finite price on {}", bar.date),
            ));
        }
        if bar.close <= 0.0 || bar.adjusted_close <= 0.0 {
            return Err(EngineError::invalid(
                symbol,
                format!("non-positive close on {}", bar.date),
            ));
        }
        if !bar.volume.is_finite() || bar.volume < 0.0 {
            return Err(EngineError::invalid(
                symbol,
                format!("invalid volume on {}", bar.date),
            ));
        }
        if i > 0 && bars[i - 1].date >= bar.date {
            return Err(EngineError::invalid(
                symbol,
                format!(
                    "dates not strictly ascending ({} then {})",
                    bars[i - 1].date,
                    bar.date
                ),
            ));
        }
    }

    Ok(())
}

/// Price series the indicators run on
pub fn analysis_prices(bars: &[PriceBar], use_adjusted_close: bool) -> Vec<f64> {
    bars.iter()
        .map(|b| {
            if use_adjusted_close {
                b.adjusted_close
            } else {
                b.close
            }
        })
        .collect()
}

// ============================================================================
// Individual indicators
// ============================================================================

fn period_error(name: &'static str) -> impl Fn(ta::errors::TaError) -> ConfigError {
    move |e| ConfigError::InvalidValue(format!("{name} period rejected: {e:?}"))
}

/// RSI from EMA-smoothed gains and losses, available from bar `period`.
///
/// A window with no losses reads 100; a window with neither gains nor losses
/// has no defined RSI.
pub fn rsi_series(prices: &[f64], period: usize) -> Result<Vec<Option<f64>>, ConfigError> {
    let mut avg_gain = ExponentialMovingAverage::new(period).map_err(period_error("rsi"))?;
    let mut avg_loss = ExponentialMovingAverage::new(period).map_err(period_error("rsi"))?;

    let mut out = vec![None; prices.len()];
    for i in 1..prices.len() {
        let delta = prices[i] - prices[i - 1];
        let gain = avg_gain.next(delta.max(0.0));
        let loss = avg_loss.next((-delta).max(0.0));

        if i < period {
            continue;
        }
        out[i] = if loss > 0.0 {
            let rs = gain / loss;
            Some(100.0 - 100.0 / (1.0 + rs))
        } else if gain > 0.0 {
            Some(100.0)
        } else {
            None
        };
    }
    Ok(out)
}

/// Percent change over `period` bars
pub fn roc_series(prices: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..prices.len())
        .map(|i| {
            if i < period {
                return None;
            }
            let base = prices[i - period];
            if base > 0.0 {
                Some((prices[i] - base) / base * 100.0)
            } else {
                None
            }
        })
        .collect()
}

/// Simple moving average, undefined for the first `period - 1` values
pub fn sma_series(values: &[f64], period: usize) -> Result<Vec<Option<f64>>, ConfigError> {
    let mut sma = SimpleMovingAverage::new(period).map_err(period_error("sma"))?;
    Ok(values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let avg = sma.next(*v);
            (i + 1 >= period).then_some(avg)
        })
        .collect())
}

/// True range; the first bar has no previous close and uses high - low.
///
/// With `use_adjusted_close` each bar's high, low and close are scaled by its
/// adjustment factor (`adjusted_close / close`), keeping splits and dividends
/// out of the range.
pub fn true_range_series(bars: &[PriceBar], use_adjusted_close: bool) -> Vec<f64> {
    let factor = |bar: &PriceBar| {
        if use_adjusted_close && bar.close > 0.0 {
            bar.adjusted_close / bar.close
        } else {
            1.0
        }
    };

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let f = factor(bar);
            let (high, low) = (bar.high * f, bar.low * f);
            let range = high - low;
            if i == 0 {
                return range;
            }
            let prev = &bars[i - 1];
            let prev_close = prev.close * factor(prev);
            range
                .max((high - prev_close).abs())
                .max((low - prev_close).abs())
        })
        .collect()
}

/// ATR as the simple average of true range
pub fn atr_series(
    bars: &[PriceBar],
    period: usize,
    use_adjusted_close: bool,
) -> Result<Vec<Option<f64>>, ConfigError> {
    sma_series(&true_range_series(bars, use_adjusted_close), period)
}

#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

/// MACD line from bar `slow - 1`, signal and histogram from `slow + signal - 2`
pub fn macd_series(
    prices: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> Result<MacdSeries, ConfigError> {
    let mut ema_fast = ExponentialMovingAverage::new(fast).map_err(period_error("macd_fast"))?;
    let mut ema_slow = ExponentialMovingAverage::new(slow).map_err(period_error("macd_slow"))?;
    let mut ema_signal =
        ExponentialMovingAverage::new(signal).map_err(period_error("macd_signal"))?;

    let n = prices.len();
    let mut out = MacdSeries {
        line: vec![None; n],
        signal: vec![None; n],
        histogram: vec![None; n],
    };

    let line_start = slow.saturating_sub(1);
    let signal_start = slow + signal - 2;

    for (i, price) in prices.iter().enumerate() {
        let line = ema_fast.next(*price) - ema_slow.next(*price);
        let sig = ema_signal.next(line);

        if i >= line_start {
            out.line[i] = Some(line);
        }
        if i >= signal_start {
            out.signal[i] = Some(sig);
            out.histogram[i] = Some(line - sig);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// Bollinger bands around the SMA using the sample standard deviation
pub fn bollinger_series(
    prices: &[f64],
    period: usize,
    num_std: f64,
) -> Result<Vec<Option<BollingerPoint>>, ConfigError> {
    let middle = sma_series(prices, period)?;
    if period < 2 {
        return Ok(vec![None; prices.len()]);
    }

    Ok(middle
        .iter()
        .enumerate()
        .map(|(i, mean)| {
            let mean = (*mean)?;
            let window = &prices[i + 1 - period..=i];
            let var = window.iter().map(|p| (p - mean).powi(2)).sum::<f64>()
                / (period - 1) as f64;
            let width = var.sqrt() * num_std;
            Some(BollingerPoint {
                upper: mean + width,
                middle: mean,
                lower: mean - width,
            })
        })
        .collect())
}

/// Volume relative to its rolling mean; undefined when the mean is zero
pub fn relative_volume_series(
    volumes: &[f64],
    period: usize,
) -> Result<Vec<Option<f64>>, ConfigError> {
    let avg = sma_series(volumes, period)?;
    Ok(volumes
        .iter()
        .zip(avg)
        .map(|(v, mean)| match mean {
            Some(m) if m > 0.0 => Some(v / m),
            _ => None,
        })
        .collect())
}

/// Stock ROC minus benchmark ROC for the same calendar date
fn relative_strength_series(
    dates: &[NaiveDate],
    stock_roc: &[Option<f64>],
    bench_roc: &[Option<f64>],
    bench_index: &HashMap<NaiveDate, usize>,
) -> Vec<Option<f64>> {
    dates
        .iter()
        .zip(stock_roc)
        .map(|(date, stock)| {
            let bench = bench_index.get(date).and_then(|&j| bench_roc[j])?;
            Some((*stock)? - bench)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn day(i: usize) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i as i64)
    }

    fn make_bars(prices: &[f64]) -> Vec<PriceBar> {
        prices
            .iter()
            .enumerate()
            .map(|(i, &p)| PriceBar {
                date: day(i),
                open: p,
                high: p + 1.0,
                low: p - 1.0,
                close: p,
                adjusted_close: p,
                volume: 1000.0,
            })
            .collect()
    }

    fn defaults() -> IndicatorPeriods {
        IndicatorPeriods::default()
    }

    #[test]
    fn test_roc_constant_series_is_zero() {
        let bars = make_bars(&[100.0; 30]);
        let snaps = compute_indicators("FLAT", &bars, None, &defaults()).unwrap();
        for (t, s) in snaps.iter().enumerate() {
            if t < 5 {
                assert_eq!(s.roc_5, None);
            } else {
                assert_eq!(s.roc_5, Some(0.0));
            }
            if t >= 20 {
                assert_eq!(s.roc_20, Some(0.0));
            }
        }
    }

    #[test]
    fn test_rsi_monotonic_series_reaches_100() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        let rsi = rsi_series(&prices, 14).unwrap();
        assert!(rsi[..14].iter().all(Option::is_none));
        assert_eq!(rsi[14], Some(100.0));
        assert_eq!(rsi[39], Some(100.0));
    }

    #[test]
    fn test_rsi_flat_series_unavailable() {
        let rsi = rsi_series(&[50.0; 30], 14).unwrap();
        assert!(rsi.iter().all(Option::is_none));
    }

    #[test]
    fn test_rsi_stays_bounded() {
        let prices: Vec<f64> = (0..120)
            .map(|i| 100.0 + 10.0 * (i as f64 / 5.0).sin() + (i % 7) as f64)
            .collect();
        for v in rsi_series(&prices, 14).unwrap().into_iter().flatten() {
            assert!((0.0..=100.0).contains(&v), "rsi out of range: {v}");
        }
    }

    #[test]
    fn test_rsi_matches_unadjusted_ewm() {
        let prices = [10.0, 11.0, 10.5, 11.5, 12.0, 11.0];
        let rsi = rsi_series(&prices, 3).unwrap();

        let k = 2.0 / 4.0;
        let (mut g, mut l) = (1.0, 0.0);
        for d in [-0.5, 1.0, 0.5] {
            g = k * f64::max(d, 0.0) + (1.0 - k) * g;
            l = k * f64::max(-d, 0.0) + (1.0 - k) * l;
        }
        let expected = 100.0 - 100.0 / (1.0 + g / l);
        assert!((rsi[4].unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_warmup_windows() {
        let prices: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let bars = make_bars(&prices);
        let snaps = compute_indicators("WARM", &bars, None, &defaults()).unwrap();

        assert!(snaps[18].sma_20.is_none());
        assert!(snaps[19].sma_20.is_some());
        assert!(snaps.iter().all(|s| s.sma_50.is_none()));
        assert!(snaps[24].macd.is_none());
        assert!(snaps[25].macd.is_some());
        assert!(snaps[32].macd_signal.is_none());
        assert!(snaps[33].macd_signal.is_some());
        assert!(snaps[33].macd_hist.is_some());
        assert!(snaps[12].atr.is_none());
        assert!(snaps[13].atr.is_some());
    }

    #[test]
    fn test_short_history_is_partial_not_error() {
        let bars = make_bars(&[10.0, 10.5, 11.0, 10.8, 11.2]);
        let snaps = compute_indicators("NEW", &bars, None, &defaults()).unwrap();
        assert_eq!(snaps.len(), 5);
        let last = &snaps[4];
        assert_eq!(last.close, Some(11.2));
        assert!(last.rsi.is_none());
        assert!(last.sma_20.is_none());
        assert!(last.bb_middle.is_none());
        assert!(last.relative_volume.is_none());
    }

    #[test]
    fn test_bollinger_collapses_on_flat_series() {
        let bars = make_bars(&[100.0; 30]);
        let last = latest_snapshot("FLAT", &bars, None, &defaults()).unwrap();
        let mid = last.bb_middle.unwrap();
        assert!((mid - 100.0).abs() < 1e-9);
        assert!((last.bb_upper.unwrap() - mid).abs() < 1e-9);
        assert!((last.bb_lower.unwrap() - mid).abs() < 1e-9);
    }

    #[test]
    fn test_bollinger_uses_sample_std() {
        let prices = [1.0, 2.0, 3.0, 4.0];
        let bands = bollinger_series(&prices, 4, 2.0).unwrap();
        let b = bands[3].unwrap();
        let sample_std = (5.0f64 / 3.0).sqrt();
        assert!((b.middle - 2.5).abs() < 1e-12);
        assert!((b.upper - (2.5 + 2.0 * sample_std)).abs() < 1e-12);
        assert!((b.lower - (2.5 - 2.0 * sample_std)).abs() < 1e-12);
    }

    #[test]
    fn test_atr_constant_range() {
        let bars = make_bars(&[100.0; 20]);
        let atr = atr_series(&bars, 14, true).unwrap();
        assert!((atr[13].unwrap() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_true_range_ignores_split_gap_on_adjusted_prices() {
        // 2:1 split after bar 9: raw prices halve, adjusted history is continuous
        let mut bars = make_bars(&[100.0; 20]);
        for b in &mut bars[..10] {
            b.open = 200.0;
            b.high = 201.0;
            b.low = 199.0;
            b.close = 200.0;
        }

        let adjusted = true_range_series(&bars, true);
        assert!(adjusted.iter().all(|tr| *tr <= 2.0 + 1e-12));

        let raw = true_range_series(&bars, false);
        assert_eq!(raw[10], 101.0);
    }

    #[test]
    fn test_relative_volume_spike() {
        let mut bars = make_bars(&[100.0; 25]);
        bars[24].volume = 3000.0;
        let last = latest_snapshot("VOL", &bars, None, &defaults()).unwrap();
        let expected = 3000.0 / ((19.0 * 1000.0 + 3000.0) / 20.0);
        assert!((last.relative_volume.unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn test_relative_volume_zero_mean_unavailable() {
        let mut bars = make_bars(&[100.0; 25]);
        for b in &mut bars {
            b.volume = 0.0;
        }
        let last = latest_snapshot("ZERO", &bars, None, &defaults()).unwrap();
        assert_eq!(last.relative_volume, None);
    }

    #[test]
    fn test_rally_then_selloff_against_flat_benchmark() {
        let mut prices: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        prices.extend((1..=20).map(|i| 159.0 - 2.0 * i as f64));
        let bars = make_bars(&prices);
        let bench = make_bars(&vec![1000.0; prices.len()]);

        let snaps = compute_indicators("SWING", &bars, Some(&bench), &defaults()).unwrap();
        let last = snaps.last().unwrap();

        let roc_5 = last.roc_5.unwrap();
        assert!(roc_5 < -5.0);
        assert!((last.relative_strength_5.unwrap() - roc_5).abs() < 1e-9);
        assert!(last.relative_strength_10.unwrap() < 0.0);
        assert!(last.rsi.unwrap() < snaps[59].rsi.unwrap());
        assert!(last.rsi.unwrap() < 30.0);
    }

    #[test]
    fn test_relative_strength_aligned_by_date() {
        let prices: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&prices);

        // Benchmark is missing day 29 and has an extra leading day
        let mut bench = vec![PriceBar {
            date: day(0) - Duration::days(1),
            open: 50.0,
            high: 50.0,
            low: 50.0,
            close: 50.0,
            adjusted_close: 50.0,
            volume: 0.0,
        }];
        bench.extend(make_bars(&[50.0; 29]));

        let snaps = compute_indicators("ALIGN", &bars, Some(&bench), &defaults()).unwrap();
        assert_eq!(snaps[29].relative_strength_5, None);
        let rs = snaps[28].relative_strength_5.unwrap();
        assert!((rs - snaps[28].roc_5.unwrap()).abs() < 1e-9);
    }

    #[test]
    fn test_no_benchmark_leaves_rs_unavailable() {
        let bars = make_bars(&(0..30).map(|i| 100.0 + i as f64).collect::<Vec<_>>());
        let last = latest_snapshot("SOLO", &bars, None, &defaults()).unwrap();
        assert_eq!(last.relative_strengths(), [None, None, None]);
    }

    #[test]
    fn test_adjusted_close_selection() {
        let mut bars = make_bars(&[100.0; 10]);
        for b in &mut bars {
            b.adjusted_close = 50.0;
        }
        let adjusted = latest_snapshot("ADJ", &bars, None, &defaults()).unwrap();
        assert_eq!(adjusted.close, Some(50.0));

        let raw = IndicatorPeriods {
            use_adjusted_close: false,
            ..defaults()
        };
        let unadjusted = latest_snapshot("ADJ", &bars, None, &raw).unwrap();
        assert_eq!(unadjusted.close, Some(100.0));
    }

    #[test]
    fn test_invalid_series_rejected() {
        assert!(matches!(
            compute_indicators("EMPTY", &[], None, &defaults()),
            Err(EngineError::InvalidInput { .. })
        ));

        let mut bars = make_bars(&[10.0, 11.0, 12.0]);
        bars.swap(0, 1);
        assert!(compute_indicators("ORDER", &bars, None, &defaults()).is_err());

        let mut bars = make_bars(&[10.0, 11.0, 12.0]);
        bars[1].close = -1.0;
        assert!(compute_indicators("NEG", &bars, None, &defaults()).is_err());

        let mut bars = make_bars(&[10.0, 11.0, 12.0]);
        bars[2].date = bars[1].date;
        assert!(compute_indicators("DUP", &bars, None, &defaults()).is_err());
    }

    #[test]
    fn test_invalid_periods_surface_as_config_error() {
        let periods = IndicatorPeriods {
            rsi: 0,
            ..defaults()
        };
        let bars = make_bars(&[10.0; 5]);
        assert!(matches!(
            compute_indicators("CFG", &bars, None, &periods),
            Err(EngineError::Config(_))
        ));
    }
}
