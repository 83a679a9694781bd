//! Price forecasting
//!
//! Monte Carlo geometric random walk over daily log returns, plus a linear
//! trend baseline and a historical volatility profile. Paths are simulated in
//! parallel with rayon; each path draws from its own `StdRng` seeded from a
//! master generator, so a fixed seed gives bit-identical output no matter how
//! the work is scheduled.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{ForecastSettings, MAX_FORECAST_DAYS};
use crate::error::ForecastError;
use crate::types::PriceBar;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const VAR_CONFIDENCE_TAIL: f64 = 0.05;
const TREND_WINDOW: usize = 30;
const TREND_MIN_BARS: usize = 10;
const VOLATILITY_MIN_BARS: usize = 20;
const ROLLING_VOL_WINDOW: usize = 10;
const ROLLING_VOL_POINTS: usize = 20;

// ============================================================================
// Result types
// ============================================================================

/// Cross-path statistics for one forecast day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastDay {
    pub day: usize,
    pub date: NaiveDate,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// Keyed `p10`, `p25`, ... for each requested percentile
    #[serde(flatten)]
    pub percentiles: BTreeMap<String, f64>,
}

/// Risk metrics on the terminal day
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastMetrics {
    pub expected_return: f64,
    pub prob_profit: f64,
    pub prob_loss_10pct: f64,
    pub prob_gain_10pct: f64,
    /// Value at risk at 95% confidence, in price units
    pub var_95: f64,
    pub var_95_pct: f64,
    pub target_low: f64,
    pub target_mid: f64,
    pub target_high: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastResult {
    pub current_price: f64,
    pub last_date: NaiveDate,
    pub forecast_days: usize,
    pub num_simulations: usize,
    /// Daily σ of log returns, in percent
    pub daily_volatility: f64,
    pub annual_volatility: f64,
    pub daily_drift: f64,
    pub metrics: ForecastMetrics,
    pub forecast: Vec<ForecastDay>,
    pub sample_paths: Vec<Vec<f64>>,
}

// ============================================================================
// Statistics helpers
// ============================================================================

fn round_to(x: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (x * factor).round() / factor
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation
fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Linear interpolation between order statistics; `sorted` must be ascending
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}

pub fn percentile_label(q: f64) -> String {
    format!("p{}", (q * 100.0).round() as i64)
}

fn log_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| (w[1] / w[0]).ln()).collect()
}

fn check_history(bars: &[PriceBar], required: usize) -> Result<Vec<f64>, ForecastError> {
    if bars.len() < required {
        return Err(ForecastError::InsufficientData {
            required,
            actual: bars.len(),
        });
    }
    if bars.windows(2).any(|w| w[0].date >= w[1].date) {
        return Err(ForecastError::DegenerateInput(
            "price history must be strictly ascending by date".into(),
        ));
    }
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    if let Some(bad) = closes.iter().find(|p| !(p.is_finite() && **p > 0.0)) {
        return Err(ForecastError::DegenerateInput(format!(
            "close price {bad} cannot be log-transformed"
        )));
    }
    Ok(closes)
}

// ============================================================================
// Monte Carlo forecast
// ============================================================================

/// Simulate `settings.num_simulations` random-walk paths over
/// `settings.days_forward` days from the last close.
pub fn forecast_prices(
    bars: &[PriceBar],
    settings: &ForecastSettings,
) -> Result<ForecastResult, ForecastError> {
    settings
        .validate()
        .map_err(|e| ForecastError::InvalidParameters(e.to_string()))?;
    let closes = check_history(bars, settings.min_history)?;

    let days = settings.days_forward;
    let n = settings.num_simulations;
    let current = closes[closes.len() - 1];
    let last_date = bars[bars.len() - 1].date;

    let returns = log_returns(&closes);
    let mu = mean(&returns);
    let sigma = std_dev(&returns);
    let normal = Normal::new(mu, sigma).map_err(|e| {
        ForecastError::DegenerateInput(format!("return distribution (μ={mu}, σ={sigma}): {e}"))
    })?;

    info!(
        bars = bars.len(),
        days = days,
        simulations = n,
        seed = settings.seed,
        "Running Monte Carlo forecast"
    );

    let mut master = StdRng::seed_from_u64(settings.seed);
    let path_seeds: Vec<u64> = (0..n).map(|_| master.gen()).collect();

    let paths: Vec<Vec<f64>> = path_seeds
        .par_iter()
        .map(|&seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut path = Vec::with_capacity(days + 1);
            let mut price = current;
            path.push(price);
            for _ in 0..days {
                price *= normal.sample(&mut rng).exp();
                path.push(price);
            }
            path
        })
        .collect();

    let forecast: Vec<ForecastDay> = (0..=days)
        .map(|t| {
            let mut column: Vec<f64> = paths.iter().map(|p| p[t]).collect();
            column.sort_by(f64::total_cmp);
            ForecastDay {
                day: t,
                date: last_date + Duration::days(t as i64),
                mean: mean(&column),
                median: percentile(&column, 0.5),
                std: std_dev(&column),
                min: column[0],
                max: column[column.len() - 1],
                percentiles: settings
                    .percentiles
                    .iter()
                    .map(|q| (percentile_label(*q), percentile(&column, *q)))
                    .collect(),
            }
        })
        .collect();

    let mut finals: Vec<f64> = paths.iter().map(|p| p[days]).collect();
    finals.sort_by(f64::total_cmp);
    let share = |pred: &dyn Fn(f64) -> bool| {
        round_to(
            finals.iter().filter(|p| pred(**p)).count() as f64 / n as f64 * 100.0,
            1,
        )
    };
    let var_95 = current - percentile(&finals, VAR_CONFIDENCE_TAIL);

    let metrics = ForecastMetrics {
        expected_return: round_to((mean(&finals) - current) / current * 100.0, 2),
        prob_profit: share(&|p| p > current),
        prob_loss_10pct: share(&|p| p < current * 0.9),
        prob_gain_10pct: share(&|p| p > current * 1.1),
        var_95: round_to(var_95, 2),
        var_95_pct: round_to(var_95 / current * 100.0, 2),
        target_low: round_to(percentile(&finals, 0.10), 2),
        target_mid: round_to(percentile(&finals, 0.50), 2),
        target_high: round_to(percentile(&finals, 0.90), 2),
    };

    let keep = settings.sample_paths.min(n);
    let sample_paths = rand::seq::index::sample(&mut master, n, keep)
        .into_vec()
        .into_iter()
        .map(|i| paths[i].clone())
        .collect();

    debug!(
        expected_return = metrics.expected_return,
        var_95 = metrics.var_95,
        "Forecast complete"
    );

    Ok(ForecastResult {
        current_price: current,
        last_date,
        forecast_days: days,
        num_simulations: n,
        daily_volatility: sigma * 100.0,
        annual_volatility: sigma * TRADING_DAYS_PER_YEAR.sqrt() * 100.0,
        daily_drift: mu * 100.0,
        metrics,
        forecast,
        sample_paths,
    })
}

// ============================================================================
// Linear trend baseline
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    Uptrend,
    Downtrend,
    Sideways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub day: usize,
    pub date: NaiveDate,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendForecast {
    pub trend: TrendDirection,
    pub slope: f64,
    pub daily_change_pct: f64,
    pub r_squared: f64,
    pub confidence: ConfidenceTier,
    pub projections: Vec<TrendPoint>,
}

/// Least-squares line through the last 30 closes, projected `days` ahead.
///
/// Day `t` is the fitted value `t + 1` steps past the last bar.
pub fn trend_forecast(bars: &[PriceBar], days: usize) -> Result<TrendForecast, ForecastError> {
    if days > MAX_FORECAST_DAYS {
        return Err(ForecastError::InvalidParameters(format!(
            "trend horizon {days} exceeds {MAX_FORECAST_DAYS} days"
        )));
    }
    let closes = check_history(bars, TREND_MIN_BARS)?;
    let y = &closes[closes.len().saturating_sub(TREND_WINDOW)..];
    let n = y.len() as f64;

    let sum_x: f64 = (0..y.len()).map(|i| i as f64).sum();
    let sum_x2: f64 = (0..y.len()).map(|i| (i as f64).powi(2)).sum();
    let sum_y: f64 = y.iter().sum();
    let sum_xy: f64 = y.iter().enumerate().map(|(i, v)| i as f64 * v).sum();

    let slope = (n * sum_xy - sum_x * sum_y) / (n * sum_x2 - sum_x * sum_x);
    let intercept = (sum_y - slope * sum_x) / n;

    let y_mean = sum_y / n;
    let ss_res: f64 = y
        .iter()
        .enumerate()
        .map(|(i, v)| (v - (slope * i as f64 + intercept)).powi(2))
        .sum();
    let ss_tot: f64 = y.iter().map(|v| (v - y_mean).powi(2)).sum();
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };

    let last_x = (y.len() - 1) as f64;
    let last_date = bars[bars.len() - 1].date;
    let projections = (0..=days)
        .map(|t| TrendPoint {
            day: t,
            date: last_date + Duration::days(t as i64),
            price: round_to((slope * (last_x + t as f64 + 1.0) + intercept).max(0.0), 2),
        })
        .collect();

    let trend = if slope > 0.0 {
        TrendDirection::Uptrend
    } else if slope < 0.0 {
        TrendDirection::Downtrend
    } else {
        TrendDirection::Sideways
    };
    let confidence = if r_squared > 0.8 {
        ConfidenceTier::High
    } else if r_squared > 0.5 {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::Low
    };

    Ok(TrendForecast {
        trend,
        slope: round_to(slope, 4),
        daily_change_pct: round_to(slope / y[y.len() - 1] * 100.0, 2),
        r_squared: round_to(r_squared, 3),
        confidence,
        projections,
    })
}

// ============================================================================
// Volatility profile
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VolatilityRegime {
    High,
    Normal,
    Low,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityPoint {
    pub date: NaiveDate,
    pub volatility: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolatilityAnalysis {
    /// Annualised, last 10 sessions
    pub current_volatility: f64,
    pub average_volatility: f64,
    pub volatility_regime: VolatilityRegime,
    pub max_daily_gain: f64,
    pub max_daily_loss: f64,
    pub positive_days_pct: f64,
    pub rolling_volatility: Vec<VolatilityPoint>,
}

/// Annualised volatility of daily percent log returns
pub fn volatility_analysis(bars: &[PriceBar]) -> Result<VolatilityAnalysis, ForecastError> {
    let closes = check_history(bars, VOLATILITY_MIN_BARS)?;
    let returns: Vec<f64> = log_returns(&closes).into_iter().map(|r| r * 100.0).collect();
    let annualise = TRADING_DAYS_PER_YEAR.sqrt();

    let mut rolling: Vec<VolatilityPoint> = (ROLLING_VOL_WINDOW..=returns.len())
        .map(|i| VolatilityPoint {
            date: bars[i].date,
            volatility: round_to(
                std_dev(&returns[i - ROLLING_VOL_WINDOW..i]) * annualise,
                2,
            ),
        })
        .collect();
    if rolling.len() > ROLLING_VOL_POINTS {
        rolling.drain(..rolling.len() - ROLLING_VOL_POINTS);
    }

    let current = std_dev(&returns[returns.len() - ROLLING_VOL_WINDOW..]) * annualise;
    let average = std_dev(&returns) * annualise;
    let regime = if current > average * 1.2 {
        VolatilityRegime::High
    } else if current < average * 0.8 {
        VolatilityRegime::Low
    } else {
        VolatilityRegime::Normal
    };

    let max_gain = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let max_loss = returns.iter().copied().fold(f64::INFINITY, f64::min);
    let positive = returns.iter().filter(|r| **r > 0.0).count();

    Ok(VolatilityAnalysis {
        current_volatility: round_to(current, 2),
        average_volatility: round_to(average, 2),
        volatility_regime: regime,
        max_daily_gain: round_to(max_gain, 2),
        max_daily_loss: round_to(max_loss, 2),
        positive_days_pct: round_to(positive as f64 / returns.len() as f64 * 100.0, 1),
        rolling_volatility: rolling,
    })
}
