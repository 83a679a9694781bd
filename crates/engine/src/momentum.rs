//! Momentum scorer
//!
//! Maps an indicator snapshot to a 0-100 composite score: seven independent
//! sub-scores, each clamped to [0, 100], combined with the configured weights.
//! An unavailable input always scores a neutral 50.

use serde::Serialize;

use crate::config::ScoreWeights;
use crate::types::{IndicatorSnapshot, ScoredSnapshot, ScoredStock, StockSnapshot};

pub const NEUTRAL_SCORE: f64 = 50.0;

/// ROC that maps to the ends of the 0-100 range
const ROC_FULL_SCALE: f64 = 20.0;

// ============================================================================
// Sub-scores
// ============================================================================

/// ±20% ROC spans the full range
pub fn score_roc(roc: Option<f64>) -> f64 {
    match roc {
        Some(x) => (NEUTRAL_SCORE + x / ROC_FULL_SCALE * 50.0).clamp(0.0, 100.0),
        None => NEUTRAL_SCORE,
    }
}

/// Piecewise linear in relative volume with breakpoints 0.7 / 1.0 / 1.2 / 1.5
pub fn score_volume(relative_volume: Option<f64>) -> f64 {
    let Some(rv) = relative_volume else {
        return NEUTRAL_SCORE;
    };
    let score = if rv >= 1.5 {
        85.0 + ((rv - 1.5) * 10.0).min(15.0)
    } else if rv >= 1.2 {
        70.0 + (rv - 1.2) / 0.3 * 15.0
    } else if rv >= 1.0 {
        50.0 + (rv - 1.0) / 0.2 * 20.0
    } else if rv >= 0.7 {
        30.0 + (rv - 0.7) / 0.3 * 20.0
    } else {
        (rv / 0.7 * 30.0).max(0.0)
    };
    score.clamp(0.0, 100.0)
}

/// Peaks at RSI 57.5 inside the 50-65 band
pub fn score_rsi(rsi: Option<f64>) -> f64 {
    let Some(rsi) = rsi else {
        return NEUTRAL_SCORE;
    };
    let score = if (50.0..=65.0).contains(&rsi) {
        90.0 + (1.0 - (rsi - 57.5).abs() / 7.5) * 10.0
    } else if (40.0..50.0).contains(&rsi) {
        75.0 + (rsi - 40.0) / 10.0 * 15.0
    } else if rsi > 65.0 && rsi <= 75.0 {
        60.0 + (75.0 - rsi) / 10.0 * 15.0
    } else if (30.0..40.0).contains(&rsi) {
        50.0 + (rsi - 30.0) / 10.0 * 25.0
    } else if rsi > 75.0 {
        (60.0 - (rsi - 75.0) * 2.0).max(20.0)
    } else {
        (50.0 - (30.0 - rsi) * 2.0).max(30.0)
    };
    score.clamp(0.0, 100.0)
}

/// Positive horizon count plus a capped magnitude bonus.
///
/// Needs all three horizons; any missing horizon scores neutral.
pub fn score_relative_strength(rs: [Option<f64>; 3]) -> f64 {
    let [Some(rs_5), Some(rs_10), Some(rs_20)] = rs else {
        return NEUTRAL_SCORE;
    };
    let values = [rs_5, rs_10, rs_20];
    let positive = values.iter().filter(|v| **v > 0.0).count() as f64;
    let mean = values.iter().sum::<f64>() / 3.0;
    let bonus = (mean * 5.0).clamp(-25.0, 25.0);
    (positive * 25.0 + bonus + 25.0).clamp(0.0, 100.0)
}

/// Price position against SMA 20 / SMA 50 with a cross adjustment
pub fn score_moving_average(close: Option<f64>, sma_20: Option<f64>, sma_50: Option<f64>) -> f64 {
    let (Some(close), Some(sma_20)) = (close, sma_20) else {
        return NEUTRAL_SCORE;
    };
    if close <= 0.0 || sma_20 <= 0.0 {
        return NEUTRAL_SCORE;
    }

    let pct_from_20 = (close - sma_20) / sma_20 * 100.0;

    let sma_50 = match sma_50 {
        Some(v) if v > 0.0 => v,
        _ => {
            let score = if close > sma_20 {
                (70.0 + pct_from_20 * 2.0).min(90.0)
            } else {
                (50.0 + pct_from_20 * 2.0).max(20.0)
            };
            return score.clamp(0.0, 100.0);
        }
    };

    let above_20 = close > sma_20;
    let above_50 = close > sma_50;

    let mut score = match (above_20, above_50) {
        (true, true) => 80.0 + (pct_from_20 * 1.5).min(15.0),
        (true, false) => 65.0 + (pct_from_20 * 1.5).min(10.0),
        (false, true) => 45.0 - (-pct_from_20).min(10.0),
        (false, false) => {
            let pct_below_50 = (sma_50 - close) / sma_50 * 100.0;
            30.0 - pct_below_50.min(15.0)
        }
    };

    score += if sma_20 > sma_50 { 5.0 } else { -5.0 };
    score.clamp(0.0, 100.0)
}

// ============================================================================
// Composite score
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct SubScores {
    roc_5: f64,
    roc_10: f64,
    roc_20: f64,
    relative_strength: f64,
    volume: f64,
    rsi: f64,
    moving_average: f64,
}

impl SubScores {
    fn of(s: &IndicatorSnapshot) -> Self {
        Self {
            roc_5: score_roc(s.roc_5),
            roc_10: score_roc(s.roc_10),
            roc_20: score_roc(s.roc_20),
            relative_strength: score_relative_strength(s.relative_strengths()),
            volume: score_volume(s.relative_volume),
            rsi: score_rsi(s.rsi),
            moving_average: score_moving_average(s.close, s.sma_20, s.sma_50),
        }
    }

    fn weighted(&self, w: &ScoreWeights) -> f64 {
        self.roc_5 * w.roc_5
            + self.roc_10 * w.roc_10
            + self.roc_20 * w.roc_20
            + self.relative_strength * w.relative_strength
            + self.volume * w.volume
            + self.rsi * w.rsi
            + self.moving_average * w.moving_average
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Composite momentum score in [0, 100], rounded to 2 decimals.
///
/// `weights` are expected to have passed [`ScoreWeights::validate`].
pub fn score_momentum(snapshot: &IndicatorSnapshot, weights: &ScoreWeights) -> f64 {
    round2(SubScores::of(snapshot).weighted(weights)).clamp(0.0, 100.0)
}

pub fn score_snapshot(snapshot: &IndicatorSnapshot, weights: &ScoreWeights) -> ScoredSnapshot {
    ScoredSnapshot {
        momentum_score: score_momentum(snapshot, weights),
        snapshot: snapshot.clone(),
    }
}

pub fn score_stock(stock: &StockSnapshot, weights: &ScoreWeights) -> ScoredStock {
    ScoredStock {
        info: stock.info.clone(),
        scored: score_snapshot(&stock.snapshot, weights),
    }
}

/// One line of a score breakdown
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreComponent {
    pub name: &'static str,
    /// Human-readable input value(s); "n/a" when unavailable
    pub value: String,
    pub score: f64,
    pub weight: f64,
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreBreakdown {
    pub components: Vec<ScoreComponent>,
    pub total_score: f64,
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "n/a".to_string())
}

/// Explain how a snapshot's score was assembled
pub fn score_breakdown(snapshot: &IndicatorSnapshot, weights: &ScoreWeights) -> ScoreBreakdown {
    let sub = SubScores::of(snapshot);
    let s = snapshot;

    let rows = [
        ("roc_5", fmt_opt(s.roc_5), sub.roc_5, weights.roc_5),
        ("roc_10", fmt_opt(s.roc_10), sub.roc_10, weights.roc_10),
        ("roc_20", fmt_opt(s.roc_20), sub.roc_20, weights.roc_20),
        (
            "relative_strength",
            format!(
                "{} / {} / {}",
                fmt_opt(s.relative_strength_5),
                fmt_opt(s.relative_strength_10),
                fmt_opt(s.relative_strength_20)
            ),
            sub.relative_strength,
            weights.relative_strength,
        ),
        (
            "volume",
            fmt_opt(s.relative_volume),
            sub.volume,
            weights.volume,
        ),
        ("rsi", fmt_opt(s.rsi), sub.rsi, weights.rsi),
        (
            "moving_average",
            format!(
                "Close: {} | SMA20: {} | SMA50: {}",
                fmt_opt(s.close),
                fmt_opt(s.sma_20),
                fmt_opt(s.sma_50)
            ),
            sub.moving_average,
            weights.moving_average,
        ),
    ];

    ScoreBreakdown {
        components: rows
            .into_iter()
            .map(|(name, value, score, weight)| ScoreComponent {
                name,
                value,
                score: round2(score),
                weight,
                contribution: round2(score * weight),
            })
            .collect(),
        total_score: score_momentum(snapshot, weights),
    }
}

// ============================================================================
// Ranking
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedStock {
    /// 1-based position, highest score first
    pub rank: usize,
    #[serde(flatten)]
    pub stock: ScoredStock,
}

/// Score every stock and sort by score descending; equal scores keep input order
pub fn rank_by_momentum(stocks: &[StockSnapshot], weights: &ScoreWeights) -> Vec<RankedStock> {
    let mut scored: Vec<ScoredStock> = stocks.iter().map(|s| score_stock(s, weights)).collect();
    scored.sort_by(|a, b| b.score().total_cmp(&a.score()));
    scored
        .into_iter()
        .enumerate()
        .map(|(i, stock)| RankedStock { rank: i + 1, stock })
        .collect()
}
