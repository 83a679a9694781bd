//! Signal classifier
//!
//! Ordered rule evaluation over a scored snapshot; the first rule that fires
//! wins. Each branch explains itself in the rationale string, which is shown
//! to users as-is. An unavailable input never satisfies a condition.

use std::collections::HashMap;

use serde::Serialize;

use crate::config::{ScoreWeights, SignalThresholds};
use crate::momentum::score_stock;
use crate::types::{IndicatorSnapshot, ScoredSnapshot, ScoredStock, SignalType, StockSnapshot};

pub const UNKNOWN_SECTOR: &str = "Others";

/// Result of classifying one snapshot
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub signal: SignalType,
    pub rationale: String,
}

impl Classification {
    fn new(signal: SignalType, parts: Vec<String>) -> Self {
        Self {
            signal,
            rationale: parts.join("; "),
        }
    }
}

fn all_horizons_positive(s: &IndicatorSnapshot) -> bool {
    s.positive_horizons() == 3
}

fn all_horizons_negative(s: &IndicatorSnapshot) -> bool {
    s.negative_horizons() == 3
}

fn above_sma_20(s: &IndicatorSnapshot) -> Option<bool> {
    match (s.close, s.sma_20) {
        (Some(close), Some(sma)) => Some(close > sma),
        _ => None,
    }
}

/// Classify a scored snapshot into exactly one signal
pub fn classify_signal(scored: &ScoredSnapshot, t: &SignalThresholds) -> Classification {
    let s = &scored.snapshot;
    let score = scored.momentum_score;
    let rel_vol = s.relative_volume;
    let positive = s.positive_horizons();

    let volume_at_least = |floor: f64| matches!(rel_vol, Some(v) if v >= floor);

    // Strong buy
    if score >= t.strong_buy_min
        && all_horizons_positive(s)
        && volume_at_least(t.volume_confirmation)
        && above_sma_20(s) == Some(true)
        && matches!(s.rsi, Some(r) if (50.0..=65.0).contains(&r))
    {
        return Classification::new(
            SignalType::StrongBuy,
            vec![
                format!("Momentum score {score:.1} in top tier"),
                "Outperforming benchmark across all timeframes".to_string(),
                format!(
                    "Strong volume confirmation ({:.2}x)",
                    rel_vol.unwrap_or_default()
                ),
                "Price above 20-day SMA (uptrend)".to_string(),
                format!("RSI {:.1} in optimal zone", s.rsi.unwrap_or_default()),
            ],
        );
    }

    // Buy
    if score >= t.buy_min && positive >= 2 && volume_at_least(t.volume_buy) {
        let breadth = if positive == 3 {
            "Consistent market outperformance"
        } else {
            "Outperforming benchmark in 2+ timeframes"
        };
        return Classification::new(
            SignalType::Buy,
            vec![
                format!("Momentum score {score:.1} shows strength"),
                breadth.to_string(),
                format!("Volume {:.2}x average", rel_vol.unwrap_or_default()),
            ],
        );
    }

    if let Some(rsi) = s.rsi {
        if rsi > t.overbought_rsi {
            return Classification::new(
                SignalType::Sell,
                vec![format!(
                    "RSI {rsi:.1} indicates overbought conditions - risk of reversal"
                )],
            );
        }
        if rsi < t.oversold_rsi {
            return Classification::new(
                SignalType::Avoid,
                vec![format!(
                    "RSI {rsi:.1} indicates oversold - may continue falling or bounce"
                )],
            );
        }
    }

    if score < t.hold_min {
        let mut parts = vec![format!("Momentum score {score:.1} below threshold")];
        if all_horizons_negative(s) {
            parts.push("Underperforming benchmark across all timeframes".to_string());
            return Classification::new(SignalType::Avoid, parts);
        }
        return Classification::new(SignalType::Sell, parts);
    }

    let mut parts = vec![format!("Momentum score {score:.1} in neutral range")];
    match above_sma_20(s) {
        Some(true) => parts.push("Price above 20-day SMA".to_string()),
        Some(false) => parts.push("Price below 20-day SMA".to_string()),
        None => {}
    }
    parts.push(format!(
        "Outperforming benchmark in {positive}/3 timeframes"
    ));
    Classification::new(SignalType::Hold, parts)
}

// ============================================================================
// Universe-wide signals
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StockSignal {
    #[serde(flatten)]
    pub stock: ScoredStock,
    pub signal_type: SignalType,
    pub rationale: String,
}

impl StockSignal {
    pub fn symbol(&self) -> &str {
        &self.stock.info.symbol
    }

    pub fn score(&self) -> f64 {
        self.stock.score()
    }

    pub fn sector(&self) -> &str {
        self.stock.info.sector.as_deref().unwrap_or(UNKNOWN_SECTOR)
    }
}

pub fn signal_for(stock: &ScoredStock, thresholds: &SignalThresholds) -> StockSignal {
    let Classification { signal, rationale } = classify_signal(&stock.scored, thresholds);
    StockSignal {
        stock: stock.clone(),
        signal_type: signal,
        rationale,
    }
}

/// Score and classify every stock, highest score first (ties keep input order)
pub fn generate_signals(
    stocks: &[StockSnapshot],
    weights: &ScoreWeights,
    thresholds: &SignalThresholds,
) -> Vec<StockSignal> {
    let mut signals: Vec<StockSignal> = stocks
        .iter()
        .map(|s| signal_for(&score_stock(s, weights), thresholds))
        .collect();
    signals.sort_by(|a, b| b.score().total_cmp(&a.score()));
    signals
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SignalSummary {
    pub strong_buy: usize,
    pub buy: usize,
    pub hold: usize,
    pub sell: usize,
    pub avoid: usize,
}

impl SignalSummary {
    pub fn count(&self, signal: SignalType) -> usize {
        match signal {
            SignalType::StrongBuy => self.strong_buy,
            SignalType::Buy => self.buy,
            SignalType::Hold => self.hold,
            SignalType::Sell => self.sell,
            SignalType::Avoid => self.avoid,
        }
    }

    pub fn total(&self) -> usize {
        SignalType::all().iter().map(|s| self.count(*s)).sum()
    }
}

pub fn signal_summary(signals: &[StockSignal]) -> SignalSummary {
    let mut summary = SignalSummary::default();
    for s in signals {
        match s.signal_type {
            SignalType::StrongBuy => summary.strong_buy += 1,
            SignalType::Buy => summary.buy += 1,
            SignalType::Hold => summary.hold += 1,
            SignalType::Sell => summary.sell += 1,
            SignalType::Avoid => summary.avoid += 1,
        }
    }
    summary
}

pub fn filter_by_types<'a>(signals: &'a [StockSignal], types: &[SignalType]) -> Vec<&'a StockSignal> {
    signals
        .iter()
        .filter(|s| types.contains(&s.signal_type))
        .collect()
}

/// First `n` signals, optionally restricted to the given types
pub fn top_signals<'a>(
    signals: &'a [StockSignal],
    n: usize,
    types: Option<&[SignalType]>,
) -> Vec<&'a StockSignal> {
    match types {
        Some(types) if !types.is_empty() => {
            filter_by_types(signals, types).into_iter().take(n).collect()
        }
        _ => signals.iter().take(n).collect(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorStats {
    pub sector: String,
    pub count: usize,
    pub buy_signals: usize,
    pub sell_signals: usize,
    pub avg_score: f64,
}

/// Per-sector signal counts, best average score first
pub fn sector_analysis(signals: &[StockSignal]) -> Vec<SectorStats> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, (SectorStats, f64)> = HashMap::new();

    for s in signals {
        let sector = s.sector().to_string();
        let entry = totals.entry(sector.clone()).or_insert_with(|| {
            order.push(sector.clone());
            (
                SectorStats {
                    sector,
                    count: 0,
                    buy_signals: 0,
                    sell_signals: 0,
                    avg_score: 0.0,
                },
                0.0,
            )
        });
        entry.0.count += 1;
        entry.1 += s.score();
        if s.signal_type.is_bullish() {
            entry.0.buy_signals += 1;
        } else if s.signal_type.is_bearish() {
            entry.0.sell_signals += 1;
        }
    }

    let mut stats: Vec<SectorStats> = order
        .into_iter()
        .filter_map(|sector| totals.remove(&sector))
        .map(|(mut stats, total)| {
            stats.avg_score = (total / stats.count as f64 * 100.0).round() / 100.0;
            stats
        })
        .collect();
    stats.sort_by(|a, b| b.avg_score.total_cmp(&a.avg_score));
    stats
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketBreadth {
    pub total_stocks: usize,
    pub advancing: usize,
    pub declining: usize,
    pub ad_ratio: f64,
    pub pct_above_70: f64,
    pub pct_above_50: f64,
    pub pct_below_40: f64,
    pub avg_momentum_score: f64,
}

/// Advance/decline on 5-day ROC plus score distribution; `None` for no signals
pub fn market_breadth(signals: &[StockSignal]) -> Option<MarketBreadth> {
    if signals.is_empty() {
        return None;
    }

    let total = signals.len();
    let advancing = signals
        .iter()
        .filter(|s| matches!(s.stock.snapshot().roc_5, Some(r) if r > 0.0))
        .count();
    let declining = total - advancing;

    let pct = |pred: &dyn Fn(f64) -> bool| {
        let n = signals.iter().filter(|s| pred(s.score())).count();
        (n as f64 / total as f64 * 1000.0).round() / 10.0
    };
    let avg = signals.iter().map(|s| s.score()).sum::<f64>() / total as f64;

    Some(MarketBreadth {
        total_stocks: total,
        advancing,
        declining,
        ad_ratio: (advancing as f64 / declining.max(1) as f64 * 100.0).round() / 100.0,
        pct_above_70: pct(&|s| s >= 70.0),
        pct_above_50: pct(&|s| s >= 50.0),
        pct_below_40: pct(&|s| s < 40.0),
        avg_momentum_score: (avg * 100.0).round() / 100.0,
    })
}
