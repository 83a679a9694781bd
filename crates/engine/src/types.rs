//! Types for the analysis engine

use std::cmp::Ordering;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single daily bar (OHLCV)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adjusted_close: f64,
    pub volume: f64,
}

/// Static description of a tracked stock
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
}

impl StockInfo {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: None,
            sector: None,
        }
    }
}

/// Indicator values for one symbol as of one date.
///
/// Every field is `None` until enough history exists for its lookback window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub date: Option<NaiveDate>,
    /// Price the indicators were computed on (adjusted close by default)
    pub close: Option<f64>,
    pub rsi: Option<f64>,
    pub roc_5: Option<f64>,
    pub roc_10: Option<f64>,
    pub roc_20: Option<f64>,
    pub atr: Option<f64>,
    pub sma_20: Option<f64>,
    pub sma_50: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub bb_upper: Option<f64>,
    pub bb_middle: Option<f64>,
    pub bb_lower: Option<f64>,
    pub relative_volume: Option<f64>,
    pub relative_strength_5: Option<f64>,
    pub relative_strength_10: Option<f64>,
    pub relative_strength_20: Option<f64>,
}

impl IndicatorSnapshot {
    /// The three relative-strength horizons, shortest first
    pub fn relative_strengths(&self) -> [Option<f64>; 3] {
        [
            self.relative_strength_5,
            self.relative_strength_10,
            self.relative_strength_20,
        ]
    }

    /// Number of relative-strength horizons that are strictly positive
    pub fn positive_horizons(&self) -> usize {
        self.relative_strengths()
            .iter()
            .filter(|rs| matches!(rs, Some(v) if *v > 0.0))
            .count()
    }

    /// Number of relative-strength horizons that are strictly negative
    pub fn negative_horizons(&self) -> usize {
        self.relative_strengths()
            .iter()
            .filter(|rs| matches!(rs, Some(v) if *v < 0.0))
            .count()
    }
}

/// A snapshot together with its composite momentum score (0-100)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredSnapshot {
    #[serde(flatten)]
    pub snapshot: IndicatorSnapshot,
    pub momentum_score: f64,
}

/// Latest indicator snapshot for one stock in the universe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockSnapshot {
    #[serde(flatten)]
    pub info: StockInfo,
    #[serde(flatten)]
    pub snapshot: IndicatorSnapshot,
}

/// A stock with its scored snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredStock {
    #[serde(flatten)]
    pub info: StockInfo,
    #[serde(flatten)]
    pub scored: ScoredSnapshot,
}

impl ScoredStock {
    pub fn snapshot(&self) -> &IndicatorSnapshot {
        &self.scored.snapshot
    }

    pub fn score(&self) -> f64 {
        self.scored.momentum_score
    }
}

/// Discrete recommendation state.
///
/// Ordered by bullishness: StrongBuy > Buy > Hold > Sell, Hold > Avoid.
/// Sell and Avoid are separate severity tiers and do not compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    StrongBuy,
    Buy,
    Hold,
    Sell,
    Avoid,
}

impl SignalType {
    pub fn all() -> &'static [SignalType] {
        &[
            Self::StrongBuy,
            Self::Buy,
            Self::Hold,
            Self::Sell,
            Self::Avoid,
        ]
    }

    pub fn is_bullish(&self) -> bool {
        matches!(self, Self::StrongBuy | Self::Buy)
    }

    pub fn is_bearish(&self) -> bool {
        matches!(self, Self::Sell | Self::Avoid)
    }

    /// Parse either the snake_case key (`strong_buy`) or the display label (`Strong Buy`)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace(' ', "_").as_str() {
            "strong_buy" => Some(Self::StrongBuy),
            "buy" => Some(Self::Buy),
            "hold" => Some(Self::Hold),
            "sell" => Some(Self::Sell),
            "avoid" => Some(Self::Avoid),
            _ => None,
        }
    }

    fn tier(&self) -> u8 {
        match self {
            Self::StrongBuy => 3,
            Self::Buy => 2,
            Self::Hold => 1,
            Self::Sell | Self::Avoid => 0,
        }
    }
}

impl PartialOrd for SignalType {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        match self.tier().cmp(&other.tier()) {
            Ordering::Equal => None,
            ord => Some(ord),
        }
    }
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalType::StrongBuy => write!(f, "Strong Buy"),
            SignalType::Buy => write!(f, "Buy"),
            SignalType::Hold => write!(f, "Hold"),
            SignalType::Sell => write!(f, "Sell"),
            SignalType::Avoid => write!(f, "Avoid"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_bullishness_order() {
        assert!(SignalType::StrongBuy > SignalType::Buy);
        assert!(SignalType::Buy > SignalType::Hold);
        assert!(SignalType::Hold > SignalType::Sell);
        assert!(SignalType::Hold > SignalType::Avoid);
        assert_eq!(SignalType::Sell.partial_cmp(&SignalType::Avoid), None);
        assert_eq!(
            SignalType::Avoid.partial_cmp(&SignalType::Avoid),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn test_signal_parse_accepts_key_and_label() {
        assert_eq!(SignalType::parse("strong_buy"), Some(SignalType::StrongBuy));
        assert_eq!(SignalType::parse("Strong Buy"), Some(SignalType::StrongBuy));
        assert_eq!(SignalType::parse("AVOID"), Some(SignalType::Avoid));
        assert_eq!(SignalType::parse("maybe"), None);
        for s in SignalType::all() {
            assert_eq!(SignalType::parse(&s.to_string()), Some(*s));
        }
    }

    #[test]
    fn test_horizon_counts_ignore_missing() {
        let snap = IndicatorSnapshot {
            relative_strength_5: Some(1.0),
            relative_strength_10: None,
            relative_strength_20: Some(-2.0),
            ..Default::default()
        };
        assert_eq!(snap.positive_horizons(), 1);
        assert_eq!(snap.negative_horizons(), 1);
    }

    #[test]
    fn test_scored_snapshot_flattens() {
        let scored = ScoredSnapshot {
            snapshot: IndicatorSnapshot {
                rsi: Some(55.0),
                ..Default::default()
            },
            momentum_score: 72.5,
        };
        let json = serde_json::to_value(&scored).unwrap();
        assert_eq!(json["rsi"], 55.0);
        assert_eq!(json["momentum_score"], 72.5);
    }
}
