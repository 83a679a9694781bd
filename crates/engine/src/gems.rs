//! Gem detector: oversold names showing signs of a reversal
//!
//! Only candidates with RSI at or below 40 are considered. Each one collects
//! additive points from independent signals and a separate risk score.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::Serialize;

use crate::signals::UNKNOWN_SECTOR;
use crate::types::ScoredStock;

pub const MAX_GEM_RSI: f64 = 40.0;
pub const MIN_GEM_SCORE: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GemType {
    DeepValue,
    OversoldBounce,
    PullbackBuy,
    VolumeSpike,
}

impl fmt::Display for GemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GemType::DeepValue => write!(f, "Deep Value"),
            GemType::OversoldBounce => write!(f, "Oversold Bounce"),
            GemType::PullbackBuy => write!(f, "Pullback Buy"),
            GemType::VolumeSpike => write!(f, "Volume Spike"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Gem {
    #[serde(flatten)]
    pub stock: ScoredStock,
    pub gem_type: GemType,
    pub gem_score: u32,
    pub risk_level: RiskLevel,
    pub reasons: Vec<String>,
}

impl Gem {
    pub fn sector(&self) -> &str {
        self.stock.info.sector.as_deref().unwrap_or(UNKNOWN_SECTOR)
    }
}

/// Risk tier from RSI depth, thin volume and negative 20-day relative strength
pub fn risk_level(rsi: f64, relative_volume: Option<f64>, rs_20: Option<f64>) -> RiskLevel {
    let mut risk = 0;

    risk += if rsi < 20.0 {
        3
    } else if rsi < 25.0 {
        2
    } else if rsi < 30.0 {
        1
    } else {
        0
    };

    match relative_volume {
        Some(rv) if rv < 0.8 => risk += 2,
        Some(rv) if rv < 1.0 => risk += 1,
        _ => {}
    }

    match rs_20 {
        Some(rs) if rs < -5.0 => risk += 2,
        Some(rs) if rs < 0.0 => risk += 1,
        _ => {}
    }

    if risk >= 5 {
        RiskLevel::High
    } else if risk >= 3 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Evaluate one stock; `None` if it is not oversold or scores below the floor
pub fn evaluate_gem(stock: &ScoredStock) -> Option<Gem> {
    let s = stock.snapshot();
    let rsi = s.rsi.filter(|r| *r <= MAX_GEM_RSI)?;

    let mut score = 0;
    let mut reasons = Vec::new();

    let mut gem_type = if rsi < 25.0 {
        score += 30;
        reasons.push(format!("Deeply oversold RSI ({rsi:.1})"));
        GemType::DeepValue
    } else if rsi < 30.0 {
        score += 25;
        reasons.push(format!("Oversold RSI ({rsi:.1})"));
        GemType::OversoldBounce
    } else if rsi < 35.0 {
        score += 20;
        reasons.push(format!("Near oversold RSI ({rsi:.1})"));
        GemType::OversoldBounce
    } else {
        score += 10;
        reasons.push(format!("Pullback zone RSI ({rsi:.1})"));
        GemType::PullbackBuy
    };

    if let (Some(close), Some(lower)) = (s.close, s.bb_lower) {
        if lower > 0.0 && close <= lower * 1.02 {
            score += 15;
            reasons.push("Price at Bollinger lower band (support)".to_string());
        }
    }

    match s.relative_volume {
        Some(rv) if rv >= 1.5 => {
            score += 15;
            gem_type = GemType::VolumeSpike;
            reasons.push(format!("High volume ({rv:.1}x) - potential accumulation"));
        }
        Some(rv) if rv >= 1.2 => {
            score += 10;
            reasons.push(format!("Above average volume ({rv:.1}x)"));
        }
        _ => {}
    }

    if matches!(s.relative_strength_20, Some(rs) if rs > 0.0) {
        score += 15;
        reasons.push("Outperforming benchmark on 20-day basis".to_string());
    } else if matches!(s.relative_strength_10, Some(rs) if rs > 0.0) {
        score += 10;
        reasons.push("Outperforming benchmark on 10-day basis".to_string());
    }

    if let (Some(roc_5), Some(roc_10)) = (s.roc_5, s.roc_10) {
        if roc_5 > roc_10 {
            score += 10;
            reasons.push("Short-term momentum improving".to_string());
        }
    }

    if let (Some(close), Some(sma_50)) = (s.close, s.sma_50) {
        if sma_50 > 0.0 && (close - sma_50).abs() / sma_50 < 0.03 {
            score += 10;
            reasons.push("Price near 50-day SMA support".to_string());
        }
    }

    if score < MIN_GEM_SCORE {
        return None;
    }

    Some(Gem {
        stock: stock.clone(),
        gem_type,
        gem_score: score,
        risk_level: risk_level(rsi, s.relative_volume, s.relative_strength_20),
        reasons,
    })
}

/// Scan a universe for gems, best gem score first (ties keep input order)
pub fn detect_gems(stocks: &[ScoredStock]) -> Vec<Gem> {
    let mut gems: Vec<Gem> = stocks.iter().filter_map(evaluate_gem).collect();
    gems.sort_by(|a, b| b.gem_score.cmp(&a.gem_score));
    gems
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GemSummary {
    pub total: usize,
    pub by_type: BTreeMap<GemType, usize>,
    pub by_risk: BTreeMap<RiskLevel, usize>,
    pub avg_rsi: f64,
    pub avg_gem_score: f64,
}

pub fn gem_summary(gems: &[Gem]) -> GemSummary {
    if gems.is_empty() {
        return GemSummary::default();
    }

    let mut summary = GemSummary {
        total: gems.len(),
        ..Default::default()
    };
    for g in gems {
        *summary.by_type.entry(g.gem_type).or_default() += 1;
        *summary.by_risk.entry(g.risk_level).or_default() += 1;
    }

    let n = gems.len() as f64;
    let avg_rsi = gems
        .iter()
        .filter_map(|g| g.stock.snapshot().rsi)
        .sum::<f64>()
        / n;
    let avg_score = gems.iter().map(|g| g.gem_score as f64).sum::<f64>() / n;
    summary.avg_rsi = (avg_rsi * 10.0).round() / 10.0;
    summary.avg_gem_score = (avg_score * 10.0).round() / 10.0;
    summary
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorGems<'a> {
    pub sector: String,
    pub gems: Vec<&'a Gem>,
}

/// Group gems by sector, largest group first
pub fn gems_by_sector(gems: &[Gem]) -> Vec<SectorGems<'_>> {
    let mut groups: Vec<SectorGems<'_>> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for gem in gems {
        let sector = gem.sector();
        let slot = *index.entry(sector).or_insert_with(|| {
            groups.push(SectorGems {
                sector: sector.to_string(),
                gems: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].gems.push(gem);
    }

    groups.sort_by(|a, b| b.gems.len().cmp(&a.gems.len()));
    groups
}
