//! Engine configuration: indicator periods, score weights, signal thresholds
//!
//! Every component takes its settings as an explicit value. `EngineConfig::load`
//! parses a TOML file and validates it, so a bad file fails at startup rather
//! than halfway through a screening run.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Top-level configuration for the whole engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub indicators: IndicatorPeriods,
    #[serde(default)]
    pub weights: ScoreWeights,
    #[serde(default)]
    pub thresholds: SignalThresholds,
    #[serde(default)]
    pub forecast: ForecastSettings,
    #[serde(default)]
    pub screener: ScreenerSettings,
}

impl EngineConfig {
    /// Parse a TOML document; missing sections and fields fall back to defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig =
            toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.indicators.validate()?;
        self.weights.validate()?;
        self.thresholds.validate()?;
        self.forecast.validate()?;
        self.screener.validate()
    }
}

// ============================================================================
// Indicator periods
// ============================================================================

/// Lookback windows for the indicator engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPeriods {
    #[serde(default = "default_rsi")]
    pub rsi: usize,
    #[serde(default = "default_atr")]
    pub atr: usize,
    #[serde(default = "default_roc_short")]
    pub roc_short: usize,
    #[serde(default = "default_roc_medium")]
    pub roc_medium: usize,
    #[serde(default = "default_roc_long")]
    pub roc_long: usize,
    #[serde(default = "default_sma_short")]
    pub sma_short: usize,
    #[serde(default = "default_sma_long")]
    pub sma_long: usize,
    #[serde(default = "default_macd_fast")]
    pub macd_fast: usize,
    #[serde(default = "default_macd_slow")]
    pub macd_slow: usize,
    #[serde(default = "default_macd_signal")]
    pub macd_signal: usize,
    #[serde(default = "default_bollinger_period")]
    pub bollinger_period: usize,
    #[serde(default = "default_bollinger_std")]
    pub bollinger_std: f64,
    #[serde(default = "default_volume_avg_period")]
    pub volume_avg_period: usize,
    /// Compute on adjusted close instead of raw close
    #[serde(default = "default_true")]
    pub use_adjusted_close: bool,
}

fn default_rsi() -> usize {
    14
}
fn default_atr() -> usize {
    14
}
fn default_roc_short() -> usize {
    5
}
fn default_roc_medium() -> usize {
    10
}
fn default_roc_long() -> usize {
    20
}
fn default_sma_short() -> usize {
    20
}
fn default_sma_long() -> usize {
    50
}
fn default_macd_fast() -> usize {
    12
}
fn default_macd_slow() -> usize {
    26
}
fn default_macd_signal() -> usize {
    9
}
fn default_bollinger_period() -> usize {
    20
}
fn default_bollinger_std() -> f64 {
    2.0
}
fn default_volume_avg_period() -> usize {
    20
}
fn default_true() -> bool {
    true
}

impl Default for IndicatorPeriods {
    fn default() -> Self {
        Self {
            rsi: default_rsi(),
            atr: default_atr(),
            roc_short: default_roc_short(),
            roc_medium: default_roc_medium(),
            roc_long: default_roc_long(),
            sma_short: default_sma_short(),
            sma_long: default_sma_long(),
            macd_fast: default_macd_fast(),
            macd_slow: default_macd_slow(),
            macd_signal: default_macd_signal(),
            bollinger_period: default_bollinger_period(),
            bollinger_std: default_bollinger_std(),
            volume_avg_period: default_volume_avg_period(),
            use_adjusted_close: true,
        }
    }
}

impl IndicatorPeriods {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("rsi", self.rsi),
            ("atr", self.atr),
            ("roc_short", self.roc_short),
            ("roc_medium", self.roc_medium),
            ("roc_long", self.roc_long),
            ("sma_short", self.sma_short),
            ("sma_long", self.sma_long),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("bollinger_period", self.bollinger_period),
            ("volume_avg_period", self.volume_avg_period),
        ];
        for (name, period) in periods {
            if period == 0 {
                return Err(ConfigError::InvalidValue(format!(
                    "indicator period {name} must be at least 1"
                )));
            }
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ConfigError::ThresholdOrder(format!(
                "macd_fast ({}) must be shorter than macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }
        if !(self.roc_short <= self.roc_medium && self.roc_medium <= self.roc_long) {
            return Err(ConfigError::ThresholdOrder(
                "roc periods must satisfy roc_short <= roc_medium <= roc_long".into(),
            ));
        }
        if !(self.bollinger_std.is_finite() && self.bollinger_std > 0.0) {
            return Err(ConfigError::InvalidValue(
                "bollinger_std must be a positive number".into(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Score weights
// ============================================================================

/// Weight of each sub-score in the composite momentum score (sum = 1.0)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    #[serde(default = "default_w_roc_5")]
    pub roc_5: f64,
    #[serde(default = "default_w_roc_10")]
    pub roc_10: f64,
    #[serde(default = "default_w_roc_20")]
    pub roc_20: f64,
    #[serde(default = "default_w_relative_strength")]
    pub relative_strength: f64,
    #[serde(default = "default_w_volume")]
    pub volume: f64,
    #[serde(default = "default_w_rsi")]
    pub rsi: f64,
    #[serde(default = "default_w_moving_average")]
    pub moving_average: f64,
}

fn default_w_roc_5() -> f64 {
    0.20
}
fn default_w_roc_10() -> f64 {
    0.15
}
fn default_w_roc_20() -> f64 {
    0.10
}
fn default_w_relative_strength() -> f64 {
    0.15
}
fn default_w_volume() -> f64 {
    0.10
}
fn default_w_rsi() -> f64 {
    0.20
}
fn default_w_moving_average() -> f64 {
    0.10
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            roc_5: default_w_roc_5(),
            roc_10: default_w_roc_10(),
            roc_20: default_w_roc_20(),
            relative_strength: default_w_relative_strength(),
            volume: default_w_volume(),
            rsi: default_w_rsi(),
            moving_average: default_w_moving_average(),
        }
    }
}

impl ScoreWeights {
    pub fn as_array(&self) -> [(&'static str, f64); 7] {
        [
            ("roc_5", self.roc_5),
            ("roc_10", self.roc_10),
            ("roc_20", self.roc_20),
            ("relative_strength", self.relative_strength),
            ("volume", self.volume),
            ("rsi", self.rsi),
            ("moving_average", self.moving_average),
        ]
    }

    pub fn sum(&self) -> f64 {
        self.as_array().iter().map(|(_, w)| w).sum()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, weight) in self.as_array() {
            if !weight.is_finite() || weight < 0.0 {
                return Err(ConfigError::InvalidValue(format!(
                    "weight {name} must be a non-negative number (got {weight})"
                )));
            }
        }
        let sum = self.sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ConfigError::WeightSum { sum });
        }
        Ok(())
    }
}

// ============================================================================
// Signal thresholds
// ============================================================================

/// Thresholds used by the signal classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    #[serde(default = "default_strong_buy_min")]
    pub strong_buy_min: f64,
    #[serde(default = "default_buy_min")]
    pub buy_min: f64,
    #[serde(default = "default_hold_min")]
    pub hold_min: f64,
    #[serde(default = "default_overbought_rsi")]
    pub overbought_rsi: f64,
    #[serde(default = "default_oversold_rsi")]
    pub oversold_rsi: f64,
    #[serde(default = "default_volume_confirmation")]
    pub volume_confirmation: f64,
    #[serde(default = "default_volume_buy")]
    pub volume_buy: f64,
}

fn default_strong_buy_min() -> f64 {
    80.0
}
fn default_buy_min() -> f64 {
    70.0
}
fn default_hold_min() -> f64 {
    40.0
}
fn default_overbought_rsi() -> f64 {
    75.0
}
fn default_oversold_rsi() -> f64 {
    25.0
}
fn default_volume_confirmation() -> f64 {
    1.5
}
fn default_volume_buy() -> f64 {
    1.2
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            strong_buy_min: default_strong_buy_min(),
            buy_min: default_buy_min(),
            hold_min: default_hold_min(),
            overbought_rsi: default_overbought_rsi(),
            oversold_rsi: default_oversold_rsi(),
            volume_confirmation: default_volume_confirmation(),
            volume_buy: default_volume_buy(),
        }
    }
}

impl SignalThresholds {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let all = [
            ("strong_buy_min", self.strong_buy_min),
            ("buy_min", self.buy_min),
            ("hold_min", self.hold_min),
            ("overbought_rsi", self.overbought_rsi),
            ("oversold_rsi", self.oversold_rsi),
            ("volume_confirmation", self.volume_confirmation),
            ("volume_buy", self.volume_buy),
        ];
        for (name, value) in all {
            if !value.is_finite() {
                return Err(ConfigError::InvalidValue(format!(
                    "threshold {name} must be finite"
                )));
            }
        }

        if !(0.0 <= self.hold_min
            && self.hold_min <= self.buy_min
            && self.buy_min <= self.strong_buy_min
            && self.strong_buy_min <= 100.0)
        {
            return Err(ConfigError::ThresholdOrder(format!(
                "expected 0 <= hold_min ({}) <= buy_min ({}) <= strong_buy_min ({}) <= 100",
                self.hold_min, self.buy_min, self.strong_buy_min
            )));
        }

        if !(0.0 <= self.oversold_rsi
            && self.oversold_rsi < self.overbought_rsi
            && self.overbought_rsi <= 100.0)
        {
            return Err(ConfigError::ThresholdOrder(format!(
                "expected 0 <= oversold_rsi ({}) < overbought_rsi ({}) <= 100",
                self.oversold_rsi, self.overbought_rsi
            )));
        }

        if !(0.0 < self.volume_buy && self.volume_buy <= self.volume_confirmation) {
            return Err(ConfigError::ThresholdOrder(format!(
                "expected 0 < volume_buy ({}) <= volume_confirmation ({})",
                self.volume_buy, self.volume_confirmation
            )));
        }

        Ok(())
    }
}

// ============================================================================
// Forecast and screener settings
// ============================================================================

/// Longest forecast horizon accepted, in days
pub const MAX_FORECAST_DAYS: usize = 365;
/// Most simulated paths accepted for one forecast
pub const MAX_SIMULATIONS: usize = 100_000;

/// Defaults for the Monte Carlo forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSettings {
    #[serde(default = "default_days_forward")]
    pub days_forward: usize,
    #[serde(default = "default_num_simulations")]
    pub num_simulations: usize,
    #[serde(default = "default_percentiles")]
    pub percentiles: Vec<f64>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Number of simulated paths kept in the result
    #[serde(default = "default_sample_paths")]
    pub sample_paths: usize,
    #[serde(default = "default_min_history")]
    pub min_history: usize,
}

fn default_days_forward() -> usize {
    20
}
fn default_num_simulations() -> usize {
    1000
}
fn default_percentiles() -> Vec<f64> {
    vec![0.10, 0.25, 0.50, 0.75, 0.90]
}
fn default_seed() -> u64 {
    42
}
fn default_sample_paths() -> usize {
    50
}
fn default_min_history() -> usize {
    20
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            days_forward: default_days_forward(),
            num_simulations: default_num_simulations(),
            percentiles: default_percentiles(),
            seed: default_seed(),
            sample_paths: default_sample_paths(),
            min_history: default_min_history(),
        }
    }
}

impl ForecastSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_FORECAST_DAYS).contains(&self.days_forward) {
            return Err(ConfigError::InvalidValue(format!(
                "forecast days_forward must be between 1 and {MAX_FORECAST_DAYS}"
            )));
        }
        if !(1..=MAX_SIMULATIONS).contains(&self.num_simulations) {
            return Err(ConfigError::InvalidValue(format!(
                "forecast num_simulations must be between 1 and {MAX_SIMULATIONS}"
            )));
        }
        if self.min_history < 2 {
            return Err(ConfigError::InvalidValue(
                "forecast min_history must be at least 2".into(),
            ));
        }
        if let Some(p) = self
            .percentiles
            .iter()
            .find(|p| !(p.is_finite() && **p > 0.0 && **p < 1.0))
        {
            return Err(ConfigError::InvalidValue(format!(
                "forecast percentile {p} must lie strictly between 0 and 1"
            )));
        }
        Ok(())
    }
}

/// Settings for universe-wide screening and the daily update job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenerSettings {
    /// Symbols with fewer stored bars are skipped with an error entry
    #[serde(default = "default_min_history_bars")]
    pub min_history_bars: usize,
    /// Bars loaded per symbol for indicator computation
    #[serde(default = "default_history_days")]
    pub history_days: usize,
    /// Calendar days requested from the market data provider
    #[serde(default = "default_fetch_days")]
    pub fetch_days: u32,
}

fn default_min_history_bars() -> usize {
    30
}
fn default_history_days() -> usize {
    60
}
fn default_fetch_days() -> u32 {
    90
}

impl Default for ScreenerSettings {
    fn default() -> Self {
        Self {
            min_history_bars: default_min_history_bars(),
            history_days: default_history_days(),
            fetch_days: default_fetch_days(),
        }
    }
}

impl ScreenerSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_history_bars == 0 {
            return Err(ConfigError::InvalidValue(
                "screener min_history_bars must be at least 1".into(),
            ));
        }
        if self.history_days < self.min_history_bars {
            return Err(ConfigError::ThresholdOrder(format!(
                "screener history_days ({}) must cover min_history_bars ({})",
                self.history_days, self.min_history_bars
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
        assert!((ScoreWeights::default().sum() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_weights_must_sum_to_one() {
        let weights = ScoreWeights {
            rsi: 0.30,
            ..Default::default()
        };
        match weights.validate() {
            Err(ConfigError::WeightSum { sum }) => assert!((sum - 1.1).abs() < 1e-9),
            other => panic!("expected WeightSum error, got {other:?}"),
        }
    }

    #[test]
    fn test_negative_weight_rejected() {
        let weights = ScoreWeights {
            roc_5: -0.10,
            rsi: 0.50,
            ..Default::default()
        };
        assert!(matches!(
            weights.validate(),
            Err(ConfigError::InvalidValue(_))
        ));
    }

    #[test]
    fn test_threshold_order_rejected() {
        let thresholds = SignalThresholds {
            buy_min: 85.0,
            ..Default::default()
        };
        assert!(matches!(
            thresholds.validate(),
            Err(ConfigError::ThresholdOrder(_))
        ));

        let thresholds = SignalThresholds {
            oversold_rsi: 80.0,
            ..Default::default()
        };
        assert!(thresholds.validate().is_err());

        let thresholds = SignalThresholds {
            volume_buy: 2.0,
            ..Default::default()
        };
        assert!(thresholds.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            [thresholds]
            strong_buy_min = 85.0

            [indicators]
            rsi = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.thresholds.strong_buy_min, 85.0);
        assert_eq!(config.thresholds.buy_min, 70.0);
        assert_eq!(config.indicators.rsi, 10);
        assert_eq!(config.indicators.sma_long, 50);
        assert_eq!(config.weights, ScoreWeights::default());
    }

    #[test]
    fn test_invalid_toml_fails_at_load() {
        let err = EngineConfig::from_toml_str(
            r#"
            [weights]
            roc_5 = 0.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::WeightSum { .. }));

        let err = EngineConfig::from_toml_str("indicators = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_macd_periods_checked() {
        let periods = IndicatorPeriods {
            macd_fast: 26,
            macd_slow: 12,
            ..Default::default()
        };
        assert!(periods.validate().is_err());
    }

    #[test]
    fn test_forecast_percentiles_checked() {
        let settings = ForecastSettings {
            percentiles: vec![0.5, 1.5],
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_forecast_work_is_bounded() {
        let at_limit = ForecastSettings {
            days_forward: MAX_FORECAST_DAYS,
            num_simulations: MAX_SIMULATIONS,
            ..Default::default()
        };
        assert!(at_limit.validate().is_ok());

        let too_long = ForecastSettings {
            days_forward: MAX_FORECAST_DAYS + 1,
            ..Default::default()
        };
        assert!(too_long.validate().is_err());

        let too_many = ForecastSettings {
            num_simulations: 1_000_000_000,
            ..Default::default()
        };
        assert!(too_many.validate().is_err());
    }
}
