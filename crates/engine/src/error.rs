//! Error types for the analysis engine

use thiserror::Error;

/// Invalid configuration, reported when the configuration is loaded
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Score weights must sum to 1.0 (got {sum:.6})")]
    WeightSum { sum: f64 },

    #[error("Thresholds out of order: {0}")]
    ThresholdOrder(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Failed to read configuration: {0}")]
    Io(String),
}

/// Per-symbol failure in the analysis pipeline
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("{symbol}: invalid price history ({reason})")]
    InvalidInput { symbol: String, reason: String },

    #[error("{symbol}: insufficient history ({actual} bars, need {required})")]
    InsufficientData {
        symbol: String,
        required: usize,
        actual: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    pub fn invalid(symbol: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single Monte Carlo forecast request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Insufficient price data for forecast ({actual} bars, need {required})")]
    InsufficientData { required: usize, actual: usize },

    #[error("Invalid forecast parameters: {0}")]
    InvalidParameters(String),

    #[error("Degenerate price history: {0}")]
    DegenerateInput(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
