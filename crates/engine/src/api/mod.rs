//! Market data providers

use anyhow::Result;
use async_trait::async_trait;

use crate::types::PriceBar;

pub mod yahoo;

pub use yahoo::YahooFinanceClient;

/// Source of daily price history
#[async_trait]
pub trait PriceHistoryProvider: Send + Sync {
    /// Daily bars covering roughly the last `days` calendar days, oldest first
    async fn fetch_history(&self, symbol: &str, days: u32) -> Result<Vec<PriceBar>>;
}
