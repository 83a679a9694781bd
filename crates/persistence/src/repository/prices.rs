//! Price repository — daily bars per stock and benchmark history

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A daily bar for one stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PriceRecord {
    pub symbol: String,
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: Option<f64>,
    pub volume: f64,
}

/// A daily bar of the benchmark index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BenchmarkRecord {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Repository for stock prices and benchmark history
pub struct PriceRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PriceRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update bars (upsert by symbol + date) in one transaction
    pub async fn upsert_prices(&self, bars: &[PriceRecord]) -> DbResult<usize> {
        let mut tx = self.pool.begin().await?;
        for bar in bars {
            sqlx::query(
                r#"INSERT INTO prices (symbol, date, open, high, low, close, adj_close, volume)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                   ON CONFLICT(symbol, date) DO UPDATE SET
                     open = excluded.open,
                     high = excluded.high,
                     low = excluded.low,
                     close = excluded.close,
                     adj_close = excluded.adj_close,
                     volume = excluded.volume
                "#,
            )
            .bind(&bar.symbol)
            .bind(&bar.date)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.adj_close)
            .bind(bar.volume)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(bars.len())
    }

    /// The most recent `days` bars for a symbol, oldest first
    pub async fn get_prices(&self, symbol: &str, days: i64) -> DbResult<Vec<PriceRecord>> {
        let mut records = sqlx::query_as::<_, PriceRecord>(
            r#"SELECT symbol, date, open, high, low, close, adj_close, volume
               FROM prices
               WHERE symbol = ?1
               ORDER BY date DESC
               LIMIT ?2"#,
        )
        .bind(symbol)
        .bind(days)
        .fetch_all(self.pool)
        .await?;

        records.reverse();
        Ok(records)
    }

    pub async fn latest_price(&self, symbol: &str) -> DbResult<Option<PriceRecord>> {
        let record = sqlx::query_as::<_, PriceRecord>(
            r#"SELECT symbol, date, open, high, low, close, adj_close, volume
               FROM prices
               WHERE symbol = ?1
               ORDER BY date DESC
               LIMIT 1"#,
        )
        .bind(symbol)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    pub async fn count_bars(&self, symbol: &str) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM prices WHERE symbol = ?1")
            .bind(symbol)
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }

    /// Insert or update benchmark bars (upsert by date) in one transaction
    pub async fn upsert_benchmark(&self, bars: &[BenchmarkRecord]) -> DbResult<usize> {
        let mut tx = self.pool.begin().await?;
        for bar in bars {
            sqlx::query(
                r#"INSERT INTO benchmark_history (date, open, high, low, close, volume)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                   ON CONFLICT(date) DO UPDATE SET
                     open = excluded.open,
                     high = excluded.high,
                     low = excluded.low,
                     close = excluded.close,
                     volume = excluded.volume
                "#,
            )
            .bind(&bar.date)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(bars.len())
    }

    /// The most recent `days` benchmark bars, oldest first
    pub async fn get_benchmark(&self, days: i64) -> DbResult<Vec<BenchmarkRecord>> {
        let mut records = sqlx::query_as::<_, BenchmarkRecord>(
            r#"SELECT date, open, high, low, close, volume
               FROM benchmark_history
               ORDER BY date DESC
               LIMIT ?1"#,
        )
        .bind(days)
        .fetch_all(self.pool)
        .await?;

        records.reverse();
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{StockRecord, StockRepository};
    use crate::Database;

    fn bar(symbol: &str, date: &str, close: f64) -> PriceRecord {
        PriceRecord {
            symbol: symbol.into(),
            date: date.into(),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            adj_close: Some(close),
            volume: 1_000.0,
        }
    }

    async fn setup() -> Database {
        let db = Database::in_memory().await.unwrap();
        StockRepository::new(db.pool())
            .upsert(&StockRecord::new("INFY.NS", None, None))
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_prices_upsert_replaces_same_date() {
        let db = setup().await;
        let repo = PriceRepository::new(db.pool());

        repo.upsert_prices(&[
            bar("INFY.NS", "2024-01-02", 100.0),
            bar("INFY.NS", "2024-01-03", 101.0),
        ])
        .await
        .unwrap();
        repo.upsert_prices(&[bar("INFY.NS", "2024-01-03", 105.0)])
            .await
            .unwrap();

        assert_eq!(repo.count_bars("INFY.NS").await.unwrap(), 2);
        let latest = repo.latest_price("INFY.NS").await.unwrap().unwrap();
        assert_eq!(latest.date, "2024-01-03");
        assert_eq!(latest.close, 105.0);
    }

    #[tokio::test]
    async fn test_get_prices_returns_recent_window_ascending() {
        let db = setup().await;
        let repo = PriceRepository::new(db.pool());

        let bars: Vec<PriceRecord> = (1..=9)
            .map(|d| bar("INFY.NS", &format!("2024-01-0{d}"), 100.0 + d as f64))
            .collect();
        repo.upsert_prices(&bars).await.unwrap();

        let window = repo.get_prices("INFY.NS", 3).await.unwrap();
        let dates: Vec<&str> = window.iter().map(|b| b.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-01-07", "2024-01-08", "2024-01-09"]);
        assert!(repo.get_prices("TCS.NS", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prices_require_known_stock() {
        let db = setup().await;
        let repo = PriceRepository::new(db.pool());
        assert!(repo
            .upsert_prices(&[bar("UNKNOWN.NS", "2024-01-02", 1.0)])
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_benchmark_history() {
        let db = Database::in_memory().await.unwrap();
        let repo = PriceRepository::new(db.pool());

        let bars: Vec<BenchmarkRecord> = ["2024-01-03", "2024-01-01", "2024-01-02"]
            .iter()
            .enumerate()
            .map(|(i, d)| BenchmarkRecord {
                date: d.to_string(),
                open: 21_000.0,
                high: 21_100.0,
                low: 20_900.0,
                close: 21_000.0 + i as f64,
                volume: 0.0,
            })
            .collect();
        repo.upsert_benchmark(&bars).await.unwrap();

        let history = repo.get_benchmark(10).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].date, "2024-01-01");
        assert_eq!(history[2].date, "2024-01-03");
    }
}
