//! Stock master list repository

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A tracked stock
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StockRecord {
    pub symbol: String,
    pub name: Option<String>,
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub added_at: Option<String>,
}

impl StockRecord {
    pub fn new(symbol: impl Into<String>, name: Option<String>, sector: Option<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name,
            sector,
            industry: None,
            added_at: None,
        }
    }
}

/// Repository for the stock master list
pub struct StockRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StockRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update a stock (upsert by symbol, keeps the original added_at)
    pub async fn upsert(&self, stock: &StockRecord) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO stocks (symbol, name, sector, industry)
               VALUES (?1, ?2, ?3, ?4)
               ON CONFLICT(symbol) DO UPDATE SET
                 name = excluded.name,
                 sector = excluded.sector,
                 industry = excluded.industry
            "#,
        )
        .bind(&stock.symbol)
        .bind(&stock.name)
        .bind(&stock.sector)
        .bind(&stock.industry)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    pub async fn upsert_many(&self, stocks: &[StockRecord]) -> DbResult<usize> {
        for stock in stocks {
            self.upsert(stock).await?;
        }
        Ok(stocks.len())
    }

    pub async fn get(&self, symbol: &str) -> DbResult<Option<StockRecord>> {
        let record = sqlx::query_as::<_, StockRecord>("SELECT * FROM stocks WHERE symbol = ?1")
            .bind(symbol)
            .fetch_optional(self.pool)
            .await?;

        Ok(record)
    }

    /// Case-insensitive substring match on symbol or name
    pub async fn search(&self, query: &str, limit: i64) -> DbResult<Vec<StockRecord>> {
        let pattern = format!("%{}%", query.trim());
        let records = sqlx::query_as::<_, StockRecord>(
            r#"SELECT * FROM stocks
               WHERE symbol LIKE ?1 OR name LIKE ?1
               ORDER BY symbol
               LIMIT ?2"#,
        )
        .bind(pattern)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM stocks")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}
