//! Analysis repository — indicator snapshots and signals

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// Indicator values for one symbol on one date
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct IndicatorRecord {
    pub symbol: String,
    pub date: String,
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
    pub momentum_score: Option<f64>,
}

/// Indicator row joined with the stock's name and sector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StockIndicatorRecord {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub indicators: IndicatorRecord,
    pub name: Option<String>,
    pub sector: Option<String>,
}

/// A persisted signal recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct SignalRecord {
    pub symbol: String,
    pub date: String,
    pub signal_type: String,
    pub momentum_score: Option<f64>,
    pub rationale: Option<String>,
    pub created_at: Option<String>,
}

/// Signal row joined with the stock's name and sector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct StockSignalRecord {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub signal: SignalRecord,
    pub name: Option<String>,
    pub sector: Option<String>,
}

/// Repository for indicator snapshots and signals
pub struct AnalysisRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AnalysisRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or update an indicator snapshot (upsert by symbol + date)
    pub async fn upsert_indicators(&self, record: &IndicatorRecord) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO indicators
                (symbol, date, close, rsi, roc_5, roc_10, roc_20, atr, sma_20, sma_50,
                 macd, macd_signal, macd_hist, bb_upper, bb_middle, bb_lower,
                 relative_volume, relative_strength_5, relative_strength_10,
                 relative_strength_20, momentum_score)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15,
                       ?16, ?17, ?18, ?19, ?20, ?21)
               ON CONFLICT(symbol, date) DO UPDATE SET
                 close = excluded.close,
                 rsi = excluded.rsi,
                 roc_5 = excluded.roc_5,
                 roc_10 = excluded.roc_10,
                 roc_20 = excluded.roc_20,
                 atr = excluded.atr,
                 sma_20 = excluded.sma_20,
                 sma_50 = excluded.sma_50,
                 macd = excluded.macd,
                 macd_signal = excluded.macd_signal,
                 macd_hist = excluded.macd_hist,
                 bb_upper = excluded.bb_upper,
                 bb_middle = excluded.bb_middle,
                 bb_lower = excluded.bb_lower,
                 relative_volume = excluded.relative_volume,
                 relative_strength_5 = excluded.relative_strength_5,
                 relative_strength_10 = excluded.relative_strength_10,
                 relative_strength_20 = excluded.relative_strength_20,
                 momentum_score = excluded.momentum_score
            "#,
        )
        .bind(&record.symbol)
        .bind(&record.date)
        .bind(record.close)
        .bind(record.rsi)
        .bind(record.roc_5)
        .bind(record.roc_10)
        .bind(record.roc_20)
        .bind(record.atr)
        .bind(record.sma_20)
        .bind(record.sma_50)
        .bind(record.macd)
        .bind(record.macd_signal)
        .bind(record.macd_hist)
        .bind(record.bb_upper)
        .bind(record.bb_middle)
        .bind(record.bb_lower)
        .bind(record.relative_volume)
        .bind(record.relative_strength_5)
        .bind(record.relative_strength_10)
        .bind(record.relative_strength_20)
        .bind(record.momentum_score)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Insert or update a signal (upsert by symbol + date)
    pub async fn upsert_signal(&self, record: &SignalRecord) -> DbResult<()> {
        sqlx::query(
            r#"INSERT INTO signals (symbol, date, signal_type, momentum_score, rationale)
               VALUES (?1, ?2, ?3, ?4, ?5)
               ON CONFLICT(symbol, date) DO UPDATE SET
                 signal_type = excluded.signal_type,
                 momentum_score = excluded.momentum_score,
                 rationale = excluded.rationale,
                 created_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&record.symbol)
        .bind(&record.date)
        .bind(&record.signal_type)
        .bind(record.momentum_score)
        .bind(&record.rationale)
        .execute(self.pool)
        .await?;

        Ok(())
    }

    /// Most recent indicator row of every symbol, highest momentum score first
    pub async fn latest_indicators(&self, limit: i64) -> DbResult<Vec<StockIndicatorRecord>> {
        let records = sqlx::query_as::<_, StockIndicatorRecord>(
            r#"SELECT i.*, s.name, s.sector
               FROM indicators i
               JOIN stocks s ON i.symbol = s.symbol
               WHERE i.date = (SELECT MAX(date) FROM indicators WHERE symbol = i.symbol)
               ORDER BY i.momentum_score DESC, i.symbol
               LIMIT ?1"#,
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Most recent indicator row for one symbol
    pub async fn latest_for_symbol(&self, symbol: &str) -> DbResult<Option<StockIndicatorRecord>> {
        let record = sqlx::query_as::<_, StockIndicatorRecord>(
            r#"SELECT i.*, s.name, s.sector
               FROM indicators i
               JOIN stocks s ON i.symbol = s.symbol
               WHERE i.symbol = ?1
               ORDER BY i.date DESC
               LIMIT 1"#,
        )
        .bind(symbol)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    /// Indicator history for a symbol, newest first
    pub async fn indicator_history(&self, symbol: &str, days: i64) -> DbResult<Vec<IndicatorRecord>> {
        let records = sqlx::query_as::<_, IndicatorRecord>(
            r#"SELECT * FROM indicators
               WHERE symbol = ?1
               ORDER BY date DESC
               LIMIT ?2"#,
        )
        .bind(symbol)
        .bind(days)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Signals for a date (defaults to the latest signal date), highest score first
    pub async fn latest_signals(&self, date: Option<&str>) -> DbResult<Vec<StockSignalRecord>> {
        let records = match date {
            Some(date) => {
                sqlx::query_as::<_, StockSignalRecord>(
                    r#"SELECT sg.*, s.name, s.sector
                       FROM signals sg
                       JOIN stocks s ON sg.symbol = s.symbol
                       WHERE sg.date = ?1
                       ORDER BY sg.momentum_score DESC, sg.symbol"#,
                )
                .bind(date)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, StockSignalRecord>(
                    r#"SELECT sg.*, s.name, s.sector
                       FROM signals sg
                       JOIN stocks s ON sg.symbol = s.symbol
                       WHERE sg.date = (SELECT MAX(date) FROM signals)
                       ORDER BY sg.momentum_score DESC, sg.symbol"#,
                )
                .fetch_all(self.pool)
                .await?
            }
        };

        Ok(records)
    }

    pub async fn latest_indicator_date(&self) -> DbResult<Option<String>> {
        let (date,): (Option<String>,) = sqlx::query_as("SELECT MAX(date) FROM indicators")
            .fetch_one(self.pool)
            .await?;
        Ok(date)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{StockRecord, StockRepository};
    use crate::Database;

    async fn setup() -> Database {
        let db = Database::in_memory().await.unwrap();
        StockRepository::new(db.pool())
            .upsert_many(&[
                StockRecord::new("TCS.NS", Some("TCS".into()), Some("IT".into())),
                StockRecord::new("INFY.NS", Some("Infosys".into()), Some("IT".into())),
                StockRecord::new("ITC.NS", Some("ITC".into()), None),
            ])
            .await
            .unwrap();
        db
    }

    fn indicators(symbol: &str, date: &str, score: f64) -> IndicatorRecord {
        IndicatorRecord {
            symbol: symbol.into(),
            date: date.into(),
            close: Some(100.0),
            rsi: Some(55.0),
            momentum_score: Some(score),
            ..Default::default()
        }
    }

    fn signal(symbol: &str, date: &str, signal_type: &str, score: f64) -> SignalRecord {
        SignalRecord {
            symbol: symbol.into(),
            date: date.into(),
            signal_type: signal_type.into(),
            momentum_score: Some(score),
            rationale: Some("test".into()),
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_latest_indicators_per_symbol() {
        let db = setup().await;
        let repo = AnalysisRepository::new(db.pool());

        repo.upsert_indicators(&indicators("TCS.NS", "2024-03-01", 40.0))
            .await
            .unwrap();
        repo.upsert_indicators(&indicators("TCS.NS", "2024-03-04", 75.0))
            .await
            .unwrap();
        // Lagging symbol still shows up with its own latest row
        repo.upsert_indicators(&indicators("INFY.NS", "2024-03-01", 60.0))
            .await
            .unwrap();

        let latest = repo.latest_indicators(10).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].indicators.symbol, "TCS.NS");
        assert_eq!(latest[0].indicators.momentum_score, Some(75.0));
        assert_eq!(latest[0].name.as_deref(), Some("TCS"));
        assert_eq!(latest[1].indicators.date, "2024-03-01");

        let history = repo.indicator_history("TCS.NS", 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, "2024-03-04");

        assert_eq!(
            repo.latest_indicator_date().await.unwrap().as_deref(),
            Some("2024-03-04")
        );
    }

    #[tokio::test]
    async fn test_indicator_upsert_keeps_missing_values() {
        let db = setup().await;
        let repo = AnalysisRepository::new(db.pool());

        let mut record = indicators("ITC.NS", "2024-03-04", 50.0);
        record.sma_50 = None;
        repo.upsert_indicators(&record).await.unwrap();
        record.momentum_score = Some(52.5);
        repo.upsert_indicators(&record).await.unwrap();

        let latest = repo.latest_for_symbol("ITC.NS").await.unwrap().unwrap();
        assert_eq!(latest.indicators.sma_50, None);
        assert_eq!(latest.indicators.momentum_score, Some(52.5));
        assert_eq!(latest.sector, None);
    }

    #[tokio::test]
    async fn test_latest_signals_defaults_to_latest_date() {
        let db = setup().await;
        let repo = AnalysisRepository::new(db.pool());

        repo.upsert_signal(&signal("TCS.NS", "2024-03-01", "hold", 45.0))
            .await
            .unwrap();
        repo.upsert_signal(&signal("TCS.NS", "2024-03-04", "buy", 72.0))
            .await
            .unwrap();
        repo.upsert_signal(&signal("INFY.NS", "2024-03-04", "strong_buy", 85.0))
            .await
            .unwrap();

        let latest = repo.latest_signals(None).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].signal.symbol, "INFY.NS");
        assert_eq!(latest[1].signal.signal_type, "buy");

        let earlier = repo.latest_signals(Some("2024-03-01")).await.unwrap();
        assert_eq!(earlier.len(), 1);
        assert_eq!(earlier[0].signal.signal_type, "hold");
    }
}
