//! Conversions between stored records and engine types

use anyhow::{Context, Result};
use chrono::NaiveDate;
use engine::{IndicatorSnapshot, PriceBar, ScoredSnapshot, StockInfo, StockSignal, StockSnapshot};
use persistence::repository::{
    BenchmarkRecord, IndicatorRecord, PriceRecord, SignalRecord, StockIndicatorRecord,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

fn parse_date(date: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date, DATE_FORMAT).with_context(|| format!("invalid date {date:?}"))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn price_bar(record: &PriceRecord) -> Result<PriceBar> {
    Ok(PriceBar {
        date: parse_date(&record.date)?,
        open: record.open,
        high: record.high,
        low: record.low,
        close: record.close,
        adjusted_close: record.adj_close.unwrap_or(record.close),
        volume: record.volume,
    })
}

pub fn price_bars(records: &[PriceRecord]) -> Result<Vec<PriceBar>> {
    records.iter().map(price_bar).collect()
}

pub fn benchmark_bars(records: &[BenchmarkRecord]) -> Result<Vec<PriceBar>> {
    records
        .iter()
        .map(|r| {
            Ok(PriceBar {
                date: parse_date(&r.date)?,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                adjusted_close: r.close,
                volume: r.volume,
            })
        })
        .collect()
}

pub fn price_record(symbol: &str, bar: &PriceBar) -> PriceRecord {
    PriceRecord {
        symbol: symbol.to_string(),
        date: format_date(bar.date),
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        adj_close: Some(bar.adjusted_close),
        volume: bar.volume,
    }
}

pub fn benchmark_record(bar: &PriceBar) -> BenchmarkRecord {
    BenchmarkRecord {
        date: format_date(bar.date),
        open: bar.open,
        high: bar.high,
        low: bar.low,
        close: bar.close,
        volume: bar.volume,
    }
}

pub fn indicator_record(symbol: &str, scored: &ScoredSnapshot) -> Option<IndicatorRecord> {
    let s = &scored.snapshot;
    Some(IndicatorRecord {
        symbol: symbol.to_string(),
        date: format_date(s.date?),
        close: s.close,
        rsi: s.rsi,
        roc_5: s.roc_5,
        roc_10: s.roc_10,
        roc_20: s.roc_20,
        atr: s.atr,
        sma_20: s.sma_20,
        sma_50: s.sma_50,
        macd: s.macd,
        macd_signal: s.macd_signal,
        macd_hist: s.macd_hist,
        bb_upper: s.bb_upper,
        bb_middle: s.bb_middle,
        bb_lower: s.bb_lower,
        relative_volume: s.relative_volume,
        relative_strength_5: s.relative_strength_5,
        relative_strength_10: s.relative_strength_10,
        relative_strength_20: s.relative_strength_20,
        momentum_score: Some(scored.momentum_score),
    })
}

/// Rebuild a snapshot from a stored row; an unparseable date is left empty
pub fn snapshot(record: &IndicatorRecord) -> IndicatorSnapshot {
    IndicatorSnapshot {
        date: parse_date(&record.date).ok(),
        close: record.close,
        rsi: record.rsi,
        roc_5: record.roc_5,
        roc_10: record.roc_10,
        roc_20: record.roc_20,
        atr: record.atr,
        sma_20: record.sma_20,
        sma_50: record.sma_50,
        macd: record.macd,
        macd_signal: record.macd_signal,
        macd_hist: record.macd_hist,
        bb_upper: record.bb_upper,
        bb_middle: record.bb_middle,
        bb_lower: record.bb_lower,
        relative_volume: record.relative_volume,
        relative_strength_5: record.relative_strength_5,
        relative_strength_10: record.relative_strength_10,
        relative_strength_20: record.relative_strength_20,
    }
}

pub fn stock_snapshot(record: &StockIndicatorRecord) -> StockSnapshot {
    StockSnapshot {
        info: StockInfo {
            symbol: record.indicators.symbol.clone(),
            name: record.name.clone(),
            sector: record.sector.clone(),
        },
        snapshot: snapshot(&record.indicators),
    }
}

pub fn signal_record(signal: &StockSignal) -> Option<SignalRecord> {
    let date = signal.stock.snapshot().date?;
    Some(SignalRecord {
        symbol: signal.symbol().to_string(),
        date: format_date(date),
        signal_type: serde_json::to_value(signal.signal_type)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| signal.signal_type.to_string()),
        momentum_score: Some(signal.score()),
        rationale: Some(signal.rationale.clone()),
        created_at: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{ScoredStock, SignalType};

    #[test]
    fn test_price_record_round_trip_falls_back_to_close() {
        let mut record = PriceRecord {
            symbol: "INFY.NS".into(),
            date: "2024-03-04".into(),
            open: 1.0,
            high: 2.0,
            low: 0.5,
            close: 1.5,
            adj_close: None,
            volume: 10.0,
        };
        let bar = price_bar(&record).unwrap();
        assert_eq!(bar.adjusted_close, 1.5);
        assert_eq!(bar.date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());

        record.adj_close = Some(1.5);
        assert_eq!(price_record("INFY.NS", &bar), record);
    }

    #[test]
    fn test_bad_date_is_an_error() {
        let record = BenchmarkRecord {
            date: "04/03/2024".into(),
            open: 1.0,
            high: 1.0,
            low: 1.0,
            close: 1.0,
            volume: 0.0,
        };
        assert!(benchmark_bars(&[record]).is_err());
    }

    #[test]
    fn test_signal_record_uses_snake_case_type() {
        let signal = StockSignal {
            stock: ScoredStock {
                info: StockInfo::new("TCS.NS"),
                scored: ScoredSnapshot {
                    snapshot: IndicatorSnapshot {
                        date: NaiveDate::from_ymd_opt(2024, 3, 4),
                        ..Default::default()
                    },
                    momentum_score: 82.0,
                },
            },
            signal_type: SignalType::StrongBuy,
            rationale: "test".into(),
        };
        let record = signal_record(&signal).unwrap();
        assert_eq!(record.signal_type, "strong_buy");
        assert_eq!(record.date, "2024-03-04");
    }

    #[test]
    fn test_indicator_record_needs_a_date() {
        let scored = ScoredSnapshot {
            snapshot: IndicatorSnapshot::default(),
            momentum_score: 50.0,
        };
        assert!(indicator_record("TCS.NS", &scored).is_none());
    }
}
