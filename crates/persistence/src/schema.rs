//! Database schema definitions

/// SQL to create all tables
/// NOTE: dates are stored as ISO-8601 TEXT (YYYY-MM-DD) so they sort lexically
pub const CREATE_TABLES: &str = r#"
-- Master list of tracked stocks
CREATE TABLE IF NOT EXISTS stocks (
    symbol TEXT PRIMARY KEY,
    name TEXT,
    sector TEXT,
    industry TEXT,
    added_at TEXT DEFAULT CURRENT_TIMESTAMP
);

-- Daily OHLCV bars
CREATE TABLE IF NOT EXISTS prices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    adj_close REAL,
    volume REAL NOT NULL DEFAULT 0,
    UNIQUE(symbol, date),
    FOREIGN KEY (symbol) REFERENCES stocks(symbol)
);

-- Benchmark index history
CREATE TABLE IF NOT EXISTS benchmark_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date TEXT NOT NULL UNIQUE,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL DEFAULT 0
);

-- Indicator snapshots with momentum score
CREATE TABLE IF NOT EXISTS indicators (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    close REAL,
    rsi REAL,
    roc_5 REAL,
    roc_10 REAL,
    roc_20 REAL,
    atr REAL,
    sma_20 REAL,
    sma_50 REAL,
    macd REAL,
    macd_signal REAL,
    macd_hist REAL,
    bb_upper REAL,
    bb_middle REAL,
    bb_lower REAL,
    relative_volume REAL,
    relative_strength_5 REAL,
    relative_strength_10 REAL,
    relative_strength_20 REAL,
    momentum_score REAL,
    UNIQUE(symbol, date),
    FOREIGN KEY (symbol) REFERENCES stocks(symbol)
);

-- Signal recommendations
CREATE TABLE IF NOT EXISTS signals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol TEXT NOT NULL,
    date TEXT NOT NULL,
    signal_type TEXT NOT NULL,
    momentum_score REAL,
    rationale TEXT,
    created_at TEXT DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(symbol, date),
    FOREIGN KEY (symbol) REFERENCES stocks(symbol)
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_prices_symbol_date ON prices(symbol, date);
CREATE INDEX IF NOT EXISTS idx_indicators_symbol_date ON indicators(symbol, date);
CREATE INDEX IF NOT EXISTS idx_signals_date ON signals(date);
CREATE INDEX IF NOT EXISTS idx_benchmark_date ON benchmark_history(date)
"#;
