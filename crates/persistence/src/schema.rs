//! Database schema definitions

/// SQL to create all tables
/// NOTE: JSON payloads (params, curves, trades) are stored as TEXT; times are epoch seconds
pub const CREATE_TABLES: &str = r#"
-- User-authored strategies
CREATE TABLE IF NOT EXISTS strategies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    code TEXT NOT NULL,
    params TEXT NOT NULL DEFAULT '{}',
    template_key TEXT,
    is_active INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER DEFAULT (strftime('%s', 'now')),
    updated_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Completed backtest runs
CREATE TABLE IF NOT EXISTS backtest_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    strategy_id INTEGER NOT NULL REFERENCES strategies(id) ON DELETE CASCADE,
    token_id TEXT NOT NULL,
    market_name TEXT NOT NULL DEFAULT '',
    strategy_hash TEXT NOT NULL,
    equity_curve TEXT NOT NULL DEFAULT '[]',
    timestamps TEXT NOT NULL DEFAULT '[]',
    prices TEXT NOT NULL DEFAULT '[]',
    trades TEXT NOT NULL DEFAULT '[]',
    initial_capital REAL NOT NULL DEFAULT 1000.0,
    final_equity REAL NOT NULL DEFAULT 0.0,
    total_pnl REAL NOT NULL DEFAULT 0.0,
    roi_pct REAL NOT NULL DEFAULT 0.0,
    sharpe_ratio REAL NOT NULL DEFAULT 0.0,
    max_drawdown_pct REAL NOT NULL DEFAULT 0.0,
    win_rate_pct REAL NOT NULL DEFAULT 0.0,
    total_trades INTEGER NOT NULL DEFAULT 0,
    winning_trades INTEGER NOT NULL DEFAULT 0,
    losing_trades INTEGER NOT NULL DEFAULT 0,
    avg_win REAL NOT NULL DEFAULT 0.0,
    avg_loss REAL NOT NULL DEFAULT 0.0,
    profit_factor REAL NOT NULL DEFAULT 0.0,
    max_consecutive_wins INTEGER NOT NULL DEFAULT 0,
    max_consecutive_losses INTEGER NOT NULL DEFAULT 0,
    data_points INTEGER NOT NULL DEFAULT 0,
    duration_seconds REAL NOT NULL DEFAULT 0.0,
    created_at INTEGER DEFAULT (strftime('%s', 'now'))
);

-- Addresses the user follows
CREATE TABLE IF NOT EXISTS tracked_traders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    address TEXT NOT NULL UNIQUE,
    alias TEXT NOT NULL DEFAULT '',
    notes TEXT NOT NULL DEFAULT '',
    total_trades INTEGER NOT NULL DEFAULT 0,
    total_pnl REAL NOT NULL DEFAULT 0.0,
    win_rate REAL NOT NULL DEFAULT 0.0,
    avg_position_size REAL NOT NULL DEFAULT 0.0,
    detected_strategy TEXT NOT NULL DEFAULT 'unknown',
    last_analyzed INTEGER,
    tracked_since INTEGER DEFAULT (strftime('%s', 'now')),
    is_favorite INTEGER NOT NULL DEFAULT 0
);

-- ========== INDEXES ==========

CREATE INDEX IF NOT EXISTS idx_strategies_created ON strategies(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_backtests_strategy ON backtest_results(strategy_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_backtests_hash ON backtest_results(strategy_hash, token_id);
CREATE INDEX IF NOT EXISTS idx_tracked_since ON tracked_traders(tracked_since DESC)
"#;

/// Additive column migrations for databases created by earlier versions
pub const MIGRATIONS: &[&str] = &[
    "ALTER TABLE tracked_traders ADD COLUMN is_favorite INTEGER NOT NULL DEFAULT 0",
];

/// Split a schema script into executable statements, dropping `--` comment lines
pub fn statements(script: &str) -> Vec<String> {
    script
        .split(';')
        .map(|statement| {
            statement
                .lines()
                .filter(|line| !line.trim_start().starts_with("--"))
                .collect::<Vec<_>>()
                .join("\n")
                .trim()
                .to_string()
        })
        .filter(|sql| !sql.is_empty())
        .collect()
}

/// Re-running an `ADD COLUMN` migration fails this way and is harmless
pub fn is_duplicate_column(err: &sqlx::Error) -> bool {
    err.to_string().contains("duplicate column name")
}
