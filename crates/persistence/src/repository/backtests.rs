//! Backtest results repository

use crate::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A completed backtest; curves and trades are JSON array text
#[derive(Debug, Clone, Default, Serialize, Deserialize, FromRow)]
pub struct BacktestRecord {
    pub id: i64,
    pub strategy_id: i64,
    pub token_id: String,
    pub market_name: String,
    pub strategy_hash: String,
    pub equity_curve: String,
    pub timestamps: String,
    pub prices: String,
    pub trades: String,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_pnl: f64,
    pub roi_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub total_trades: i64,
    pub winning_trades: i64,
    pub losing_trades: i64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub profit_factor: f64,
    pub max_consecutive_wins: i64,
    pub max_consecutive_losses: i64,
    pub data_points: i64,
    pub duration_seconds: f64,
    pub created_at: Option<i64>,
}

/// Headline numbers of a backtest for listings
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BacktestSummary {
    pub id: i64,
    pub strategy_id: i64,
    pub token_id: String,
    pub market_name: String,
    pub total_pnl: f64,
    pub roi_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub win_rate_pct: f64,
    pub total_trades: i64,
    pub created_at: Option<i64>,
}

/// Equity curve of a strategy's most recent backtest, JSON array text
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LatestCurve {
    pub strategy_id: i64,
    pub market_name: String,
    pub equity_curve: String,
    pub timestamps: String,
}

/// Repository for backtest results
pub struct BacktestRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> BacktestRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a result; `id` and `created_at` of the record are ignored
    pub async fn save(&self, record: &BacktestRecord) -> DbResult<BacktestRecord> {
        let result = sqlx::query(
            r#"
            INSERT INTO backtest_results (
                strategy_id, token_id, market_name, strategy_hash,
                equity_curve, timestamps, prices, trades,
                initial_capital, final_equity,
                total_pnl, roi_pct, sharpe_ratio, max_drawdown_pct, win_rate_pct,
                total_trades, winning_trades, losing_trades, avg_win, avg_loss,
                profit_factor, max_consecutive_wins, max_consecutive_losses,
                data_points, duration_seconds
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.strategy_id)
        .bind(&record.token_id)
        .bind(&record.market_name)
        .bind(&record.strategy_hash)
        .bind(&record.equity_curve)
        .bind(&record.timestamps)
        .bind(&record.prices)
        .bind(&record.trades)
        .bind(record.initial_capital)
        .bind(record.final_equity)
        .bind(record.total_pnl)
        .bind(record.roi_pct)
        .bind(record.sharpe_ratio)
        .bind(record.max_drawdown_pct)
        .bind(record.win_rate_pct)
        .bind(record.total_trades)
        .bind(record.winning_trades)
        .bind(record.losing_trades)
        .bind(record.avg_win)
        .bind(record.avg_loss)
        .bind(record.profit_factor)
        .bind(record.max_consecutive_wins)
        .bind(record.max_consecutive_losses)
        .bind(record.data_points)
        .bind(record.duration_seconds)
        .execute(self.pool)
        .await?;

        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> DbResult<BacktestRecord> {
        sqlx::query_as::<_, BacktestRecord>("SELECT * FROM backtest_results WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(DbError::NotFound("Backtest"))
    }

    /// Newest first, optionally restricted to one strategy
    pub async fn list(
        &self,
        strategy_id: Option<i64>,
        skip: i64,
        limit: i64,
    ) -> DbResult<Vec<BacktestSummary>> {
        let records = sqlx::query_as::<_, BacktestSummary>(
            r#"SELECT id, strategy_id, token_id, market_name, total_pnl, roi_pct, sharpe_ratio,
                      max_drawdown_pct, win_rate_pct, total_trades, created_at
               FROM backtest_results
               WHERE ?1 IS NULL OR strategy_id = ?1
               ORDER BY created_at DESC, id DESC
               LIMIT ?2 OFFSET ?3"#,
        )
        .bind(strategy_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Every stored backtest, newest first
    pub async fn all(&self) -> DbResult<Vec<BacktestSummary>> {
        // LIMIT -1 is unbounded in SQLite
        self.list(None, 0, -1).await
    }

    /// The newest backtest of each strategy, newest first
    pub async fn latest_curves(&self) -> DbResult<Vec<LatestCurve>> {
        let curves = sqlx::query_as::<_, LatestCurve>(
            r#"SELECT b.strategy_id, b.market_name, b.equity_curve, b.timestamps
               FROM backtest_results b
               WHERE b.id = (
                   SELECT x.id FROM backtest_results x
                   WHERE x.strategy_id = b.strategy_id
                   ORDER BY x.created_at DESC, x.id DESC
                   LIMIT 1
               )
               ORDER BY b.created_at DESC, b.id DESC"#,
        )
        .fetch_all(self.pool)
        .await?;

        Ok(curves)
    }

    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM backtest_results WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("Backtest"));
        }
        Ok(())
    }
}
