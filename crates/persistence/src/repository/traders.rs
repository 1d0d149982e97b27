//! Tracked traders repository — followed addresses and their last analysis

use crate::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrackedTraderRecord {
    pub id: i64,
    pub address: String,
    pub alias: String,
    pub notes: String,
    pub total_trades: i64,
    pub total_pnl: f64,
    pub win_rate: f64,
    pub avg_position_size: f64,
    pub detected_strategy: String,
    pub last_analyzed: Option<i64>,
    pub tracked_since: Option<i64>,
    pub is_favorite: bool,
}

/// Analysis numbers recorded for a tracked trader
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraderSnapshot {
    pub total_trades: i64,
    pub total_pnl: f64,
    pub win_rate: f64,
    pub avg_position_size: f64,
    pub detected_strategy: String,
}

/// Repository for tracked traders
pub struct TrackedTraderRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TrackedTraderRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Start tracking an address; tracking it twice is a conflict
    pub async fn track(&self, address: &str, alias: &str, notes: &str) -> DbResult<TrackedTraderRecord> {
        let address = address.to_lowercase();
        let result = sqlx::query("INSERT INTO tracked_traders (address, alias, notes) VALUES (?1, ?2, ?3)")
            .bind(&address)
            .bind(alias)
            .bind(notes)
            .execute(self.pool)
            .await;

        match result {
            Ok(_) => {
                debug!(address = %address, "Tracking trader");
                self.get(&address).await
            }
            Err(e) => {
                let err = DbError::from(e);
                if err.is_unique_violation() {
                    Err(DbError::Conflict("Trader already tracked".to_string()))
                } else {
                    Err(err)
                }
            }
        }
    }

    pub async fn get(&self, address: &str) -> DbResult<TrackedTraderRecord> {
        sqlx::query_as::<_, TrackedTraderRecord>("SELECT * FROM tracked_traders WHERE address = ?")
            .bind(address.to_lowercase())
            .fetch_optional(self.pool)
            .await?
            .ok_or(DbError::NotFound("Tracked trader"))
    }

    /// Favorites first, then most recently tracked
    pub async fn list(&self, skip: i64, limit: i64) -> DbResult<Vec<TrackedTraderRecord>> {
        let records = sqlx::query_as::<_, TrackedTraderRecord>(
            r#"SELECT * FROM tracked_traders
               ORDER BY is_favorite DESC, tracked_since DESC, id DESC
               LIMIT ? OFFSET ?"#,
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn untrack(&self, address: &str) -> DbResult<()> {
        let result = sqlx::query("DELETE FROM tracked_traders WHERE address = ?")
            .bind(address.to_lowercase())
            .execute(self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("Tracked trader"));
        }
        Ok(())
    }

    pub async fn set_favorite(&self, address: &str, is_favorite: bool) -> DbResult<TrackedTraderRecord> {
        let result = sqlx::query("UPDATE tracked_traders SET is_favorite = ?1 WHERE address = ?2")
            .bind(is_favorite)
            .bind(address.to_lowercase())
            .execute(self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("Tracked trader"));
        }
        debug!(address = %address, is_favorite, "Favorite flag updated");
        self.get(address).await
    }

    /// Record the latest analysis and stamp `last_analyzed`
    pub async fn update_snapshot(&self, address: &str, snapshot: &TraderSnapshot) -> DbResult<TrackedTraderRecord> {
        let result = sqlx::query(
            r#"UPDATE tracked_traders
               SET total_trades = ?1, total_pnl = ?2, win_rate = ?3, avg_position_size = ?4,
                   detected_strategy = ?5, last_analyzed = strftime('%s', 'now')
               WHERE address = ?6"#,
        )
        .bind(snapshot.total_trades)
        .bind(snapshot.total_pnl)
        .bind(snapshot.win_rate)
        .bind(snapshot.avg_position_size)
        .bind(&snapshot.detected_strategy)
        .bind(address.to_lowercase())
        .execute(self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::NotFound("Tracked trader"));
        }
        self.get(address).await
    }
}
