//! Strategies repository — user-authored strategy code and parameters

use crate::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A persisted strategy
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StrategyRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub code: String,
    /// JSON object text
    pub params: String,
    pub template_key: Option<String>,
    pub is_active: bool,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

impl StrategyRecord {
    /// Stored params, or an empty object if the text is not valid JSON
    pub fn params_json(&self) -> serde_json::Value {
        serde_json::from_str(&self.params)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }
}

/// Fields of a strategy to create
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewStrategy {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub code: String,
    #[serde(default = "empty_object")]
    pub params: serde_json::Value,
    #[serde(default)]
    pub template_key: Option<String>,
    #[serde(default)]
    pub is_active: bool,
}

/// Partial update; `None` fields are left unchanged
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
    pub params: Option<serde_json::Value>,
    pub is_active: Option<bool>,
}

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(Default::default())
}

/// Repository for strategies
pub struct StrategyRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> StrategyRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, strategy: &NewStrategy) -> DbResult<StrategyRecord> {
        let result = sqlx::query(
            r#"INSERT INTO strategies (name, description, code, params, template_key, is_active)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        )
        .bind(&strategy.name)
        .bind(&strategy.description)
        .bind(&strategy.code)
        .bind(serde_json::to_string(&strategy.params)?)
        .bind(&strategy.template_key)
        .bind(strategy.is_active)
        .execute(self.pool)
        .await?;

        self.get(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> DbResult<StrategyRecord> {
        sqlx::query_as::<_, StrategyRecord>("SELECT * FROM strategies WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?
            .ok_or(DbError::NotFound("Strategy"))
    }

    /// Newest first
    pub async fn list(&self, skip: i64, limit: i64) -> DbResult<Vec<StrategyRecord>> {
        let records = sqlx::query_as::<_, StrategyRecord>(
            "SELECT * FROM strategies ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(skip)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    pub async fn update(&self, id: i64, update: &StrategyUpdate) -> DbResult<StrategyRecord> {
        let current = self.get(id).await?;

        let params = match &update.params {
            Some(params) => serde_json::to_string(params)?,
            None => current.params,
        };

        sqlx::query(
            r#"UPDATE strategies
               SET name = ?1, description = ?2, code = ?3, params = ?4, is_active = ?5,
                   updated_at = strftime('%s', 'now')
               WHERE id = ?6"#,
        )
        .bind(update.name.as_ref().unwrap_or(&current.name))
        .bind(update.description.as_ref().unwrap_or(&current.description))
        .bind(update.code.as_ref().unwrap_or(&current.code))
        .bind(params)
        .bind(update.is_active.unwrap_or(current.is_active))
        .bind(id)
        .execute(self.pool)
        .await?;

        self.get(id).await
    }

    /// Delete a strategy together with its backtest results
    pub async fn delete(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM backtest_results WHERE strategy_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM strategies WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(DbError::NotFound("Strategy"));
        }
        tx.commit().await?;
        Ok(())
    }
}
