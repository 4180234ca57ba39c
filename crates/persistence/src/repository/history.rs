//! Search history repository — append-only, scoped to the owning user

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A persisted search and its result snapshot
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HistoryRecord {
    pub id: i64,
    pub user_id: i64,
    pub sickness: String,
    /// Serialized list of drug results as returned to the user
    pub results_json: String,
    /// Unix timestamp (seconds)
    pub timestamp: i64,
}

/// Repository for per-user search history. Exposes insert and list only —
/// entries are never updated or deleted.
pub struct HistoryRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> HistoryRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Append one history entry for a successful search
    pub async fn insert(
        &self,
        user_id: i64,
        sickness: &str,
        results_json: &str,
    ) -> DbResult<i64> {
        let result = sqlx::query(
            "INSERT INTO history (user_id, sickness, results_json) VALUES (?1, ?2, ?3)",
        )
        .bind(user_id)
        .bind(sickness)
        .bind(results_json)
        .execute(self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// All entries for one user, newest first
    pub async fn list_for_user(&self, user_id: i64) -> DbResult<Vec<HistoryRecord>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            r#"SELECT id, user_id, sickness, results_json, timestamp
               FROM history
               WHERE user_id = ?1
               ORDER BY timestamp DESC, id DESC"#,
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Number of entries for one user
    pub async fn count_for_user(&self, user_id: i64) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM history WHERE user_id = ?1")
            .bind(user_id)
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }
}
