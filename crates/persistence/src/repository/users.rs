//! User accounts repository

use crate::DbResult;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    /// Unix timestamp (seconds)
    pub joined_at: i64,
}

/// Repository for user accounts
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a new account. Fails on duplicate username (UNIQUE constraint).
    pub async fn create(&self, username: &str, password_hash: &str) -> DbResult<i64> {
        let result = sqlx::query("INSERT INTO users (username, password_hash) VALUES (?1, ?2)")
            .bind(username)
            .bind(password_hash)
            .execute(self.pool)
            .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn find_by_username(&self, username: &str) -> DbResult<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, password_hash, joined_at FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }

    pub async fn find_by_id(&self, id: i64) -> DbResult<Option<UserRecord>> {
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, username, password_hash, joined_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(self.pool)
        .await?;

        Ok(record)
    }
}
