//! Session tokens repository

use crate::DbResult;
use sqlx::SqlitePool;

/// Repository for server-side bearer session tokens
pub struct SessionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SessionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Store a freshly issued token for a user
    pub async fn create(&self, token: &str, user_id: i64) -> DbResult<()> {
        sqlx::query("INSERT INTO sessions (token, user_id) VALUES (?1, ?2)")
            .bind(token)
            .bind(user_id)
            .execute(self.pool)
            .await?;

        Ok(())
    }

    /// Resolve a presented token to the owning user id
    pub async fn find_user_id(&self, token: &str) -> DbResult<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT user_id FROM sessions WHERE token = ?1")
                .bind(token)
                .fetch_optional(self.pool)
                .await?;

        Ok(row.map(|(id,)| id))
    }

    /// Delete a token (logout). Returns true if a session was removed.
    pub async fn delete(&self, token: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::UserRepository;
    use crate::Database;

    #[tokio::test]
    async fn create_resolve_delete() {
        let db = Database::in_memory().await.unwrap();
        let user_id = UserRepository::new(db.pool())
            .create("alice", "hash")
            .await
            .unwrap();
        let repo = SessionRepository::new(db.pool());

        repo.create("tok-1", user_id).await.unwrap();
        assert_eq!(repo.find_user_id("tok-1").await.unwrap(), Some(user_id));
        assert_eq!(repo.find_user_id("tok-2").await.unwrap(), None);

        assert!(repo.delete("tok-1").await.unwrap());
        assert_eq!(repo.find_user_id("tok-1").await.unwrap(), None);
        assert!(!repo.delete("tok-1").await.unwrap());
    }
}
