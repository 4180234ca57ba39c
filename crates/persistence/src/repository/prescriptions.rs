//! Prescriptions repository — the read side of the drug search

use crate::DbResult;
use sqlx::{FromRow, SqlitePool};

/// A single raw prescription observation (bulk-load input)
#[derive(Debug, Clone)]
pub struct PrescriptionRow {
    pub drug_name: String,
    pub condition: String,
    pub rating: f64,
}

/// One drug's aggregate over all records matching a condition
#[derive(Debug, Clone, FromRow)]
pub struct DrugAggregate {
    pub drug_name: String,
    /// Number of records backing this drug for the condition
    pub patients: i64,
    /// Mean rating, already rounded to one decimal by SQLite
    pub rating: f64,
}

/// Repository for the bulk-loaded prescription records
pub struct PrescriptionRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> PrescriptionRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Group records whose condition contains the given text (case-insensitive),
    /// keep groups with at least `min_support` records, rank by count descending
    /// and cap at `limit`. This is the only serving-time query shape.
    pub async fn aggregate_by_condition(
        &self,
        condition: &str,
        min_support: i64,
        limit: i64,
    ) -> DbResult<Vec<DrugAggregate>> {
        let pattern = format!("%{condition}%");

        let records = sqlx::query_as::<_, DrugAggregate>(
            r#"
            SELECT drug_name, COUNT(*) AS patients, ROUND(AVG(rating), 1) AS rating
            FROM prescriptions
            WHERE LOWER(condition) LIKE LOWER(?1)
            GROUP BY drug_name
            HAVING COUNT(*) >= ?2
            ORDER BY patients DESC
            LIMIT ?3
            "#,
        )
        .bind(&pattern)
        .bind(min_support)
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(records)
    }

    /// Total number of loaded records
    pub async fn count_all(&self) -> DbResult<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM prescriptions")
            .fetch_one(self.pool)
            .await?;

        Ok(row.0)
    }

    /// Replace the table contents with a freshly loaded dataset.
    /// Runs in a single transaction so a failed load leaves the old data intact.
    /// Returns the number of inserted rows.
    pub async fn replace_all(&self, rows: &[PrescriptionRow]) -> DbResult<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM prescriptions")
            .execute(&mut *tx)
            .await?;

        let mut inserted = 0u64;
        for row in rows {
            sqlx::query(
                "INSERT INTO prescriptions (drug_name, condition, rating) VALUES (?1, ?2, ?3)",
            )
            .bind(&row.drug_name)
            .bind(&row.condition)
            .bind(row.rating)
            .execute(&mut *tx)
            .await?;
            inserted += 1;
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Database;

    fn row(drug: &str, condition: &str, rating: f64) -> PrescriptionRow {
        PrescriptionRow {
            drug_name: drug.to_string(),
            condition: condition.to_string(),
            rating,
        }
    }

    #[tokio::test]
    async fn aggregate_groups_and_ranks_by_count() {
        let db = Database::in_memory().await.unwrap();
        let repo = PrescriptionRepository::new(db.pool());

        let mut rows = Vec::new();
        for _ in 0..8 {
            rows.push(row("Sumatriptan", "Migraine", 8.0));
        }
        for _ in 0..5 {
            rows.push(row("Ibuprofen", "Migraine", 6.0));
        }
        repo.replace_all(&rows).await.unwrap();

        let aggs = repo.aggregate_by_condition("migraine", 5, 12).await.unwrap();
        assert_eq!(aggs.len(), 2);
        assert_eq!(aggs[0].drug_name, "Sumatriptan");
        assert_eq!(aggs[0].patients, 8);
        assert_eq!(aggs[1].drug_name, "Ibuprofen");
        assert_eq!(aggs[1].patients, 5);
    }

    #[tokio::test]
    async fn aggregate_enforces_support_threshold() {
        let db = Database::in_memory().await.unwrap();
        let repo = PrescriptionRepository::new(db.pool());

        let mut rows = Vec::new();
        for _ in 0..4 {
            rows.push(row("Aspirin", "Headache", 7.0));
        }
        for _ in 0..5 {
            rows.push(row("Paracetamol", "Headache", 7.0));
        }
        repo.replace_all(&rows).await.unwrap();

        let aggs = repo.aggregate_by_condition("headache", 5, 12).await.unwrap();
        assert_eq!(aggs.len(), 1);
        assert_eq!(aggs[0].drug_name, "Paracetamol");
    }

    #[tokio::test]
    async fn aggregate_matches_substring_case_insensitively() {
        let db = Database::in_memory().await.unwrap();
        let repo = PrescriptionRepository::new(db.pool());

        let rows: Vec<_> = (0..5)
            .map(|_| row("Lisinopril", "High Blood Pressure", 8.0))
            .collect();
        repo.replace_all(&rows).await.unwrap();

        let aggs = repo
            .aggregate_by_condition("blood pressure", 5, 12)
            .await
            .unwrap();
        assert_eq!(aggs.len(), 1);

        let aggs = repo.aggregate_by_condition("BLOOD", 5, 12).await.unwrap();
        assert_eq!(aggs.len(), 1);
    }

    #[tokio::test]
    async fn aggregate_caps_result_count() {
        let db = Database::in_memory().await.unwrap();
        let repo = PrescriptionRepository::new(db.pool());

        let mut rows = Vec::new();
        for d in 0..15 {
            for _ in 0..(5 + d) {
                rows.push(row(&format!("Drug{d}"), "Acne", 5.0));
            }
        }
        repo.replace_all(&rows).await.unwrap();

        let aggs = repo.aggregate_by_condition("acne", 5, 12).await.unwrap();
        assert_eq!(aggs.len(), 12);
        // Highest-support drug comes first
        assert_eq!(aggs[0].drug_name, "Drug14");
        assert_eq!(aggs[0].patients, 19);
    }

    #[tokio::test]
    async fn aggregate_rounds_mean_rating_to_one_decimal() {
        let db = Database::in_memory().await.unwrap();
        let repo = PrescriptionRepository::new(db.pool());

        let ratings = [9.0, 8.0, 9.0, 7.0, 8.0, 9.0, 8.0, 9.0]; // mean 8.375
        let rows: Vec<_> = ratings
            .iter()
            .map(|&r| row("Sumatriptan", "Migraine", r))
            .collect();
        repo.replace_all(&rows).await.unwrap();

        let aggs = repo.aggregate_by_condition("migraine", 5, 12).await.unwrap();
        assert_eq!(aggs[0].rating, 8.4);
    }

    #[tokio::test]
    async fn replace_all_swaps_dataset() {
        let db = Database::in_memory().await.unwrap();
        let repo = PrescriptionRepository::new(db.pool());

        repo.replace_all(&[row("A", "Flu", 5.0)]).await.unwrap();
        assert_eq!(repo.count_all().await.unwrap(), 1);

        let inserted = repo
            .replace_all(&[row("B", "Flu", 5.0), row("C", "Flu", 6.0)])
            .await
            .unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(repo.count_all().await.unwrap(), 2);
    }
}
