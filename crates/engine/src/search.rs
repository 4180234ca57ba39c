//! Aggregation query service
//!
//! Given a free-text condition, ranks the drugs prescribed for matching
//! records by how many records back them, and reports each drug's share
//! of the returned set plus its mean rating. Successful searches append
//! one entry to the calling user's history.

use crate::text::title_case;
use persistence::repository::{HistoryRepository, PrescriptionRepository};
use persistence::{DbError, SqlitePool};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Minimum record count for a drug to qualify for results
pub const SUPPORT_THRESHOLD: i64 = 5;

/// Maximum number of drugs returned per search
pub const RESULT_CAP: i64 = 12;

/// One ranked drug in a search response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrugResult {
    pub drug: String,
    /// Number of records backing this drug (>= SUPPORT_THRESHOLD)
    pub patients: i64,
    /// Share of the returned set, one decimal, 0–100
    pub percentage: f64,
    /// Mean rating, one decimal
    pub rating: f64,
}

/// Successful search response
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    /// Title-cased echo of the searched condition
    pub sickness: String,
    pub total_patients: i64,
    pub drugs: Vec<DrugResult>,
}

#[derive(Debug, Error)]
pub enum SearchError {
    /// Input was empty after trimming. User-correctable; nothing is logged
    /// or persisted.
    #[error("empty search input")]
    EmptyQuery,

    /// No drug met the support threshold for this condition. A normal
    /// outcome, not a fault; nothing is persisted.
    #[error("no drugs matched the condition")]
    NoMatches,

    /// The underlying store failed. Single attempt, surfaced immediately.
    #[error(transparent)]
    Store(#[from] DbError),

    #[error("failed to serialize results: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Run one search for an authenticated user.
///
/// Identity is always an explicit parameter; on success exactly one
/// history entry is written for `user_id`. Percentages are computed over
/// the capped, filtered result set, so they sum to 100 across the
/// returned drugs.
pub async fn run_search(
    pool: &SqlitePool,
    user_id: i64,
    raw_condition: &str,
) -> Result<SearchResponse, SearchError> {
    let condition = raw_condition.trim();
    if condition.is_empty() {
        return Err(SearchError::EmptyQuery);
    }

    let groups = PrescriptionRepository::new(pool)
        .aggregate_by_condition(condition, SUPPORT_THRESHOLD, RESULT_CAP)
        .await?;

    if groups.is_empty() {
        return Err(SearchError::NoMatches);
    }

    let total: i64 = groups.iter().map(|g| g.patients).sum();
    let drugs: Vec<DrugResult> = groups
        .into_iter()
        .map(|g| DrugResult {
            drug: g.drug_name,
            patients: g.patients,
            percentage: round1(g.patients as f64 / total as f64 * 100.0),
            rating: g.rating,
        })
        .collect();

    let results_json = serde_json::to_string(&drugs)?;
    HistoryRepository::new(pool)
        .insert(user_id, condition, &results_json)
        .await?;

    info!(user_id, condition, drugs = drugs.len(), total, "search completed");

    Ok(SearchResponse {
        sickness: title_case(condition),
        total_patients: total,
        drugs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use persistence::repository::{PrescriptionRow, UserRepository};
    use persistence::Database;

    async fn setup() -> (Database, i64) {
        let db = Database::in_memory().await.unwrap();
        let user_id = UserRepository::new(db.pool())
            .create("tester", "hash")
            .await
            .unwrap();
        (db, user_id)
    }

    async fn seed(db: &Database, rows: &[(&str, &str, f64)]) {
        let rows: Vec<PrescriptionRow> = rows
            .iter()
            .map(|(drug, condition, rating)| PrescriptionRow {
                drug_name: drug.to_string(),
                condition: condition.to_string(),
                rating: *rating,
            })
            .collect();
        PrescriptionRepository::new(db.pool())
            .replace_all(&rows)
            .await
            .unwrap();
    }

    fn migraine_dataset() -> Vec<(&'static str, &'static str, f64)> {
        let mut rows = Vec::new();
        for r in [9.0, 8.0, 9.0, 7.0, 8.0, 9.0, 8.0, 9.0] {
            rows.push(("Sumatriptan", "Migraine", r));
        }
        for r in [6.0, 6.0, 7.0, 6.0, 6.0] {
            rows.push(("Ibuprofen", "Migraine", r));
        }
        rows
    }

    #[tokio::test]
    async fn migraine_example_matches_expected_numbers() {
        let (db, user_id) = setup().await;
        seed(&db, &migraine_dataset()).await;

        let response = run_search(db.pool(), user_id, "migraine").await.unwrap();

        assert_eq!(response.sickness, "Migraine");
        assert_eq!(response.total_patients, 13);
        assert_eq!(response.drugs.len(), 2);

        let top = &response.drugs[0];
        assert_eq!(top.drug, "Sumatriptan");
        assert_eq!(top.patients, 8);
        assert_eq!(top.percentage, 61.5);
        assert_eq!(top.rating, 8.4);

        let second = &response.drugs[1];
        assert_eq!(second.drug, "Ibuprofen");
        assert_eq!(second.patients, 5);
        assert_eq!(second.percentage, 38.5);
        assert_eq!(second.rating, 6.2);
    }

    #[tokio::test]
    async fn percentages_cover_the_returned_set() {
        let (db, user_id) = setup().await;
        let mut rows = Vec::new();
        for (drug, n) in [("A", 9), ("B", 7), ("C", 5)] {
            for _ in 0..n {
                rows.push((drug, "Acne", 5.0));
            }
        }
        seed(&db, &rows).await;

        let response = run_search(db.pool(), user_id, "acne").await.unwrap();
        let sum: f64 = response.drugs.iter().map(|d| d.percentage).sum();
        assert!((sum - 100.0).abs() < 0.1, "percentages sum to {sum}");
    }

    #[tokio::test]
    async fn results_are_sorted_by_patients_descending() {
        let (db, user_id) = setup().await;
        let mut rows = Vec::new();
        for (drug, n) in [("Low", 5), ("High", 11), ("Mid", 8)] {
            for _ in 0..n {
                rows.push((drug, "Eczema", 6.0));
            }
        }
        seed(&db, &rows).await;

        let response = run_search(db.pool(), user_id, "eczema").await.unwrap();
        let counts: Vec<i64> = response.drugs.iter().map(|d| d.patients).collect();
        assert_eq!(counts, vec![11, 8, 5]);
    }

    #[tokio::test]
    async fn empty_input_is_rejected_without_side_effects() {
        let (db, user_id) = setup().await;
        seed(&db, &migraine_dataset()).await;

        for input in ["", "   ", "\t\n"] {
            let err = run_search(db.pool(), user_id, input).await.unwrap_err();
            assert!(matches!(err, SearchError::EmptyQuery));
        }

        let history = HistoryRepository::new(db.pool());
        assert_eq!(history.count_for_user(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unmatched_condition_is_not_found_and_writes_nothing() {
        let (db, user_id) = setup().await;
        seed(&db, &migraine_dataset()).await;

        let err = run_search(db.pool(), user_id, "lycanthropy")
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NoMatches));

        // Below the support threshold is also "not found"
        seed(&db, &[("X", "Gout", 5.0); 4]).await;
        let err = run_search(db.pool(), user_id, "gout").await.unwrap_err();
        assert!(matches!(err, SearchError::NoMatches));

        let history = HistoryRepository::new(db.pool());
        assert_eq!(history.count_for_user(user_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn success_writes_exactly_one_matching_history_entry() {
        let (db, user_id) = setup().await;
        seed(&db, &migraine_dataset()).await;

        let response = run_search(db.pool(), user_id, "  migraine ").await.unwrap();

        let history = HistoryRepository::new(db.pool());
        let entries = history.list_for_user(user_id).await.unwrap();
        assert_eq!(entries.len(), 1);
        // Stored as trimmed input, not title-cased
        assert_eq!(entries[0].sickness, "migraine");

        let stored: Vec<DrugResult> = serde_json::from_str(&entries[0].results_json).unwrap();
        assert_eq!(stored, response.drugs);
    }

    #[tokio::test]
    async fn repeated_query_is_idempotent_on_unchanged_data() {
        let (db, user_id) = setup().await;
        seed(&db, &migraine_dataset()).await;

        let first = run_search(db.pool(), user_id, "migraine").await.unwrap();
        let second = run_search(db.pool(), user_id, "migraine").await.unwrap();

        assert_eq!(first.total_patients, second.total_patients);
        assert_eq!(first.drugs, second.drugs);
    }

    #[test]
    fn round1_rounds_half_away_from_zero() {
        assert_eq!(round1(61.538), 61.5);
        assert_eq!(round1(38.45), 38.5);
        assert_eq!(round1(0.05), 0.1);
        assert_eq!(round1(99.96), 100.0);
    }
}
