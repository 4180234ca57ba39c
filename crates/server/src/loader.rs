//! One-shot CSV bulk loader for drugs.com-style review exports.
//!
//! Reads `drugName`, `condition` and `rating` out of each file, strips
//! stray HTML fragments from the condition column and drops rows with
//! missing fields. The cleaned rows replace the prescriptions table in a
//! single transaction.

use anyhow::{Context, Result};
use persistence::repository::PrescriptionRow;
use regex::Regex;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

/// Raw CSV row; extra columns (review text, date, votes) are ignored
#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "drugName")]
    drug_name: Option<String>,
    condition: Option<String>,
    rating: Option<f64>,
}

/// Counters reported after reading the input files
#[derive(Debug, Default)]
pub struct LoadSummary {
    pub parsed: usize,
    pub skipped: usize,
}

/// Read and clean prescription rows from one or more CSV files
pub fn read_records(paths: &[impl AsRef<Path>]) -> Result<(Vec<PrescriptionRow>, LoadSummary)> {
    let tag_re = Regex::new(r"<.*?>").context("invalid tag pattern")?;

    let mut rows = Vec::new();
    let mut summary = LoadSummary::default();

    for path in paths {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open {}", path.display()))?;

        let before = rows.len();
        for record in reader.deserialize::<RawRecord>() {
            let record = match record {
                Ok(r) => r,
                Err(_) => {
                    summary.skipped += 1;
                    continue;
                }
            };

            let (Some(drug_name), Some(condition), Some(rating)) =
                (record.drug_name, record.condition, record.rating)
            else {
                summary.skipped += 1;
                continue;
            };

            let condition = tag_re.replace_all(&condition, "").trim().to_string();
            // "nan" shows up where the source export had no condition at all
            if drug_name.is_empty() || condition.is_empty() || condition.eq_ignore_ascii_case("nan")
            {
                summary.skipped += 1;
                continue;
            }

            rows.push(PrescriptionRow {
                drug_name,
                condition,
                rating,
            });
        }

        info!(
            file = %path.display(),
            rows = rows.len() - before,
            "read input file"
        );
    }

    summary.parsed = rows.len();
    Ok((rows, summary))
}
