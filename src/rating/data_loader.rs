use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use std::collections::HashMap;
use std::path::Path;

use super::aggregator::{RatingStats, RatingValue};
use super::store::RatingRecord;

const RECIPE_ID_COL: &str = "recipe_id";
const USER_ID_COL: &str = "user_id";
const RATING_COL: &str = "rating";
const UPDATED_AT_COL: &str = "updated_at";
const RATING_COUNT_COL: &str = "rating_count";
const RATING_SUM_COL: &str = "rating_sum";

fn column_index(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| anyhow::anyhow!("Column '{}' not found", name))
}

fn required_field<'a>(record: &'a StringRecord, idx: usize, name: &str, row: usize) -> Result<&'a str> {
    let value = record.get(idx).map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Err(anyhow::anyhow!("Missing {} at row {}", name, row));
    }
    Ok(value)
}

fn open_reader(csv_path: &Path, kind: &str) -> Result<csv::Reader<std::fs::File>> {
    if !csv_path.exists() {
        return Err(anyhow::anyhow!("{} CSV file not found at: {:?}", kind, csv_path));
    }
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open {} CSV file at {:?}", kind, csv_path))?;
    Ok(ReaderBuilder::new().has_headers(true).from_reader(file))
}

/// Loads individual ratings: `recipe_id,user_id,rating[,updated_at]`.
///
/// `updated_at` is RFC 3339; rows without it are stamped with the load time.
pub fn load_rating_records(csv_path: &Path) -> Result<Vec<RatingRecord>> {
    let mut rdr = open_reader(csv_path, "Ratings")?;
    let headers = rdr.headers()?.clone();

    let recipe_idx = column_index(&headers, RECIPE_ID_COL)?;
    let user_idx = column_index(&headers, USER_ID_COL)?;
    let rating_idx = column_index(&headers, RATING_COL)?;
    let updated_idx = column_index(&headers, UPDATED_AT_COL).ok();
    let loaded_at = Utc::now();

    let mut records = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read record at row index {}", row_index))?;

        let recipe_id = required_field(&record, recipe_idx, RECIPE_ID_COL, row_index)?;
        let user_id = required_field(&record, user_idx, USER_ID_COL, row_index)?;
        let raw_rating = required_field(&record, rating_idx, RATING_COL, row_index)?;
        let rating = raw_rating
            .parse::<i64>()
            .with_context(|| format!("Invalid rating '{}' at row {}", raw_rating, row_index))
            .and_then(|value| {
                RatingValue::new(value).with_context(|| format!("Rejected rating at row {}", row_index))
            })?;

        let updated_at = match updated_idx.and_then(|idx| record.get(idx)).map(str::trim) {
            Some(raw) if !raw.is_empty() => DateTime::parse_from_rfc3339(raw)
                .with_context(|| format!("Invalid updated_at '{}' at row {}", raw, row_index))?
                .with_timezone(&Utc),
            _ => loaded_at,
        };

        records.push(RatingRecord {
            recipe_id: recipe_id.to_string(),
            user_id: user_id.to_string(),
            rating,
            updated_at,
        });
    }

    Ok(records)
}

/// Loads stored aggregate counters: `recipe_id,rating_count,rating_sum`.
pub fn load_stored_stats(csv_path: &Path) -> Result<HashMap<String, RatingStats>> {
    let mut rdr = open_reader(csv_path, "Recipe stats")?;
    let headers = rdr.headers()?.clone();

    let recipe_idx = column_index(&headers, RECIPE_ID_COL)?;
    let count_idx = column_index(&headers, RATING_COUNT_COL)?;
    let sum_idx = column_index(&headers, RATING_SUM_COL)?;

    let mut stats = HashMap::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read record at row index {}", row_index))?;

        let recipe_id = required_field(&record, recipe_idx, RECIPE_ID_COL, row_index)?;
        let rating_count = required_field(&record, count_idx, RATING_COUNT_COL, row_index)?
            .parse::<u64>()
            .with_context(|| format!("Invalid rating_count at row {}", row_index))?;
        let rating_sum = required_field(&record, sum_idx, RATING_SUM_COL, row_index)?
            .parse::<u64>()
            .with_context(|| format!("Invalid rating_sum at row {}", row_index))?;

        stats.insert(recipe_id.to_string(), RatingStats::new(rating_count, rating_sum));
    }

    Ok(stats)
}
