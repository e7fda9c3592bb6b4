use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::aggregator::{
    apply_new_rating, apply_rating_update, RatingDisplay, RatingError, RatingPrior, RatingStats,
    RatingValue,
};
use super::audit::{audit_stats, RatingAudit};

/// One user's rating of one recipe. There is at most one per (recipe, user).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRecord {
    pub recipe_id: String,
    pub user_id: String,
    pub rating: RatingValue,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitOutcome {
    pub stats: RatingStats,
    pub created: bool,
    pub previous: Option<RatingValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeRatingSummary {
    pub recipe_id: String,
    pub stats: RatingStats,
    pub simple_average: f64,
    pub weighted_rating: f64,
    pub display: RatingDisplay,
}

impl RecipeRatingSummary {
    pub fn new(recipe_id: &str, stats: RatingStats, prior: &RatingPrior) -> Self {
        let weighted_rating = stats.weighted(prior);
        Self {
            recipe_id: recipe_id.to_string(),
            stats,
            simple_average: stats.simple_average().unwrap_or(0.0),
            weighted_rating,
            display: stats.display(prior),
        }
    }
}

#[derive(Debug, Default)]
struct RecipeRatings {
    stats: RatingStats,
    by_user: HashMap<String, RatingRecord>,
}

/// Ratings for every recipe, with one lock per recipe.
///
/// A submission holds its recipe's lock across the whole read-modify-write of the
/// counters and the user's record, so concurrent raters never lose an update.
#[derive(Debug, Default)]
pub struct RatingStore {
    recipes: RwLock<HashMap<String, Arc<Mutex<RecipeRatings>>>>,
}

impl RatingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a recipe with empty counters. Returns `false` if it already existed.
    pub async fn create_recipe(&self, recipe_id: &str) -> bool {
        let mut recipes = self.recipes.write().await;
        if recipes.contains_key(recipe_id) {
            return false;
        }
        recipes.insert(recipe_id.to_string(), Arc::default());
        true
    }

    async fn entry(&self, recipe_id: &str) -> Result<Arc<Mutex<RecipeRatings>>, RatingError> {
        self.recipes
            .read()
            .await
            .get(recipe_id)
            .cloned()
            .ok_or_else(|| RatingError::UnknownRecipe(recipe_id.to_string()))
    }

    pub async fn submit_rating(
        &self,
        recipe_id: &str,
        user_id: &str,
        rating: i64,
    ) -> Result<SubmitOutcome, RatingError> {
        self.submit_rating_at(recipe_id, user_id, rating, Utc::now())
            .await
    }

    pub async fn submit_rating_at(
        &self,
        recipe_id: &str,
        user_id: &str,
        rating: i64,
        now: DateTime<Utc>,
    ) -> Result<SubmitOutcome, RatingError> {
        let value = RatingValue::new(rating)?;
        let entry = self.entry(recipe_id).await?;
        let mut ratings = entry.lock().await;

        let previous = ratings.by_user.get(user_id).map(|record| record.rating);
        let stats = match previous {
            Some(old) => apply_rating_update(ratings.stats, old, value)?,
            None => apply_new_rating(ratings.stats, value)?,
        };

        ratings.stats = stats;
        ratings.by_user.insert(
            user_id.to_string(),
            RatingRecord {
                recipe_id: recipe_id.to_string(),
                user_id: user_id.to_string(),
                rating: value,
                updated_at: now,
            },
        );

        debug!(
            "Recipe {} rated {} by {} (count={}, sum={})",
            recipe_id, value, user_id, stats.rating_count, stats.rating_sum
        );

        Ok(SubmitOutcome {
            stats,
            created: previous.is_none(),
            previous,
        })
    }

    /// Loads existing records through the normal submission path, creating recipes as needed.
    /// Later records for the same user replace earlier ones.
    pub async fn import(&self, records: &[RatingRecord]) -> Result<usize, RatingError> {
        for record in records {
            self.create_recipe(&record.recipe_id).await;
            self.submit_rating_at(
                &record.recipe_id,
                &record.user_id,
                record.rating.get() as i64,
                record.updated_at,
            )
            .await?;
        }
        Ok(records.len())
    }

    pub async fn stats(&self, recipe_id: &str) -> Result<RatingStats, RatingError> {
        let entry = self.entry(recipe_id).await?;
        let stats = entry.lock().await.stats;
        Ok(stats)
    }

    /// Current records for a recipe, ordered by user id.
    pub async fn records(&self, recipe_id: &str) -> Result<Vec<RatingRecord>, RatingError> {
        let entry = self.entry(recipe_id).await?;
        let ratings = entry.lock().await;
        let mut records: Vec<RatingRecord> = ratings.by_user.values().cloned().collect();
        records.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(records)
    }

    pub async fn summary(
        &self,
        recipe_id: &str,
        prior: &RatingPrior,
    ) -> Result<RecipeRatingSummary, RatingError> {
        let stats = self.stats(recipe_id).await?;
        Ok(RecipeRatingSummary::new(recipe_id, stats, prior))
    }

    /// Cross-checks a recipe's counters against its individual records.
    pub async fn audit(&self, recipe_id: &str, prior: &RatingPrior) -> Result<RatingAudit, RatingError> {
        let entry = self.entry(recipe_id).await?;
        let ratings = entry.lock().await;
        let records: Vec<RatingRecord> = ratings.by_user.values().cloned().collect();
        Ok(audit_stats(recipe_id, ratings.stats, &records, prior))
    }

    async fn snapshot(&self) -> Vec<(String, RatingStats)> {
        let entries: Vec<(String, Arc<Mutex<RecipeRatings>>)> = self
            .recipes
            .read()
            .await
            .iter()
            .map(|(id, entry)| (id.clone(), Arc::clone(entry)))
            .collect();

        let mut snapshot = Vec::with_capacity(entries.len());
        for (id, entry) in entries {
            let stats = entry.lock().await.stats;
            snapshot.push((id, stats));
        }
        snapshot
    }

    /// Every recipe, best first: weighted rating, then number of ratings, then id.
    pub async fn catalog(&self, prior: &RatingPrior) -> Vec<RecipeRatingSummary> {
        let mut catalog: Vec<RecipeRatingSummary> = self
            .snapshot()
            .await
            .into_iter()
            .map(|(id, stats)| RecipeRatingSummary::new(&id, stats, prior))
            .collect();

        catalog.sort_by(|a, b| {
            b.weighted_rating
                .total_cmp(&a.weighted_rating)
                .then_with(|| b.stats.rating_count.cmp(&a.stats.rating_count))
                .then_with(|| a.recipe_id.cmp(&b.recipe_id))
        });
        catalog
    }

    /// Prior whose mean is the average of every rating in the store.
    pub async fn dataset_prior(&self, prior_weight: u32) -> RatingPrior {
        let stats: Vec<RatingStats> = self
            .snapshot()
            .await
            .into_iter()
            .map(|(_, stats)| stats)
            .collect();
        RatingPrior::from_dataset(&stats, prior_weight)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_unknown_recipe_is_rejected() {
        let store = RatingStore::new();
        let result = store.submit_rating("missing", "alice", 4).await;
        assert_eq!(result, Err(RatingError::UnknownRecipe("missing".to_string())));
    }

    #[tokio::test]
    async fn test_create_recipe_starts_empty() {
        let store = RatingStore::new();
        assert!(store.create_recipe("soup").await);
        assert!(!store.create_recipe("soup").await);
        assert_eq!(store.stats("soup").await.unwrap(), RatingStats::default());
    }

    #[tokio::test]
    async fn test_resubmission_updates_existing_record() {
        let store = RatingStore::new();
        store.create_recipe("soup").await;
        let first_at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let second_at = Utc.with_ymd_and_hms(2024, 3, 2, 12, 0, 0).unwrap();

        let first = store.submit_rating_at("soup", "alice", 2, first_at).await.unwrap();
        assert!(first.created);
        assert_eq!(first.previous, None);
        assert_eq!(first.stats, RatingStats::new(1, 2));

        let second = store.submit_rating_at("soup", "alice", 5, second_at).await.unwrap();
        assert!(!second.created);
        assert_eq!(second.previous.map(RatingValue::get), Some(2));
        assert_eq!(second.stats, RatingStats::new(1, 5));

        let records = store.records("soup").await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rating.get(), 5);
        assert_eq!(records[0].updated_at, second_at);
    }

    #[tokio::test]
    async fn test_invalid_rating_leaves_stats_untouched() {
        let store = RatingStore::new();
        store.create_recipe("soup").await;
        store.submit_rating("soup", "alice", 4).await.unwrap();

        let result = store.submit_rating("soup", "bob", 7).await;
        assert_eq!(result, Err(RatingError::InvalidRating(7)));
        assert_eq!(store.stats("soup").await.unwrap(), RatingStats::new(1, 4));
    }

    #[tokio::test]
    async fn test_catalog_ordering() {
        let store = RatingStore::new();
        for id in ["lone-five", "crowd-favourite", "unrated"] {
            store.create_recipe(id).await;
        }
        store.submit_rating("lone-five", "u0", 5).await.unwrap();
        for i in 0..20 {
            let rating = if i % 5 == 0 { 4 } else { 5 };
            store
                .submit_rating("crowd-favourite", &format!("u{i}"), rating)
                .await
                .unwrap();
        }

        let catalog = store.catalog(&RatingPrior::default()).await;
        let ids: Vec<&str> = catalog.iter().map(|c| c.recipe_id.as_str()).collect();
        assert_eq!(ids, vec!["crowd-favourite", "lone-five", "unrated"]);
        assert!(!catalog[2].display.has_ratings);
        assert_eq!(catalog[2].weighted_rating, 3.0);
    }

    #[tokio::test]
    async fn test_import_last_write_wins() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let record = |user: &str, rating: i64| RatingRecord {
            recipe_id: "stew".to_string(),
            user_id: user.to_string(),
            rating: RatingValue::new(rating).unwrap(),
            updated_at: at,
        };
        let store = RatingStore::new();
        let imported = store
            .import(&[record("a", 1), record("b", 5), record("a", 3)])
            .await
            .unwrap();

        assert_eq!(imported, 3);
        assert_eq!(store.stats("stew").await.unwrap(), RatingStats::new(2, 8));
        assert!(!store.audit("stew", &RatingPrior::default()).await.unwrap().has_drift);
    }

    #[tokio::test]
    async fn test_dataset_prior() {
        let store = RatingStore::new();
        store.create_recipe("a").await;
        store.create_recipe("b").await;
        store.submit_rating("a", "x", 5).await.unwrap();
        store.submit_rating("b", "x", 4).await.unwrap();
        store.submit_rating("b", "y", 3).await.unwrap();

        let prior = store.dataset_prior(5).await;
        assert_eq!(prior.prior_weight, 5);
        assert_eq!(prior.prior_mean, 4.0);
    }
}
