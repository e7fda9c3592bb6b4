use log::warn;
use serde::Serialize;

use super::aggregator::{RatingPrior, RatingStats};
use super::store::RatingRecord;

/// Stored counters for a recipe next to the same values recomputed from its records.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingAudit {
    pub recipe_id: String,
    pub stored: RatingStats,
    pub recomputed: RatingStats,
    pub stored_simple_average: f64,
    pub recomputed_simple_average: f64,
    pub stored_weighted_rating: f64,
    pub recomputed_weighted_rating: f64,
    pub has_drift: bool,
}

/// Rebuilds the counters from scratch. Only records for `recipe_id` are counted.
pub fn recompute_stats(recipe_id: &str, records: &[RatingRecord]) -> RatingStats {
    records
        .iter()
        .filter(|record| record.recipe_id == recipe_id)
        .fold(RatingStats::default(), |stats, record| {
            RatingStats::new(
                stats.rating_count.saturating_add(1),
                stats.rating_sum.saturating_add(record.rating.get() as u64),
            )
        })
}

pub fn audit_stats(
    recipe_id: &str,
    stored: RatingStats,
    records: &[RatingRecord],
    prior: &RatingPrior,
) -> RatingAudit {
    let recomputed = recompute_stats(recipe_id, records);
    let has_drift = stored != recomputed;

    if has_drift {
        warn!(
            "Rating drift on recipe {}: stored count={} sum={}, recomputed count={} sum={}",
            recipe_id,
            stored.rating_count,
            stored.rating_sum,
            recomputed.rating_count,
            recomputed.rating_sum
        );
    }

    RatingAudit {
        recipe_id: recipe_id.to_string(),
        stored,
        recomputed,
        stored_simple_average: stored.simple_average().unwrap_or(0.0),
        recomputed_simple_average: recomputed.simple_average().unwrap_or(0.0),
        stored_weighted_rating: stored.weighted(prior),
        recomputed_weighted_rating: recomputed.weighted(prior),
        has_drift,
    }
}
