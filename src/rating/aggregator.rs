use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

pub const DEFAULT_PRIOR_WEIGHT: u32 = 5;
pub const DEFAULT_PRIOR_MEAN: f64 = 3.0;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RatingError {
    #[error("rating must be between {MIN_RATING} and {MAX_RATING}, got {0}")]
    InvalidRating(i64),
    #[error("stale rating update: {0}")]
    StalePrecondition(String),
    #[error("rating counters overflowed")]
    Overflow,
    #[error("unknown recipe: {0}")]
    UnknownRecipe(String),
}

/// A single star rating, guaranteed to be in `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct RatingValue(u8);

impl RatingValue {
    pub fn new(value: i64) -> Result<Self, RatingError> {
        if (MIN_RATING as i64..=MAX_RATING as i64).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(RatingError::InvalidRating(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for RatingValue {
    type Error = RatingError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RatingValue> for u8 {
    fn from(value: RatingValue) -> Self {
        value.0
    }
}

impl fmt::Display for RatingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Aggregate rating counters stored alongside a recipe.
///
/// `rating_sum` is always the sum of every current rating for the recipe and
/// `rating_count` the number of users who rated it; the two only ever change together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RatingStats {
    pub rating_count: u64,
    pub rating_sum: u64,
}

impl RatingStats {
    pub fn new(rating_count: u64, rating_sum: u64) -> Self {
        Self {
            rating_count,
            rating_sum,
        }
    }

    /// Plain mean of all ratings, `None` while nobody has rated.
    pub fn simple_average(&self) -> Option<f64> {
        if self.rating_count == 0 {
            None
        } else {
            Some(self.rating_sum as f64 / self.rating_count as f64)
        }
    }

    pub fn weighted(&self, prior: &RatingPrior) -> f64 {
        weighted_rating(self.rating_count, self.rating_sum, prior)
    }

    pub fn display(&self, prior: &RatingPrior) -> RatingDisplay {
        display_rating(self.weighted(prior), self.rating_count)
    }
}

/// The Bayesian prior blended into every weighted rating.
///
/// `prior_weight` is the number of virtual votes cast at `prior_mean`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingPrior {
    pub prior_weight: u32,
    pub prior_mean: f64,
}

impl Default for RatingPrior {
    fn default() -> Self {
        Self {
            prior_weight: DEFAULT_PRIOR_WEIGHT,
            prior_mean: DEFAULT_PRIOR_MEAN,
        }
    }
}

impl RatingPrior {
    pub fn new(prior_weight: u32, prior_mean: f64) -> Self {
        Self {
            prior_weight,
            prior_mean,
        }
    }

    /// Derives the prior mean from every rating in the dataset.
    /// Falls back to the default mean when nothing has been rated yet.
    pub fn from_dataset<'a>(
        stats: impl IntoIterator<Item = &'a RatingStats>,
        prior_weight: u32,
    ) -> Self {
        // Widened so totals across many recipes cannot overflow.
        let (count, sum) = stats
            .into_iter()
            .fold((0u128, 0u128), |(count, sum), s| {
                (count + s.rating_count as u128, sum + s.rating_sum as u128)
            });

        let prior_mean = if count == 0 {
            DEFAULT_PRIOR_MEAN
        } else {
            sum as f64 / count as f64
        };

        Self::new(prior_weight, prior_mean)
    }
}

/// What a listing should show for a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingDisplay {
    pub rating: f64,
    pub has_ratings: bool,
}

/// Counters after a user rates a recipe for the first time.
pub fn apply_new_rating(stats: RatingStats, value: RatingValue) -> Result<RatingStats, RatingError> {
    let rating_count = stats.rating_count.checked_add(1).ok_or(RatingError::Overflow)?;
    let rating_sum = stats
        .rating_sum
        .checked_add(value.get() as u64)
        .ok_or(RatingError::Overflow)?;

    Ok(RatingStats::new(rating_count, rating_sum))
}

/// Counters after a user changes an existing rating. The count is unchanged.
pub fn apply_rating_update(
    stats: RatingStats,
    old_value: RatingValue,
    new_value: RatingValue,
) -> Result<RatingStats, RatingError> {
    if stats.rating_count == 0 {
        return Err(RatingError::StalePrecondition(
            "no existing ratings to update, use the new rating path".to_string(),
        ));
    }

    let without_old = stats
        .rating_sum
        .checked_sub(old_value.get() as u64)
        .ok_or_else(|| {
            RatingError::StalePrecondition(format!(
                "rating sum {} cannot contain previous rating {}",
                stats.rating_sum, old_value
            ))
        })?;
    let rating_sum = without_old
        .checked_add(new_value.get() as u64)
        .ok_or(RatingError::Overflow)?;

    Ok(RatingStats::new(stats.rating_count, rating_sum))
}

/// Bayesian average: `(sum + weight * mean) / (count + weight)`.
pub fn weighted_rating(rating_count: u64, rating_sum: u64, prior: &RatingPrior) -> f64 {
    let denominator = rating_count as f64 + prior.prior_weight as f64;
    if rating_count == 0 || denominator == 0.0 {
        return prior.prior_mean;
    }
    (rating_sum as f64 + prior.prior_weight as f64 * prior.prior_mean) / denominator
}

pub fn display_rating(weighted_rating: f64, rating_count: u64) -> RatingDisplay {
    if rating_count == 0 {
        return RatingDisplay {
            rating: 0.0,
            has_ratings: false,
        };
    }

    RatingDisplay {
        rating: (weighted_rating * 10.0).round() / 10.0,
        has_ratings: true,
    }
}
