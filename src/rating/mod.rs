pub mod aggregator;
pub mod audit;
pub mod data_loader;
pub mod store;

pub use aggregator::{
    apply_new_rating, apply_rating_update, display_rating, weighted_rating, RatingDisplay,
    RatingError, RatingPrior, RatingStats, RatingValue,
};
pub use audit::{audit_stats, recompute_stats, RatingAudit};
pub use data_loader::{load_rating_records, load_stored_stats};
pub use store::{RatingRecord, RatingStore, RecipeRatingSummary, SubmitOutcome};
