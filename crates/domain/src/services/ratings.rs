//! Average product ratings for the featured listing. Review aggregation is
//! owned by the catalog system; this seam only reads it.

use async_trait::async_trait;

use crate::model::SellerId;

#[async_trait]
pub trait RatingSource: Send + Sync {
    /// Average product rating for the seller, if any reviews exist.
    async fn average_rating(&self, seller: &SellerId) -> Option<f64>;
}

/// Used when no review system is wired in.
#[derive(Debug, Clone, Default)]
pub struct NoRatings;

#[async_trait]
impl RatingSource for NoRatings {
    async fn average_rating(&self, _seller: &SellerId) -> Option<f64> {
        None
    }
}
