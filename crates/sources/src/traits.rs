//! Prediction seam between the blender and the trained model.

use crate::error::Result;
use crate::types::{sort_desc_stable, ScoredItem};
use tracing::warn;

/// Anything that can estimate a user's affinity for an item.
///
/// `Send + Sync` so one trained instance can be shared by every request
/// thread behind an `Arc`.
pub trait RatingPredictor: Send + Sync {
    /// Estimate the affinity of `user_id` for `item_id`
    fn try_predict(&self, user_id: &str, item_id: &str) -> Result<f32>;

    /// Score every candidate, best first, ties in input order.
    ///
    /// A failed or non-finite prediction drops that one candidate; the rest
    /// are still scored.
    fn predict_batch(&self, user_id: &str, items: &[&str]) -> Vec<ScoredItem> {
        let mut predictions: Vec<ScoredItem> = items
            .iter()
            .filter_map(|&item_id| match self.try_predict(user_id, item_id) {
                Ok(score) if score.is_finite() => Some(ScoredItem::new(item_id, score)),
                Ok(score) => {
                    warn!("Non-finite prediction {} for user {}, item {}", score, user_id, item_id);
                    None
                }
                Err(e) => {
                    warn!("Skipping item {} for user {}: {}", item_id, user_id, e);
                    None
                }
            })
            .collect();

        sort_desc_stable(&mut predictions, |p| p.score);
        predictions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ModelError;

    /// Scores items by id length and fails on one poisoned id
    struct FlakyPredictor;

    impl RatingPredictor for FlakyPredictor {
        fn try_predict(&self, user_id: &str, item_id: &str) -> Result<f32> {
            match item_id {
                "poison" => Err(ModelError::PredictionFailed {
                    user_id: user_id.to_string(),
                    item_id: item_id.to_string(),
                    reason: "boom".to_string(),
                }),
                "nan" => Ok(f32::NAN),
                _ => Ok(item_id.len() as f32),
            }
        }
    }

    #[test]
    fn test_failed_prediction_only_drops_that_item() {
        let items = ["aa", "poison", "bbb", "c", "nan"];
        let predictions = FlakyPredictor.predict_batch("u", &items);

        let ids: Vec<&str> = predictions.iter().map(|p| p.item_id.as_str()).collect();
        assert_eq!(ids, vec!["bbb", "aa", "c"]);
    }

    #[test]
    fn test_ties_keep_input_order() {
        let items = ["xy", "ab", "zz"];
        let predictions = FlakyPredictor.predict_batch("u", &items);
        let ids: Vec<&str> = predictions.iter().map(|p| p.item_id.as_str()).collect();
        assert_eq!(ids, vec!["xy", "ab", "zz"]);
    }
}
