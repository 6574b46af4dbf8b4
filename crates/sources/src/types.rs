//! Shared result types produced by the signal sources.

use data_loader::{ItemId, UserId};
use serde::{Deserialize, Serialize};

/// An item with a score from one signal source.
///
/// Scores from different sources live on different scales; the blender is the
/// only place where they are compared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub item_id: ItemId,
    pub score: f32,
}

impl ScoredItem {
    pub fn new(item_id: impl Into<ItemId>, score: f32) -> Self {
        Self {
            item_id: item_id.into(),
            score,
        }
    }
}

/// A neighboring user and its similarity to the query user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub user_id: UserId,
    pub score: f32,
}

/// Sort by score descending, keeping input order for ties
pub(crate) fn sort_desc_stable<T>(items: &mut [T], score: impl Fn(&T) -> f32) {
    items.sort_by(|a, b| {
        score(b)
            .partial_cmp(&score(a))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}
