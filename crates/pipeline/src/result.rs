//! Caller-facing recommendation result.
//!
//! The same shape is returned for every terminal state, so callers only
//! branch on `recommendation_type` when they care how the list was produced.

use data_loader::{ItemId, UserId};
use serde::{Deserialize, Serialize};
use sources::PopularityEntry;

/// Note attached to items served from the popularity fallback
pub const FALLBACK_NOTE: &str = "popular item (fallback)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecommendationType {
    #[serde(rename = "personalized")]
    Personalized,
    #[serde(rename = "popular")]
    Popular,
    #[serde(rename = "popular (error fallback)")]
    PopularErrorFallback,
}

impl RecommendationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendationType::Personalized => "personalized",
            RecommendationType::Popular => "popular",
            RecommendationType::PopularErrorFallback => "popular (error fallback)",
        }
    }
}

impl std::fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedItem {
    /// 1-based position in the list
    pub rank: usize,
    pub item_id: ItemId,
    /// Rounded to 2 decimals
    pub score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub user_id: UserId,
    pub user_exists: bool,
    pub recommendation_type: RecommendationType,
    pub recommendations: Vec<RecommendedItem>,
}

pub fn round_score(score: f32) -> f32 {
    (score * 100.0).round() / 100.0
}

impl RecommendationResult {
    /// Rank already-ordered (item, score) pairs
    pub fn ranked<I>(
        user_id: impl Into<UserId>,
        user_exists: bool,
        recommendation_type: RecommendationType,
        items: I,
    ) -> Self
    where
        I: IntoIterator<Item = (ItemId, f32)>,
    {
        let note = match recommendation_type {
            RecommendationType::Personalized => None,
            _ => Some(FALLBACK_NOTE.to_string()),
        };

        let recommendations = items
            .into_iter()
            .enumerate()
            .map(|(idx, (item_id, score))| RecommendedItem {
                rank: idx + 1,
                item_id,
                score: round_score(score),
                note: note.clone(),
            })
            .collect();

        Self {
            user_id: user_id.into(),
            user_exists,
            recommendation_type,
            recommendations,
        }
    }

    /// Popularity-based result; every entry carries the fallback note
    pub fn fallback(
        user_id: impl Into<UserId>,
        user_exists: bool,
        recommendation_type: RecommendationType,
        entries: Vec<PopularityEntry>,
    ) -> Self {
        Self::ranked(
            user_id,
            user_exists,
            recommendation_type,
            entries.into_iter().map(|e| (e.item_id, e.popularity_score)),
        )
    }

    pub fn len(&self) -> usize {
        self.recommendations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recommendations.is_empty()
    }

    pub fn item_ids(&self) -> Vec<&str> {
        self.recommendations.iter().map(|r| r.item_id.as_str()).collect()
    }
}
