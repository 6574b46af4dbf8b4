//! Hybrid Blender - one ranked list per user from all signal sources.
//!
//! ## Algorithm
//! 1. Unknown user: diverse popular items, tagged `popular`
//! 2. Candidates: every item the user has not interacted with
//! 3. Signals over the candidates:
//!    - latent-factor predictions, top 3·N
//!    - neighborhood predictions from the K nearest users, top 2·N
//!    - both empty: diverse popular items, tagged `popular`
//! 4. Merge (see [`merge_signals`]) and rank, tagged `personalized`
//! 5. Any [`BlendError`] on the way: diverse popular items, tagged
//!    `popular (error fallback)`

use crate::error::BlendError;
use crate::result::{RecommendationResult, RecommendationType};
use crate::snapshot::HybridSnapshot;
use sources::{PopularityEntry, ScoredItem, SimilarityEngine, neighborhood_scores};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// Weight of the latent-factor score for items both signals found
pub const LATENT_WEIGHT: f32 = 0.4;
/// Weight of the neighborhood score for items both signals found
pub const NEIGHBORHOOD_WEIGHT: f32 = 0.6;

/// How far the personalized path got
#[derive(Debug, Clone, PartialEq)]
pub enum BlendOutcome {
    /// Merged and ranked items, at most N
    Personalized(Vec<ScoredItem>),
    /// Neither signal produced a single candidate
    NoSignal,
}

/// Merge the two signal lists into at most `n` items, best first.
///
/// ## Policy
/// 1. Items in both lists score `0.4 · latent + 0.6 · neighborhood`
/// 2. While short of `n`: neighborhood-only items in their order, then
///    latent-only items in their order
/// 3. While still short of `n`: `popular` items not already chosen
/// 4. Sort by assigned score (stable) and truncate to `n`
pub fn merge_signals(
    latent_top: &[ScoredItem],
    neighborhood_top: &[ScoredItem],
    popular: &[PopularityEntry],
    n: usize,
) -> Vec<ScoredItem> {
    if n == 0 {
        return Vec::new();
    }

    let latent_scores: HashMap<&str, f32> = latent_top
        .iter()
        .map(|s| (s.item_id.as_str(), s.score))
        .collect();

    let mut selected: HashSet<&str> = HashSet::new();
    let mut merged: Vec<ScoredItem> = Vec::with_capacity(n);

    for item in neighborhood_top {
        if let Some(&latent) = latent_scores.get(item.item_id.as_str()) {
            if selected.insert(item.item_id.as_str()) {
                let combined = LATENT_WEIGHT * latent + NEIGHBORHOOD_WEIGHT * item.score;
                merged.push(ScoredItem::new(item.item_id.clone(), combined));
            }
        }
    }
    let common = merged.len();

    for item in neighborhood_top.iter().chain(latent_top) {
        if merged.len() >= n {
            break;
        }
        if selected.insert(item.item_id.as_str()) {
            merged.push(item.clone());
        }
    }

    for entry in popular {
        if merged.len() >= n {
            break;
        }
        if selected.insert(entry.item_id.as_str()) {
            merged.push(ScoredItem::new(entry.item_id.clone(), entry.popularity_score));
        }
    }

    merged.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    merged.truncate(n);

    debug!(
        "Merged {} latent + {} neighborhood items ({} common) into {}",
        latent_top.len(),
        neighborhood_top.len(),
        common,
        merged.len()
    );
    merged
}

/// Applies the merge and fallback policy against a [`HybridSnapshot`]
#[derive(Debug, Clone, Default)]
pub struct HybridBlender {
    similarity: SimilarityEngine,
}

impl HybridBlender {
    pub fn new(similarity: SimilarityEngine) -> Self {
        Self { similarity }
    }

    pub fn similarity(&self) -> &SimilarityEngine {
        &self.similarity
    }

    /// Top-N recommendations for one user. Never fails.
    #[instrument(skip(self, snapshot), fields(version = snapshot.version()))]
    pub fn recommend(
        &self,
        snapshot: &HybridSnapshot,
        user_id: &str,
        n: usize,
    ) -> RecommendationResult {
        if !snapshot.matrix().contains_user(user_id) {
            debug!("Unknown user {}, serving popular items", user_id);
            return RecommendationResult::fallback(
                user_id,
                false,
                RecommendationType::Popular,
                snapshot.popularity().diverse(n),
            );
        }

        let outcome = self.blend(snapshot, user_id, n);
        let result = Self::resolve(snapshot, user_id, n, outcome);
        info!(
            "Served {} {} recommendations to user {}",
            result.len(),
            result.recommendation_type,
            user_id
        );
        result
    }

    /// The personalized path for a user known to the snapshot
    pub fn blend(
        &self,
        snapshot: &HybridSnapshot,
        user_id: &str,
        n: usize,
    ) -> Result<BlendOutcome, BlendError> {
        let matrix = snapshot.matrix();
        let row = matrix
            .user_position(user_id)
            .ok_or_else(|| BlendError::InconsistentSnapshot {
                user_id: user_id.to_string(),
            })?;

        let mut purchased = vec![false; matrix.item_count()];
        for &col in matrix.interacted_positions(row) {
            purchased[col] = true;
        }
        let candidates: Vec<usize> = (0..matrix.item_count()).filter(|&col| !purchased[col]).collect();
        let candidate_ids: Vec<&str> = candidates.iter().filter_map(|&col| matrix.item_at(col)).collect();

        let mut latent_top = match snapshot.predictor() {
            Some(predictor) => predictor.predict_batch(user_id, &candidate_ids),
            None => Vec::new(),
        };
        latent_top.truncate(n.saturating_mul(3));

        let neighbors = self.similarity.similar_users(matrix, user_id);
        let mut neighborhood_top = neighborhood_scores(matrix, &neighbors, &candidates);
        neighborhood_top.truncate(n.saturating_mul(2));

        debug!(
            "User {}: {} candidates, {} latent, {} neighborhood",
            user_id,
            candidates.len(),
            latent_top.len(),
            neighborhood_top.len()
        );

        if latent_top.is_empty() && neighborhood_top.is_empty() {
            return Ok(BlendOutcome::NoSignal);
        }

        let merged = merge_signals(
            &latent_top,
            &neighborhood_top,
            snapshot.popularity().top_n(n),
            n,
        );
        if let Some(bad) = merged.iter().find(|s| !s.score.is_finite()) {
            return Err(BlendError::NonFiniteScore {
                item_id: bad.item_id.clone(),
                score: bad.score,
            });
        }

        Ok(BlendOutcome::Personalized(merged))
    }

    /// Map a blend outcome onto its terminal state
    pub fn resolve(
        snapshot: &HybridSnapshot,
        user_id: &str,
        n: usize,
        outcome: Result<BlendOutcome, BlendError>,
    ) -> RecommendationResult {
        match outcome {
            Ok(BlendOutcome::Personalized(items)) => RecommendationResult::ranked(
                user_id,
                true,
                RecommendationType::Personalized,
                items.into_iter().map(|s| (s.item_id, s.score)),
            ),
            Ok(BlendOutcome::NoSignal) => RecommendationResult::fallback(
                user_id,
                true,
                RecommendationType::Popular,
                snapshot.popularity().diverse(n),
            ),
            Err(e) => {
                warn!("Blend failed for user {}: {}", user_id, e);
                Self::error_fallback(snapshot, user_id, n)
            }
        }
    }

    /// Diverse popular items tagged `popular (error fallback)`
    pub fn error_fallback(
        snapshot: &HybridSnapshot,
        user_id: &str,
        n: usize,
    ) -> RecommendationResult {
        RecommendationResult::fallback(
            user_id,
            false,
            RecommendationType::PopularErrorFallback,
            snapshot.popularity().diverse(n),
        )
    }
}
