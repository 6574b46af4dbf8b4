//! Similarity Engine - user-to-user similarity over the interaction matrix
//!
//! Finds the K users whose purchase vectors are closest to a target user.
//!
//! ## Metrics
//! - `Cosine`: plain cosine over the raw quantity vectors
//! - `Blended`: 0.4·cosine + 0.4·Pearson (over co-purchased items)
//!   + 0.2·Jaccard (over purchased-item sets), scaled down by
//!   `common / min_common_items` when the two users share fewer than
//!   `min_common_items` items
//!
//! One metric is fixed per engine; both are deterministic for a given matrix.
//! Zero norms are floored at [`EPSILON`] and NaN scores never leave this
//! module.

use crate::types::{sort_desc_stable, Neighbor};
use data_loader::InteractionMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

/// Floor for vector norms before division
pub const EPSILON: f32 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    Cosine,
    #[default]
    Blended,
}

/// Cosine similarity with epsilon-floored norms
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    dot / (norm_a.sqrt().max(EPSILON) * norm_b.sqrt().max(EPSILON))
}

/// Cosine + Pearson + Jaccard blend with a few-common-items penalty
pub fn blended_similarity(a: &[f32], b: &[f32], min_common_items: usize) -> f32 {
    let cos = cosine(a, b);

    // Purchased-item statistics for both users in one pass
    let (mut count_a, mut count_b, mut common, mut union) = (0usize, 0usize, 0usize, 0usize);
    let (mut sum_a, mut sum_b) = (0.0f32, 0.0f32);
    for (&x, &y) in a.iter().zip(b) {
        let (has_a, has_b) = (x > 0.0, y > 0.0);
        if has_a {
            count_a += 1;
            sum_a += x;
        }
        if has_b {
            count_b += 1;
            sum_b += y;
        }
        if has_a && has_b {
            common += 1;
        }
        if has_a || has_b {
            union += 1;
        }
    }

    let jaccard = common as f32 / union.max(1) as f32;

    let mean_a = if count_a > 0 { sum_a / count_a as f32 } else { 0.0 };
    let mean_b = if count_b > 0 { sum_b / count_b as f32 } else { 0.0 };

    let (mut numerator, mut var_a, mut var_b) = (0.0f32, 0.0f32, 0.0f32);
    for (&x, &y) in a.iter().zip(b) {
        if x > 0.0 && y > 0.0 {
            let centered_a = x - mean_a;
            let centered_b = y - mean_b;
            numerator += centered_a * centered_b;
            var_a += centered_a * centered_a;
            var_b += centered_b * centered_b;
        }
    }
    let pearson = if var_a > 0.0 && var_b > 0.0 {
        numerator / (var_a.sqrt() * var_b.sqrt())
    } else {
        0.0
    };

    let mut combined = 0.4 * cos + 0.4 * pearson + 0.2 * jaccard;
    if min_common_items > 0 && common < min_common_items {
        combined *= common as f32 / min_common_items as f32;
    }
    combined
}

/// Ranks other users by similarity to a target user
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    metric: SimilarityMetric,
    neighbor_count: usize,
    min_common_items: usize,
}

impl SimilarityEngine {
    pub fn new() -> Self {
        Self {
            metric: SimilarityMetric::default(),
            neighbor_count: 10,
            min_common_items: 2,
        }
    }

    /// Configure the similarity metric (default: Blended)
    pub fn with_metric(mut self, metric: SimilarityMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Configure K, the number of neighbors returned (default: 10)
    pub fn with_neighbor_count(mut self, k: usize) -> Self {
        self.neighbor_count = k;
        self
    }

    /// Configure the blended-metric penalty threshold (default: 2)
    pub fn with_min_common_items(mut self, min: usize) -> Self {
        self.min_common_items = min;
        self
    }

    pub fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbor_count
    }

    /// Score a pair of rows with the configured metric
    pub fn score(&self, a: &[f32], b: &[f32]) -> f32 {
        match self.metric {
            SimilarityMetric::Cosine => cosine(a, b),
            SimilarityMetric::Blended => blended_similarity(a, b, self.min_common_items),
        }
    }

    /// Top-K most similar users, best first.
    ///
    /// Unknown users get an empty list. The query user is never included and
    /// ties keep matrix row order.
    #[instrument(skip(self, matrix))]
    pub fn similar_users(&self, matrix: &InteractionMatrix, user_id: &str) -> Vec<Neighbor> {
        let Some(target) = matrix.user_position(user_id) else {
            return Vec::new();
        };
        let target_row = matrix.row_at(target);

        let mut scored: Vec<(usize, f32)> = (0..matrix.user_count())
            .into_par_iter()
            .filter(|&other| other != target)
            .map(|other| (other, self.score(target_row, matrix.row_at(other))))
            .filter(|(_, score)| !score.is_nan())
            .collect();

        sort_desc_stable(&mut scored, |(_, score)| *score);
        scored.truncate(self.neighbor_count);

        let neighbors: Vec<Neighbor> = scored
            .into_iter()
            .filter_map(|(position, score)| {
                matrix.user_at(position).map(|user| Neighbor {
                    user_id: user.to_string(),
                    score,
                })
            })
            .collect();

        debug!("Found {} neighbors for user {}", neighbors.len(), user_id);
        neighbors
    }
}

impl Default for SimilarityEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_loader::Interaction;

    fn create_test_matrix() -> InteractionMatrix {
        let rows = vec![
            // target: a, b, c
            Interaction::new("u1", "a", 1.0),
            Interaction::new("u1", "b", 2.0),
            Interaction::new("u1", "c", 1.0),
            // identical taste
            Interaction::new("u2", "a", 1.0),
            Interaction::new("u2", "b", 2.0),
            Interaction::new("u2", "c", 1.0),
            // partial overlap
            Interaction::new("u3", "a", 1.0),
            Interaction::new("u3", "d", 5.0),
            // disjoint
            Interaction::new("u4", "d", 1.0),
            Interaction::new("u4", "e", 1.0),
        ];
        InteractionMatrix::from_interactions(&rows)
    }

    #[test]
    fn test_cosine_basic() {
        assert!((cosine(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_is_zero_not_nan() {
        let zeros = [0.0, 0.0, 0.0];
        let other = [1.0, 2.0, 3.0];

        let cos = cosine(&zeros, &other);
        assert_eq!(cos, 0.0);
        assert!(!blended_similarity(&zeros, &other, 2).is_nan());
        assert_eq!(blended_similarity(&zeros, &zeros, 2), 0.0);
    }

    #[test]
    fn test_pearson_zero_variance_is_zero() {
        // All co-purchased quantities equal their means -> Pearson term is 0
        let a = [1.0, 1.0, 0.0];
        let b = [2.0, 2.0, 0.0];
        let score = blended_similarity(&a, &b, 2);
        // 0.4 * cosine(=1) + 0.4 * 0 + 0.2 * jaccard(=1)
        assert!((score - 0.6).abs() < 1e-5);
    }

    #[test]
    fn test_few_common_items_penalty() {
        let a = [1.0, 0.0];
        let b = [1.0, 0.0];
        // one common item with threshold 2 halves the score
        let full = blended_similarity(&a, &b, 1);
        let penalized = blended_similarity(&a, &b, 2);
        assert!((penalized - full * 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_similar_users_ranking() {
        let matrix = create_test_matrix();
        let engine = SimilarityEngine::new();

        let neighbors = engine.similar_users(&matrix, "u1");

        assert_eq!(neighbors.len(), 3);
        assert_eq!(neighbors[0].user_id, "u2");
        assert!(neighbors.iter().all(|n| n.user_id != "u1"));
        assert!(neighbors.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn test_unknown_user_has_no_neighbors() {
        let matrix = create_test_matrix();
        let engine = SimilarityEngine::new();
        assert!(engine.similar_users(&matrix, "ghost").is_empty());
    }

    #[test]
    fn test_neighbor_count_truncates() {
        let matrix = create_test_matrix();
        let engine = SimilarityEngine::new().with_neighbor_count(1);
        assert_eq!(engine.similar_users(&matrix, "u1").len(), 1);
    }

    #[test]
    fn test_ties_keep_row_order() {
        let rows = vec![
            Interaction::new("a", "x", 1.0),
            Interaction::new("c", "y", 1.0),
            Interaction::new("b", "y", 1.0),
        ];
        let matrix = InteractionMatrix::from_interactions(&rows);
        let engine = SimilarityEngine::new().with_metric(SimilarityMetric::Cosine);

        // both "b" and "c" score 0 against "a"; row order is b, c
        let neighbors = engine.similar_users(&matrix, "a");
        let ids: Vec<&str> = neighbors.iter().map(|n| n.user_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn test_results_are_reproducible() {
        let matrix = create_test_matrix();
        let engine = SimilarityEngine::new();
        assert_eq!(
            engine.similar_users(&matrix, "u3"),
            engine.similar_users(&matrix, "u3")
        );
    }
}
