//! Neighborhood predictions - "customers like you bought..."
//!
//! For every candidate item, the score is the similarity-weighted average of
//! the quantities the neighbors recorded for it:
//!
//! ```text
//! score(item) = Σ sim(n) · qty(n, item) / Σ |sim(n)|
//! ```
//!
//! where the sums run over the neighbors that interacted with the item. Items
//! no neighbor interacted with get no score at all.

use crate::similarity::EPSILON;
use crate::types::{sort_desc_stable, Neighbor, ScoredItem};
use data_loader::InteractionMatrix;
use tracing::debug;

/// Score candidate items (given as matrix column positions) from neighbors.
///
/// Output is sorted by score descending; ties keep column order. Neighbors
/// that are not rows of `matrix` are ignored.
pub fn neighborhood_scores(
    matrix: &InteractionMatrix,
    neighbors: &[Neighbor],
    candidates: &[usize],
) -> Vec<ScoredItem> {
    if neighbors.is_empty() || candidates.is_empty() {
        return Vec::new();
    }

    let mut is_candidate = vec![false; matrix.item_count()];
    for &col in candidates {
        if let Some(flag) = is_candidate.get_mut(col) {
            *flag = true;
        }
    }

    let mut weighted_sum = vec![0.0f32; matrix.item_count()];
    let mut weight_total = vec![0.0f32; matrix.item_count()];

    for neighbor in neighbors {
        let Some(row) = matrix.user_position(&neighbor.user_id) else {
            continue;
        };
        let quantities = matrix.row_at(row);
        for &col in matrix.interacted_positions(row) {
            if is_candidate[col] {
                weighted_sum[col] += neighbor.score * quantities[col];
                weight_total[col] += neighbor.score.abs();
            }
        }
    }

    let mut scores: Vec<ScoredItem> = weight_total
        .iter()
        .enumerate()
        .filter(|(_, total)| **total > EPSILON)
        .filter_map(|(col, total)| {
            let score = weighted_sum[col] / total;
            if !score.is_finite() {
                return None;
            }
            matrix.item_at(col).map(|item| ScoredItem::new(item, score))
        })
        .collect();

    sort_desc_stable(&mut scores, |s| s.score);
    debug!(
        "Neighborhood scored {} of {} candidates from {} neighbors",
        scores.len(),
        candidates.len(),
        neighbors.len()
    );
    scores
}
