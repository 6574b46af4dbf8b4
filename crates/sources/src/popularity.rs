//! Popularity Ranker - global best sellers
//!
//! ```text
//! popularity = 0.7 · count / max_count + 0.3 · avg_quantity / quantity_scale
//! ```
//!
//! `count` is the number of raw interaction rows for the item and
//! `avg_quantity` their mean quantity. The quantity term is not clamped, so
//! items bought in bulk can score above 1.
//!
//! Used for cold-start users, for padding short personalized lists, and in
//! its "diverse" variant whenever the personalized path gives up.

use crate::types::sort_desc_stable;
use data_loader::{Interaction, ItemId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// Default divisor for the average-quantity term
pub const DEFAULT_QUANTITY_SCALE: f32 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularityEntry {
    pub item_id: ItemId,
    pub popularity_score: f32,
}

impl PopularityEntry {
    pub fn new(item_id: impl Into<ItemId>, popularity_score: f32) -> Self {
        Self {
            item_id: item_id.into(),
            popularity_score,
        }
    }

    /// Cheap category proxy: the first character of the item id
    fn prefix(&self) -> Option<char> {
        self.item_id.chars().next()
    }
}

/// Precomputed popularity ranking for one data snapshot
#[derive(Debug, Clone, Default)]
pub struct PopularityRanker {
    /// Every item, best first; ties in item-id order
    ranked: Vec<PopularityEntry>,
}

impl PopularityRanker {
    /// Rank all items found in the raw interaction rows
    pub fn from_interactions(interactions: &[Interaction], quantity_scale: f32) -> Self {
        // (row count, quantity sum) per item, iterated in item-id order
        let mut stats: BTreeMap<&str, (u32, f32)> = BTreeMap::new();
        for interaction in interactions {
            let entry = stats.entry(interaction.item_id.as_str()).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += interaction.quantity;
        }

        let max_count = stats.values().map(|(count, _)| *count).max().unwrap_or(0).max(1) as f32;

        let ranked: Vec<PopularityEntry> = stats
            .into_iter()
            .map(|(item_id, (count, total))| {
                let normalized_frequency = count as f32 / max_count;
                let avg_quantity = total / count as f32;
                let score = 0.7 * normalized_frequency + 0.3 * avg_quantity / quantity_scale;
                PopularityEntry::new(item_id, score)
            })
            .collect();

        Self::from_entries(ranked)
    }

    /// Build from precomputed entries; they are re-sorted best first
    pub fn from_entries(mut entries: Vec<PopularityEntry>) -> Self {
        entries.retain(|e| e.popularity_score.is_finite());
        sort_desc_stable(&mut entries, |e| e.popularity_score);
        debug!("Popularity ranking over {} items", entries.len());
        Self { ranked: entries }
    }

    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// The N most popular items
    pub fn top_n(&self, n: usize) -> &[PopularityEntry] {
        &self.ranked[..n.min(self.ranked.len())]
    }

    /// Popular items with at most one item per id prefix.
    ///
    /// Scans the 3·N most popular items and keeps the first item of each
    /// prefix. If fewer than N prefixes exist in that pool, the remaining
    /// slots are backfilled with the skipped items in popularity order.
    pub fn diverse(&self, n: usize) -> Vec<PopularityEntry> {
        let pool = self.top_n(n.saturating_mul(3));

        let mut chosen = vec![false; pool.len()];
        let mut selected: Vec<PopularityEntry> = Vec::with_capacity(n);
        let mut seen_prefixes: HashSet<Option<char>> = HashSet::new();

        for (idx, entry) in pool.iter().enumerate() {
            if selected.len() >= n {
                break;
            }
            if seen_prefixes.insert(entry.prefix()) {
                chosen[idx] = true;
                selected.push(entry.clone());
            }
        }

        for (idx, entry) in pool.iter().enumerate() {
            if selected.len() >= n {
                break;
            }
            if !chosen[idx] {
                selected.push(entry.clone());
            }
        }

        selected
    }
}
