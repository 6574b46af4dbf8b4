//! Apriori frequent-itemset mining over a [`PresenceMatrix`].
//!
//! ## Algorithm
//! 1. Level 1: every item whose support reaches `min_support`
//! 2. Level k+1: join pairs of level-k itemsets that share their first k-1
//!    items, drop candidates with an infrequent k-subset, then count the
//!    rest (in parallel) by intersecting the prefix's order bitmap with the
//!    new item's column
//! 3. Stop when a level is empty or `max_len` is reached
//!
//! Output order is by itemset length, then lexicographic by item id. Rule ids
//! are assigned in this order, which makes it the tie-break for equal lift.

use crate::error::{Result, RuleError};
use crate::presence::PresenceMatrix;
use rayon::prelude::*;
use roaring::RoaringBitmap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequentItemset {
    /// Column positions in the presence matrix, ascending
    pub items: Vec<usize>,
    /// Fraction of orders containing all of `items`
    pub support: f64,
}

/// One level-k itemset together with the orders that contain it
struct LevelEntry {
    items: Vec<usize>,
    orders: RoaringBitmap,
}

pub fn validate_thresholds(min_support: f32, max_len: Option<usize>) -> Result<()> {
    if !(min_support > 0.0 && min_support <= 1.0) {
        return Err(RuleError::InvalidSupport(min_support));
    }
    if max_len == Some(0) {
        return Err(RuleError::InvalidItemsetLen);
    }
    Ok(())
}

/// Mine every itemset with support ≥ `min_support`, up to `max_len` items
#[instrument(skip(matrix), fields(orders = matrix.order_count(), items = matrix.item_count()))]
pub fn mine_frequent_itemsets(
    matrix: &PresenceMatrix,
    min_support: f32,
    max_len: Option<usize>,
) -> Result<Vec<FrequentItemset>> {
    validate_thresholds(min_support, max_len)?;
    if matrix.is_empty() {
        return Ok(Vec::new());
    }

    let order_count = f64::from(matrix.order_count());
    let min_count = (f64::from(min_support) * order_count - 1e-9).ceil().max(1.0) as u64;
    let max_len = max_len.unwrap_or(usize::MAX);

    let mut level: Vec<LevelEntry> = (0..matrix.item_count())
        .filter(|&col| matrix.column(col).len() >= min_count)
        .map(|col| LevelEntry {
            items: vec![col],
            orders: matrix.column(col).clone(),
        })
        .collect();

    let mut frequent = Vec::new();
    let mut size = 1;
    while !level.is_empty() {
        debug!("{} frequent itemsets of size {}", level.len(), size);
        frequent.extend(level.iter().map(|entry| FrequentItemset {
            items: entry.items.clone(),
            support: entry.orders.len() as f64 / order_count,
        }));

        if size >= max_len {
            break;
        }
        level = next_level(matrix, &level, min_count);
        size += 1;
    }

    Ok(frequent)
}

fn next_level(matrix: &PresenceMatrix, level: &[LevelEntry], min_count: u64) -> Vec<LevelEntry> {
    let known: HashSet<&[usize]> = level.iter().map(|e| e.items.as_slice()).collect();

    // (prefix entry, new last column), lexicographic
    let mut candidates: Vec<(usize, usize)> = Vec::new();
    for (i, a) in level.iter().enumerate() {
        let prefix = &a.items[..a.items.len() - 1];
        for b in &level[i + 1..] {
            if &b.items[..b.items.len() - 1] != prefix {
                break;
            }
            let last = b.items[b.items.len() - 1];
            if all_subsets_frequent(&a.items, last, &known) {
                candidates.push((i, last));
            }
        }
    }

    candidates
        .into_par_iter()
        .filter_map(|(i, last)| {
            let orders = &level[i].orders & matrix.column(last);
            if orders.len() < min_count {
                return None;
            }
            let mut items = level[i].items.clone();
            items.push(last);
            Some(LevelEntry { items, orders })
        })
        .collect()
}

/// Every k-subset of `base + [last]` that drops one of `base` is known
fn all_subsets_frequent(base: &[usize], last: usize, known: &HashSet<&[usize]>) -> bool {
    if base.len() < 2 {
        return true;
    }
    let mut subset = Vec::with_capacity(base.len());
    (0..base.len() - 1).all(|skip| {
        subset.clear();
        subset.extend(base.iter().enumerate().filter(|(idx, _)| *idx != skip).map(|(_, c)| *c));
        subset.push(last);
        known.contains(subset.as_slice())
    })
}
