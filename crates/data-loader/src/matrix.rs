//! Dense user × item interaction matrix.
//!
//! Built once per data snapshot from the flat interaction rows:
//! - duplicate (user, item) rows are summed
//! - users and items are ordered lexicographically, and that order is fixed for
//!   the lifetime of the matrix, so row/column indices can be shared with the
//!   models trained from it
//! - missing pairs read as 0
//!
//! Besides the dense rows, the matrix keeps the list of items each user has
//! interacted with and O(1) id → index maps, so per-request lookups never scan
//! the raw rows.

use crate::types::{DataFingerprint, Interaction, ItemId, UserId};
use rayon::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Sum quantities of duplicate (user, item) rows.
///
/// The returned map iterates in (user, item) order.
pub fn aggregate_interactions(interactions: &[Interaction]) -> BTreeMap<(UserId, ItemId), f32> {
    let mut aggregated: BTreeMap<(UserId, ItemId), f32> = BTreeMap::new();
    for interaction in interactions {
        *aggregated
            .entry((interaction.user_id.clone(), interaction.item_id.clone()))
            .or_insert(0.0) += interaction.quantity;
    }
    aggregated
}

#[derive(Debug, Clone)]
pub struct InteractionMatrix {
    users: Vec<UserId>,
    items: Vec<ItemId>,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
    /// One dense vector per user, indexed by item position
    rows: Vec<Vec<f32>>,
    /// Item positions each user has at least one row for, ascending
    interacted: Vec<Vec<usize>>,
    fingerprint: DataFingerprint,
}

impl InteractionMatrix {
    /// Build the matrix from raw interaction rows
    pub fn from_interactions(interactions: &[Interaction]) -> Self {
        let aggregated = aggregate_interactions(interactions);

        let mut users: Vec<UserId> = Vec::new();
        let mut items: Vec<ItemId> = aggregated.keys().map(|(_, item)| item.clone()).collect();
        items.sort_unstable();
        items.dedup();

        let item_index: HashMap<ItemId, usize> = items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.clone(), idx))
            .collect();

        // Aggregated keys are sorted by user first, so each user's entries are contiguous
        let mut entries: Vec<Vec<(usize, f32)>> = Vec::new();
        for ((user_id, item_id), quantity) in &aggregated {
            if users.last() != Some(user_id) {
                users.push(user_id.clone());
                entries.push(Vec::new());
            }
            if let (Some(row), Some(&col)) = (entries.last_mut(), item_index.get(item_id)) {
                row.push((col, *quantity));
            }
        }

        let user_index: HashMap<UserId, usize> = users
            .iter()
            .enumerate()
            .map(|(idx, user)| (user.clone(), idx))
            .collect();

        let item_count = items.len();
        let rows: Vec<Vec<f32>> = entries
            .par_iter()
            .map(|row_entries| {
                let mut row = vec![0.0; item_count];
                for &(col, quantity) in row_entries {
                    row[col] = quantity;
                }
                row
            })
            .collect();

        let interacted: Vec<Vec<usize>> = entries
            .iter()
            .map(|row_entries| row_entries.iter().map(|&(col, _)| col).collect())
            .collect();

        let fingerprint = DataFingerprint {
            interactions: interactions.len(),
            users: users.len(),
            items: items.len(),
            quantity_sum: interactions.iter().map(|i| i.quantity as f64).sum(),
        };

        debug!(
            "Built interaction matrix: {} users x {} items from {} rows",
            users.len(),
            items.len(),
            interactions.len()
        );

        Self {
            users,
            items,
            user_index,
            item_index,
            rows,
            interacted,
            fingerprint,
        }
    }

    /// An empty matrix, used before the first snapshot is loaded
    pub fn empty() -> Self {
        Self::from_interactions(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// All users in row order
    pub fn users(&self) -> &[UserId] {
        &self.users
    }

    /// All items in column order
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn contains_user(&self, user_id: &str) -> bool {
        self.user_index.contains_key(user_id)
    }

    pub fn user_position(&self, user_id: &str) -> Option<usize> {
        self.user_index.get(user_id).copied()
    }

    pub fn item_position(&self, item_id: &str) -> Option<usize> {
        self.item_index.get(item_id).copied()
    }

    pub fn user_at(&self, position: usize) -> Option<&str> {
        self.users.get(position).map(String::as_str)
    }

    pub fn item_at(&self, position: usize) -> Option<&str> {
        self.items.get(position).map(String::as_str)
    }

    /// Dense row of a user, or `None` for unknown users
    pub fn row(&self, user_id: &str) -> Option<&[f32]> {
        self.user_position(user_id).map(|idx| self.rows[idx].as_slice())
    }

    /// Dense row at a row position
    ///
    /// Returns an empty slice for out-of-range positions.
    pub fn row_at(&self, position: usize) -> &[f32] {
        self.rows.get(position).map(|r| r.as_slice()).unwrap_or(&[])
    }

    /// Summed quantity for a pair; `None` when either id is unknown
    pub fn quantity(&self, user_id: &str, item_id: &str) -> Option<f32> {
        let row = self.user_position(user_id)?;
        let col = self.item_position(item_id)?;
        Some(self.rows[row][col])
    }

    /// Column positions the user has interacted with, ascending
    pub fn interacted_positions(&self, user_position: usize) -> &[usize] {
        self.interacted
            .get(user_position)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Item ids the user has interacted with, in column order
    pub fn interacted_items(&self, user_id: &str) -> Vec<&str> {
        match self.user_position(user_id) {
            Some(row) => self
                .interacted_positions(row)
                .iter()
                .map(|&col| self.items[col].as_str())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Every observed (row, column, quantity) entry in row-major order
    pub fn observed_entries(&self) -> impl Iterator<Item = (usize, usize, f32)> + '_ {
        self.interacted.iter().enumerate().flat_map(move |(row, cols)| {
            cols.iter().map(move |&col| (row, col, self.rows[row][col]))
        })
    }

    pub fn fingerprint(&self) -> DataFingerprint {
        self.fingerprint
    }
}

impl Default for InteractionMatrix {
    fn default() -> Self {
        Self::empty()
    }
}
