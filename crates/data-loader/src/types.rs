//! Core domain types for interaction and order exports.
//!
//! Identifiers are kept as strings: the catalog exports customer and article
//! codes verbatim, and leading zeros or alphanumeric prefixes are meaningful
//! (the first character doubles as a coarse category, see the popularity
//! ranker).

use serde::{Deserialize, Serialize};

// =============================================================================
// Type Aliases
// =============================================================================

/// Customer code as exported by the catalog
pub type UserId = String;

/// Article code as exported by the catalog
pub type ItemId = String;

/// Sales document number grouping the lines of one order
pub type OrderId = String;

// =============================================================================
// Interaction Types
// =============================================================================

/// One observed (user, item, quantity) row.
///
/// Several rows may exist for the same pair; they are summed when the
/// interaction matrix is built, but kept raw for popularity statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: UserId,
    pub item_id: ItemId,
    /// Non-negative purchased quantity (or rating, depending on the export)
    pub quantity: f32,
}

impl Interaction {
    pub fn new(user_id: impl Into<UserId>, item_id: impl Into<ItemId>, quantity: f32) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            quantity,
        }
    }
}

/// One line of a sales document, used by the association-rule path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderLine {
    pub order_id: OrderId,
    pub item_id: ItemId,
}

impl OrderLine {
    pub fn new(order_id: impl Into<OrderId>, item_id: impl Into<ItemId>) -> Self {
        Self {
            order_id: order_id.into(),
            item_id: item_id.into(),
        }
    }
}

// =============================================================================
// Snapshot identity
// =============================================================================

/// Cheap identity of an interaction snapshot.
///
/// Two snapshots with the same fingerprint are treated as the same data; a
/// persisted model is only reused when its fingerprint matches the matrix it
/// would be paired with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataFingerprint {
    pub interactions: usize,
    pub users: usize,
    pub items: usize,
    pub quantity_sum: f64,
}

impl DataFingerprint {
    /// Compares two fingerprints, tolerating float noise in the quantity sum
    pub fn matches(&self, other: &DataFingerprint) -> bool {
        self.interactions == other.interactions
            && self.users == other.users
            && self.items == other.items
            && (self.quantity_sum - other.quantity_sum).abs() <= 1e-6 * self.quantity_sum.abs().max(1.0)
    }
}
