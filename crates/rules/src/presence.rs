//! Order × item presence matrix, stored column-wise as bitmaps.
//!
//! Column `i` is the set of order indices that contain item `i`, so the
//! support count of an itemset is the cardinality of the intersection of its
//! columns. Items and orders are indexed in lexicographic id order.

use data_loader::{ItemId, OrderLine};
use roaring::RoaringBitmap;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct PresenceMatrix {
    items: Vec<ItemId>,
    columns: Vec<RoaringBitmap>,
    order_count: u32,
}

impl PresenceMatrix {
    /// Build from (order, item) rows; repeated rows count once
    pub fn from_order_lines(lines: &[OrderLine]) -> Self {
        let mut orders: BTreeMap<&str, u32> = BTreeMap::new();
        let mut by_item: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for line in lines {
            orders.insert(line.order_id.as_str(), 0);
            by_item
                .entry(line.item_id.as_str())
                .or_default()
                .push(line.order_id.as_str());
        }
        for (idx, position) in orders.values_mut().enumerate() {
            *position = idx as u32;
        }

        let mut items = Vec::with_capacity(by_item.len());
        let mut columns = Vec::with_capacity(by_item.len());
        for (item_id, order_ids) in by_item {
            let column: RoaringBitmap = order_ids.iter().filter_map(|o| orders.get(o).copied()).collect();
            items.push(item_id.to_string());
            columns.push(column);
        }

        debug!(
            "Presence matrix: {} orders x {} items",
            orders.len(),
            items.len()
        );

        Self {
            items,
            columns,
            order_count: orders.len() as u32,
        }
    }

    pub fn order_count(&self) -> u32 {
        self.order_count
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order_count == 0
    }

    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn item_at(&self, column: usize) -> Option<&str> {
        self.items.get(column).map(|s| s.as_str())
    }

    /// Orders containing the item at `column`
    pub fn column(&self, column: usize) -> &RoaringBitmap {
        &self.columns[column]
    }

    /// Number of orders containing every item in `columns`
    pub fn support_count(&self, columns: &[usize]) -> u64 {
        let Some((&first, rest)) = columns.split_first() else {
            return u64::from(self.order_count);
        };
        let mut orders = self.columns[first].clone();
        for &col in rest {
            orders &= &self.columns[col];
        }
        orders.len()
    }

    /// Fraction of orders containing every item in `columns`
    pub fn support(&self, columns: &[usize]) -> f64 {
        if self.order_count == 0 {
            return 0.0;
        }
        self.support_count(columns) as f64 / f64::from(self.order_count)
    }
}
