//! Cart-based recommendations: "people who bought X also bought Y".

use crate::apriori::{mine_frequent_itemsets, validate_thresholds};
use crate::error::{Result, RuleError};
use crate::index::RuleIndex;
use crate::presence::PresenceMatrix;
use crate::rules::{derive_rules, AssociationRule};
use data_loader::{ItemId, OrderLine};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Trim ids, drop empty ones and duplicates; first occurrence wins
pub fn normalize_cart<S: AsRef<str>>(items: &[S]) -> Vec<ItemId> {
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|item| item.as_ref().trim())
        .filter(|item| !item.is_empty() && seen.insert(item.to_string()))
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinerConfig {
    /// Minimum fraction of orders an itemset must appear in
    pub min_support: f32,
    pub min_lift: f32,
    /// Largest itemset considered; unbounded when `None`
    pub max_itemset_len: Option<usize>,
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            min_support: 0.02,
            min_lift: 1.0,
            max_itemset_len: None,
        }
    }
}

impl MinerConfig {
    pub fn validate(&self) -> Result<()> {
        validate_thresholds(self.min_support, self.max_itemset_len)?;
        if !(self.min_lift.is_finite() && self.min_lift >= 0.0) {
            return Err(RuleError::InvalidLift(self.min_lift));
        }
        Ok(())
    }
}

/// Counts from one mining run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MiningReport {
    pub orders: usize,
    pub items: usize,
    pub itemsets: usize,
    pub rules: usize,
}

/// Rule list plus its index. Immutable; a new mining run builds a new one.
#[derive(Debug, Clone, Default)]
pub struct CartRecommender {
    rules: Vec<AssociationRule>,
    index: RuleIndex,
}

impl CartRecommender {
    /// Index rules given in discovery order
    pub fn from_rules(rules: Vec<AssociationRule>) -> Self {
        let index = RuleIndex::build(&rules);
        Self { rules, index }
    }

    /// Mine rules from raw order lines
    #[instrument(skip(lines, config), fields(lines = lines.len()))]
    pub fn mine(lines: &[OrderLine], config: &MinerConfig) -> Result<(Self, MiningReport)> {
        config.validate()?;

        let matrix = PresenceMatrix::from_order_lines(lines);
        let itemsets = mine_frequent_itemsets(&matrix, config.min_support, config.max_itemset_len)?;
        let rules = derive_rules(&matrix, &itemsets, config.min_lift)?;

        let report = MiningReport {
            orders: matrix.order_count() as usize,
            items: matrix.item_count(),
            itemsets: itemsets.len(),
            rules: rules.len(),
        };
        info!(
            "Mined {} rules from {} itemsets over {} orders",
            report.rules, report.itemsets, report.orders
        );

        Ok((Self::from_rules(rules), report))
    }

    pub fn rules(&self) -> &[AssociationRule] {
        &self.rules
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Up to `count` items to add to `cart`, strongest rule first.
    ///
    /// ## Algorithm
    /// 1. Normalize the cart; empty cart gives an empty list
    /// 2. Collect the rules whose antecedent touches any cart item
    /// 3. Sort them by lift descending, ties in discovery order
    /// 4. Walk their consequents, skipping items in the cart or already
    ///    chosen, until `count` items are chosen
    pub fn recommend<S: AsRef<str>>(&self, cart: &[S], count: usize) -> Vec<ItemId> {
        let cart = normalize_cart(cart);
        if cart.is_empty() || count == 0 {
            return Vec::new();
        }

        let mut candidates = self.index.candidates(&cart);
        candidates.sort_by(|&a, &b| {
            self.rules[b]
                .lift
                .partial_cmp(&self.rules[a].lift)
                .unwrap_or(Ordering::Equal)
        });

        let in_cart: HashSet<&str> = cart.iter().map(String::as_str).collect();
        let mut chosen: HashSet<&str> = HashSet::new();
        let mut recommendations = Vec::with_capacity(count);

        'rules: for rule_id in &candidates {
            for item in &self.rules[*rule_id].consequent {
                if in_cart.contains(item.as_str()) || !chosen.insert(item.as_str()) {
                    continue;
                }
                recommendations.push(item.clone());
                if recommendations.len() >= count {
                    break 'rules;
                }
            }
        }

        debug!(
            "Cart of {} items matched {} rules, {} recommendations",
            cart.len(),
            candidates.len(),
            recommendations.len()
        );
        recommendations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_recommender() -> CartRecommender {
        CartRecommender::from_rules(vec![
            AssociationRule::with_lift(["A"], ["B"], 3.0),
            AssociationRule::with_lift(["A"], ["C"], 1.5),
            AssociationRule::with_lift(["B"], ["D"], 2.0),
        ])
    }

    #[test]
    fn test_highest_lift_first() {
        let recommender = create_test_recommender();
        assert_eq!(recommender.recommend(&["A"], 2), vec!["B", "C"]);
    }

    #[test]
    fn test_cart_items_are_skipped() {
        let recommender = create_test_recommender();
        assert_eq!(recommender.recommend(&["A", "B"], 3), vec!["D", "C"]);
    }

    #[test]
    fn test_count_limits_output() {
        let recommender = create_test_recommender();
        assert_eq!(recommender.recommend(&["A"], 1), vec!["B"]);
    }

    #[test]
    fn test_empty_and_unknown_carts() {
        let recommender = create_test_recommender();
        assert!(recommender.recommend::<&str>(&[], 5).is_empty());
        assert!(recommender.recommend(&["  ", ""], 5).is_empty());
        assert!(recommender.recommend(&["Z"], 5).is_empty());
    }

    #[test]
    fn test_equal_lift_keeps_discovery_order() {
        let recommender = CartRecommender::from_rules(vec![
            AssociationRule::with_lift(["A"], ["Y"], 2.0),
            AssociationRule::with_lift(["A"], ["X"], 2.0),
        ]);
        assert_eq!(recommender.recommend(&["A"], 2), vec!["Y", "X"]);
    }

    #[test]
    fn test_consequents_deduplicated() {
        let recommender = CartRecommender::from_rules(vec![
            AssociationRule::with_lift(["A"], ["B", "C"], 2.0),
            AssociationRule::with_lift(["A"], ["C", "D"], 1.5),
        ]);
        assert_eq!(recommender.recommend(&["A"], 5), vec!["B", "C", "D"]);
    }

    #[test]
    fn test_normalize_cart() {
        assert_eq!(
            normalize_cart(&[" A ", "B", "", "A", "b"]),
            vec!["A", "B", "b"]
        );
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = MinerConfig {
            min_support: 1.5,
            ..MinerConfig::default()
        };
        assert_eq!(
            CartRecommender::mine(&[], &config).map(|(_, report)| report),
            Err(RuleError::InvalidSupport(1.5))
        );
    }
}
