//! Association rules derived from frequent itemsets.
//!
//! For every frequent itemset `S` with at least two items, each non-empty
//! proper subset `X` yields the rule `X → S \ X` with
//!
//! ```text
//! confidence = support(S) / support(X)
//! lift       = confidence / support(S \ X)
//! ```
//!
//! Antecedent sizes run from |S|-1 down to 1, subsets of one size in
//! lexicographic order. Rules below `min_lift` are dropped.

use crate::apriori::FrequentItemset;
use crate::error::{Result, RuleError};
use crate::presence::PresenceMatrix;
use data_loader::ItemId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssociationRule {
    pub antecedent: Vec<ItemId>,
    pub consequent: Vec<ItemId>,
    pub support: f64,
    pub confidence: f64,
    pub lift: f64,
}

impl AssociationRule {
    /// A rule scored by lift alone
    pub fn with_lift(
        antecedent: impl IntoIterator<Item = impl Into<ItemId>>,
        consequent: impl IntoIterator<Item = impl Into<ItemId>>,
        lift: f64,
    ) -> Self {
        Self {
            antecedent: antecedent.into_iter().map(Into::into).collect(),
            consequent: consequent.into_iter().map(Into::into).collect(),
            support: 0.0,
            confidence: 0.0,
            lift,
        }
    }
}

/// All `k`-combinations of `items`, lexicographic by position
fn combinations(items: &[usize], k: usize) -> Vec<Vec<usize>> {
    let n = items.len();
    if k == 0 || k > n {
        return Vec::new();
    }
    let mut picks: Vec<usize> = (0..k).collect();
    let mut out = Vec::new();
    loop {
        out.push(picks.iter().map(|&p| items[p]).collect());

        // rightmost pick that can still move right
        let Some(slot) = (0..k).rev().find(|&i| picks[i] < n - k + i) else {
            return out;
        };
        picks[slot] += 1;
        for i in slot + 1..k {
            picks[i] = picks[i - 1] + 1;
        }
    }
}

#[instrument(skip(matrix, itemsets), fields(itemsets = itemsets.len()))]
pub fn derive_rules(
    matrix: &PresenceMatrix,
    itemsets: &[FrequentItemset],
    min_lift: f32,
) -> Result<Vec<AssociationRule>> {
    if !(min_lift.is_finite() && min_lift >= 0.0) {
        return Err(RuleError::InvalidLift(min_lift));
    }
    let min_lift = f64::from(min_lift);

    let supports: HashMap<&[usize], f64> = itemsets
        .iter()
        .map(|set| (set.items.as_slice(), set.support))
        .collect();
    // Subsets of a frequent itemset are frequent; the matrix covers anything missing
    let support_of = |items: &[usize]| supports.get(items).copied().unwrap_or_else(|| matrix.support(items));
    let names = |items: &[usize]| -> Vec<ItemId> {
        items
            .iter()
            .filter_map(|&c| matrix.item_at(c))
            .map(str::to_string)
            .collect()
    };

    let mut rules = Vec::new();
    for set in itemsets.iter().filter(|s| s.items.len() >= 2) {
        for size in (1..set.items.len()).rev() {
            for antecedent in combinations(&set.items, size) {
                let consequent: Vec<usize> = set
                    .items
                    .iter()
                    .copied()
                    .filter(|c| !antecedent.contains(c))
                    .collect();

                let antecedent_support = support_of(&antecedent);
                let consequent_support = support_of(&consequent);
                if antecedent_support <= 0.0 || consequent_support <= 0.0 {
                    continue;
                }
                let confidence = set.support / antecedent_support;
                let lift = confidence / consequent_support;
                if lift < min_lift {
                    continue;
                }

                rules.push(AssociationRule {
                    antecedent: names(&antecedent),
                    consequent: names(&consequent),
                    support: set.support,
                    confidence,
                    lift,
                });
            }
        }
    }

    debug!("Derived {} rules", rules.len());
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apriori::mine_frequent_itemsets;
    use data_loader::OrderLine;

    #[test]
    fn test_combinations_order() {
        assert_eq!(
            combinations(&[1, 2, 3], 2),
            vec![vec![1, 2], vec![1, 3], vec![2, 3]]
        );
        assert_eq!(combinations(&[7], 1), vec![vec![7]]);
        assert!(combinations(&[1, 2], 3).is_empty());
    }

    fn create_test_matrix() -> PresenceMatrix {
        // beer+chips together in 3 of 5 orders; milk alone otherwise
        let orders: [&[&str]; 5] = [
            &["beer", "chips"],
            &["beer", "chips"],
            &["beer", "chips", "milk"],
            &["milk"],
            &["milk"],
        ];
        let lines: Vec<OrderLine> = orders
            .iter()
            .enumerate()
            .flat_map(|(idx, items)| items.iter().map(move |item| OrderLine::new(format!("o{}", idx), *item)))
            .collect();
        PresenceMatrix::from_order_lines(&lines)
    }

    #[test]
    fn test_confidence_and_lift() {
        let matrix = create_test_matrix();
        let itemsets = mine_frequent_itemsets(&matrix, 0.4, None).unwrap();
        let rules = derive_rules(&matrix, &itemsets, 1.0).unwrap();

        // beer -> chips: support 0.6, confidence 1.0, lift 1/0.6
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].antecedent, vec!["beer"]);
        assert_eq!(rules[0].consequent, vec!["chips"]);
        assert!((rules[0].confidence - 1.0).abs() < 1e-9);
        assert!((rules[0].lift - 1.0 / 0.6).abs() < 1e-9);
        assert_eq!(rules[1].antecedent, vec!["chips"]);
    }

    #[test]
    fn test_min_lift_filters() {
        let matrix = create_test_matrix();
        let itemsets = mine_frequent_itemsets(&matrix, 0.4, None).unwrap();
        assert!(derive_rules(&matrix, &itemsets, 2.0).unwrap().is_empty());
    }

    #[test]
    fn test_larger_antecedents_first() {
        let lines: Vec<OrderLine> = (0..3)
            .flat_map(|o| ["a", "b", "c"].map(|item| OrderLine::new(format!("o{}", o), item)))
            .collect();
        let matrix = PresenceMatrix::from_order_lines(&lines);
        let itemsets = mine_frequent_itemsets(&matrix, 0.5, None).unwrap();
        let rules = derive_rules(&matrix, &itemsets, 0.0).unwrap();

        // 3 pairs x 2 rules + 6 rules from abc
        assert_eq!(rules.len(), 12);
        let abc: Vec<&AssociationRule> = rules.iter().filter(|r| r.antecedent.len() + r.consequent.len() == 3).collect();
        assert_eq!(abc[0].antecedent, vec!["a", "b"]);
        assert_eq!(abc[0].consequent, vec!["c"]);
        assert_eq!(abc[3].antecedent, vec!["a"]);
        assert_eq!(abc[3].consequent, vec!["b", "c"]);
    }

    #[test]
    fn test_invalid_lift() {
        let matrix = create_test_matrix();
        assert!(matches!(
            derive_rules(&matrix, &[], f32::NAN),
            Err(RuleError::InvalidLift(_))
        ));
        assert!(derive_rules(&matrix, &[], -1.0).is_err());
    }
}
