//! Item → rule lookup, so a cart touches only the rules it can match.

use crate::rules::AssociationRule;
use data_loader::ItemId;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct RuleIndex {
    /// Rule ids (positions in the rule list) per antecedent item, ascending
    by_item: HashMap<ItemId, Vec<usize>>,
}

impl RuleIndex {
    pub fn build(rules: &[AssociationRule]) -> Self {
        let mut by_item: HashMap<ItemId, Vec<usize>> = HashMap::new();
        for (rule_id, rule) in rules.iter().enumerate() {
            for item in &rule.antecedent {
                let ids = by_item.entry(item.clone()).or_default();
                if ids.last() != Some(&rule_id) {
                    ids.push(rule_id);
                }
            }
        }
        Self { by_item }
    }

    /// Rules whose antecedent contains `item_id`
    pub fn rules_for(&self, item_id: &str) -> &[usize] {
        self.by_item.get(item_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Union of the rule ids of every item, ascending
    pub fn candidates<S: AsRef<str>>(&self, items: &[S]) -> Vec<usize> {
        let ids: BTreeSet<usize> = items
            .iter()
            .flat_map(|item| self.rules_for(item.as_ref()).iter().copied())
            .collect();
        ids.into_iter().collect()
    }

    pub fn item_count(&self) -> usize {
        self.by_item.len()
    }
}
