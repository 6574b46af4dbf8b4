//! # Rules Crate
//!
//! Co-purchase association rules for cart-based recommendations.
//!
//! ## Pipeline
//! 1. `PresenceMatrix`: which orders contain which items, as bitmaps
//! 2. `mine_frequent_itemsets`: Apriori at a minimum support
//! 3. `derive_rules`: antecedent → consequent rules at a minimum lift
//! 4. `CartRecommender`: rules indexed by antecedent item, looked up per cart
//!
//! Mining is a batch step; the resulting `CartRecommender` is read-only and
//! replaced as a whole when rules are refreshed.

pub mod apriori;
pub mod error;
pub mod index;
pub mod presence;
pub mod recommender;
pub mod rules;

pub use apriori::{mine_frequent_itemsets, FrequentItemset};
pub use error::{Result, RuleError};
pub use index::RuleIndex;
pub use presence::PresenceMatrix;
pub use recommender::{normalize_cart, CartRecommender, MinerConfig, MiningReport};
pub use rules::{derive_rules, AssociationRule};
