//! Versioned, read-only inputs of one blend.
//!
//! The interaction matrix, the rating predictor and the popularity ranking
//! are built from the same data fetch and always travel together. A request
//! captures one `Arc<HybridSnapshot>` at its start and never sees a half
//! replaced pair.

use data_loader::InteractionMatrix;
use sources::{PopularityRanker, RatingPredictor};
use std::sync::Arc;

pub struct HybridSnapshot {
    version: u64,
    matrix: InteractionMatrix,
    predictor: Option<Arc<dyn RatingPredictor>>,
    popularity: PopularityRanker,
}

impl HybridSnapshot {
    pub fn new(
        version: u64,
        matrix: InteractionMatrix,
        predictor: Option<Arc<dyn RatingPredictor>>,
        popularity: PopularityRanker,
    ) -> Self {
        Self {
            version,
            matrix,
            predictor,
            popularity,
        }
    }

    /// Snapshot served before the first successful retrain
    pub fn empty() -> Self {
        Self::new(0, InteractionMatrix::empty(), None, PopularityRanker::default())
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn matrix(&self) -> &InteractionMatrix {
        &self.matrix
    }

    pub fn predictor(&self) -> Option<&dyn RatingPredictor> {
        self.predictor.as_deref()
    }

    pub fn popularity(&self) -> &PopularityRanker {
        &self.popularity
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.is_empty()
    }
}

impl Default for HybridSnapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl std::fmt::Debug for HybridSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HybridSnapshot")
            .field("version", &self.version)
            .field("users", &self.matrix.user_count())
            .field("items", &self.matrix.item_count())
            .field("has_predictor", &self.predictor.is_some())
            .field("popular_items", &self.popularity.len())
            .finish()
    }
}
