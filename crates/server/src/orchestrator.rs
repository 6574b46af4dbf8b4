//! # Recommendation Orchestrator
//!
//! Async front of the [`RecommendationEngine`] for request handlers.
//!
//! Scoring, mining and training are CPU-bound, so every call runs on the
//! blocking pool via `spawn_blocking` and the async workers stay free. A full
//! refresh runs the hybrid retrain and the rule mining side by side with
//! `tokio::join!`; they guard different snapshots.
//!
//! A scoring task that dies (panics) still yields a result: the
//! `popular (error fallback)` list against the snapshot currently served.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{info, warn};

use data_loader::ItemId;
use pipeline::{HybridBlender, RecommendationResult};
use rules::MiningReport;

use crate::engine::{RecommendationEngine, RefreshReport, RetrainReport};

#[derive(Clone)]
pub struct RecommendationOrchestrator {
    engine: Arc<RecommendationEngine>,
}

impl RecommendationOrchestrator {
    pub fn new(engine: Arc<RecommendationEngine>) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &Arc<RecommendationEngine> {
        &self.engine
    }

    /// Top-N recommendations for a user; never fails
    pub async fn get_recommendations(&self, user_id: &str, n: usize) -> RecommendationResult {
        let start_time = Instant::now();

        let task = tokio::task::spawn_blocking({
            let engine = self.engine.clone();
            let user_id = user_id.to_string();
            move || engine.get_recommendations(&user_id, n)
        });

        let result = match task.await {
            Ok(result) => result,
            Err(e) => {
                warn!("Recommendation task for user {} failed: {}", user_id, e);
                HybridBlender::error_fallback(&self.engine.snapshot(), user_id, n)
            }
        };

        info!(
            "Recommendations for user {}: {} items ({}) in {:.2?}",
            user_id,
            result.len(),
            result.recommendation_type,
            start_time.elapsed()
        );
        result
    }

    /// Cart-based suggestions; a failed lookup yields an empty list
    pub async fn get_cart_recommendations(&self, items: Vec<String>, count: usize) -> Vec<ItemId> {
        let task = tokio::task::spawn_blocking({
            let engine = self.engine.clone();
            move || engine.get_cart_recommendations(&items, count)
        });

        match task.await {
            Ok(recommendations) => recommendations,
            Err(e) => {
                warn!("Cart recommendation task failed: {}", e);
                Vec::new()
            }
        }
    }

    pub async fn retrain(&self, force: bool) -> Result<RetrainReport> {
        let start_time = Instant::now();
        let engine = self.engine.clone();
        let report = tokio::task::spawn_blocking(move || engine.retrain(force))
            .await
            .context("Retrain task panicked")?
            .context("Retrain failed")?;
        info!("Retrain finished in {:.2?}", start_time.elapsed());
        Ok(report)
    }

    pub async fn refresh_rules(&self) -> Result<MiningReport> {
        let start_time = Instant::now();
        let engine = self.engine.clone();
        let report = tokio::task::spawn_blocking(move || engine.refresh_rules())
            .await
            .context("Rule refresh task panicked")?
            .context("Rule refresh failed")?;
        info!("Rule refresh finished in {:.2?}", start_time.elapsed());
        Ok(report)
    }

    /// Retrain and re-mine in parallel; both must succeed
    pub async fn refresh(&self, force: bool) -> Result<RefreshReport> {
        let (retrain, rules) = tokio::join!(self.retrain(force), self.refresh_rules());
        Ok(RefreshReport {
            retrain: retrain?,
            rules: rules?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use data_loader::{Interaction, OrderLine, StaticSource};
    use pipeline::RecommendationType;
    use sources::LatentFactorConfig;

    fn create_test_orchestrator() -> RecommendationOrchestrator {
        let interactions = vec![
            Interaction::new("C1", "A-1", 1.0),
            Interaction::new("C1", "A-2", 2.0),
            Interaction::new("C2", "A-1", 1.0),
            Interaction::new("C2", "B-1", 1.0),
            Interaction::new("C3", "A-2", 1.0),
            Interaction::new("C3", "B-1", 3.0),
        ];
        let order_lines = vec![
            OrderLine::new("o1", "A-1"),
            OrderLine::new("o1", "B-1"),
            OrderLine::new("o2", "A-1"),
            OrderLine::new("o2", "B-1"),
            OrderLine::new("o3", "A-2"),
        ];
        let config = EngineConfig {
            latent: LatentFactorConfig {
                factor_count: 4,
                epoch_count: 5,
                ..LatentFactorConfig::default()
            },
            ..EngineConfig::default()
        };
        let source = Arc::new(StaticSource::new(interactions, order_lines));
        RecommendationOrchestrator::new(Arc::new(RecommendationEngine::new(config, source)))
    }

    #[tokio::test]
    async fn test_refresh_then_recommend() {
        let orchestrator = create_test_orchestrator();
        let report = orchestrator.refresh(false).await.unwrap();
        assert_eq!(report.retrain.users, 3);

        let result = orchestrator.get_recommendations("C1", 2).await;
        assert!(result.user_exists);
        assert_eq!(result.recommendation_type, RecommendationType::Personalized);

        let cart = orchestrator
            .get_cart_recommendations(vec!["A-1".to_string()], 3)
            .await;
        assert_eq!(cart, vec!["B-1"]);
    }

    #[tokio::test]
    async fn test_unknown_user_before_and_after_refresh() {
        let orchestrator = create_test_orchestrator();
        let before = orchestrator.get_recommendations("nobody", 3).await;
        assert!(before.is_empty());

        orchestrator.refresh(false).await.unwrap();
        let after = orchestrator.get_recommendations("nobody", 3).await;
        assert_eq!(after.recommendation_type, RecommendationType::Popular);
        assert!(!after.user_exists);
        assert_eq!(after.len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_requests_agree() {
        let orchestrator = create_test_orchestrator();
        orchestrator.retrain(false).await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let orchestrator = orchestrator.clone();
                tokio::spawn(async move { orchestrator.get_recommendations("C2", 3).await })
            })
            .collect();

        let mut results = Vec::new();
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }
}
