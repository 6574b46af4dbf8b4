//! # Recommendation Engine
//!
//! Owns the served snapshots and the only code paths that replace them.
//!
//! ## Snapshots
//! - hybrid: interaction matrix + latent-factor model + popularity ranking,
//!   all built from one fetch
//! - rules: association rules + their index
//!
//! Each is held as an `Arc` behind a lock that is taken only long enough to
//! clone or swap the `Arc`. A request clones the current `Arc` once and
//! works on it to the end, so it sees either the old or the new snapshot,
//! never a mix. Each snapshot kind has a single writer: a refresh that finds
//! another one of the same kind running is rejected with
//! [`EngineError::RetrainInProgress`]. A failed refresh leaves the served
//! snapshot untouched.

use crate::cache::{cache_key, ResultCache};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::store::ArtifactStore;
use data_loader::{DataLoadError, InteractionMatrix, InteractionSource, ItemId};
use parking_lot::{Mutex, RwLock};
use pipeline::{HybridBlender, HybridSnapshot, RecommendationResult, RecommendationType};
use rules::{CartRecommender, MiningReport};
use serde::Serialize;
use sources::{LatentFactorModel, PopularityRanker, RatingPredictor};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Where the served model came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelOrigin {
    Trained,
    Loaded,
}

/// Summary of one successful retrain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrainReport {
    pub version: u64,
    pub interactions: usize,
    pub users: usize,
    pub items: usize,
    pub origin: ModelOrigin,
    pub holdout_rmse: Option<f32>,
    /// Whether a freshly trained model reached the artifact store
    pub persisted: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub retrain: RetrainReport,
    pub rules: MiningReport,
}

pub struct RecommendationEngine {
    config: EngineConfig,
    source: Arc<dyn InteractionSource>,
    store: Option<Arc<dyn ArtifactStore>>,
    cache: Option<Arc<dyn ResultCache>>,
    blender: HybridBlender,
    hybrid: RwLock<Arc<HybridSnapshot>>,
    rules: RwLock<Arc<CartRecommender>>,
    retrain_lock: Mutex<()>,
    rules_lock: Mutex<()>,
    next_version: AtomicU64,
}

impl RecommendationEngine {
    /// Engine serving empty snapshots until the first refresh
    pub fn new(config: EngineConfig, source: Arc<dyn InteractionSource>) -> Self {
        let blender = HybridBlender::new(config.similarity_engine());
        Self {
            config,
            source,
            store: None,
            cache: None,
            blender,
            hybrid: RwLock::new(Arc::new(HybridSnapshot::empty())),
            rules: RwLock::new(Arc::new(CartRecommender::default())),
            retrain_lock: Mutex::new(()),
            rules_lock: Mutex::new(()),
            next_version: AtomicU64::new(1),
        }
    }

    /// Persist trained models and reuse them across restarts
    pub fn with_store(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Cache personalized and popular results
    pub fn with_cache(mut self, cache: Arc<dyn ResultCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn blender(&self) -> &HybridBlender {
        &self.blender
    }

    /// The hybrid snapshot currently served
    pub fn snapshot(&self) -> Arc<HybridSnapshot> {
        self.hybrid.read().clone()
    }

    /// The rule set currently served
    pub fn rule_set(&self) -> Arc<CartRecommender> {
        self.rules.read().clone()
    }

    /// Top-N recommendations for a user.
    ///
    /// Scoring failures resolve to the popular fallback. A panic while
    /// scoring still unwinds to the caller; the async orchestrator turns it
    /// into the fallback.
    pub fn get_recommendations(&self, user_id: &str, n: usize) -> RecommendationResult {
        let key = cache_key(user_id, n);
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get(&key)) {
            return cached;
        }

        let snapshot = self.snapshot();
        let result = self.blender.recommend(&snapshot, user_id, n);

        if let Some(cache) = &self.cache {
            if result.recommendation_type != RecommendationType::PopularErrorFallback {
                self.cache_if_current(cache.as_ref(), &key, &result, snapshot.version());
            }
        }
        result
    }

    /// Store a result computed from snapshot `version`.
    ///
    /// A retrain swaps the snapshot before it flushes. A swap landing after
    /// the second version check is followed by a flush that clears the
    /// entry; an earlier swap is caught by that check.
    fn cache_if_current(&self, cache: &dyn ResultCache, key: &str, result: &RecommendationResult, version: u64) {
        let current = || self.hybrid.read().version() == version;
        if !current() {
            return;
        }
        cache.put(key, result.clone(), self.config.cache_ttl());
        if !current() {
            debug!("Snapshot replaced while caching {}, dropping entry", key);
            cache.remove(key);
        }
    }

    /// Items to suggest for a cart; `count == 0` uses the configured default
    pub fn get_cart_recommendations<S: AsRef<str>>(&self, items: &[S], count: usize) -> Vec<ItemId> {
        let count = if count == 0 {
            self.config.default_recommendations
        } else {
            count
        };
        self.rule_set().recommend(items, count)
    }

    /// Rebuild the hybrid snapshot from a fresh fetch.
    ///
    /// ## Algorithm
    /// 1. Take the retrain lock or fail with `RetrainInProgress`
    /// 2. Fetch interactions and build the matrix and popularity ranking
    /// 3. Unless `force`, reuse the latest stored model when it was trained
    ///    on identical data; otherwise train and store a new one
    /// 4. Swap the new snapshot in and flush the result cache
    #[instrument(skip(self))]
    pub fn retrain(&self, force: bool) -> Result<RetrainReport> {
        let _guard = self
            .retrain_lock
            .try_lock()
            .ok_or(EngineError::RetrainInProgress)?;

        let interactions = self.source.fetch_interactions().map_err(|e| {
            warn!("Retrain aborted, keeping the served snapshot: {}", e);
            e
        })?;
        if interactions.is_empty() {
            return Err(DataLoadError::EmptyData("interactions".to_string()).into());
        }

        let matrix = InteractionMatrix::from_interactions(&interactions);
        let popularity =
            PopularityRanker::from_interactions(&interactions, self.config.popularity.quantity_scale);

        let (model, origin) = match self.load_matching_model(&matrix, force) {
            Some(model) => (model, ModelOrigin::Loaded),
            None => (LatentFactorModel::train(&matrix, &self.config.latent)?, ModelOrigin::Trained),
        };
        let persisted = origin == ModelOrigin::Trained && self.persist(&model);

        let version = self.next_version.fetch_add(1, Ordering::SeqCst);
        let report = RetrainReport {
            version,
            interactions: interactions.len(),
            users: matrix.user_count(),
            items: matrix.item_count(),
            origin,
            holdout_rmse: model.holdout_rmse(),
            persisted,
        };

        let predictor: Arc<dyn RatingPredictor> = Arc::new(model);
        let snapshot = HybridSnapshot::new(version, matrix, Some(predictor), popularity);
        *self.hybrid.write() = Arc::new(snapshot);

        if let Some(cache) = &self.cache {
            cache.flush();
        }

        info!(
            "Serving snapshot v{}: {} users, {} items, model {:?}",
            report.version, report.users, report.items, report.origin
        );
        Ok(report)
    }

    /// Re-mine association rules from a fresh fetch of order lines
    #[instrument(skip(self))]
    pub fn refresh_rules(&self) -> Result<MiningReport> {
        let _guard = self
            .rules_lock
            .try_lock()
            .ok_or(EngineError::RetrainInProgress)?;

        let lines = self.source.fetch_order_lines().map_err(|e| {
            warn!("Rule refresh aborted, keeping the served rules: {}", e);
            e
        })?;
        if lines.is_empty() {
            return Err(DataLoadError::EmptyData("order lines".to_string()).into());
        }

        let (recommender, report) = CartRecommender::mine(&lines, &self.config.rules)?;
        *self.rules.write() = Arc::new(recommender);

        info!("Serving {} rules", report.rules);
        Ok(report)
    }

    /// Retrain the hybrid snapshot, then re-mine the rules
    pub fn refresh(&self, force: bool) -> Result<RefreshReport> {
        let retrain = self.retrain(force)?;
        let rules = self.refresh_rules()?;
        Ok(RefreshReport { retrain, rules })
    }

    /// Latest stored model, if it was trained on data identical to `matrix`
    fn load_matching_model(&self, matrix: &InteractionMatrix, force: bool) -> Option<LatentFactorModel> {
        if force {
            return None;
        }
        let store = self.store.as_ref()?;

        let loaded = store
            .latest()
            .and_then(|handle| match handle {
                Some(handle) => store.load(&handle),
                None => Ok(None),
            });

        match loaded {
            Ok(Some(model)) if model.fingerprint().matches(&matrix.fingerprint()) => {
                info!("Reusing stored model trained on identical data");
                Some(model)
            }
            Ok(Some(_)) => {
                info!("Stored model was trained on different data, retraining");
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Cannot load stored model, retraining: {}", e);
                None
            }
        }
    }

    fn persist(&self, model: &LatentFactorModel) -> bool {
        let Some(store) = &self.store else {
            return false;
        };
        match store.save(model) {
            Ok(_) => true,
            Err(e) => {
                warn!("Model trained but not persisted: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::store::FileArtifactStore;
    use data_loader::{Interaction, OrderLine, StaticSource};
    use sources::LatentFactorConfig;
    use std::sync::atomic::AtomicBool;
    use std::sync::{OnceLock, Weak};
    use std::time::Duration;

    fn create_test_source() -> StaticSource {
        let mut interactions = Vec::new();
        for (user, items) in [
            ("C1", &["milk", "bread", "eggs"][..]),
            ("C2", &["milk", "bread"][..]),
            ("C3", &["milk", "eggs", "flour"][..]),
            ("C4", &["coffee", "filters"][..]),
        ] {
            for item in items {
                interactions.push(Interaction::new(user, *item, 1.0));
            }
        }
        let mut order_lines = Vec::new();
        for (order, items) in [
            ("o1", &["milk", "bread"][..]),
            ("o2", &["milk", "bread"][..]),
            ("o3", &["coffee", "filters"][..]),
            ("o4", &["eggs"][..]),
        ] {
            for item in items {
                order_lines.push(OrderLine::new(order, *item));
            }
        }
        StaticSource::new(interactions, order_lines)
    }

    fn test_config() -> EngineConfig {
        EngineConfig {
            latent: LatentFactorConfig {
                factor_count: 4,
                epoch_count: 10,
                ..LatentFactorConfig::default()
            },
            rules: rules::MinerConfig {
                min_support: 0.25,
                ..rules::MinerConfig::default()
            },
            ..EngineConfig::default()
        }
    }

    fn create_test_engine() -> RecommendationEngine {
        RecommendationEngine::new(test_config(), Arc::new(create_test_source()))
    }

    #[test]
    fn test_empty_engine_serves_empty_popular() {
        let engine = create_test_engine();
        let result = engine.get_recommendations("C1", 3);
        assert_eq!(result.recommendation_type, RecommendationType::Popular);
        assert!(result.is_empty());
        assert!(engine.get_cart_recommendations(&["milk"], 3).is_empty());
    }

    #[test]
    fn test_retrain_swaps_snapshot() {
        let engine = create_test_engine();
        let report = engine.retrain(false).unwrap();

        assert_eq!(report.origin, ModelOrigin::Trained);
        assert_eq!(report.users, 4);
        assert!(!report.persisted);
        assert_eq!(engine.snapshot().version(), report.version);

        let result = engine.get_recommendations("C2", 2);
        assert_eq!(result.recommendation_type, RecommendationType::Personalized);
    }

    #[test]
    fn test_readers_keep_their_snapshot() {
        let engine = create_test_engine();
        engine.retrain(false).unwrap();
        let held = engine.snapshot();

        engine.retrain(true).unwrap();
        assert_ne!(held.version(), engine.snapshot().version());
        assert!(held.matrix().contains_user("C1"));
    }

    #[test]
    fn test_concurrent_retrain_is_rejected() {
        let engine = create_test_engine();
        let _running = engine.retrain_lock.lock();
        assert!(matches!(engine.retrain(false), Err(EngineError::RetrainInProgress)));
    }

    #[test]
    fn test_data_unavailable_keeps_served_snapshot() {
        let engine = RecommendationEngine::new(test_config(), Arc::new(StaticSource::default()));
        assert!(matches!(engine.retrain(false), Err(EngineError::DataUnavailable(_))));
        assert!(matches!(engine.refresh_rules(), Err(EngineError::DataUnavailable(_))));
        assert_eq!(engine.snapshot().version(), 0);
    }

    #[test]
    fn test_stored_model_is_reused_unless_forced() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::new(dir.path()));

        let first = create_test_engine().with_store(store.clone());
        let report = first.retrain(false).unwrap();
        assert_eq!(report.origin, ModelOrigin::Trained);
        assert!(report.persisted);

        let second = create_test_engine().with_store(store.clone());
        assert_eq!(second.retrain(false).unwrap().origin, ModelOrigin::Loaded);
        assert_eq!(
            first.get_recommendations("C3", 3),
            second.get_recommendations("C3", 3)
        );

        assert_eq!(second.retrain(true).unwrap().origin, ModelOrigin::Trained);
    }

    #[test]
    fn test_stored_model_for_other_data_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ArtifactStore> = Arc::new(FileArtifactStore::new(dir.path()));
        create_test_engine().with_store(store.clone()).retrain(false).unwrap();

        let mut source = create_test_source();
        source.interactions.push(Interaction::new("C5", "milk", 2.0));
        let engine = RecommendationEngine::new(test_config(), Arc::new(source)).with_store(store);

        assert_eq!(engine.retrain(false).unwrap().origin, ModelOrigin::Trained);
    }

    #[test]
    fn test_cache_is_filled_and_flushed() {
        let cache = Arc::new(InMemoryCache::new());
        let engine = create_test_engine().with_cache(cache.clone());
        engine.retrain(false).unwrap();

        let result = engine.get_recommendations("C1", 2);
        assert_eq!(cache.get(&cache_key("C1", 2)), Some(result.clone()));
        assert_eq!(engine.get_recommendations("C1", 2), result);

        engine.retrain(true).unwrap();
        assert!(cache.is_empty());
    }

    /// Source whose data can change between fetches
    struct SharedSource(parking_lot::Mutex<StaticSource>);

    impl InteractionSource for SharedSource {
        fn fetch_interactions(&self) -> data_loader::Result<Vec<Interaction>> {
            self.0.lock().fetch_interactions()
        }

        fn fetch_order_lines(&self) -> data_loader::Result<Vec<OrderLine>> {
            self.0.lock().fetch_order_lines()
        }
    }

    /// Cache whose first write happens after a retrain has already landed
    struct RetrainOnFirstPut {
        inner: InMemoryCache,
        engine: OnceLock<Weak<RecommendationEngine>>,
        source: Arc<SharedSource>,
        fired: AtomicBool,
    }

    impl ResultCache for RetrainOnFirstPut {
        fn get(&self, key: &str) -> Option<RecommendationResult> {
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: RecommendationResult, ttl: Duration) {
            if !self.fired.swap(true, Ordering::SeqCst) {
                let mut source = self.source.0.lock();
                source.interactions.push(Interaction::new("C9", "milk", 1.0));
                source.interactions.push(Interaction::new("C9", "bread", 1.0));
                drop(source);
                let engine = self.engine.get().and_then(Weak::upgrade).unwrap();
                engine.retrain(true).unwrap();
            }
            self.inner.put(key, value, ttl);
        }

        fn remove(&self, key: &str) {
            self.inner.remove(key)
        }

        fn flush(&self) {
            self.inner.flush()
        }
    }

    #[test]
    fn test_result_from_replaced_snapshot_is_not_served() {
        let source = Arc::new(SharedSource(parking_lot::Mutex::new(create_test_source())));
        let cache = Arc::new(RetrainOnFirstPut {
            inner: InMemoryCache::new(),
            engine: OnceLock::new(),
            source: source.clone(),
            fired: AtomicBool::new(false),
        });
        let engine = Arc::new(
            RecommendationEngine::new(test_config(), source).with_cache(cache.clone()),
        );
        assert!(cache.engine.set(Arc::downgrade(&engine)).is_ok());
        engine.retrain(false).unwrap();

        let before = engine.get_recommendations("C9", 3);
        assert!(!before.user_exists);
        assert!(cache.inner.is_empty());

        let after = engine.get_recommendations("C9", 3);
        assert!(after.user_exists);
        assert_eq!(after.recommendation_type, RecommendationType::Personalized);
    }

    #[test]
    fn test_cart_recommendations_use_default_count() {
        let engine = create_test_engine();
        engine.refresh_rules().unwrap();

        assert_eq!(engine.get_cart_recommendations(&["milk"], 0), vec!["bread"]);
        assert_eq!(engine.get_cart_recommendations(&[" coffee "], 1), vec!["filters"]);
        assert!(engine.get_cart_recommendations::<&str>(&[], 3).is_empty());
    }

    #[test]
    fn test_refresh_reports_both_paths() {
        let engine = create_test_engine();
        let report = engine.refresh(false).unwrap();
        assert_eq!(report.rules.orders, 4);
        assert!(report.rules.rules > 0);
        assert_eq!(report.retrain.interactions, 10);
    }
}
