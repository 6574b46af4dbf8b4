//! Engine configuration.
//!
//! Every field has a default. `from_env` overrides single fields from
//! `RECS_*` variables, `from_json_file` reads the whole structure.
//!
//! Environment variables:
//! - `RECS_DATA_DIR`, `RECS_ARTIFACT_DIR`
//! - `RECS_DEFAULT_RECOMMENDATIONS`, `RECS_CACHE_TTL_SECS`
//! - `RECS_NEIGHBOR_COUNT`, `RECS_SIMILARITY_METRIC` (cosine/blended),
//!   `RECS_MIN_COMMON_ITEMS`
//! - `RECS_LATENT_FACTOR_COUNT`, `RECS_LATENT_EPOCH_COUNT`,
//!   `RECS_LATENT_LEARNING_RATE`, `RECS_LATENT_REGULARIZATION`,
//!   `RECS_LATENT_RANDOM_SEED`, `RECS_LATENT_HOLDOUT_FRACTION`
//! - `RECS_QUANTITY_SCALE`
//! - `RECS_MIN_SUPPORT`, `RECS_MIN_LIFT`, `RECS_MAX_ITEMSET_LEN`

use crate::error::{EngineError, Result};
use rules::MinerConfig;
use serde::{Deserialize, Serialize};
use sources::{LatentFactorConfig, SimilarityEngine, SimilarityMetric, DEFAULT_QUANTITY_SCALE};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopularityConfig {
    /// Divisor for the average-quantity term
    pub quantity_scale: f32,
}

impl Default for PopularityConfig {
    fn default() -> Self {
        Self {
            quantity_scale: DEFAULT_QUANTITY_SCALE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub data_dir: PathBuf,
    pub artifact_dir: PathBuf,
    /// Count used when a cart lookup asks for 0 items
    pub default_recommendations: usize,
    pub cache_ttl_secs: u64,
    pub neighbor_count: usize,
    pub similarity_metric: SimilarityMetric,
    pub min_common_items: usize,
    pub latent: LatentFactorConfig,
    pub popularity: PopularityConfig,
    pub rules: MinerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            artifact_dir: PathBuf::from("models"),
            default_recommendations: 5,
            cache_ttl_secs: 3600,
            neighbor_count: 10,
            similarity_metric: SimilarityMetric::Blended,
            min_common_items: 2,
            latent: LatentFactorConfig::default(),
            popularity: PopularityConfig::default(),
            rules: MinerConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("{}: cannot parse {:?}", key, raw)))
}

impl EngineConfig {
    /// Defaults overridden by `RECS_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns per variable name
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        macro_rules! apply {
            ($key:literal => $($field:ident).+) => {
                if let Some(raw) = lookup($key) {
                    config.$($field).+ = parse_var($key, &raw)?;
                }
            };
        }

        if let Some(raw) = lookup("RECS_DATA_DIR") {
            config.data_dir = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("RECS_ARTIFACT_DIR") {
            config.artifact_dir = PathBuf::from(raw);
        }
        apply!("RECS_DEFAULT_RECOMMENDATIONS" => default_recommendations);
        apply!("RECS_CACHE_TTL_SECS" => cache_ttl_secs);
        apply!("RECS_NEIGHBOR_COUNT" => neighbor_count);
        apply!("RECS_MIN_COMMON_ITEMS" => min_common_items);
        if let Some(raw) = lookup("RECS_SIMILARITY_METRIC") {
            config.similarity_metric = match raw.trim().to_ascii_lowercase().as_str() {
                "cosine" => SimilarityMetric::Cosine,
                "blended" => SimilarityMetric::Blended,
                other => {
                    return Err(EngineError::Config(format!(
                        "RECS_SIMILARITY_METRIC: unknown metric {:?}",
                        other
                    )));
                }
            };
        }
        apply!("RECS_LATENT_FACTOR_COUNT" => latent.factor_count);
        apply!("RECS_LATENT_EPOCH_COUNT" => latent.epoch_count);
        apply!("RECS_LATENT_LEARNING_RATE" => latent.learning_rate);
        apply!("RECS_LATENT_REGULARIZATION" => latent.regularization);
        apply!("RECS_LATENT_RANDOM_SEED" => latent.random_seed);
        apply!("RECS_LATENT_HOLDOUT_FRACTION" => latent.holdout_fraction);
        apply!("RECS_QUANTITY_SCALE" => popularity.quantity_scale);
        apply!("RECS_MIN_SUPPORT" => rules.min_support);
        apply!("RECS_MIN_LIFT" => rules.min_lift);
        if let Some(raw) = lookup("RECS_MAX_ITEMSET_LEN") {
            config.rules.max_itemset_len = Some(parse_var("RECS_MAX_ITEMSET_LEN", &raw)?);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.neighbor_count == 0 {
            return Err(EngineError::Config("neighbor_count must be > 0".into()));
        }
        if !(self.popularity.quantity_scale.is_finite() && self.popularity.quantity_scale > 0.0) {
            return Err(EngineError::Config(format!(
                "quantity_scale must be positive, got {}",
                self.popularity.quantity_scale
            )));
        }
        self.latent
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        self.rules
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Similarity engine as configured
    pub fn similarity_engine(&self) -> SimilarityEngine {
        SimilarityEngine::new()
            .with_metric(self.similarity_metric)
            .with_neighbor_count(self.neighbor_count)
            .with_min_common_items(self.min_common_items)
    }
}
