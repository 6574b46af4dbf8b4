//! Latent-Factor Model - biased matrix factorization trained with SGD
//!
//! ## Model
//! ```text
//! r̂(u, i) = μ + b_u + b_i + p_u · q_i
//! ```
//! `μ` is the mean observed quantity, `b_u`/`b_i` are user/item biases and
//! `p_u`/`q_i` are `factor_count`-dimensional latent vectors.
//!
//! ## Training
//! 1. Collect the observed (user, item, quantity) entries of the matrix
//! 2. Shuffle them with the seeded RNG and hold out `holdout_fraction`
//! 3. Initialise factors uniformly in ±`init_scale`, biases at 0
//! 4. For each epoch, walk the training entries in order and apply
//!    ```text
//!    e    = r - r̂
//!    b_u += lr · (e - reg · b_u)
//!    b_i += lr · (e - reg · b_i)
//!    p_u += lr · (e · q_i - reg · p_u)
//!    q_i += lr · (e · p_u - reg · q_i)
//!    ```
//! 5. Report RMSE over the holdout
//!
//! Identical data and seed give identical parameters.
//!
//! ## Unknown ids
//! Prediction never fails: a user or item absent from training falls back to
//! the bias terms that are known (μ + b_i, μ + b_u, or μ alone). Estimates are
//! clipped to the observed quantity range.

use crate::error::{ModelError, Result};
use crate::traits::RatingPredictor;
use data_loader::{DataFingerprint, InteractionMatrix, ItemId, UserId};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, instrument};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatentFactorConfig {
    /// Rank of the factorization
    pub factor_count: usize,
    pub epoch_count: usize,
    pub learning_rate: f32,
    /// Weight decay applied to biases and factors
    pub regularization: f32,
    pub random_seed: u64,
    /// Share of observed entries held out for validation, in [0, 1)
    pub holdout_fraction: f32,
    /// Half-width of the uniform factor initialisation
    pub init_scale: f32,
}

impl Default for LatentFactorConfig {
    fn default() -> Self {
        Self {
            factor_count: 250,
            epoch_count: 20,
            learning_rate: 0.005,
            regularization: 0.02,
            random_seed: 69,
            holdout_fraction: 0.2,
            init_scale: 0.1,
        }
    }
}

impl LatentFactorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.factor_count == 0 {
            return Err(ModelError::InvalidConfig("factor_count must be > 0".into()));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ModelError::InvalidConfig(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.regularization.is_finite() && self.regularization >= 0.0) {
            return Err(ModelError::InvalidConfig(format!(
                "regularization must be non-negative, got {}",
                self.regularization
            )));
        }
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            return Err(ModelError::InvalidConfig(format!(
                "holdout_fraction must be in [0, 1), got {}",
                self.holdout_fraction
            )));
        }
        Ok(())
    }
}

/// A trained factorization. Immutable once built; retraining produces a new
/// instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatentFactorModel {
    config: LatentFactorConfig,
    user_index: HashMap<UserId, usize>,
    item_index: HashMap<ItemId, usize>,
    global_mean: f32,
    user_bias: Vec<f32>,
    item_bias: Vec<f32>,
    /// Row-major, `user_index.len() × factor_count`
    user_factors: Vec<f32>,
    /// Row-major, `item_index.len() × factor_count`
    item_factors: Vec<f32>,
    min_estimate: f32,
    max_estimate: f32,
    fingerprint: DataFingerprint,
    holdout_rmse: Option<f32>,
}

/// One observed entry, indexed into the model's own parameter tables
#[derive(Clone, Copy)]
struct Sample {
    user: usize,
    item: usize,
    value: f32,
}

impl LatentFactorModel {
    /// Train a fresh model on the observed entries of `matrix`
    #[instrument(skip_all, fields(users = matrix.user_count(), items = matrix.item_count()))]
    pub fn train(matrix: &InteractionMatrix, config: &LatentFactorConfig) -> Result<Self> {
        config.validate()?;

        let mut entries: Vec<(usize, usize, f32)> = matrix.observed_entries().collect();
        if entries.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }

        let mut rng = StdRng::seed_from_u64(config.random_seed);
        entries.shuffle(&mut rng);

        let holdout_len = ((entries.len() as f32 * config.holdout_fraction) as usize)
            .min(entries.len() - 1);
        let (holdout, training) = entries.split_at(holdout_len);

        // Model tables cover only users/items seen in the training split
        let mut user_slots: Vec<Option<usize>> = vec![None; matrix.user_count()];
        let mut item_slots: Vec<Option<usize>> = vec![None; matrix.item_count()];
        let mut user_index = HashMap::new();
        let mut item_index = HashMap::new();
        let mut samples = Vec::with_capacity(training.len());

        for &(row, col, value) in training {
            let user = *user_slots[row].get_or_insert_with(|| {
                let slot = user_index.len();
                user_index.insert(matrix.user_at(row).unwrap_or_default().to_string(), slot);
                slot
            });
            let item = *item_slots[col].get_or_insert_with(|| {
                let slot = item_index.len();
                item_index.insert(matrix.item_at(col).unwrap_or_default().to_string(), slot);
                slot
            });
            samples.push(Sample { user, item, value });
        }

        let k = config.factor_count;
        let scale = config.init_scale.abs();
        let mut init = |len: usize| -> Vec<f32> {
            if scale > 0.0 {
                (0..len).map(|_| rng.random_range(-scale..scale)).collect()
            } else {
                vec![0.0; len]
            }
        };
        let user_factors = init(user_index.len() * k);
        let item_factors = init(item_index.len() * k);

        let global_mean = samples.iter().map(|s| s.value as f64).sum::<f64>() / samples.len() as f64;
        let max_estimate = samples.iter().map(|s| s.value).fold(0.0f32, f32::max);

        let mut model = Self {
            config: config.clone(),
            user_bias: vec![0.0; user_index.len()],
            item_bias: vec![0.0; item_index.len()],
            user_index,
            item_index,
            global_mean: global_mean as f32,
            user_factors,
            item_factors,
            min_estimate: 0.0,
            max_estimate,
            fingerprint: matrix.fingerprint(),
            holdout_rmse: None,
        };

        for epoch in 0..config.epoch_count {
            let loss = model.run_epoch(&samples);
            debug!("Epoch {}/{}: training RMSE {:.4}", epoch + 1, config.epoch_count, loss);
        }

        if !model.is_finite() {
            return Err(ModelError::Diverged {
                epochs: config.epoch_count,
            });
        }

        if !holdout.is_empty() {
            let squared: f64 = holdout
                .iter()
                .map(|&(row, col, value)| {
                    let user = matrix.user_at(row).unwrap_or_default();
                    let item = matrix.item_at(col).unwrap_or_default();
                    let err = (value - model.predict(user, item)) as f64;
                    err * err
                })
                .sum();
            model.holdout_rmse = Some((squared / holdout.len() as f64).sqrt() as f32);
        }

        info!(
            "Trained latent-factor model: {} users, {} items, {} samples, holdout RMSE {:?}",
            model.user_index.len(),
            model.item_index.len(),
            samples.len(),
            model.holdout_rmse
        );
        Ok(model)
    }

    /// One SGD pass; returns the training RMSE measured during the pass
    fn run_epoch(&mut self, samples: &[Sample]) -> f32 {
        let k = self.config.factor_count;
        let lr = self.config.learning_rate;
        let reg = self.config.regularization;
        let mut squared = 0.0f64;

        for sample in samples {
            let (u, i) = (sample.user, sample.item);
            let p = &mut self.user_factors[u * k..(u + 1) * k];
            let q = &mut self.item_factors[i * k..(i + 1) * k];

            let dot: f32 = p.iter().zip(q.iter()).map(|(a, b)| a * b).sum();
            let err = sample.value - (self.global_mean + self.user_bias[u] + self.item_bias[i] + dot);
            squared += (err * err) as f64;

            self.user_bias[u] += lr * (err - reg * self.user_bias[u]);
            self.item_bias[i] += lr * (err - reg * self.item_bias[i]);

            for f in 0..k {
                let (pf, qf) = (p[f], q[f]);
                p[f] += lr * (err * qf - reg * pf);
                q[f] += lr * (err * pf - reg * qf);
            }
        }

        (squared / samples.len().max(1) as f64).sqrt() as f32
    }

    fn is_finite(&self) -> bool {
        self.global_mean.is_finite()
            && self.user_bias.iter().all(|v| v.is_finite())
            && self.item_bias.iter().all(|v| v.is_finite())
            && self.user_factors.iter().all(|v| v.is_finite())
            && self.item_factors.iter().all(|v| v.is_finite())
    }

    /// Estimated affinity of a user for an item; never fails
    pub fn predict(&self, user_id: &str, item_id: &str) -> f32 {
        let k = self.config.factor_count;
        let user = self.user_index.get(user_id).copied();
        let item = self.item_index.get(item_id).copied();

        let mut estimate = self.global_mean;
        if let Some(u) = user {
            estimate += self.user_bias[u];
        }
        if let Some(i) = item {
            estimate += self.item_bias[i];
        }
        if let (Some(u), Some(i)) = (user, item) {
            let p = &self.user_factors[u * k..(u + 1) * k];
            let q = &self.item_factors[i * k..(i + 1) * k];
            estimate += p.iter().zip(q).map(|(a, b)| a * b).sum::<f32>();
        }

        estimate.clamp(self.min_estimate, self.max_estimate.max(self.min_estimate))
    }

    pub fn config(&self) -> &LatentFactorConfig {
        &self.config
    }

    pub fn global_mean(&self) -> f32 {
        self.global_mean
    }

    /// Identity of the snapshot this model was trained on
    pub fn fingerprint(&self) -> DataFingerprint {
        self.fingerprint
    }

    pub fn holdout_rmse(&self) -> Option<f32> {
        self.holdout_rmse
    }

    /// Serialize the trained parameters as a JSON artifact
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Restore a model from a JSON artifact
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let model: Self = serde_json::from_slice(bytes)?;
        let k = model.config.factor_count;
        if model.user_factors.len() != model.user_index.len() * k
            || model.item_factors.len() != model.item_index.len() * k
            || model.user_bias.len() != model.user_index.len()
            || model.item_bias.len() != model.item_index.len()
        {
            return Err(ModelError::InvalidConfig(
                "artifact parameter tables do not match its indices".into(),
            ));
        }
        if !is_permutation(&model.user_index) || !is_permutation(&model.item_index) {
            return Err(ModelError::InvalidConfig(
                "artifact index slots are out of range or repeated".into(),
            ));
        }
        if !model.is_finite() {
            return Err(ModelError::InvalidConfig("artifact holds non-finite parameters".into()));
        }
        Ok(model)
    }
}

/// Every slot in `0..index.len()` is used exactly once
fn is_permutation(index: &HashMap<String, usize>) -> bool {
    let mut seen = vec![false; index.len()];
    index.values().all(|&slot| match seen.get_mut(slot) {
        Some(taken) if !*taken => {
            *taken = true;
            true
        }
        _ => false,
    })
}

impl RatingPredictor for LatentFactorModel {
    fn try_predict(&self, user_id: &str, item_id: &str) -> Result<f32> {
        Ok(self.predict(user_id, item_id))
    }
}
