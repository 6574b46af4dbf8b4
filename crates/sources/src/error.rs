//! Errors raised by the trainable signal sources.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Cannot train on an empty interaction set")]
    EmptyTrainingSet,

    #[error("Invalid model configuration: {0}")]
    InvalidConfig(String),

    /// SGD produced NaN/inf parameters, usually a learning rate too large for
    /// the quantity scale
    #[error("Training diverged after {epochs} epochs")]
    Diverged { epochs: usize },

    #[error("Prediction failed for user {user_id}, item {item_id}: {reason}")]
    PredictionFailed {
        user_id: String,
        item_id: String,
        reason: String,
    },

    #[error("Model artifact error: {0}")]
    Artifact(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ModelError>;
