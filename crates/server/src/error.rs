use data_loader::DataLoadError;
use rules::RuleError;
use sources::ModelError;
use thiserror::Error;

use crate::store::StoreError;

/// Failures of refresh and retrain. Scoring never returns these.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The source failed or returned nothing; the served snapshot is kept
    #[error("No data available: {0}")]
    DataUnavailable(#[from] DataLoadError),

    #[error("A refresh of the same snapshot is already running")]
    RetrainInProgress,

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Rule mining error: {0}")]
    Rules(#[from] RuleError),

    #[error("Artifact store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, EngineError>;
