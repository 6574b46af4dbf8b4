//! Server crate for the basket recommendation engine.
//!
//! This crate wires the recommenders to their collaborators:
//! - `config`: engine configuration from defaults, environment or JSON
//! - `store`: durable storage for trained latent-factor models
//! - `cache`: result cache keyed by (user, N)
//! - `engine`: served snapshots and the single-writer refresh paths
//! - `orchestrator`: async facade running the engine on the blocking pool

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod orchestrator;
pub mod store;

pub use cache::{cache_key, InMemoryCache, ResultCache};
pub use config::{EngineConfig, PopularityConfig};
pub use engine::{ModelOrigin, RecommendationEngine, RefreshReport, RetrainReport};
pub use error::EngineError;
pub use orchestrator::RecommendationOrchestrator;
pub use store::{ArtifactHandle, ArtifactStore, FileArtifactStore, StoreError};
