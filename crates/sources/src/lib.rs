//! # Sources Crate
//!
//! The three live signal sources behind personalized recommendations, plus
//! the shared neighborhood scoring.
//!
//! ## Components
//!
//! ### Similarity Engine
//! User-to-user similarity over the interaction matrix (cosine, or the
//! cosine/Pearson/Jaccard blend) and top-K neighbor lookup.
//!
//! ### Neighborhood predictions
//! "Customers like you bought...": similarity-weighted average of the
//! quantities the neighbors recorded for each candidate item.
//!
//! ### Latent-Factor Model
//! Biased matrix factorization trained with seeded SGD; predicts an affinity
//! for any (user, item) pair, including pairs never observed.
//!
//! ### Popularity Ranker
//! Frequency + average-quantity popularity, with a prefix-diverse variant for
//! cold-start users.
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::InteractionMatrix;
//! use sources::{LatentFactorConfig, LatentFactorModel, SimilarityEngine};
//!
//! let matrix = InteractionMatrix::from_interactions(&interactions);
//! let neighbors = SimilarityEngine::new().similar_users(&matrix, "C001");
//! let model = LatentFactorModel::train(&matrix, &LatentFactorConfig::default())?;
//! let score = model.predict("C001", "A-1042");
//! ```

pub mod error;
pub mod latent;
pub mod neighborhood;
pub mod popularity;
pub mod similarity;
pub mod traits;
pub mod types;

pub use error::{ModelError, Result};
pub use latent::{LatentFactorConfig, LatentFactorModel};
pub use neighborhood::neighborhood_scores;
pub use popularity::{PopularityEntry, PopularityRanker, DEFAULT_QUANTITY_SCALE};
pub use similarity::{SimilarityEngine, SimilarityMetric};
pub use traits::RatingPredictor;
pub use types::{Neighbor, ScoredItem};
