//! Hybrid blending of personalized signals into one ranked list.
//!
//! This crate provides:
//! - `HybridSnapshot`: the matrix, predictor and popularity ranking of one
//!   data fetch, shared read-only between requests
//! - `HybridBlender`: the merge and fallback policy
//! - `RecommendationResult`: the caller-facing output, identical in shape for
//!   every terminal state
//!
//! ## Terminal states
//! 1. `personalized`: merged latent-factor and neighborhood predictions
//! 2. `popular`: the user is unknown, or neither signal produced anything
//! 3. `popular (error fallback)`: the personalized path failed
//!
//! ## Example Usage
//! ```ignore
//! use pipeline::{HybridBlender, HybridSnapshot};
//!
//! let snapshot = HybridSnapshot::new(1, matrix, Some(Arc::new(model)), popularity);
//! let blender = HybridBlender::new(SimilarityEngine::new());
//! let result = blender.recommend(&snapshot, "C001", 5);
//! ```

pub mod blender;
pub mod error;
pub mod result;
pub mod snapshot;

pub use blender::{merge_signals, BlendOutcome, HybridBlender};
pub use error::BlendError;
pub use result::{RecommendationResult, RecommendationType, RecommendedItem, FALLBACK_NOTE};
pub use snapshot::HybridSnapshot;
