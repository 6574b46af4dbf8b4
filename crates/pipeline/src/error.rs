//! Failures inside the personalized blend.
//!
//! None of these reach callers: the blender turns every one of them into the
//! `popular (error fallback)` result.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlendError {
    /// The user passed the existence check but has no row in the matrix
    #[error("Snapshot has no row for user {user_id}")]
    InconsistentSnapshot { user_id: String },

    #[error("Non-finite score {score} for item {item_id}")]
    NonFiniteScore { item_id: String, score: f32 },
}
