use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuleError {
    #[error("min_support must be in (0, 1], got {0}")]
    InvalidSupport(f32),

    #[error("min_lift must be finite and non-negative, got {0}")]
    InvalidLift(f32),

    #[error("max_itemset_len must be at least 1")]
    InvalidItemsetLen,
}

pub type Result<T> = std::result::Result<T, RuleError>;
