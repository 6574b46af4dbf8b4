//! # Data Loader Crate
//!
//! Loads catalog interaction and order exports and turns them into the
//! in-memory structures the recommenders share.
//!
//! ## Main Components
//!
//! - **types**: Core domain types (Interaction, OrderLine, id aliases)
//! - **parser**: Parse the CSV exports into Rust structs
//! - **matrix**: Dense user × item matrix with O(1) id lookups
//! - **source**: Snapshot providers (files, in-memory)
//! - **error**: Error types for data loading
//!
//! ## Example Usage
//!
//! ```ignore
//! use data_loader::{FileSource, InteractionMatrix, InteractionSource};
//!
//! let source = FileSource::new("data/shop");
//! let interactions = source.fetch_interactions()?;
//! let matrix = InteractionMatrix::from_interactions(&interactions);
//!
//! println!("{} users x {} items", matrix.user_count(), matrix.item_count());
//! ```

pub mod error;
pub mod matrix;
pub mod parser;
pub mod source;
pub mod types;

pub use error::{DataLoadError, Result};
pub use matrix::{aggregate_interactions, InteractionMatrix};
pub use source::{FileSource, InteractionSource, StaticSource};
pub use types::{DataFingerprint, Interaction, ItemId, OrderId, OrderLine, UserId};
