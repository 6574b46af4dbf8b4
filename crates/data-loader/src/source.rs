//! Data sources feeding the recommenders.
//!
//! The engine only needs a finite snapshot of rows for each refresh; where
//! they come from (ERP database, export files) sits behind
//! [`InteractionSource`].

use crate::error::{DataLoadError, Result};
use crate::parser;
use crate::types::{Interaction, OrderLine};
use std::path::{Path, PathBuf};
use tracing::info;

/// Supplies full snapshots of interaction and order data
pub trait InteractionSource: Send + Sync {
    /// All (user, item, quantity) rows for the personalized path
    fn fetch_interactions(&self) -> Result<Vec<Interaction>>;

    /// All (order, item) rows for the cart-based path
    fn fetch_order_lines(&self) -> Result<Vec<OrderLine>>;
}

/// Reads `interactions.csv` and `orders.csv` from a directory
#[derive(Debug, Clone)]
pub struct FileSource {
    data_dir: PathBuf,
}

impl FileSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

impl InteractionSource for FileSource {
    fn fetch_interactions(&self) -> Result<Vec<Interaction>> {
        let path = self.data_dir.join("interactions.csv");
        let interactions = parser::parse_interactions(&path)?;
        if interactions.is_empty() {
            return Err(DataLoadError::EmptyData(path.display().to_string()));
        }
        info!("Loaded {} interactions from {:?}", interactions.len(), path);
        Ok(interactions)
    }

    fn fetch_order_lines(&self) -> Result<Vec<OrderLine>> {
        let path = self.data_dir.join("orders.csv");
        let lines = parser::parse_order_lines(&path)?;
        if lines.is_empty() {
            return Err(DataLoadError::EmptyData(path.display().to_string()));
        }
        info!("Loaded {} order lines from {:?}", lines.len(), path);
        Ok(lines)
    }
}

/// Fixed in-memory snapshot, handy for tests and embedding
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    pub interactions: Vec<Interaction>,
    pub order_lines: Vec<OrderLine>,
}

impl StaticSource {
    pub fn new(interactions: Vec<Interaction>, order_lines: Vec<OrderLine>) -> Self {
        Self {
            interactions,
            order_lines,
        }
    }
}

impl InteractionSource for StaticSource {
    fn fetch_interactions(&self) -> Result<Vec<Interaction>> {
        if self.interactions.is_empty() {
            return Err(DataLoadError::EmptyData("static interactions".to_string()));
        }
        Ok(self.interactions.clone())
    }

    fn fetch_order_lines(&self) -> Result<Vec<OrderLine>> {
        if self.order_lines.is_empty() {
            return Err(DataLoadError::EmptyData("static order lines".to_string()));
        }
        Ok(self.order_lines.clone())
    }
}
