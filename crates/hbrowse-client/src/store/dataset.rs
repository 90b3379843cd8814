//! JSON datasets for seeding a [`MemoryStore`].
//!
//! ```json
//! {
//!   "tables": [
//!     {
//!       "name": "users",
//!       "families": ["info"],
//!       "splits": ["user:5"],
//!       "rows": [
//!         { "key": "user:1", "cells": [
//!           { "family": "info", "qualifier": "name", "value": "ada" }
//!         ] }
//!       ]
//!     }
//!   ]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::MemoryStore;
use crate::error::StoreError;

/// Errors from loading a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The file could not be read.
    #[error("cannot read dataset: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a valid dataset.
    #[error("invalid dataset: {0}")]
    Parse(#[from] serde_json::Error),

    /// A row referenced a missing table or family.
    #[error("cannot apply dataset: {0}")]
    Store(#[from] StoreError),
}

/// A set of tables with their rows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// Tables in creation order.
    #[serde(default)]
    pub tables: Vec<TableSpec>,
}

/// One table of a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Column families.
    pub families: Vec<String>,
    /// Region split keys.
    #[serde(default)]
    pub splits: Vec<String>,
    /// Rows.
    #[serde(default)]
    pub rows: Vec<RowSpec>,
}

/// One row of a dataset table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSpec {
    /// Row key.
    pub key: String,
    /// Cells in write order.
    #[serde(default)]
    pub cells: Vec<CellSpec>,
}

/// One cell of a dataset row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellSpec {
    /// Column family.
    pub family: String,
    /// Qualifier.
    pub qualifier: String,
    /// Value.
    pub value: String,
}

impl Dataset {
    /// Parses a dataset from JSON text.
    pub fn from_json(text: &str) -> Result<Self, DatasetError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Reads a dataset from a JSON file.
    pub fn load(path: &Path) -> Result<Self, DatasetError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Creates the tables in a store and writes every row.
    pub fn apply(&self, store: &MemoryStore) -> Result<(), DatasetError> {
        for table in &self.tables {
            let families: Vec<&str> = table.families.iter().map(String::as_str).collect();
            store.create_table(&table.name, &families);
            store.split_table(&table.name, table.splits.iter().map(String::as_str))?;
            for row in &table.rows {
                for cell in &row.cells {
                    store.put(
                        &table.name,
                        row.key.as_str(),
                        &cell.family,
                        &cell.qualifier,
                        &cell.value,
                    )?;
                }
            }
        }
        info!(tables = self.tables.len(), "dataset applied");
        Ok(())
    }

    /// Builds a fresh store holding this dataset.
    pub fn into_store(&self) -> Result<MemoryStore, DatasetError> {
        let store = MemoryStore::new();
        self.apply(&store)?;
        Ok(store)
    }
}
