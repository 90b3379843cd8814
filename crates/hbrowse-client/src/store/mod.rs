//! Outbound interface to the backing store.
//!
//! The browser depends only on this capability set: open a connection, list
//! tables with their families, open a table, open a cursor for a compiled
//! scan, iterate it, and close each resource. Drivers implement the traits;
//! [`memory`] provides a complete in-process one.

pub mod dataset;
pub mod memory;

use std::sync::Arc;

use bytes::Bytes;

use crate::error::StoreResult;
use crate::query::CompiledScan;
use crate::setting::ClusterConfig;

pub use dataset::{Dataset, DatasetError};
pub use memory::{MemoryStore, StoreEvent};

/// A cell as returned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCell {
    /// Column family bytes.
    pub family: Bytes,
    /// Qualifier bytes.
    pub qualifier: Bytes,
    /// Value bytes.
    pub value: Bytes,
    /// Write timestamp.
    pub timestamp: u64,
}

impl RawCell {
    /// Creates a cell with timestamp zero.
    pub fn new(
        family: impl AsRef<[u8]>,
        qualifier: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Self {
        Self {
            family: Bytes::copy_from_slice(family.as_ref()),
            qualifier: Bytes::copy_from_slice(qualifier.as_ref()),
            value: Bytes::copy_from_slice(value.as_ref()),
            timestamp: 0,
        }
    }

    /// Sets the timestamp.
    pub fn with_timestamp(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// One row as returned by the store: its key and cells in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    /// Row key bytes.
    pub row: Bytes,
    /// Cells in server order.
    pub cells: Vec<RawCell>,
}

impl RawRecord {
    /// Creates a record.
    pub fn new(row: impl AsRef<[u8]>, cells: Vec<RawCell>) -> Self {
        Self {
            row: Bytes::copy_from_slice(row.as_ref()),
            cells,
        }
    }
}

/// A table as listed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Table name.
    pub name: String,
    /// Family names, in whatever order the store keeps them.
    pub families: Vec<Bytes>,
}

/// Opens connections to a cluster.
pub trait StoreConnector: Send + Sync {
    /// Opens a session using the given client properties.
    fn connect(&self, config: &ClusterConfig) -> StoreResult<Arc<dyn StoreConnection>>;
}

/// A live session with a cluster. Shared by concurrent scans.
pub trait StoreConnection: Send + Sync {
    /// Lists every table with its families, in store order.
    fn list_tables(&self) -> StoreResult<Vec<TableDescriptor>>;

    /// Opens a table handle owned by the caller.
    fn open_table(&self, name: &str) -> StoreResult<Box<dyn TableHandle>>;

    /// Closes the session.
    fn close(&self) -> StoreResult<()>;
}

/// A per-call handle to one table.
pub trait TableHandle: Send {
    /// Returns the table name.
    fn name(&self) -> &str;

    /// Opens a cursor for the scan.
    fn open_scanner(&self, scan: &CompiledScan) -> StoreResult<Box<dyn ScanCursor>>;

    /// Releases the handle.
    fn close(&mut self) -> StoreResult<()>;
}

/// A server-side iterator over a bounded, filtered key range.
pub trait ScanCursor: Send {
    /// Returns the next record, or `None` when the scan is exhausted.
    fn next_record(&mut self) -> StoreResult<Option<RawRecord>>;

    /// Releases the cursor.
    fn close(&mut self) -> StoreResult<()>;
}
