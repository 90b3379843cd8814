//! Error types for the browser library.
//!
//! Two layers: [`StoreError`] is what a store driver reports, [`BrowseError`]
//! is what callers of the library see. Every `BrowseError` that wraps a store
//! failure also names the setting, connection, or table it concerns.

use thiserror::Error;

/// Errors reported by a store driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The cluster could not be reached or refused the session.
    #[error("cluster unreachable: {0}")]
    Unreachable(String),

    /// The requested table does not exist.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// The table has no such column family.
    #[error("no family '{family}' in table '{table}'")]
    NoSuchFamily {
        /// Table name.
        table: String,
        /// Requested family.
        family: String,
    },

    /// An I/O failure while talking to the cluster.
    #[error("i/o error: {0}")]
    Io(String),

    /// The connection, table, or cursor was already closed.
    #[error("{0} already closed")]
    Closed(&'static str),

    /// A failure injected by a test driver.
    #[error("injected fault: {0}")]
    Injected(String),
}

/// Result type for store driver operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Browser error type.
#[derive(Debug, Error)]
pub enum BrowseError {
    /// Opening a connection for a setting failed.
    #[error("connection '{setting}' failed: {source}")]
    Connection {
        /// Name of the setting that failed.
        setting: String,
        /// Underlying driver error.
        #[source]
        source: StoreError,
    },

    /// Listing tables or families failed.
    #[error("schema discovery on '{connection}' failed: {source}")]
    Schema {
        /// Name of the connection being inspected.
        connection: String,
        /// Underlying driver error.
        #[source]
        source: StoreError,
    },

    /// Opening or iterating a scan failed.
    #[error("scan of table '{table}' failed: {source}")]
    Scan {
        /// Table being scanned.
        table: String,
        /// Underlying driver error.
        #[source]
        source: StoreError,
    },

    /// No connection is registered under this name.
    #[error("no connection named '{0}'")]
    NotConnected(String),

    /// The connection handle was closed.
    #[error("connection '{0}' is closed")]
    ConnectionClosed(String),

    /// A connection setting is malformed.
    #[error("invalid connection setting '{setting}': {reason}")]
    InvalidSetting {
        /// Name of the setting, possibly empty.
        setting: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A query is malformed.
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}

impl BrowseError {
    /// Returns the store error behind this failure, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            BrowseError::Connection { source, .. }
            | BrowseError::Schema { source, .. }
            | BrowseError::Scan { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type for browser operations.
pub type BrowseResult<T> = Result<T, BrowseError>;
