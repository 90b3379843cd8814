//! # hbrowse-client
//!
//! Client library for browsing a distributed sorted key-value store.
//!
//! This crate provides:
//!
//! - **Connection Management**: named connection settings, shared handles
//! - **Schema Discovery**: tables and their column families, per connection
//! - **Query Compilation**: prefix, key range, family projection and paging
//!   turned into a server-side scan
//! - **Scan Execution**: scoped release of cursors and table handles
//! - **Materialization**: raw cells decoded into ordered rows
//!
//! The store is reached through the traits in [`store`]. An in-process
//! driver, [`store::MemoryStore`], implements them.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use hbrowse_client::{Browser, ConnectionSetting, MemoryStore, Query};
//!
//! let store = MemoryStore::new();
//! store.create_table("users", &["info"]);
//! store.put("users", "user:1", "info", "name", "ada").unwrap();
//!
//! let browser = Browser::new(Arc::new(store));
//! browser
//!     .connect(&ConnectionSetting::new("local").quorum("zk1"))
//!     .unwrap();
//!
//! let result = browser
//!     .run_query("local", &Query::new("users").prefix("user:").page_size(2))
//!     .unwrap();
//! assert_eq!(result.rows[0].get("name").unwrap().value, "ada");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Browser facade.
pub mod browser;

/// Connection handles and manager.
pub mod connection;

/// Error types.
pub mod error;

/// Query model and compiler.
pub mod query;

/// Named registries.
pub mod registry;

/// Scan results.
pub mod result;

/// Scan executor.
pub mod scan;

/// Schema catalog.
pub mod schema;

/// Connection settings.
pub mod setting;

/// Store capability traits and drivers.
pub mod store;

/// Key types.
pub mod types;

// Re-exports
pub use browser::Browser;
pub use connection::{ConnectionHandle, ConnectionManager};
pub use error::{BrowseError, BrowseResult, StoreError, StoreResult};
pub use query::{CompiledScan, Query, QueryCompiler, ScanFilter, DEFAULT_PAGE_SIZE, SCAN_CACHING};
pub use result::{materialize, CellValue, Row, ScanResult};
pub use scan::{ScanExecutor, ScanStats};
pub use schema::{SchemaCatalog, SchemaDescriptor};
pub use setting::{ClusterConfig, ConnectionSetting};
pub use store::{Dataset, MemoryStore};
pub use types::RowKey;
