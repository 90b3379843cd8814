//! The browser facade: connect, discover, query.

use std::sync::Arc;

use tracing::info;

use crate::connection::{ConnectionHandle, ConnectionManager};
use crate::error::{BrowseError, BrowseResult};
use crate::query::{CompiledScan, Query, QueryCompiler};
use crate::result::ScanResult;
use crate::scan::{ScanExecutor, ScanStats};
use crate::schema::{SchemaCatalog, SchemaDescriptor};
use crate::setting::ConnectionSetting;
use crate::store::StoreConnector;

/// Entry point of the library.
///
/// Owns the connections, their discovered schemas, and the scan executor.
/// All methods take `&self`; a `Browser` can be shared across threads.
#[derive(Debug)]
pub struct Browser {
    connections: ConnectionManager,
    catalog: SchemaCatalog,
    compiler: QueryCompiler,
    executor: ScanExecutor,
}

impl Browser {
    /// Creates a browser that opens sessions through `connector`.
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connections: ConnectionManager::new(connector),
            catalog: SchemaCatalog::new(),
            compiler: QueryCompiler::new(),
            executor: ScanExecutor::new(),
        }
    }

    /// Opens a connection and discovers its tables.
    ///
    /// If discovery fails the connection stays registered and usable; the
    /// schema error is returned and [`Browser::discover`] can be retried.
    /// If the connection itself fails, an open connection under the same
    /// name keeps its handle and its cached schema.
    pub fn connect(&self, setting: &ConnectionSetting) -> BrowseResult<ConnectionHandle> {
        let handle = self.connections.connect(setting)?;
        self.catalog.remove(&setting.name);
        let schemas = self.catalog.discover(&handle)?;
        info!(connection = %setting.name, tables = schemas.len(), "schema loaded");
        self.catalog.store(&setting.name, schemas);
        Ok(handle)
    }

    /// Re-discovers the tables of an open connection.
    pub fn discover(&self, name: &str) -> BrowseResult<Vec<SchemaDescriptor>> {
        let handle = self.handle(name)?;
        let schemas = self.catalog.discover(&handle)?;
        self.catalog.store(name, schemas.clone());
        Ok(schemas)
    }

    /// Returns the cached tables of a connection.
    pub fn schemas(&self, name: &str) -> Option<Vec<SchemaDescriptor>> {
        self.catalog.get(name)
    }

    /// Compiles and runs a query on a connection.
    pub fn run_query(&self, name: &str, query: &Query) -> BrowseResult<ScanResult> {
        query.validate()?;
        let handle = self.handle(name)?;
        let scan = self.compiler.compile(query);
        self.executor.execute(&handle, &query.table_name, &scan)
    }

    /// Compiles a query without running it.
    pub fn explain(&self, query: &Query) -> BrowseResult<CompiledScan> {
        query.validate()?;
        Ok(self.compiler.compile(query))
    }

    /// Closes a connection and forgets its schema.
    pub fn disconnect(&self, name: &str) -> bool {
        self.catalog.remove(name);
        self.connections.disconnect(name)
    }

    /// Returns the open connection names, sorted.
    pub fn connection_names(&self) -> Vec<String> {
        self.connections.connection_names()
    }

    /// Returns the handle of an open connection.
    pub fn handle(&self, name: &str) -> BrowseResult<ConnectionHandle> {
        self.connections
            .get_handle(name)
            .ok_or_else(|| BrowseError::NotConnected(name.to_string()))
    }

    /// Returns the schema catalog.
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Returns the scan counters.
    pub fn stats(&self) -> ScanStats {
        self.executor.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn browser() -> (MemoryStore, Browser) {
        let store = MemoryStore::new();
        store.create_table("users", &["info"]);
        store.put("users", "user:1", "info", "name", "ada").unwrap();
        store.put("users", "user:2", "info", "name", "bob").unwrap();
        let browser = Browser::new(Arc::new(store.clone()));
        (store, browser)
    }

    fn local() -> ConnectionSetting {
        ConnectionSetting::new("local").quorum("zk1")
    }

    #[test]
    fn test_connect_discovers_schema() {
        let (_store, browser) = browser();
        browser.connect(&local()).unwrap();

        let schemas = browser.schemas("local").unwrap();
        assert_eq!(schemas, vec![SchemaDescriptor::new("users", ["info"])]);
        assert_eq!(browser.connection_names(), vec!["local"]);
    }

    #[test]
    fn test_schema_failure_keeps_connection() {
        let (store, browser) = browser();
        store.fail_list_tables(true);

        assert!(matches!(
            browser.connect(&local()),
            Err(BrowseError::Schema { .. })
        ));
        assert!(browser.schemas("local").is_none());

        store.fail_list_tables(false);
        assert_eq!(browser.discover("local").unwrap().len(), 1);
        assert!(browser.schemas("local").is_some());
    }

    #[test]
    fn test_failed_reconnect_keeps_schema() {
        let (store, browser) = browser();
        browser.connect(&local()).unwrap();

        store.refuse_host("zk1");
        assert!(matches!(
            browser.connect(&local()),
            Err(BrowseError::Connection { .. })
        ));
        assert!(matches!(
            browser.connect(&ConnectionSetting::new("local")),
            Err(BrowseError::InvalidSetting { .. })
        ));

        let schemas = browser.schemas("local").unwrap();
        assert_eq!(schemas, vec![SchemaDescriptor::new("users", ["info"])]);
        assert_eq!(browser.catalog().table_names("local"), vec!["users"]);
        assert!(!browser.handle("local").unwrap().is_closed());
        assert_eq!(
            browser
                .run_query("local", &Query::new("users"))
                .unwrap()
                .row_count(),
            2
        );
    }

    #[test]
    fn test_reconnect_reloads_schema() {
        let (store, browser) = browser();
        browser.connect(&local()).unwrap();

        store.create_table("events", &["raw"]);
        browser.connect(&local()).unwrap();
        assert_eq!(
            browser.catalog().table_names("local"),
            vec!["users", "events"]
        );
    }

    #[test]
    fn test_run_query() {
        let (_store, browser) = browser();
        browser.connect(&local()).unwrap();

        let result = browser
            .run_query("local", &Query::new("users").prefix("user:"))
            .unwrap();
        assert_eq!(result.row_count(), 2);
        assert_eq!(result.rows[1].get("name").unwrap().value, "bob");
        assert_eq!(browser.stats().scans_executed, 1);
    }

    #[test]
    fn test_run_query_unknown_connection() {
        let (_store, browser) = browser();
        assert!(matches!(
            browser.run_query("nope", &Query::new("users")),
            Err(BrowseError::NotConnected(_))
        ));
        assert!(matches!(
            browser.run_query("nope", &Query::new("")),
            Err(BrowseError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_disconnect_forgets_schema() {
        let (_store, browser) = browser();
        browser.connect(&local()).unwrap();

        assert!(browser.disconnect("local"));
        assert!(browser.schemas("local").is_none());
        assert!(browser.connection_names().is_empty());
    }

    #[test]
    fn test_explain() {
        let (_store, browser) = browser();
        let scan = browser.explain(&Query::new("users").prefix("u")).unwrap();
        assert!(scan.to_string().contains("PrefixFilter(\"u\")"));
    }
}
