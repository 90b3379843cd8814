//! Connection handles and the manager that owns them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::{BrowseError, BrowseResult};
use crate::registry::Registry;
use crate::setting::ConnectionSetting;
use crate::store::{StoreConnection, StoreConnector};

struct HandleInner {
    setting: ConnectionSetting,
    session: Arc<dyn StoreConnection>,
    closed: AtomicBool,
    connected_at: Instant,
}

/// A live session with a cluster.
///
/// Clones share the session. Scans may run concurrently on the same handle;
/// each opens its own table handle and cursor.
#[derive(Clone)]
pub struct ConnectionHandle {
    inner: Arc<HandleInner>,
}

impl ConnectionHandle {
    pub(crate) fn new(setting: ConnectionSetting, session: Arc<dyn StoreConnection>) -> Self {
        Self {
            inner: Arc::new(HandleInner {
                setting,
                session,
                closed: AtomicBool::new(false),
                connected_at: Instant::now(),
            }),
        }
    }

    /// Returns the connection name.
    pub fn name(&self) -> &str {
        &self.inner.setting.name
    }

    /// Returns the setting this handle was opened with.
    pub fn setting(&self) -> &ConnectionSetting {
        &self.inner.setting
    }

    /// Returns true once the handle was closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Returns how long the handle has been open.
    pub fn connected_for(&self) -> Duration {
        self.inner.connected_at.elapsed()
    }

    /// Returns true if both handles share one session.
    pub fn same_session(&self, other: &ConnectionHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Returns the underlying session, or an error if the handle is closed.
    pub fn session(&self) -> BrowseResult<&Arc<dyn StoreConnection>> {
        if self.is_closed() {
            return Err(BrowseError::ConnectionClosed(self.name().to_string()));
        }
        Ok(&self.inner.session)
    }

    /// Closes the session. Returns false if it was already closed.
    ///
    /// A close failure reported by the store is logged and the handle is
    /// considered closed regardless.
    pub fn close(&self) -> bool {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        if let Err(err) = self.inner.session.close() {
            warn!(connection = %self.name(), error = %err, "failed to close connection");
        }
        true
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("name", &self.name())
            .field("closed", &self.is_closed())
            .field("connected_for", &self.connected_for())
            .finish()
    }
}

/// Opens connections and keeps them by setting name.
///
/// Dropping the manager closes every handle it still owns.
pub struct ConnectionManager {
    connector: Arc<dyn StoreConnector>,
    handles: Registry<ConnectionHandle>,
}

impl ConnectionManager {
    /// Creates a manager that opens sessions through `connector`.
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            handles: Registry::new(),
        }
    }

    /// Opens a connection and registers it under the setting name.
    ///
    /// A handle already registered under that name is closed.
    pub fn connect(&self, setting: &ConnectionSetting) -> BrowseResult<ConnectionHandle> {
        setting.validate()?;

        let config = setting.cluster_config();
        for (key, value) in config.iter() {
            debug!(connection = %setting.name, key, value, "cluster property");
        }
        let session = self
            .connector
            .connect(&config)
            .map_err(|source| BrowseError::Connection {
                setting: setting.name.clone(),
                source,
            })?;

        let handle = ConnectionHandle::new(setting.clone(), session);
        if let Some(previous) = self.handles.insert(setting.name.clone(), handle.clone()) {
            warn!(connection = %setting.name, "replacing open connection");
            previous.close();
        }

        info!(connection = %setting.name, quorum = %config.connection_string(), "connected");
        Ok(handle)
    }

    /// Returns the handle registered under `name`.
    pub fn get_handle(&self, name: &str) -> Option<ConnectionHandle> {
        self.handles.get(name)
    }

    /// Closes and unregisters a connection. Returns false if none was open.
    pub fn disconnect(&self, name: &str) -> bool {
        match self.handles.remove(name) {
            Some(handle) => {
                handle.close();
                info!(connection = %name, "disconnected");
                true
            }
            None => false,
        }
    }

    /// Returns the registered connection names, sorted.
    pub fn connection_names(&self) -> Vec<String> {
        self.handles.names()
    }

    /// Returns the number of registered connections.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Closes and unregisters every connection.
    pub fn close_all(&self) {
        for (_, handle) in self.handles.drain() {
            handle.close();
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close_all();
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connections", &self.handles.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryStore, StoreEvent};

    fn setting(name: &str) -> ConnectionSetting {
        ConnectionSetting::new(name).quorum("zk1")
    }

    fn closed_connections(store: &MemoryStore) -> usize {
        store
            .events()
            .iter()
            .filter(|e| matches!(e, StoreEvent::ConnectionClosed { .. }))
            .count()
    }

    #[test]
    fn test_connect_registers_handle() {
        let manager = ConnectionManager::new(Arc::new(MemoryStore::new()));
        let handle = manager.connect(&setting("local")).unwrap();

        assert_eq!(handle.name(), "local");
        assert!(manager.get_handle("local").unwrap().same_session(&handle));
        assert!(manager.get_handle("other").is_none());
    }

    #[test]
    fn test_connect_failure_names_setting() {
        let store = MemoryStore::new();
        store.refuse_host("zk1");
        let manager = ConnectionManager::new(Arc::new(store));

        match manager.connect(&setting("prod")) {
            Err(BrowseError::Connection { setting, source }) => {
                assert_eq!(setting, "prod");
                assert!(matches!(source, StoreError::Unreachable(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(manager.is_empty());
    }

    #[test]
    fn test_invalid_setting_rejected() {
        let manager = ConnectionManager::new(Arc::new(MemoryStore::new()));
        match manager.connect(&ConnectionSetting::new("x")) {
            Err(BrowseError::InvalidSetting { setting, .. }) => assert_eq!(setting, "x"),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(manager.is_empty());
    }

    #[test]
    fn test_reconnect_closes_previous() {
        let store = MemoryStore::new();
        let manager = ConnectionManager::new(Arc::new(store.clone()));

        let first = manager.connect(&setting("local")).unwrap();
        let second = manager.connect(&setting("local")).unwrap();

        assert!(first.is_closed());
        assert!(!second.is_closed());
        assert_eq!(manager.len(), 1);
        assert_eq!(closed_connections(&store), 1);
        assert!(matches!(
            first.session(),
            Err(BrowseError::ConnectionClosed(_))
        ));
    }

    #[test]
    fn test_disconnect_and_drop() {
        let store = MemoryStore::new();
        {
            let manager = ConnectionManager::new(Arc::new(store.clone()));
            manager.connect(&setting("a")).unwrap();
            manager.connect(&setting("b")).unwrap();
            assert_eq!(manager.connection_names(), vec!["a", "b"]);

            assert!(manager.disconnect("a"));
            assert!(!manager.disconnect("a"));
            assert_eq!(closed_connections(&store), 1);
        }
        assert_eq!(closed_connections(&store), 2);
    }

    #[test]
    fn test_close_is_idempotent() {
        let manager = ConnectionManager::new(Arc::new(MemoryStore::new()));
        let handle = manager.connect(&setting("a")).unwrap();

        assert!(handle.close());
        assert!(!handle.close());
    }
}
