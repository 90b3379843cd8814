//! # hbrowse-test
//!
//! Integration tests for hbrowse.
//!
//! This crate contains:
//! - Fixtures: seeded in-memory stores and connected browsers
//! - End-to-end scan tests
//! - Resource release and concurrency tests

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::sync::Arc;

use hbrowse_client::store::StoreEvent;
use hbrowse_client::{Browser, ConnectionSetting, MemoryStore, ScanResult};

/// Name of the connection opened by [`connected`].
pub const LOCAL: &str = "local";

/// Returns the setting used by the fixtures.
pub fn local_setting() -> ConnectionSetting {
    ConnectionSetting::new(LOCAL)
        .master("localhost:16000")
        .quorum("localhost")
}

/// Creates a table with one family and a `q` cell per key, value = key.
pub fn seed_table(store: &MemoryStore, table: &str, keys: &[&str]) {
    store.create_table(table, &["cf"]);
    for key in keys {
        store
            .put(table, *key, "cf", "q", *key)
            .unwrap_or_else(|e| panic!("seeding {table}: {e}"));
    }
}

/// A `users` table with `info` and `stats` families.
///
/// Rows: `admin:1`, `user:1` .. `user:4`, `zeta`. Every row has
/// `info:name`; `user:*` rows also have `stats:visits`.
pub fn users_store() -> MemoryStore {
    let store = MemoryStore::new();
    store.create_table("users", &["info", "stats"]);
    let rows = [
        ("admin:1", "root"),
        ("user:1", "ada"),
        ("user:2", "bob"),
        ("user:3", "cy"),
        ("user:4", "dee"),
        ("zeta", "z"),
    ];
    for (i, (key, name)) in rows.iter().enumerate() {
        store
            .put("users", *key, "info", "name", *name)
            .unwrap_or_else(|e| panic!("seeding users: {e}"));
        if key.starts_with("user:") {
            store
                .put("users", *key, "stats", "visits", i.to_string())
                .unwrap_or_else(|e| panic!("seeding users: {e}"));
        }
    }
    store
}

/// Creates a browser over `store` with [`LOCAL`] connected.
pub fn connected(store: &MemoryStore) -> Browser {
    let browser = Browser::new(Arc::new(store.clone()));
    browser
        .connect(&local_setting())
        .unwrap_or_else(|e| panic!("connecting fixture: {e}"));
    store.clear_events();
    browser
}

/// Returns the row keys of a result in order.
pub fn rowkeys(result: &ScanResult) -> Vec<String> {
    result.iter().map(|row| row.rowkey.clone()).collect()
}

/// Returns the cursor and table releases recorded by the store, in order.
pub fn releases(store: &MemoryStore) -> Vec<&'static str> {
    store
        .events()
        .iter()
        .filter_map(|event| match event {
            StoreEvent::CursorClosed { .. } => Some("cursor"),
            StoreEvent::TableClosed { .. } => Some("table"),
            _ => None,
        })
        .collect()
}

/// Counts opened minus closed resources: cursors and tables.
pub fn open_resources(store: &MemoryStore) -> (i64, i64) {
    store
        .events()
        .iter()
        .fold((0, 0), |(cursors, tables), event| match event {
            StoreEvent::CursorOpened { .. } => (cursors + 1, tables),
            StoreEvent::CursorClosed { .. } => (cursors - 1, tables),
            StoreEvent::TableOpened { .. } => (cursors, tables + 1),
            StoreEvent::TableClosed { .. } => (cursors, tables - 1),
            _ => (cursors, tables),
        })
}
