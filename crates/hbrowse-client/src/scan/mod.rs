//! Scan execution.
//!
//! [`ScanExecutor::execute`] opens a table handle, opens a cursor for the
//! compiled scan, and drains it into a [`ScanResult`]. Both resources sit in
//! guards that close them on every exit path, cursor first. A failing close is
//! logged and counted but never replaces the error that ended the scan.
//! Results are all or nothing: rows read before a failure are dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::connection::ConnectionHandle;
use crate::error::{BrowseError, BrowseResult, StoreError, StoreResult};
use crate::query::CompiledScan;
use crate::result::{materialize, ScanResult};
use crate::store::{RawRecord, ScanCursor, TableHandle};

/// Executor counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    /// Scans that returned a result.
    pub scans_executed: u64,
    /// Scans that failed.
    pub scans_failed: u64,
    /// Rows returned by successful scans.
    pub rows_returned: u64,
    /// Cursor or table closes that failed.
    pub release_warnings: u64,
}

#[derive(Debug, Default)]
struct Counters {
    scans_executed: AtomicU64,
    scans_failed: AtomicU64,
    rows_returned: AtomicU64,
    release_warnings: AtomicU64,
}

/// Closes the table handle when dropped.
struct TableGuard<'a> {
    table: Box<dyn TableHandle>,
    counters: &'a Counters,
}

impl TableGuard<'_> {
    fn open_scanner(&self, scan: &CompiledScan) -> StoreResult<Box<dyn ScanCursor>> {
        self.table.open_scanner(scan)
    }
}

impl Drop for TableGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.table.close() {
            self.counters.release_warnings.fetch_add(1, Ordering::Relaxed);
            warn!(table = %self.table.name(), error = %err, "failed to release table handle");
        }
    }
}

/// Closes the cursor when dropped.
struct CursorGuard<'a> {
    cursor: Box<dyn ScanCursor>,
    table: &'a str,
    counters: &'a Counters,
}

impl CursorGuard<'_> {
    fn next_record(&mut self) -> StoreResult<Option<RawRecord>> {
        self.cursor.next_record()
    }
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.cursor.close() {
            self.counters.release_warnings.fetch_add(1, Ordering::Relaxed);
            warn!(table = %self.table, error = %err, "failed to release scan cursor");
        }
    }
}

/// Runs compiled scans against a connection.
#[derive(Debug, Default)]
pub struct ScanExecutor {
    counters: Counters,
}

impl ScanExecutor {
    /// Creates an executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Scans a table and materializes every returned record.
    pub fn execute(
        &self,
        handle: &ConnectionHandle,
        table_name: &str,
        scan: &CompiledScan,
    ) -> BrowseResult<ScanResult> {
        let start = Instant::now();

        match self.run(handle, table_name, scan) {
            Ok(mut result) => {
                result.elapsed = start.elapsed();
                self.counters.scans_executed.fetch_add(1, Ordering::Relaxed);
                self.counters
                    .rows_returned
                    .fetch_add(result.row_count() as u64, Ordering::Relaxed);
                info!(
                    table = %table_name,
                    rows = result.row_count(),
                    elapsed_ms = result.elapsed.as_millis() as u64,
                    "scan complete"
                );
                Ok(result)
            }
            Err(err) => {
                self.counters.scans_failed.fetch_add(1, Ordering::Relaxed);
                debug!(table = %table_name, error = %err, "scan failed");
                Err(err)
            }
        }
    }

    fn run(
        &self,
        handle: &ConnectionHandle,
        table_name: &str,
        scan: &CompiledScan,
    ) -> BrowseResult<ScanResult> {
        let scan_error = |source: StoreError| BrowseError::Scan {
            table: table_name.to_string(),
            source,
        };

        // Declaration order fixes release order: cursor, then table.
        let table = TableGuard {
            table: handle.session()?.open_table(table_name).map_err(scan_error)?,
            counters: &self.counters,
        };
        let mut cursor = CursorGuard {
            cursor: table.open_scanner(scan).map_err(scan_error)?,
            table: table_name,
            counters: &self.counters,
        };
        debug!(table = %table_name, connection = %handle.name(), "cursor open");

        let mut result = ScanResult::empty(table_name);
        while let Some(record) = cursor.next_record().map_err(scan_error)? {
            result.rows.push(materialize(&record));
        }
        Ok(result)
    }

    /// Returns a snapshot of the counters.
    pub fn stats(&self) -> ScanStats {
        ScanStats {
            scans_executed: self.counters.scans_executed.load(Ordering::Relaxed),
            scans_failed: self.counters.scans_failed.load(Ordering::Relaxed),
            rows_returned: self.counters.rows_returned.load(Ordering::Relaxed),
            release_warnings: self.counters.release_warnings.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::connection::ConnectionManager;
    use crate::query::{Query, QueryCompiler};
    use crate::setting::ConnectionSetting;
    use crate::store::{MemoryStore, StoreEvent};

    fn fixture() -> (MemoryStore, ConnectionManager, ConnectionHandle) {
        let store = MemoryStore::new();
        store.create_table("t", &["cf"]);
        for key in ["a", "b", "c", "d"] {
            store.put("t", key, "cf", "q", key).unwrap();
        }
        let manager = ConnectionManager::new(Arc::new(store.clone()));
        let handle = manager
            .connect(&ConnectionSetting::new("local").quorum("zk1"))
            .unwrap();
        store.clear_events();
        (store, manager, handle)
    }

    fn compile(query: &Query) -> CompiledScan {
        QueryCompiler::new().compile(query)
    }

    fn releases(store: &MemoryStore) -> Vec<&'static str> {
        store
            .events()
            .iter()
            .filter_map(|e| match e {
                StoreEvent::CursorClosed { .. } => Some("cursor"),
                StoreEvent::TableClosed { .. } => Some("table"),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_execute_releases_cursor_then_table() {
        let (store, _manager, handle) = fixture();
        let executor = ScanExecutor::new();

        let result = executor.execute(&handle, "t", &compile(&Query::new("t"))).unwrap();
        let keys: Vec<&str> = result.iter().map(|r| r.rowkey.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d"]);
        assert_eq!(releases(&store), vec!["cursor", "table"]);
        assert_eq!(executor.stats().rows_returned, 4);
    }

    #[test]
    fn test_mid_scan_failure_discards_rows() {
        let (store, _manager, handle) = fixture();
        store.fail_scan_after("t", 2);
        let executor = ScanExecutor::new();

        let err = executor
            .execute(&handle, "t", &compile(&Query::new("t")))
            .unwrap_err();
        assert!(matches!(
            err,
            BrowseError::Scan { ref table, source: StoreError::Injected(_) } if table == "t"
        ));
        assert_eq!(releases(&store), vec!["cursor", "table"]);
        assert_eq!(executor.stats().scans_failed, 1);
    }

    #[test]
    fn test_release_failure_does_not_mask_scan_error() {
        let (store, _manager, handle) = fixture();
        store.fail_scan_after("t", 1);
        store.fail_cursor_close(true);
        store.fail_table_close(true);
        let executor = ScanExecutor::new();

        let err = executor
            .execute(&handle, "t", &compile(&Query::new("t")))
            .unwrap_err();
        assert!(matches!(err, BrowseError::Scan { .. }));
        assert!(err.to_string().contains("after 1 records"));
        assert_eq!(releases(&store), vec!["cursor", "table"]);
        assert_eq!(executor.stats().release_warnings, 2);
    }

    #[test]
    fn test_release_failure_keeps_result() {
        let (store, _manager, handle) = fixture();
        store.fail_table_close(true);
        let executor = ScanExecutor::new();

        let result = executor.execute(&handle, "t", &compile(&Query::new("t")));
        assert_eq!(result.unwrap().row_count(), 4);
        assert_eq!(executor.stats().release_warnings, 1);
    }

    #[test]
    fn test_open_table_failure_opens_no_cursor() {
        let (store, _manager, handle) = fixture();
        let executor = ScanExecutor::new();

        let err = executor
            .execute(&handle, "missing", &compile(&Query::new("missing")))
            .unwrap_err();
        assert!(matches!(
            err.store_error(),
            Some(StoreError::TableNotFound(_))
        ));
        assert!(store
            .events()
            .iter()
            .all(|e| !matches!(e, StoreEvent::CursorOpened { .. })));
    }

    #[test]
    fn test_closed_handle() {
        let (_store, _manager, handle) = fixture();
        handle.close();

        let err = ScanExecutor::new()
            .execute(&handle, "t", &compile(&Query::new("t")))
            .unwrap_err();
        assert!(matches!(err, BrowseError::ConnectionClosed(_)));
    }

    #[test]
    fn test_start_inclusive_stop_exclusive() {
        let (_store, _manager, handle) = fixture();
        let result = ScanExecutor::new()
            .execute(&handle, "t", &compile(&Query::new("t").start("b").stop("d")))
            .unwrap();

        let keys: Vec<&str> = result.iter().map(|r| r.rowkey.as_str()).collect();
        assert_eq!(keys, vec!["b", "c"]);
    }
}
