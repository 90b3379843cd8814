//! In-process store driver.
//!
//! [`MemoryStore`] keeps tables as sorted row maps split into regions at
//! configurable keys. Scans walk the regions overlapping the requested range
//! in key order and evaluate the scan filter with fresh state per region, the
//! way a region server would. Within a row, cells come back in write order.
//!
//! Every open and close is appended to an event log, and faults can be
//! injected at each step, so resource handling can be observed from tests.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::ops::Bound;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::debug;

use super::{RawCell, RawRecord, ScanCursor, StoreConnection, StoreConnector, TableDescriptor, TableHandle};
use crate::error::{StoreError, StoreResult};
use crate::query::CompiledScan;
use crate::setting::{ClusterConfig, MASTER_KEY};
use crate::types::RowKey;

/// An open or close observed by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A connection was opened.
    ConnectionOpened {
        /// Connection id.
        id: u64,
    },
    /// A connection was closed.
    ConnectionClosed {
        /// Connection id.
        id: u64,
    },
    /// A table handle was opened.
    TableOpened {
        /// Table name.
        table: String,
        /// Handle id.
        id: u64,
    },
    /// A table handle close was attempted.
    TableClosed {
        /// Table name.
        table: String,
        /// Handle id.
        id: u64,
        /// False if the close reported a failure.
        ok: bool,
    },
    /// A cursor was opened.
    CursorOpened {
        /// Table name.
        table: String,
        /// Cursor id.
        id: u64,
    },
    /// A cursor close was attempted.
    CursorClosed {
        /// Table name.
        table: String,
        /// Cursor id.
        id: u64,
        /// False if the close reported a failure.
        ok: bool,
    },
    /// A cursor pulled a batch of rows.
    BatchFetched {
        /// Table name.
        table: String,
        /// Cursor id.
        id: u64,
        /// Rows in the batch.
        rows: usize,
    },
}

#[derive(Debug, Default)]
struct Faults {
    refused_hosts: HashSet<String>,
    fail_list_tables: bool,
    fail_open_table: HashSet<String>,
    fail_scan_after: HashMap<String, usize>,
    fail_cursor_close: bool,
    fail_table_close: bool,
}

#[derive(Debug)]
struct TableData {
    name: String,
    families: Vec<Bytes>,
    splits: Vec<RowKey>,
    rows: BTreeMap<RowKey, Vec<RawCell>>,
}

impl TableData {
    fn regions(&self) -> Vec<(Option<&[u8]>, Option<&[u8]>)> {
        let mut regions = Vec::with_capacity(self.splits.len() + 1);
        let mut start = None;
        for split in &self.splits {
            regions.push((start, Some(split.as_bytes())));
            start = Some(split.as_bytes());
        }
        regions.push((start, None));
        regions
    }

    fn scan(&self, scan: &CompiledScan) -> Vec<RawRecord> {
        let mut records = Vec::new();
        let scan_start = scan.start_row().map(RowKey::as_bytes);
        let scan_stop = scan.stop_row().map(RowKey::as_bytes);

        for (region_start, region_end) in self.regions() {
            let lower = max_lower(region_start, scan_start);
            let upper = min_upper(region_end, scan_stop);
            if let (Some(lower), Some(upper)) = (lower, upper) {
                if lower >= upper {
                    continue;
                }
            }
            let range = (
                lower.map_or(Bound::Unbounded, Bound::Included),
                upper.map_or(Bound::Unbounded, Bound::Excluded),
            );

            // Filter state is per region.
            let mut filter = scan.filter().evaluator();
            for (key, cells) in self.rows.range::<[u8], _>(range) {
                if filter.filter_all_remaining() {
                    break;
                }
                let projected: Vec<RawCell> = cells
                    .iter()
                    .filter(|cell| scan.projects_family(&cell.family))
                    .cloned()
                    .collect();
                if projected.is_empty() {
                    continue;
                }
                if filter.accept_row(key) {
                    records.push(RawRecord {
                        row: key.as_raw().clone(),
                        cells: projected,
                    });
                }
            }
        }
        records
    }
}

fn max_lower<'a>(a: Option<&'a [u8]>, b: Option<&'a [u8]>) -> Option<&'a [u8]> {
    match (a, b) {
        (Some(a), Some(b)) => Some(std::cmp::max(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}

fn min_upper<'a>(a: Option<&'a [u8]>, b: Option<&'a [u8]>) -> Option<&'a [u8]> {
    match (a, b) {
        (Some(a), Some(b)) => Some(std::cmp::min(a, b)),
        (a, None) => a,
        (None, b) => b,
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    tables: RwLock<Vec<TableData>>,
    faults: Mutex<Faults>,
    events: Mutex<Vec<StoreEvent>>,
    next_id: AtomicU64,
    clock: AtomicU64,
}

impl StoreInner {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn record(&self, event: StoreEvent) {
        self.events.lock().push(event);
    }
}

/// A thread-safe in-memory cluster. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    /// Creates an empty cluster.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table, replacing any table with the same name.
    pub fn create_table(&self, name: &str, families: &[&str]) {
        let table = TableData {
            name: name.to_string(),
            families: families
                .iter()
                .map(|f| Bytes::copy_from_slice(f.as_bytes()))
                .collect(),
            splits: Vec::new(),
            rows: BTreeMap::new(),
        };
        let mut tables = self.inner.tables.write();
        match tables.iter_mut().find(|t| t.name == name) {
            Some(existing) => *existing = table,
            None => tables.push(table),
        }
    }

    /// Splits a table into regions at the given keys.
    pub fn split_table<I, K>(&self, name: &str, split_keys: I) -> StoreResult<()>
    where
        I: IntoIterator<Item = K>,
        K: Into<RowKey>,
    {
        let mut tables = self.inner.tables.write();
        let table = tables
            .iter_mut()
            .find(|t| t.name == name)
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))?;

        let mut splits: Vec<RowKey> = table.splits.drain(..).collect();
        splits.extend(
            split_keys
                .into_iter()
                .map(Into::into)
                .filter(|k: &RowKey| !k.is_empty()),
        );
        splits.sort();
        splits.dedup();
        table.splits = splits;
        Ok(())
    }

    /// Appends a cell to a row.
    pub fn put(
        &self,
        table: &str,
        row: impl Into<RowKey>,
        family: &str,
        qualifier: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> StoreResult<()> {
        let mut tables = self.inner.tables.write();
        let data = tables
            .iter_mut()
            .find(|t| t.name == table)
            .ok_or_else(|| StoreError::TableNotFound(table.to_string()))?;
        if !data.families.iter().any(|f| f.as_ref() == family.as_bytes()) {
            return Err(StoreError::NoSuchFamily {
                table: table.to_string(),
                family: family.to_string(),
            });
        }

        let timestamp = self.inner.clock.fetch_add(1, Ordering::Relaxed) + 1;
        data.rows
            .entry(row.into())
            .or_default()
            .push(RawCell::new(family, qualifier, value).with_timestamp(timestamp));
        Ok(())
    }

    /// Returns the number of regions of a table.
    pub fn region_count(&self, table: &str) -> Option<usize> {
        self.inner
            .tables
            .read()
            .iter()
            .find(|t| t.name == table)
            .map(|t| t.splits.len() + 1)
    }

    /// Returns the table names in creation order.
    pub fn table_names(&self) -> Vec<String> {
        self.inner.tables.read().iter().map(|t| t.name.clone()).collect()
    }

    /// Refuses connections whose quorum or master includes this host.
    pub fn refuse_host(&self, host: &str) {
        self.inner.faults.lock().refused_hosts.insert(host.to_string());
    }

    /// Makes table listing fail.
    pub fn fail_list_tables(&self, fail: bool) {
        self.inner.faults.lock().fail_list_tables = fail;
    }

    /// Makes opening this table fail with an I/O error.
    pub fn fail_open_table(&self, table: &str) {
        self.inner.faults.lock().fail_open_table.insert(table.to_string());
    }

    /// Makes cursors on this table fail after returning `records` records.
    pub fn fail_scan_after(&self, table: &str, records: usize) {
        self.inner
            .faults
            .lock()
            .fail_scan_after
            .insert(table.to_string(), records);
    }

    /// Makes cursor close report a failure.
    pub fn fail_cursor_close(&self, fail: bool) {
        self.inner.faults.lock().fail_cursor_close = fail;
    }

    /// Makes table handle close report a failure.
    pub fn fail_table_close(&self, fail: bool) {
        self.inner.faults.lock().fail_table_close = fail;
    }

    /// Removes every injected fault.
    pub fn clear_faults(&self) {
        *self.inner.faults.lock() = Faults::default();
    }

    /// Returns the recorded events.
    pub fn events(&self) -> Vec<StoreEvent> {
        self.inner.events.lock().clone()
    }

    /// Clears the recorded events.
    pub fn clear_events(&self) {
        self.inner.events.lock().clear();
    }
}

impl StoreConnector for MemoryStore {
    fn connect(&self, config: &ClusterConfig) -> StoreResult<Arc<dyn StoreConnection>> {
        let hosts = config.quorum_hosts();
        if hosts.is_empty() {
            return Err(StoreError::Unreachable(
                "no quorum hosts configured".to_string(),
            ));
        }
        {
            let faults = self.inner.faults.lock();
            let refused = hosts
                .iter()
                .copied()
                .chain(config.get(MASTER_KEY))
                .find(|host| faults.refused_hosts.contains(*host));
            if let Some(host) = refused {
                return Err(StoreError::Unreachable(format!("{host} refused connection")));
            }
        }

        let id = self.inner.next_id();
        self.inner.record(StoreEvent::ConnectionOpened { id });
        debug!(id, quorum = %config.connection_string(), "memory connection opened");
        Ok(Arc::new(MemoryConnection {
            store: Arc::clone(&self.inner),
            id,
            closed: AtomicBool::new(false),
        }))
    }
}

struct MemoryConnection {
    store: Arc<StoreInner>,
    id: u64,
    closed: AtomicBool,
}

impl MemoryConnection {
    fn ensure_open(&self) -> StoreResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed("connection"));
        }
        Ok(())
    }
}

impl StoreConnection for MemoryConnection {
    fn list_tables(&self) -> StoreResult<Vec<TableDescriptor>> {
        self.ensure_open()?;
        if self.store.faults.lock().fail_list_tables {
            return Err(StoreError::Io("table listing failed".to_string()));
        }
        Ok(self
            .store
            .tables
            .read()
            .iter()
            .map(|t| TableDescriptor {
                name: t.name.clone(),
                families: t.families.clone(),
            })
            .collect())
    }

    fn open_table(&self, name: &str) -> StoreResult<Box<dyn TableHandle>> {
        self.ensure_open()?;
        if self.store.faults.lock().fail_open_table.contains(name) {
            return Err(StoreError::Io(format!("cannot open table '{name}'")));
        }
        if !self.store.tables.read().iter().any(|t| t.name == name) {
            return Err(StoreError::TableNotFound(name.to_string()));
        }

        let id = self.store.next_id();
        self.store.record(StoreEvent::TableOpened {
            table: name.to_string(),
            id,
        });
        Ok(Box::new(MemoryTable {
            store: Arc::clone(&self.store),
            table: name.to_string(),
            id,
            closed: false,
        }))
    }

    fn close(&self) -> StoreResult<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(StoreError::Closed("connection"));
        }
        self.store.record(StoreEvent::ConnectionClosed { id: self.id });
        Ok(())
    }
}

struct MemoryTable {
    store: Arc<StoreInner>,
    table: String,
    id: u64,
    closed: bool,
}

impl TableHandle for MemoryTable {
    fn name(&self) -> &str {
        &self.table
    }

    fn open_scanner(&self, scan: &CompiledScan) -> StoreResult<Box<dyn ScanCursor>> {
        if self.closed {
            return Err(StoreError::Closed("table"));
        }
        let records = {
            let tables = self.store.tables.read();
            let data = tables
                .iter()
                .find(|t| t.name == self.table)
                .ok_or_else(|| StoreError::TableNotFound(self.table.clone()))?;
            data.scan(scan)
        };
        let fail_after = self.store.faults.lock().fail_scan_after.get(&self.table).copied();

        let id = self.store.next_id();
        self.store.record(StoreEvent::CursorOpened {
            table: self.table.clone(),
            id,
        });
        Ok(Box::new(MemoryCursor {
            store: Arc::clone(&self.store),
            table: self.table.clone(),
            id,
            records: records.into(),
            caching: scan.caching().max(1) as usize,
            served: 0,
            fail_after,
            closed: false,
        }))
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed("table"));
        }
        self.closed = true;
        let ok = !self.store.faults.lock().fail_table_close;
        self.store.record(StoreEvent::TableClosed {
            table: self.table.clone(),
            id: self.id,
            ok,
        });
        if ok {
            Ok(())
        } else {
            Err(StoreError::Injected(format!("closing table '{}'", self.table)))
        }
    }
}

struct MemoryCursor {
    store: Arc<StoreInner>,
    table: String,
    id: u64,
    records: VecDeque<RawRecord>,
    caching: usize,
    served: usize,
    fail_after: Option<usize>,
    closed: bool,
}

impl ScanCursor for MemoryCursor {
    fn next_record(&mut self) -> StoreResult<Option<RawRecord>> {
        if self.closed {
            return Err(StoreError::Closed("cursor"));
        }
        if self.fail_after == Some(self.served) {
            return Err(StoreError::Injected(format!(
                "cursor on '{}' failed after {} records",
                self.table, self.served
            )));
        }
        let Some(record) = self.records.pop_front() else {
            return Ok(None);
        };
        if self.served % self.caching == 0 {
            self.store.record(StoreEvent::BatchFetched {
                table: self.table.clone(),
                id: self.id,
                rows: (self.records.len() + 1).min(self.caching),
            });
        }
        self.served += 1;
        Ok(Some(record))
    }

    fn close(&mut self) -> StoreResult<()> {
        if self.closed {
            return Err(StoreError::Closed("cursor"));
        }
        self.closed = true;
        let ok = !self.store.faults.lock().fail_cursor_close;
        self.store.record(StoreEvent::CursorClosed {
            table: self.table.clone(),
            id: self.id,
            ok,
        });
        if ok {
            Ok(())
        } else {
            Err(StoreError::Injected(format!("closing cursor on '{}'", self.table)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Query, QueryCompiler};
    use crate::setting::ConnectionSetting;

    fn store_with_rows(keys: &[&str]) -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("t", &["cf", "meta"]);
        for key in keys {
            store.put("t", *key, "cf", "q", *key).unwrap();
        }
        store
    }

    fn scan_keys(store: &MemoryStore, query: &Query) -> Vec<String> {
        let conn = store
            .connect(&ConnectionSetting::new("m").quorum("zk").cluster_config())
            .unwrap();
        let table = conn.open_table(&query.table_name).unwrap();
        let mut cursor = table.open_scanner(&QueryCompiler::new().compile(query)).unwrap();
        let mut keys = Vec::new();
        while let Some(record) = cursor.next_record().unwrap() {
            keys.push(String::from_utf8(record.row.to_vec()).unwrap());
        }
        keys
    }

    #[test]
    fn test_scan_in_key_order() {
        let store = store_with_rows(&["c", "a", "b"]);
        assert_eq!(scan_keys(&store, &Query::new("t")), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_page_limit_applies_per_region() {
        let store = store_with_rows(&["a1", "a2", "a3", "b1", "b2", "b3"]);
        store.split_table("t", ["b"]).unwrap();
        assert_eq!(store.region_count("t"), Some(2));

        let keys = scan_keys(&store, &Query::new("t").page_size(2));
        assert_eq!(keys, vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn test_bounds_clip_regions() {
        let store = store_with_rows(&["a", "b", "c", "d", "e"]);
        store.split_table("t", ["c", "e"]).unwrap();

        let keys = scan_keys(&store, &Query::new("t").start("b").stop("d"));
        assert_eq!(keys, vec!["b", "c"]);
    }

    #[test]
    fn test_inverted_bounds_yield_nothing() {
        let store = store_with_rows(&["a", "b", "c"]);
        assert!(scan_keys(&store, &Query::new("t").start("c").stop("a")).is_empty());
    }

    #[test]
    fn test_projection_skips_rows_without_cells() {
        let store = store_with_rows(&["a", "b"]);
        store.put("t", "c", "meta", "m", "1").unwrap();

        assert_eq!(scan_keys(&store, &Query::new("t").family("meta")), vec!["c"]);
    }

    #[test]
    fn test_put_validates_table_and_family() {
        let store = store_with_rows(&[]);
        assert_eq!(
            store.put("nope", "r", "cf", "q", "v"),
            Err(StoreError::TableNotFound("nope".to_string()))
        );
        assert!(matches!(
            store.put("t", "r", "zz", "q", "v"),
            Err(StoreError::NoSuchFamily { .. })
        ));
    }

    #[test]
    fn test_refused_host() {
        let store = MemoryStore::new();
        store.refuse_host("zk2");
        let config = ConnectionSetting::new("m").quorum("zk1,zk2").cluster_config();
        assert!(matches!(
            store.connect(&config),
            Err(StoreError::Unreachable(_))
        ));
    }

    #[test]
    fn test_cursor_batches_follow_caching() {
        let keys: Vec<String> = (0..250).map(|i| format!("k{i:03}")).collect();
        let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let store = store_with_rows(&refs);

        let rows = scan_keys(&store, &Query::new("t").page_size(1_000));
        assert_eq!(rows.len(), 250);

        let batches: Vec<usize> = store
            .events()
            .into_iter()
            .filter_map(|e| match e {
                StoreEvent::BatchFetched { rows, .. } => Some(rows),
                _ => None,
            })
            .collect();
        assert_eq!(batches, vec![100, 100, 50]);
    }
}
