//! Scan results and their materialization from raw store records.
//!
//! Row keys, families, qualifiers and values are decoded as UTF-8 with
//! `String::from_utf8_lossy`: invalid sequences become U+FFFD and decoding
//! never fails.

use std::time::Duration;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::store::RawRecord;

/// One decoded cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellValue {
    /// Column family.
    pub family: String,
    /// Qualifier.
    pub key: String,
    /// Value.
    pub value: String,
}

impl CellValue {
    /// Returns the `family:qualifier` label of the cell.
    pub fn column(&self) -> String {
        format!("{}:{}", self.family, self.key)
    }
}

/// One decoded row.
///
/// Cells are keyed by qualifier in first-seen order. A later cell with the
/// same qualifier replaces the value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Row {
    /// Row key.
    pub rowkey: String,
    /// Cells by qualifier.
    pub cells: IndexMap<String, CellValue>,
}

impl Row {
    /// Creates an empty row.
    pub fn new(rowkey: impl Into<String>) -> Self {
        Self {
            rowkey: rowkey.into(),
            cells: IndexMap::new(),
        }
    }

    /// Inserts a cell, overwriting any cell with the same qualifier.
    pub fn insert(&mut self, cell: CellValue) {
        self.cells.insert(cell.key.clone(), cell);
    }

    /// Gets a cell by qualifier.
    pub fn get(&self, qualifier: &str) -> Option<&CellValue> {
        self.cells.get(qualifier)
    }

    /// Returns the number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns true if the row has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Decodes a raw record into a row.
pub fn materialize(record: &RawRecord) -> Row {
    let mut row = Row::new(decode(&record.row));
    for cell in &record.cells {
        row.insert(CellValue {
            family: decode(&cell.family),
            key: decode(&cell.qualifier),
            value: decode(&cell.value),
        });
    }
    row
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// The rows returned by one scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanResult {
    /// Scanned table.
    pub table: String,
    /// Rows in store order.
    pub rows: Vec<Row>,
    /// Wall time of the scan.
    #[serde(skip)]
    pub elapsed: Duration,
}

impl ScanResult {
    /// Creates an empty result for a table.
    pub fn empty(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Returns the number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if no row matched.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterates over rows.
    pub fn iter(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter()
    }

    /// Returns the `family:qualifier` labels of all cells, first-seen order.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = IndexSet::new();
        for row in &self.rows {
            for cell in row.cells.values() {
                columns.insert(cell.column());
            }
        }
        columns.into_iter().collect()
    }
}
