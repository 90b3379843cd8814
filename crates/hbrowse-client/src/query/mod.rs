//! Declarative queries and their compilation into server-side scans.
//!
//! A [`Query`] says what the operator wants to see; [`QueryCompiler`] turns
//! it into a [`CompiledScan`]: filter chain, key bounds, family projection
//! and caching hint, the only input a store driver needs to open a cursor.
//!
//! The page size becomes a [`ScanFilter::Page`], which the store evaluates
//! once per region. A scan crossing several regions can therefore return
//! more than `page_size` rows in total. The result is passed through as the
//! store produced it; nothing re-limits it afterwards.

mod filter;

use std::fmt;

use tracing::debug;

use crate::error::{BrowseError, BrowseResult};
use crate::types::RowKey;

pub use filter::{FilterEvaluator, ScanFilter};

/// Default number of rows per page.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Rows fetched per round trip, independent of the page size.
pub const SCAN_CACHING: u32 = 100;

/// A declarative scan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    /// Table to scan.
    pub table_name: String,
    /// Only rows whose key starts with this prefix.
    pub prefix_rowkey: Option<RowKey>,
    /// Inclusive lower key bound.
    pub start_rowkey: Option<RowKey>,
    /// Exclusive upper key bound.
    pub stop_rowkey: Option<RowKey>,
    /// Page filter bound.
    pub page_size: u64,
    /// Families to project; empty means all.
    pub families: Vec<String>,
}

impl Query {
    /// Creates a query over a whole table with the default page size.
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            prefix_rowkey: None,
            start_rowkey: None,
            stop_rowkey: None,
            page_size: DEFAULT_PAGE_SIZE,
            families: Vec::new(),
        }
    }

    /// Sets the row key prefix.
    pub fn prefix(mut self, prefix: impl Into<RowKey>) -> Self {
        self.prefix_rowkey = Some(prefix.into());
        self
    }

    /// Sets the inclusive start key.
    pub fn start(mut self, start: impl Into<RowKey>) -> Self {
        self.start_rowkey = Some(start.into());
        self
    }

    /// Sets the exclusive stop key.
    pub fn stop(mut self, stop: impl Into<RowKey>) -> Self {
        self.stop_rowkey = Some(stop.into());
        self
    }

    /// Sets the page size.
    pub fn page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Adds a family to the projection.
    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.families.push(family.into());
        self
    }

    /// Replaces the projected families.
    pub fn families<I, S>(mut self, families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.families = families.into_iter().map(Into::into).collect();
        self
    }

    /// Validates the query.
    ///
    /// Only the table name is checked. Inverted bounds are legal and match
    /// nothing; unknown tables are reported by the store.
    pub fn validate(&self) -> BrowseResult<()> {
        if self.table_name.trim().is_empty() {
            return Err(BrowseError::InvalidQuery(
                "table name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// A scan specification ready to hand to a store driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledScan {
    filter: ScanFilter,
    start_row: Option<RowKey>,
    stop_row: Option<RowKey>,
    families: Vec<String>,
    caching: u32,
}

impl CompiledScan {
    /// Returns the row filter.
    pub fn filter(&self) -> &ScanFilter {
        &self.filter
    }

    /// Returns the inclusive start row, if bounded.
    pub fn start_row(&self) -> Option<&RowKey> {
        self.start_row.as_ref()
    }

    /// Returns the exclusive stop row, if bounded.
    pub fn stop_row(&self) -> Option<&RowKey> {
        self.stop_row.as_ref()
    }

    /// Returns the projected families; empty means all.
    pub fn families(&self) -> &[String] {
        &self.families
    }

    /// Returns the caching hint.
    pub fn caching(&self) -> u32 {
        self.caching
    }

    /// Returns true if either key bound is set.
    pub fn has_key_bounds(&self) -> bool {
        self.start_row.is_some() || self.stop_row.is_some()
    }

    /// Checks a key against the start and stop bounds.
    pub fn in_bounds(&self, key: &[u8]) -> bool {
        let after_start = self
            .start_row
            .as_ref()
            .map_or(true, |start| key >= start.as_bytes());
        let before_stop = self
            .stop_row
            .as_ref()
            .map_or(true, |stop| key < stop.as_bytes());
        after_start && before_stop
    }

    /// Returns true if cells of this family are projected.
    pub fn projects_family(&self, family: &[u8]) -> bool {
        self.families.is_empty() || self.families.iter().any(|f| f.as_bytes() == family)
    }
}

impl fmt::Display for CompiledScan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |key: &Option<RowKey>| match key {
            Some(key) => format!("{:?}", key.to_string()),
            None => "-".to_string(),
        };
        write!(
            f,
            "Scan(start={}, stop={}, families=[{}], filter={}, caching={})",
            bound(&self.start_row),
            bound(&self.stop_row),
            self.families.join(","),
            self.filter,
            self.caching
        )
    }
}

/// Translates queries into scans.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueryCompiler;

impl QueryCompiler {
    /// Creates a compiler.
    pub fn new() -> Self {
        Self
    }

    /// Compiles a query. The same query always yields an equal scan.
    pub fn compile(&self, query: &Query) -> CompiledScan {
        let mut filters = Vec::with_capacity(2);

        if let Some(prefix) = non_empty(&query.prefix_rowkey) {
            filters.push(ScanFilter::Prefix(prefix.clone()));
        }
        // TODO: the page filter counts per region; decide whether a
        // scan-wide limit belongs here once the server-side semantics are
        // settled.
        filters.push(ScanFilter::Page(query.page_size));

        let filter = if filters.len() == 1 {
            filters.remove(0)
        } else {
            ScanFilter::MustPassAll(filters)
        };

        let mut families: Vec<String> = Vec::with_capacity(query.families.len());
        for family in &query.families {
            if !families.contains(family) {
                families.push(family.clone());
            }
        }

        let scan = CompiledScan {
            filter,
            start_row: non_empty(&query.start_rowkey).cloned(),
            stop_row: non_empty(&query.stop_rowkey).cloned(),
            families,
            caching: SCAN_CACHING,
        };
        debug!(table = %query.table_name, scan = %scan, "compiled query");
        scan
    }
}

fn non_empty(key: &Option<RowKey>) -> Option<&RowKey> {
    key.as_ref().filter(|k| !k.is_empty())
}
