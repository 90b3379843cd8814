//! Server-side row filters.
//!
//! A [`ScanFilter`] is the declarative description carried by a compiled
//! scan. Store drivers evaluate it through a [`FilterEvaluator`], whose state
//! (rows accepted so far, whether the prefix has been passed) lives for one
//! partition of the table only. A driver creates a fresh evaluator for every
//! region it walks, so a page limit caps rows per region and not per scan.

use std::fmt;

use crate::types::RowKey;

/// A row filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFilter {
    /// Accepts rows whose key starts with the prefix.
    Prefix(RowKey),
    /// Accepts at most this many rows.
    Page(u64),
    /// Accepts rows accepted by every filter in the list.
    MustPassAll(Vec<ScanFilter>),
}

impl ScanFilter {
    /// Creates a fresh evaluator for one partition.
    pub fn evaluator(&self) -> FilterEvaluator {
        FilterEvaluator {
            node: EvalNode::from_filter(self),
        }
    }

    /// Returns the page limit if this filter carries one.
    pub fn page_limit(&self) -> Option<u64> {
        match self {
            ScanFilter::Page(limit) => Some(*limit),
            ScanFilter::Prefix(_) => None,
            ScanFilter::MustPassAll(filters) => filters.iter().find_map(Self::page_limit),
        }
    }

    /// Returns the prefix if this filter carries one.
    pub fn prefix(&self) -> Option<&RowKey> {
        match self {
            ScanFilter::Prefix(prefix) => Some(prefix),
            ScanFilter::Page(_) => None,
            ScanFilter::MustPassAll(filters) => filters.iter().find_map(Self::prefix),
        }
    }
}

impl fmt::Display for ScanFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanFilter::Prefix(prefix) => write!(f, "PrefixFilter({:?})", prefix.to_string()),
            ScanFilter::Page(limit) => write!(f, "PageFilter({limit})"),
            ScanFilter::MustPassAll(filters) => {
                write!(f, "FilterList(MUST_PASS_ALL")?;
                for filter in filters {
                    write!(f, ", {filter}")?;
                }
                write!(f, ")")
            }
        }
    }
}

#[derive(Debug)]
enum EvalNode {
    Prefix { prefix: RowKey, passed: bool },
    Page { limit: u64, accepted: u64 },
    All(Vec<EvalNode>),
}

impl EvalNode {
    fn from_filter(filter: &ScanFilter) -> Self {
        match filter {
            ScanFilter::Prefix(prefix) => EvalNode::Prefix {
                prefix: prefix.clone(),
                passed: false,
            },
            ScanFilter::Page(limit) => EvalNode::Page {
                limit: *limit,
                accepted: 0,
            },
            ScanFilter::MustPassAll(filters) => {
                EvalNode::All(filters.iter().map(EvalNode::from_filter).collect())
            }
        }
    }

    /// Key predicate only, no counting.
    fn matches_key(&mut self, key: &[u8]) -> bool {
        match self {
            EvalNode::Prefix { prefix, passed } => {
                if key.starts_with(prefix.as_bytes()) {
                    return true;
                }
                if key > prefix.as_bytes() {
                    *passed = true;
                }
                false
            }
            EvalNode::Page { .. } => true,
            EvalNode::All(nodes) => nodes.iter_mut().all(|n| n.matches_key(key)),
        }
    }

    fn within_page(&self) -> bool {
        match self {
            EvalNode::Page { limit, accepted } => accepted < limit,
            EvalNode::Prefix { .. } => true,
            EvalNode::All(nodes) => nodes.iter().all(EvalNode::within_page),
        }
    }

    fn count_accepted(&mut self) {
        match self {
            EvalNode::Page { accepted, .. } => *accepted += 1,
            EvalNode::Prefix { .. } => {}
            EvalNode::All(nodes) => nodes.iter_mut().for_each(EvalNode::count_accepted),
        }
    }

    fn all_remaining_filtered(&self) -> bool {
        match self {
            EvalNode::Prefix { passed, .. } => *passed,
            EvalNode::Page { limit, accepted } => accepted >= limit,
            EvalNode::All(nodes) => nodes.iter().any(EvalNode::all_remaining_filtered),
        }
    }
}

/// Per-partition filter state.
#[derive(Debug)]
pub struct FilterEvaluator {
    node: EvalNode,
}

impl FilterEvaluator {
    /// Decides whether the row with this key is returned.
    ///
    /// Rows must be presented in ascending key order.
    pub fn accept_row(&mut self, key: &[u8]) -> bool {
        if !self.node.matches_key(key) || !self.node.within_page() {
            return false;
        }
        self.node.count_accepted();
        true
    }

    /// Returns true once no later row of this partition can be accepted.
    pub fn filter_all_remaining(&self) -> bool {
        self.node.all_remaining_filtered()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefix_and_page(prefix: &str, limit: u64) -> ScanFilter {
        ScanFilter::MustPassAll(vec![
            ScanFilter::Prefix(RowKey::from(prefix)),
            ScanFilter::Page(limit),
        ])
    }

    #[test]
    fn test_page_filter_caps_rows() {
        let mut eval = ScanFilter::Page(2).evaluator();
        assert!(eval.accept_row(b"a"));
        assert!(!eval.filter_all_remaining());
        assert!(eval.accept_row(b"b"));
        assert!(eval.filter_all_remaining());
        assert!(!eval.accept_row(b"c"));
    }

    #[test]
    fn test_page_zero_accepts_nothing() {
        let mut eval = ScanFilter::Page(0).evaluator();
        assert!(eval.filter_all_remaining());
        assert!(!eval.accept_row(b"a"));
    }

    #[test]
    fn test_rejected_rows_do_not_count_against_page() {
        let mut eval = prefix_and_page("user:", 2).evaluator();
        assert!(!eval.accept_row(b"other:1"));
        assert!(eval.accept_row(b"user:1"));
        assert!(eval.accept_row(b"user:2"));
        assert!(!eval.accept_row(b"user:3"));
        assert!(eval.filter_all_remaining());
    }

    #[test]
    fn test_prefix_passed_ends_partition() {
        let mut eval = ScanFilter::Prefix(RowKey::from("m")).evaluator();
        assert!(!eval.accept_row(b"a"));
        assert!(!eval.filter_all_remaining());
        assert!(eval.accept_row(b"m1"));
        assert!(!eval.accept_row(b"z"));
        assert!(eval.filter_all_remaining());
    }

    #[test]
    fn test_fresh_evaluator_resets_state() {
        let filter = ScanFilter::Page(1);
        let mut first = filter.evaluator();
        assert!(first.accept_row(b"a"));
        assert!(!first.accept_row(b"b"));

        let mut second = filter.evaluator();
        assert!(second.accept_row(b"c"));
    }

    #[test]
    fn test_accessors_and_display() {
        let filter = prefix_and_page("user:", 10);
        assert_eq!(filter.page_limit(), Some(10));
        assert_eq!(filter.prefix(), Some(&RowKey::from("user:")));
        assert_eq!(
            filter.to_string(),
            "FilterList(MUST_PASS_ALL, PrefixFilter(\"user:\"), PageFilter(10))"
        );
        assert_eq!(ScanFilter::Page(3).prefix(), None);
    }
}
