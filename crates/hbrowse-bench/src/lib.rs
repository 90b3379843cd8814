//! hbrowse Performance Benchmarks
//!
//! This crate contains benchmarks for the browser engine:
//! - Query compilation
//! - Scans over the in-memory store, single and multi-region
//! - Row materialization
//!
//! Run benchmarks with:
//! ```bash
//! cargo bench -p hbrowse-bench
//! ```

pub mod utils;
