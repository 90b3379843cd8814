//! Scan path benchmarks for hbrowse.
//!
//! Benchmarks for:
//! - Query compilation
//! - Full and prefix scans over one and many regions
//! - Row materialization

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use hbrowse_bench::utils::{generate_records, populated_store};
use hbrowse_client::{materialize, Browser, ConnectionSetting, Query, QueryCompiler};

/// Benchmark query compilation.
fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("query/compile");
    let compiler = QueryCompiler::new();

    group.bench_function("page_only", |b| {
        let query = Query::new("bench");
        b.iter(|| black_box(compiler.compile(black_box(&query))));
    });

    group.bench_function("prefix_bounds_families", |b| {
        let query = Query::new("bench")
            .prefix("row:0000")
            .start("row:00000100")
            .stop("row:00000900")
            .families(["info", "stats"])
            .page_size(50);
        b.iter(|| black_box(compiler.compile(black_box(&query))));
    });

    group.finish();
}

/// Benchmark scans with varying region counts.
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan/full");

    for regions in [1, 4, 16] {
        let store = populated_store(5_000, 4, regions);
        let browser = Browser::new(Arc::new(store));
        browser
            .connect(&ConnectionSetting::new("bench").quorum("localhost"))
            .unwrap_or_else(|e| panic!("connect failed: {e}"));
        let query = Query::new("bench").page_size(10_000);

        group.throughput(Throughput::Elements(5_000));
        group.bench_with_input(BenchmarkId::new("regions", regions), &regions, |b, _| {
            b.iter(|| black_box(browser.run_query("bench", &query).map(|r| r.row_count())));
        });
    }

    group.finish();
}

/// Benchmark prefix scans with a small page.
fn bench_prefix_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan/prefix");
    let browser = Browser::new(Arc::new(populated_store(10_000, 2, 8)));
    browser
        .connect(&ConnectionSetting::new("bench").quorum("localhost"))
        .unwrap_or_else(|e| panic!("connect failed: {e}"));

    for page_size in [10, 100] {
        let query = Query::new("bench").prefix("row:00005").page_size(page_size);
        group.bench_with_input(
            BenchmarkId::new("page_size", page_size),
            &page_size,
            |b, _| {
                b.iter(|| black_box(browser.run_query("bench", &query).map(|r| r.row_count())));
            },
        );
    }

    group.finish();
}

/// Benchmark materialization of raw records.
fn bench_materialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("result/materialize");

    for cells in [4, 32] {
        let records = generate_records(1_000, cells);
        group.throughput(Throughput::Elements(records.len() as u64));
        group.bench_with_input(BenchmarkId::new("cells", cells), &records, |b, records| {
            b.iter(|| {
                for record in records {
                    black_box(materialize(record));
                }
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_compile,
    bench_scan,
    bench_prefix_scan,
    bench_materialize
);
criterion_main!(benches);
