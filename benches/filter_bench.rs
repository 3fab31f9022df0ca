//! Benchmarks for filter lookup and root-domain extraction.
//!
//! Both run once per inbound query, so they sit on the hot path.

use criterion::{black_box, BenchmarkId, Criterion, Throughput};

use sixdrop::filter::FilterList;
use sixdrop::stats::root_domain;

fn bench_filter(c: &mut Criterion) {
    let filter = FilterList::new(["youtube.com.", "googlevideo.com."]);

    let mut group = c.benchmark_group("filter");
    group.throughput(Throughput::Elements(1));

    group.bench_function(BenchmarkId::new("contains", "hit"), |b| {
        b.iter(|| filter.contains(black_box("youtube.com.")))
    });

    group.bench_function(BenchmarkId::new("contains", "miss"), |b| {
        b.iter(|| filter.contains(black_box("www.example.com.")))
    });

    // Subdomains of configured names are deliberate misses.
    group.bench_function(BenchmarkId::new("contains", "subdomain_miss"), |b| {
        b.iter(|| filter.contains(black_box("media.ak.googlevideo.com.")))
    });

    group.finish();
}

fn bench_root_domain(c: &mut Criterion) {
    let mut group = c.benchmark_group("root_domain");
    group.throughput(Throughput::Elements(1));

    group.bench_function(BenchmarkId::new("extract", "three_labels"), |b| {
        b.iter(|| root_domain(black_box("www.youtube.com.")))
    });

    group.bench_function(BenchmarkId::new("extract", "deep"), |b| {
        b.iter(|| root_domain(black_box("r3---sn-4g5e6nsz.googlevideo.com.")))
    });

    group.bench_function(BenchmarkId::new("extract", "short"), |b| {
        b.iter(|| root_domain(black_box("localhost.")))
    });

    group.finish();
}

fn main() {
    let mut criterion = Criterion::default().configure_from_args();
    bench_filter(&mut criterion);
    bench_root_domain(&mut criterion);
    criterion.final_summary();
}
