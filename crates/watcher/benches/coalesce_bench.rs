//! Coalescer throughput benchmarks

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dirwatch::Coalescer;
use std::path::PathBuf;

fn signal_paths(count: usize, dirs: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| PathBuf::from(format!("/srv/site/dir{}/file{}.html", i % dirs, i)))
        .collect()
}

fn bench_record(c: &mut Criterion) {
    let mut group = c.benchmark_group("record");

    for &count in &[100usize, 1_000, 10_000] {
        let paths = signal_paths(count, 16);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &paths, |b, paths| {
            let coalescer = Coalescer::new(vec![PathBuf::from("/srv/site")]);
            b.iter(|| {
                for path in paths {
                    black_box(coalescer.record(path));
                }
                black_box(coalescer.flush())
            });
        });
    }

    group.finish();
}

fn bench_outside_roots(c: &mut Criterion) {
    let coalescer = Coalescer::new(vec![
        PathBuf::from("/srv/site"),
        PathBuf::from("/srv/assets"),
        PathBuf::from("/var/www"),
    ]);
    let paths = signal_paths(1_000, 16)
        .into_iter()
        .map(|p| PathBuf::from("/elsewhere").join(p.strip_prefix("/").unwrap_or(&p)))
        .collect::<Vec<_>>();

    c.bench_function("record_outside_roots", |b| {
        b.iter(|| {
            for path in &paths {
                black_box(coalescer.record(path));
            }
        });
    });
}

fn bench_flush_wide_batch(c: &mut Criterion) {
    let paths = signal_paths(10_000, 10_000);
    let coalescer = Coalescer::new(vec![PathBuf::from("/srv/site")]);

    c.bench_function("flush_10k_directories", |b| {
        b.iter(|| {
            for path in &paths {
                coalescer.record(path);
            }
            black_box(coalescer.flush().into_sorted_vec())
        });
    });
}

criterion_group!(benches, bench_record, bench_outside_roots, bench_flush_wide_batch);
criterion_main!(benches);
