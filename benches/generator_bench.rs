use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use treestat::{ByteGenerator, KeyPool, Workload};

fn bench_bytes(c: &mut Criterion) {
    let mut g = c.benchmark_group("byte_generator");

    for size in [256usize, 4096, 65536] {
        g.bench_with_input(BenchmarkId::new("fill", size), &size, |b, &size| {
            let mut rng = ByteGenerator::new(42);
            let mut buf = vec![0u8; size];
            b.iter(|| {
                rng.fill(black_box(&mut buf));
                black_box(buf[size - 1]);
            });
        });
    }

    g.finish();
}

fn bench_keys(c: &mut Criterion) {
    let mut g = c.benchmark_group("workload");

    g.bench_function("random_key", |b| {
        let mut workload = Workload::new(42);
        b.iter(|| black_box(workload.random_key()));
    });

    g.bench_function(BenchmarkId::new("key_pool", 100), |b| {
        b.iter(|| {
            let mut workload = Workload::new(black_box(42));
            black_box(KeyPool::generate(&mut workload, 100).len());
        });
    });

    g.finish();
}

criterion_group!(benches, bench_bytes, bench_keys);
criterion_main!(benches);
