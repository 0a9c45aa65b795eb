//! Benchmarks for partitioning and task persistence.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    missing_docs
)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use fedtask::{
    holdout, partition::partition, task::client_names, task::TaskContent, Distribution,
    HoldoutResult, SeedController, SkewSpec, TaskWriter, XyDataset,
};

fn create_dataset(rows: usize, classes: usize) -> XyDataset {
    let x = (0..rows).map(|i| vec![i as f32; 4]).collect();
    let y = (0..rows).map(|i| (i % classes) as i64).collect();
    XyDataset::new(x, y).unwrap()
}

fn bench_distributions(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition");
    let dataset = create_dataset(10_000, 10);
    group.throughput(Throughput::Elements(10_000));

    for distribution in [
        Distribution::Iid,
        Distribution::LabelQuantity,
        Distribution::LabelDirichlet,
        Distribution::LabelShard,
    ] {
        let spec = SkewSpec::new(distribution, 100).with_skewness(0.5);
        group.bench_with_input(
            BenchmarkId::from_parameter(distribution.name()),
            &spec,
            |b, spec| b.iter(|| partition(black_box(&dataset), spec).unwrap()),
        );
    }
    group.finish();
}

fn bench_dirichlet_clients(c: &mut Criterion) {
    let mut group = c.benchmark_group("dirichlet_clients");
    let dataset = create_dataset(20_000, 10);

    for clients in [10usize, 100, 500] {
        let spec = SkewSpec::new(Distribution::LabelDirichlet, clients).with_skewness(0.8);
        group.bench_with_input(BenchmarkId::from_parameter(clients), &spec, |b, spec| {
            b.iter(|| partition(black_box(&dataset), spec).unwrap());
        });
    }
    group.finish();
}

fn bench_holdout(c: &mut Criterion) {
    let dataset = create_dataset(50_000, 10);
    let spec = SkewSpec::new(Distribution::Iid, 100);
    let result = partition(&dataset, &spec).unwrap();

    c.bench_function("holdout_50k", |b| {
        let mut seeds = SeedController::new(0);
        b.iter(|| holdout::split(black_box(&result), 0.8, true, seeds.sampling()).unwrap());
    });
}

fn bench_save(c: &mut Criterion) {
    let mut group = c.benchmark_group("save_xy");
    group.sample_size(20);

    for size in &[1_000usize, 10_000] {
        let dataset = create_dataset(*size, 10);
        let test = create_dataset(size / 10, 10);
        let spec = SkewSpec::new(Distribution::Iid, 10);
        let part = partition(&dataset, &spec).unwrap();
        let mut seeds = SeedController::new(0);
        let split: HoldoutResult = holdout::split(&part, 0.8, true, seeds.sampling()).unwrap();
        let names = client_names(10);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let root = tempfile::tempdir().unwrap();
            let writer = TaskWriter::new(root.path());
            let mut run = 0usize;
            b.iter(|| {
                run += 1;
                writer
                    .save(
                        &format!("task{run}"),
                        &split,
                        TaskContent::Xy {
                            train: &dataset,
                            test: &test,
                        },
                        &names,
                    )
                    .unwrap()
            });
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_distributions,
    bench_dirichlet_clients,
    bench_holdout,
    bench_save
);
criterion_main!(benches);
