// Performance benchmarks for k-NN search and dataset preparation
use ahash::AHashSet;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tonematch_core::{DataSet, Descriptors, Value, FILENAME_DESCRIPTOR};
use tonematch_similarity::{build_metric, nn_search, MetricConfig};
use tonematch_transform::{pca, PcaConfig};

const MFCC_DIM: usize = 4;

fn identity(dim: usize) -> Vec<f32> {
    (0..dim * dim)
        .map(|i| if i % (dim + 1) == 0 { 1.0 } else { 0.0 })
        .collect()
}

fn random_values(rng: &mut StdRng, dim: usize) -> Vec<f32> {
    (0..dim).map(|_| rng.random_range(-1.0f32..1.0f32)).collect()
}

/// Points shaped like a prepared dataset: pca block, mfcc gaussian, high-level tags
fn generate_prepared(size: usize) -> DataSet {
    let mut rng = StdRng::seed_from_u64(7);
    let samples: Vec<(String, Descriptors)> = (0..size)
        .map(|i| {
            let mut d = Descriptors::new();
            d.insert(FILENAME_DESCRIPTOR.to_string(), Value::from(format!("sample_{}.wav", i)));
            d.insert("pca".to_string(), Value::Real(random_values(&mut rng, 25)));
            d.insert("lowlevel.mfcc.mean".to_string(), Value::Real(random_values(&mut rng, MFCC_DIM)));
            d.insert("lowlevel.mfcc.cov".to_string(), Value::Real(identity(MFCC_DIM)));
            d.insert("lowlevel.mfcc.icov".to_string(), Value::Real(identity(MFCC_DIM)));
            for tag in ["bass", "loop", "synth", "phrase", "perc"] {
                let p = rng.random_range(0.0f32..1.0f32);
                d.insert(format!("highlevel.{}.all.yes", tag), Value::scalar(p));
                d.insert(format!("highlevel.{}.all.no", tag), Value::scalar(1.0 - p));
            }
            (format!("p{}", i), d)
        })
        .collect();
    DataSet::from_descriptors("bench", samples).unwrap()
}

/// Raw numeric block for PCA
fn generate_lowlevel(size: usize, descriptors: usize) -> DataSet {
    let mut rng = StdRng::seed_from_u64(11);
    let samples: Vec<(String, Descriptors)> = (0..size)
        .map(|i| {
            let d: Descriptors = (0..descriptors)
                .map(|j| (format!("lowlevel.d{:02}", j), Value::scalar(rng.random_range(0.0f32..10.0f32))))
                .collect();
            (format!("p{}", i), d)
        })
        .collect();
    DataSet::from_descriptors("lowlevel", samples).unwrap()
}

fn benchmark_nn_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("nn_search");

    for size in [1000, 10000].iter() {
        let dataset = generate_prepared(*size);
        let metric = build_metric(dataset.layout(), &MetricConfig::default()).unwrap();
        let query = dataset.point("p0").unwrap().clone();
        let exclude = AHashSet::new();

        group.bench_with_input(BenchmarkId::new("composite", size), size, |b, _| {
            b.iter(|| {
                let results = nn_search(&dataset, &metric, black_box(&query), 30, &exclude);
                black_box(results);
            });
        });
    }

    group.finish();
}

fn benchmark_pca(c: &mut Criterion) {
    let mut group = c.benchmark_group("pca");
    group.sample_size(10);

    for size in [500, 2000].iter() {
        let dataset = generate_lowlevel(*size, 40);
        group.bench_with_input(BenchmarkId::new("fit_and_project", size), size, |b, _| {
            b.iter(|| {
                let reduced = pca(dataset.clone(), &PcaConfig::default()).unwrap();
                black_box(reduced);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_nn_search, benchmark_pca);
criterion_main!(benches);
