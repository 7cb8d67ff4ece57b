use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use steamcarve::config::ScanConfig;
use steamcarve::evidence::{EvidenceSource, MemorySource};
use steamcarve::pipeline;
use steamcarve::sink::MemorySink;

/// Zeros with a URL, a chat line and an identifier every 4 KiB.
fn artifact_dense(size: usize) -> Vec<u8> {
    let mut image = vec![0u8; size];
    let plants: [&[u8]; 3] = [
        b"https://steamcommunity.com/profiles/76561198000000000",
        b"1700000000000 see you in game",
        b"76561198000000123",
    ];
    let mut offset = 0usize;
    let mut i = 0usize;
    while offset + 64 < size {
        let plant = plants[i % plants.len()];
        image[offset..offset + plant.len()].copy_from_slice(plant);
        offset += 4096;
        i += 1;
    }
    image
}

fn run(image: Arc<dyn EvidenceSource>, workers: usize) -> pipeline::PipelineStats {
    let cfg = ScanConfig {
        chunk_size: 4 * 1024 * 1024,
        ..ScanConfig::default()
    };
    pipeline::run_pipeline(&cfg, image, Box::new(MemorySink::new()), workers).expect("pipeline")
}

fn bench_throughput(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    for size in [8 * 1024 * 1024usize, 32 * 1024 * 1024usize] {
        let zeros: Arc<dyn EvidenceSource> = Arc::new(MemorySource::new(vec![0u8; size]));
        let dense: Arc<dyn EvidenceSource> = Arc::new(MemorySource::new(artifact_dense(size)));
        group.throughput(Throughput::Bytes(size as u64));

        group.bench_with_input(BenchmarkId::new("zeros_sequential", size), &zeros, |b, image| {
            b.iter(|| run(image.clone(), 1));
        });
        group.bench_with_input(BenchmarkId::new("dense_sequential", size), &dense, |b, image| {
            b.iter(|| run(image.clone(), 1));
        });
        group.bench_with_input(BenchmarkId::new("dense_parallel", size), &dense, |b, image| {
            b.iter(|| run(image.clone(), 4));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_throughput);
criterion_main!(benches);
