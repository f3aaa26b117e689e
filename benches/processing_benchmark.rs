use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tempstats::compute::{ComputeSession, HostBackend};
use tempstats::models::{FixedPoint, Series};
use tempstats::processors::{Aligner, StatisticsPipeline};
use tempstats::readers::RecordLoader;

// Deterministic pseudo-random readings between -40.00 and 50.00
fn create_test_series(len: usize) -> Series {
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            FixedPoint::from_raw((state % 9_001) as i32 - 4_000)
        })
        .collect()
}

fn benchmark_aligner(c: &mut Criterion) {
    let series = create_test_series(100_003);

    c.bench_function("aligner_pad_256", |b| {
        b.iter(|| {
            let padded = Aligner::pad(black_box(&series), 256, FixedPoint::SENTINEL).unwrap();
            black_box(padded.len())
        })
    });
}

fn benchmark_record_parsing(c: &mut Criterion) {
    let text: String = create_test_series(50_000)
        .iter()
        .enumerate()
        .map(|(i, value)| format!("{} {}\n", i, value))
        .collect();

    c.bench_function("record_loader_50k", |b| {
        b.iter(|| {
            let loaded = RecordLoader::new()
                .load_from_reader(black_box(text.as_bytes()))
                .unwrap();
            black_box(loaded.series.len())
        })
    });
}

fn benchmark_host_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("host_pipeline");
    group.sample_size(10);

    for size in [1_000, 10_000, 100_000].iter() {
        let series = create_test_series(*size);
        group.throughput(Throughput::Elements(*size as u64));

        group.bench_with_input(BenchmarkId::new("statistics", size), size, |b, _| {
            let mut session = ComputeSession::new(HostBackend::new(num_cpus::get()).unwrap());
            let pipeline = StatisticsPipeline::default();
            b.iter(|| {
                let report = pipeline.run(&mut session, black_box(&series), None).unwrap();
                black_box(report.statistics)
            })
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    benchmark_aligner,
    benchmark_record_parsing,
    benchmark_host_pipeline
);
criterion_main!(benches);
