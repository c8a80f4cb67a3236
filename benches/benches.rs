use byte_slice_cast::AsByteSlice;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use iq_slurper::stats::autoscale;
use iq_slurper::store::CaptureFile;
use iq_slurper::{BYTES_PER_SAMPLE, SAMPLES_PER_BLOCK};
use rand::prelude::*;

fn benchmark(c: &mut Criterion) {
    let mut rng = rand::thread_rng();

    // One full hardware block of IQ samples
    let mut block = vec![0i16; SAMPLES_PER_BLOCK * 2];
    rng.fill(&mut block[..]);
    let block_bytes = SAMPLES_PER_BLOCK * BYTES_PER_SAMPLE;

    let dir = tempfile::tempdir().unwrap();
    let mut store = CaptureFile::create(&dir.path().join("bench.iq"), block_bytes as u64).unwrap();

    let mut group = c.benchmark_group("store");
    group.throughput(Throughput::Bytes(block_bytes as u64));
    group.bench_function("write block", |b| {
        b.iter(|| {
            store
                .tail_mut(block_bytes)
                .copy_from_slice(black_box(block.as_byte_slice()));
        })
    });
    group.finish();

    c.bench_function("autoscale", |b| {
        b.iter(|| autoscale(black_box(123_456_789.0)))
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
