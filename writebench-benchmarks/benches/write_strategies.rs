use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::{rngs::StdRng, SeedableRng};
use std::hint::black_box;
use tokio::runtime::Runtime;
use writebench::{
    generate_records, reset_destinations, BatchedWriter, ChunkSize, NaiveWriter, RecordCount,
};
use writebench_memory::InMemoryDocumentStore;
use writebench_types::Record;

fn records(count: usize) -> Vec<Record> {
    generate_records(
        RecordCount::try_new(count).unwrap(),
        &mut StdRng::seed_from_u64(42),
    )
}

/// Benchmark the naive strategy over growing record sets
fn bench_naive_writes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    let writer = NaiveWriter::new(store.clone());

    let mut group = c.benchmark_group("naive_writes");

    for count in [1_000usize, 10_000, 30_000] {
        let records = records(count);
        group.throughput(Throughput::Elements(count as u64));

        group.bench_with_input(BenchmarkId::new("write", count), &records, |b, records| {
            b.to_async(&rt).iter(|| async {
                reset_destinations(&store).await.unwrap();
                black_box(writer.write(records).await.unwrap())
            });
        });
    }
    group.finish();
}

/// Benchmark the batched strategy across chunk sizes, concurrent and sequential
fn bench_batched_writes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    let records = records(30_000);

    let mut group = c.benchmark_group("batched_writes");
    group.throughput(Throughput::Elements(30_000));

    for chunk in [500usize, 5_000, 15_000] {
        for concurrent in [true, false] {
            let writer = BatchedWriter::new(store.clone(), ChunkSize::try_new(chunk).unwrap())
                .with_concurrency(concurrent);
            let label = if concurrent { "concurrent" } else { "sequential" };

            group.bench_with_input(BenchmarkId::new(label, chunk), &records, |b, records| {
                b.to_async(&rt).iter(|| async {
                    reset_destinations(&store).await.unwrap();
                    black_box(writer.write(records).await.unwrap())
                });
            });
        }
    }
    group.finish();
}

criterion_group!(benches, bench_naive_writes, bench_batched_writes);
criterion_main!(benches);
