//! Benchmarks for SeqLog hot paths

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use seqlog::log::{LogCore, MemoryLog, SerialLog};
use seqlog::meta::{HashKind, MetaCodec, MetaRecord};

fn meta_benchmarks(c: &mut Criterion) {
    let record = MetaRecord::new(42, 4096, 512);

    for hash in [HashKind::Xxh3_64, HashKind::Xxh3_128] {
        let codec = MetaCodec::with_hash(hash);
        let raw = codec.encode(&record);

        c.bench_function(&format!("meta_encode_{:?}", hash), |b| {
            b.iter(|| codec.encode(black_box(&record)))
        });
        c.bench_function(&format!("meta_decode_{:?}", hash), |b| {
            b.iter(|| codec.decode(black_box(&raw)))
        });
    }
}

fn append_benchmarks(c: &mut Criterion) {
    let record = Bytes::from(vec![0xAB; 256]);

    c.bench_function("memory_append_1k", |b| {
        b.iter_batched(
            || {
                let log = MemoryLog::new();
                log.start().unwrap();
                log
            },
            |log| {
                for _ in 0..1000 {
                    log.append(record.clone(), None).unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("serial_append_1k", |b| {
        b.iter_batched(
            || {
                let log = SerialLog::new(MemoryLog::new());
                log.start().unwrap();
                log
            },
            |log| {
                for _ in 0..1000 {
                    log.append(record.clone(), None).unwrap();
                }
            },
            BatchSize::SmallInput,
        )
    });

    c.bench_function("memory_append_batch_1k", |b| {
        b.iter_batched(
            || {
                let log = MemoryLog::new();
                log.start().unwrap();
                (log, vec![record.clone(); 1000])
            },
            |(log, records)| log.append_batch(records, None).unwrap(),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, meta_benchmarks, append_benchmarks);
criterion_main!(benches);
