mod datasets;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use cryptarch::telemetry::noop_event_listener;
use cryptarch::{add_result, tokenize, MemorySink, Storage, StoreConfig};

use std::sync::Arc;
use std::thread;

fn make_config(retain_history: bool) -> StoreConfig {
    StoreConfig {
        retain_history,
        history_window: 1024,
        event_listener: noop_event_listener(),
        ..StoreConfig::default()
    }
}

fn bench_tokenize(c: &mut Criterion) {
    let ops = datasets::generate_put_ops(datasets::DEFAULT_SEED, 1_000, 1, 12);

    c.bench_function("tokenize_1k_12_fields", |b| {
        b.iter(|| {
            for op in &ops {
                black_box(tokenize(black_box(&op.raw)));
            }
        })
    });
}

fn bench_put_fixed_dataset(c: &mut Criterion) {
    let ops = datasets::generate_put_ops(datasets::DEFAULT_SEED, 20_000, 16, 6);

    let mut group = c.benchmark_group("put");

    for (name, retain) in [("retained", true), ("windowed", false)] {
        group.bench_function(format!("put_20k_{}", name), |b| {
            b.iter_batched(
                || Storage::with_config(make_config(retain)).expect("store init"),
                |storage| {
                    for op in &ops {
                        add_result(&storage, black_box(&op.query), black_box(&op.raw), true);
                    }
                },
                BatchSize::LargeInput,
            )
        });
    }

    group.bench_function("put_20k_two_sinks", |b| {
        b.iter_batched(
            || {
                let storage = Storage::with_config(make_config(true)).expect("store init");
                storage.add_external_storage(Arc::new(MemorySink::new()));
                storage.add_external_storage(Arc::new(MemorySink::new()));
                storage
            },
            |storage| {
                for op in &ops {
                    add_result(&storage, black_box(&op.query), black_box(&op.raw), true);
                }
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

fn bench_tail(c: &mut Criterion) {
    let ops = datasets::generate_put_ops(datasets::DEFAULT_SEED, 10_000, 1, 6);

    let mut group = c.benchmark_group("tail");

    group.bench_function("replay_10k", |b| {
        let storage = Storage::with_config(make_config(true)).expect("store init");
        for op in &ops {
            add_result(&storage, &op.query, &op.raw, true);
        }
        b.iter(|| {
            let mut reader = storage.new_reader_index("query_0");
            while !storage.next_or_empty(&mut reader).is_empty() {}
            black_box(storage.get_to_index(&reader).len())
        })
    });

    // One producer, two blocking readers on the same query.
    group.bench_function("put_and_tail_10k_two_readers", |b| {
        b.iter_batched(
            || Arc::new(Storage::with_config(make_config(true)).expect("store init")),
            |storage| {
                let readers: Vec<_> = (0..2)
                    .map(|_| {
                        let storage = Arc::clone(&storage);
                        let total = ops.len();
                        thread::spawn(move || {
                            let mut reader = storage.new_reader_index("query_0");
                            for _ in 0..total {
                                black_box(storage.next(&mut reader));
                            }
                        })
                    })
                    .collect();
                for op in &ops {
                    add_result(&storage, &op.query, &op.raw, true);
                }
                for handle in readers {
                    handle.join().unwrap();
                }
            },
            BatchSize::LargeInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_tokenize, bench_put_fixed_dataset, bench_tail);
criterion_main!(benches);
