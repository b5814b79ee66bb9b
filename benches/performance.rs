//! Performance benchmarks for the pipeline.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use crossbeam_channel::{bounded, unbounded};
use tether::{CancelHandle, Chain, ChannelProducer, DeliveryContext, Feed, HandleSet, Link};

/// Benchmark copy-on-write chain derivation with varying registry sizes
fn bench_chain_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("chain_derivation");

    for handles in [0, 16, 256] {
        group.bench_with_input(
            BenchmarkId::new("handles", handles),
            &handles,
            |b, &count| {
                let mut set = HandleSet::new();
                for _ in 0..count {
                    set.insert(CancelHandle::new());
                }
                let chain: Chain<u64> = Chain::new()
                    .on_receive(|batch: &[u64]| {
                        black_box(batch);
                    })
                    .with_updated_handles(set);

                b.iter(|| black_box(chain.with_updated_handles(chain.handles().clone())));
            },
        );
    }

    group.finish();
}

/// Benchmark end-to-end batch delivery through a link
fn bench_batch_delivery(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_delivery");

    for batches in [10u64, 100, 1000] {
        group.bench_with_input(
            BenchmarkId::new("batches", batches),
            &batches,
            |b, &count| {
                let ctx = DeliveryContext::new("bench");

                b.iter(|| {
                    let (done_tx, done_rx) = bounded(1);
                    let chain: Chain<u64> = Chain::new()
                        .deliver_on(ctx.clone())
                        .on_receive(|batch: &[u64]| {
                            black_box(batch);
                        })
                        .on_finish(move || {
                            let _ = done_tx.send(());
                        });

                    let (feed, source) = unbounded();
                    let _link = Link::new(ChannelProducer::new(source), chain);
                    for i in 0..count {
                        feed.send(Feed::Batch(vec![i])).unwrap();
                    }
                    feed.send(Feed::Finish).unwrap();
                    done_rx.recv().unwrap();
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_chain_derivation, bench_batch_delivery);
criterion_main!(benches);
