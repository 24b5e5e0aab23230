use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mango_feed_core::data::{AccountLayout, Event, EventQueue};
use mango_feed_core::events::EventQueueReplayer;
use mango_feed_core::testing::EventQueueBuilder;

fn queue_with(fills: usize) -> (EventQueue, u64) {
    let mut builder = EventQueueBuilder::new();
    builder.push_fills(fills, 41_500);
    let seq_num = builder.seq_num();
    (builder.decode(), seq_num)
}

fn bench_decode(c: &mut Criterion) {
    let mut builder = EventQueueBuilder::new();
    builder.push_fills(256, 41_500);
    let bytes = builder.build();

    c.bench_function("replay/decode_full_queue", |b| {
        b.iter(|| black_box(EventQueue::decode(black_box(&bytes)).unwrap()))
    });
}

fn bench_replay(c: &mut Criterion) {
    let mut group = c.benchmark_group("replay/new_events");
    for fresh in [1u64, 16, 256] {
        let (queue, seq_num) = queue_with(256);
        group.bench_with_input(BenchmarkId::from_parameter(fresh), &queue, |b, queue| {
            b.iter(|| {
                let mut replayer = EventQueueReplayer::resume_from(seq_num - fresh);
                let mut fills = 0u64;
                replayer.replay_with(black_box(queue), |event| {
                    if let Event::Fill(_) = event {
                        fills += 1;
                    }
                });
                black_box(fills)
            })
        });
    }
    group.finish();
}

fn bench_stale_snapshot(c: &mut Criterion) {
    let (queue, seq_num) = queue_with(64);
    let mut replayer = EventQueueReplayer::resume_from(seq_num);

    c.bench_function("replay/stale_snapshot", |b| {
        b.iter(|| black_box(replayer.replay_with(black_box(&queue), |_| {})))
    });
}

criterion_group!(benches, bench_decode, bench_replay, bench_stale_snapshot);
criterion_main!(benches);
