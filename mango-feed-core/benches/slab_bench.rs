use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mango_feed_core::core::Side;
use mango_feed_core::data::{AccountLayout, BookSide};
use mango_feed_core::testing::{BookSideBuilder, LeafSpec};

const NOW: u64 = 1_700_000_000;

fn book_bytes(leaves: u64) -> Vec<u8> {
    let specs: Vec<LeafSpec> = (0..leaves)
        .map(|i| LeafSpec::new(40_000 - i * 3, 1 + (i % 17) as i64).with_sequence(i))
        .collect();
    BookSideBuilder::with_leaves(&specs).build()
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("slab/decode");
    for leaves in [16u64, 128, 500] {
        let bytes = book_bytes(leaves);
        group.bench_with_input(BenchmarkId::from_parameter(leaves), &bytes, |b, bytes| {
            b.iter(|| black_box(BookSide::decode(black_box(bytes)).unwrap()))
        });
    }
    group.finish();
}

fn bench_best_order(c: &mut Criterion) {
    let book = BookSide::decode(&book_bytes(500)).unwrap();

    c.bench_function("slab/best_bid_500", |b| {
        b.iter(|| black_box(book.best_order(black_box(Side::Buy), NOW)))
    });

    c.bench_function("slab/best_ask_500", |b| {
        b.iter(|| black_box(book.best_order(black_box(Side::Sell), NOW)))
    });
}

fn bench_volume(c: &mut Criterion) {
    let book = BookSide::decode(&book_bytes(500)).unwrap();

    c.bench_function("slab/volume_full_scan_500", |b| {
        b.iter(|| black_box(book.volume(Side::Buy, black_box(39_000), NOW)))
    });

    c.bench_function("slab/levels_500", |b| {
        b.iter(|| black_box(book.levels(Side::Buy, NOW)))
    });
}

criterion_group!(benches, bench_decode, bench_best_order, bench_volume);
criterion_main!(benches);
