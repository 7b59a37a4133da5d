//! DocId 인코딩/정렬 벤치마크

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use loghive_engine::DocId;

fn bench_docid_new(c: &mut Criterion) {
    c.bench_function("docid_new", |b| {
        b.iter(|| DocId::new(black_box(481_073_250_520_000_000), black_box(42)))
    });
}

fn bench_docid_sort(c: &mut Criterion) {
    let ids: Vec<DocId> = (0..10_000u64)
        .map(|n| DocId::new((n.wrapping_mul(2_654_435_761) % 1_000_000) as i64, n))
        .collect();

    c.bench_function("docid_sort_10k", |b| {
        b.iter_with_setup(
            || ids.clone(),
            |mut ids| {
                ids.sort();
                black_box(ids)
            },
        )
    });
}

criterion_group!(benches, bench_docid_new, bench_docid_sort);
criterion_main!(benches);
