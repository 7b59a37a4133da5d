//! Event 생성 및 기준 시각 계산 벤치마크

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use loghive_core::event::{Event, ParsedFields};

fn sample_parsed() -> ParsedFields {
    ParsedFields {
        priority: 33,
        version: 5,
        timestamp: "1985-04-12T23:20:50.52Z".to_owned(),
        host: "test.com".to_owned(),
        app: "cron".to_owned(),
        pid: 304,
        message_id: "-".to_owned(),
        message: "password accepted".to_owned(),
    }
}

fn bench_event_new(c: &mut Criterion) {
    c.bench_function("event_new_parsed", |b| {
        b.iter(|| {
            Event::new(
                black_box("<33>5 1985-04-12T23:20:50.52Z test.com cron 304 - password accepted"),
                Some(sample_parsed()),
                "127.0.0.1:40312",
            )
        })
    });
}

fn bench_reference_time(c: &mut Criterion) {
    c.bench_function("event_reference_time_first_access", |b| {
        b.iter_with_setup(
            || Event::new("line", Some(sample_parsed()), "src"),
            |event| black_box(event.reference_time()),
        )
    });
}

criterion_group!(benches, bench_event_new, bench_reference_time);
criterion_main!(benches);
