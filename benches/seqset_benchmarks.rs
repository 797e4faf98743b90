use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tempo::prelude::*;

fn ts(n: i64) -> Timestamp {
    Timestamp::from_micros(n)
}

/// A set with `n` disjoint two-instant linear sequences.
fn build_set(n: i64) -> TSequenceSet {
    let sequences: Vec<TSequence> = (0..n)
        .map(|i| {
            let base = i * 10;
            TSequence::new(
                vec![
                    TInstant::new(ts(base), Value::Float(0.0)),
                    TInstant::new(ts(base + 5), Value::Float(5.0)),
                ],
                true,
                false,
                Interpolation::Linear,
                false,
            )
            .unwrap()
        })
        .collect();
    TSequenceSet::make(sequences, false).unwrap()
}

fn bench_find_timestamp(c: &mut Criterion) {
    let ss = build_set(1000);
    c.bench_function("find_timestamp_1000", |b| {
        b.iter(|| {
            for t in [3_i64, 2_503, 7_507, 9_999] {
                black_box(ss.find_timestamp(ts(t)));
            }
        })
    });
}

fn bench_append_sequence(c: &mut Criterion) {
    c.bench_function("append_sequence_1000", |b| {
        b.iter(|| {
            let mut ss = build_set(1);
            for i in 1..1000_i64 {
                let base = i * 10;
                let seq = TSequence::new(
                    vec![
                        TInstant::new(ts(base), Value::Float(0.0)),
                        TInstant::new(ts(base + 5), Value::Float(5.0)),
                    ],
                    true,
                    false,
                    Interpolation::Linear,
                    false,
                )
                .unwrap();
                ss.append_sequence(seq).unwrap();
            }
            black_box(ss)
        })
    });
}

fn bench_at_period(c: &mut Criterion) {
    let ss = build_set(1000);
    let p = Period::new(ts(2_000), ts(8_000), true, false).unwrap();
    c.bench_function("at_period_1000", |b| {
        b.iter(|| black_box(ss.at_period(black_box(&p))))
    });
}

fn bench_synchronize(c: &mut Criterion) {
    let a = build_set(200);
    let b = build_set(200);
    c.bench_function("synchronize_200", |bench| {
        bench.iter(|| black_box(synchronize_set_set(&a, &b, SyncMode::Crossings)))
    });
}

criterion_group!(
    benches,
    bench_find_timestamp,
    bench_append_sequence,
    bench_at_period,
    bench_synchronize
);
criterion_main!(benches);
