//! Throughput of the transition handoff channel.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use servokit_transition::prelude::*;
use std::hint::black_box;
use std::sync::Arc;
use std::thread;

fn run_handoff(count: u32) -> usize {
    let token = Arc::new(TransitionToken::new());
    let producer = {
        let token = Arc::clone(&token);
        thread::spawn(move || {
            for i in 0..count {
                if token.supply(f64::from(i) / f64::from(count)).is_err() {
                    return;
                }
            }
            token.finish().unwrap_or_default();
        })
    };

    let mut consumed = 0usize;
    while let Ok(position) = token.consume() {
        black_box(position);
        consumed += 1;
    }
    producer.join().unwrap_or_default();
    consumed
}

fn bench_handoff(c: &mut Criterion) {
    let mut group = c.benchmark_group("handoff");
    for count in [16u32, 256, 1024] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| run_handoff(black_box(count)));
        });
    }
    group.finish();
}

fn bench_uncontended(c: &mut Criterion) {
    let token = TransitionToken::new();
    c.bench_function("supply_consume_same_thread", |b| {
        b.iter(|| {
            token.supply(black_box(0.5)).unwrap_or_default();
            black_box(token.consume().ok())
        });
    });
}

criterion_group!(benches, bench_handoff, bench_uncontended);
criterion_main!(benches);
