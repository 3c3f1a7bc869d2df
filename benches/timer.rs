//! Micro-benchmarks for the timer registry's three hot paths: appending a fresh connection,
//! refreshing an existing one (the remove+re-append that keeps the list timestamp-ordered), and
//! sweeping expired entries from the head.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use maestro::timer::TimerRegistry;
use mio::Token;

fn bench_append(c: &mut Criterion) {
    c.bench_function("timer_append_1000", |b| {
        b.iter(|| {
            let mut reg = TimerRegistry::new();
            for i in 0..1000u64 {
                reg.append(Token(i as usize), i).unwrap();
            }
            black_box(reg.len());
        });
    });
}

fn bench_update(c: &mut Criterion) {
    let mut reg = TimerRegistry::new();
    for i in 0..1000u64 {
        reg.append(Token(i as usize), i).unwrap();
    }

    c.bench_function("timer_update_same_1000", |b| {
        b.iter(|| {
            for i in 0..1000u64 {
                reg.update(Token(i as usize), i + 1);
            }
        });
    });
}

fn bench_expire(c: &mut Criterion) {
    c.bench_function("timer_expire_1000_of_1000", |b| {
        b.iter(|| {
            let mut reg = TimerRegistry::new();
            for i in 0..1000u64 {
                reg.append(Token(i as usize), i).unwrap();
            }
            let mut expired = 0usize;
            reg.expire(10_000, 0, |_| expired += 1);
            black_box(expired);
        });
    });
}

criterion_group!(benches, bench_append, bench_update, bench_expire);
criterion_main!(benches);
