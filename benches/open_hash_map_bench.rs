use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use handle_heap::{Located, OpenHashMap};
use std::time::Duration;

fn lcg(mut s: u64) -> impl Iterator<Item = u64> {
    std::iter::from_fn(move || {
        s = s.wrapping_mul(6364136223846793005).wrapping_add(1);
        Some(s)
    })
}

fn key(n: u64) -> String {
    format!("k{:016x}", n)
}

fn filled(seed: u64, n: usize) -> (OpenHashMap<String, u64>, Vec<String>) {
    let mut m = OpenHashMap::new(0);
    let keys: Vec<String> = lcg(seed).take(n).map(key).collect();
    for (i, k) in keys.iter().enumerate() {
        m.set(k.clone(), i as u64);
    }
    (m, keys)
}

fn bench_insert_fresh_100k(c: &mut Criterion) {
    c.bench_function("map::insert_fresh_100k", |b| {
        b.iter_batched(
            || OpenHashMap::<String, u64>::new(0),
            |mut m| {
                for (i, x) in lcg(1).take(100_000).enumerate() {
                    m.set(key(x), i as u64);
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_reserve_fill_100k(c: &mut Criterion) {
    c.bench_function("map::reserve_fill_100k", |b| {
        b.iter_batched(
            || OpenHashMap::<String, u64>::with_capacity(0, 100_000),
            |mut m| {
                for (i, x) in lcg(2).take(100_000).enumerate() {
                    if let Located::Reserved(slot) = m.locate_or_reserve(key(x)) {
                        let _ = m.set_value_at(slot, i as u64);
                    }
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_find_hit_10k(c: &mut Criterion) {
    let (m, keys) = filled(3, 100_000);
    let probes: Vec<&str> = lcg(4)
        .take(10_000)
        .map(|s| keys[(s as usize) % keys.len()].as_str())
        .collect();
    c.bench_function("map::find_hit_10k", |b| {
        b.iter(|| {
            let mut acc = 0u64;
            for k in &probes {
                acc = acc.wrapping_add(*m.get(*k));
            }
            black_box(acc)
        })
    });
}

fn bench_find_miss_10k(c: &mut Criterion) {
    let (m, _) = filled(5, 100_000);
    let probes: Vec<String> = lcg(6).take(10_000).map(|x| format!("miss{x}")).collect();
    c.bench_function("map::find_miss_10k", |b| {
        b.iter(|| {
            let mut hits = 0usize;
            for k in &probes {
                hits += m.contains_key(k.as_str()) as usize;
            }
            black_box(hits)
        })
    });
}

fn bench_churn_100k(c: &mut Criterion) {
    c.bench_function("map::churn_window_1k_100k", |b| {
        b.iter_batched(
            || OpenHashMap::<u64, u64>::with_capacity(0, 1_024),
            |mut m| {
                let xs: Vec<u64> = lcg(8).take(100_000).collect();
                for (i, &x) in xs.iter().enumerate() {
                    m.set(x, x);
                    if i >= 1_000 {
                        black_box(m.remove(&xs[i - 1_000]));
                    }
                }
                black_box(m)
            },
            BatchSize::SmallInput,
        )
    });
}

fn bench_iter_ordered_vs_raw(c: &mut Criterion) {
    let (m, _) = filled(9, 100_000);
    c.bench_function("map::iter_ordered_100k", |b| {
        b.iter(|| black_box(m.values().fold(0u64, |a, v| a.wrapping_add(*v))))
    });
    c.bench_function("map::iter_raw_100k", |b| {
        b.iter(|| black_box(m.raw_iter().fold(0u64, |a, (_, _, v)| a.wrapping_add(*v))))
    });
}

fn bench_config() -> Criterion {
    Criterion::default()
        .sample_size(12)
        .measurement_time(Duration::from_secs(5))
        .warm_up_time(Duration::from_secs(1))
}

criterion_group! {
    name = benches_insert;
    config = bench_config();
    targets = bench_insert_fresh_100k, bench_reserve_fill_100k
}
criterion_group! {
    name = benches_ops;
    config = bench_config();
    targets = bench_find_hit_10k,
              bench_find_miss_10k,
              bench_churn_100k,
              bench_iter_ordered_vs_raw
}
criterion_main!(benches_insert, benches_ops);
